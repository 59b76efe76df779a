//! 领域错误定义
//!
//! 错误变体与 HTTP 层的状态码类别一一对应：未找到 / 权限 / 冲突 / 输入
//! 校验 / 状态机误用，调用方可以据此分支处理。

use thiserror::Error;

/// 领域错误类型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// 输入校验失败
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("room not found")]
    RoomNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("message not found")]
    MessageNotFound,

    #[error("invitation not found")]
    InvitationNotFound,

    /// 用户不是房间成员
    #[error("you are not a member of this room")]
    NotMember,

    #[error("insufficient permissions")]
    InsufficientPermissions,

    /// 房间名称冲突
    #[error("room name already exists")]
    DuplicateName,

    /// 同一 (房间, 被邀请人) 已存在待处理邀请
    #[error("a pending invitation already exists for this user")]
    DuplicatePending,

    #[error("user is already a member of this room")]
    AlreadyMember,

    /// 账号被封禁
    #[error("account is banned")]
    AccountBanned,

    /// 连接层认证失败
    #[error("authentication failed")]
    AuthenticationFailed,

    /// 邀请已经被接受或拒绝，不能再次处理
    #[error("invitation has already been resolved")]
    AlreadyResolved,

    /// 消息已经被删除
    #[error("message is already deleted")]
    AlreadyDeleted,

    #[error("cannot leave the global room")]
    CannotLeaveGlobal,

    #[error("cannot delete the global room")]
    CannotDeleteGlobal,

    /// 房主必须先转让房主身份或删除房间
    #[error("owner must transfer ownership or delete the room")]
    OwnerMustTransferOrDelete,
}

impl DomainError {
    pub fn invalid_input(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

/// 领域结果类型
pub type DomainResult<T> = Result<T, DomainError>;

/// 存储层错误类型
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,

    /// 唯一约束冲突
    #[error("conflicting record")]
    Conflict,

    #[error("storage error: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
