use async_trait::async_trait;
use domain::{UserId, UserRole, Username};
use thiserror::Error;

/// 连接认证后的用户身份快照。
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub username: Username,
    pub role: UserRole,
    pub is_banned: bool,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity backend error: {0}")]
    Backend(String),
}

impl IdentityError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// 身份服务端口。
///
/// 把一个不透明的凭证解析为用户记录；凭证无效时返回 `None` 而不是
/// 错误，`Err` 只表示身份后端本身不可用。
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(
        &self,
        credential: &str,
    ) -> Result<Option<AuthenticatedUser>, IdentityError>;
}
