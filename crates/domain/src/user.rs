use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{Timestamp, UserId, Username};

/// 站点级角色（区别于房间内角色）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Member,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "member" => Ok(Self::Member),
            "admin" => Ok(Self::Admin),
            _ => Err(DomainError::invalid_input("role", "unknown role value")),
        }
    }
}

/// 用户记录。
///
/// 账号的创建和凭证管理由身份服务负责，聊天子系统只读取这份快照来做
/// 授权判断（封禁、站点管理员）和展示（用户名、头像）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: Username,
    pub role: UserRole,
    pub is_banned: bool,
    pub avatar_url: Option<String>,
    pub created_at: Timestamp,
}

impl User {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }
}
