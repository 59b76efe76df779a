use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{RoomId, Timestamp};

/// 房间类别。
///
/// 每个房间必属于三类之一：全站唯一的全局房间（所有用户隐式加入，不可
/// 退出、不可删除）、可被发现并直接加入的公开房间、仅凭邀请加入的私密
/// 房间。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    Global,
    Public,
    Private,
}

impl RoomKind {
    /// 从存储层的标志位还原类别
    pub fn from_flags(is_global: bool, is_public: bool) -> Self {
        if is_global {
            Self::Global
        } else if is_public {
            Self::Public
        } else {
            Self::Private
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }

    pub fn is_public(&self) -> bool {
        matches!(self, Self::Public)
    }

    pub fn is_private(&self) -> bool {
        matches!(self, Self::Private)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub description: Option<String>,
    pub kind: RoomKind,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Room {
    pub fn new(
        id: RoomId,
        name: impl Into<String>,
        description: Option<String>,
        kind: RoomKind,
        created_at: Timestamp,
    ) -> Result<Self, DomainError> {
        let name = Self::validate_name(name.into())?;
        Ok(Self {
            id,
            name,
            description: description.filter(|text| !text.trim().is_empty()),
            kind,
            created_at,
            updated_at: created_at,
        })
    }

    pub fn is_global(&self) -> bool {
        self.kind.is_global()
    }

    /// 公开或全局房间无需邀请即可进入
    pub fn is_open(&self) -> bool {
        !self.kind.is_private()
    }

    fn validate_name(name: String) -> Result<String, DomainError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_input("name", "cannot be empty"));
        }
        if trimmed.len() > 100 {
            return Err(DomainError::invalid_input(
                "name",
                "too long (max 100 characters)",
            ));
        }
        Ok(trimmed.to_owned())
    }
}
