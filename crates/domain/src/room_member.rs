use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{RoomId, Timestamp, UserId};

/// 房间内角色。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomRole {
    Owner,
    Admin,
    Member,
}

impl RoomRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            _ => Err(DomainError::invalid_input("role", "unknown role value")),
        }
    }

    /// 房主和管理员可以管理成员
    pub fn has_admin_access(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }

    /// 用于成员列表排序：owner -> admin -> member
    pub fn sort_weight(&self) -> u8 {
        match self {
            Self::Owner => 0,
            Self::Admin => 1,
            Self::Member => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMember {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub role: RoomRole,
    pub joined_at: Timestamp,
}

impl RoomMember {
    pub fn new(room_id: RoomId, user_id: UserId, role: RoomRole, joined_at: Timestamp) -> Self {
        Self {
            room_id,
            user_id,
            role,
            joined_at,
        }
    }

    pub fn is_owner(&self) -> bool {
        matches!(self.role, RoomRole::Owner)
    }

    pub fn is_admin(&self) -> bool {
        self.role.has_admin_access()
    }

    /// 检查是否可以移除指定角色的成员。
    ///
    /// 房主可以移除除自己以外的所有人；管理员只能移除普通成员；房主
    /// 永远不能被移除。
    pub fn can_remove(&self, target: RoomRole) -> bool {
        match (self.role, target) {
            (_, RoomRole::Owner) => false,
            (RoomRole::Owner, _) => true,
            (RoomRole::Admin, RoomRole::Member) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn member(role: RoomRole) -> RoomMember {
        RoomMember::new(
            RoomId(Uuid::new_v4()),
            UserId(Uuid::new_v4()),
            role,
            Utc::now(),
        )
    }

    #[test]
    fn test_role_parse_round_trip() {
        for role in [RoomRole::Owner, RoomRole::Admin, RoomRole::Member] {
            assert_eq!(RoomRole::parse(role.as_str()).unwrap(), role);
        }
        assert!(RoomRole::parse("bot").is_err());
        assert!(RoomRole::parse("").is_err());
    }

    #[test]
    fn test_admin_access() {
        assert!(member(RoomRole::Owner).is_admin());
        assert!(member(RoomRole::Admin).is_admin());
        assert!(!member(RoomRole::Member).is_admin());
    }

    #[test]
    fn test_remove_permissions() {
        let owner = member(RoomRole::Owner);
        let admin = member(RoomRole::Admin);
        let plain = member(RoomRole::Member);

        // 房主可以移除管理员和普通成员，但房主不可被移除
        assert!(owner.can_remove(RoomRole::Admin));
        assert!(owner.can_remove(RoomRole::Member));
        assert!(!owner.can_remove(RoomRole::Owner));

        // 管理员只能移除普通成员
        assert!(!admin.can_remove(RoomRole::Owner));
        assert!(!admin.can_remove(RoomRole::Admin));
        assert!(admin.can_remove(RoomRole::Member));

        // 普通成员不能移除任何人
        assert!(!plain.can_remove(RoomRole::Owner));
        assert!(!plain.can_remove(RoomRole::Admin));
        assert!(!plain.can_remove(RoomRole::Member));
    }

    #[test]
    fn test_sort_weight_order() {
        assert!(RoomRole::Owner.sort_weight() < RoomRole::Admin.sort_weight());
        assert!(RoomRole::Admin.sort_weight() < RoomRole::Member.sort_weight());
    }
}
