//! 私密房间邀请实体
//!
//! 状态机：pending -> accepted 或 pending -> rejected，均为终态。同一
//! (房间, 被邀请人) 在任一时刻至多存在一条 pending 记录；终态记录在
//! 发起新邀请时被清理，状态机随之重新开始。

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{InvitationId, RoomId, Timestamp, UserId};

/// 邀请状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            _ => Err(DomainError::invalid_input(
                "status",
                "unknown invitation status",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: InvitationId,
    pub room_id: RoomId,
    pub inviter_id: UserId,
    pub invitee_id: UserId,
    pub status: InvitationStatus,
    pub created_at: Timestamp,
    pub responded_at: Option<Timestamp>,
}

impl Invitation {
    pub fn new(
        id: InvitationId,
        room_id: RoomId,
        inviter_id: UserId,
        invitee_id: UserId,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            room_id,
            inviter_id,
            invitee_id,
            status: InvitationStatus::Pending,
            created_at,
            responded_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, InvitationStatus::Pending)
    }

    /// 接受邀请。仅 pending 状态可以转移。
    pub fn accept(&mut self, now: Timestamp) -> Result<(), DomainError> {
        if !self.is_pending() {
            return Err(DomainError::AlreadyResolved);
        }
        self.status = InvitationStatus::Accepted;
        self.responded_at = Some(now);
        Ok(())
    }

    /// 拒绝邀请。仅 pending 状态可以转移。
    pub fn reject(&mut self, now: Timestamp) -> Result<(), DomainError> {
        if !self.is_pending() {
            return Err(DomainError::AlreadyResolved);
        }
        self.status = InvitationStatus::Rejected;
        self.responded_at = Some(now);
        Ok(())
    }
}
