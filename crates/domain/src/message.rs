use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{MessageBody, MessageId, RoomId, Timestamp, UserId};

/// 聊天消息。
///
/// 删除始终是软删除：`is_deleted` 置位后消息从列表中消失，但记录保留，
/// 回复计数和线程结构保持一致。`parent_id` 只允许一层回复。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub body: MessageBody,
    pub parent_id: Option<MessageId>,
    pub is_deleted: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Message {
    pub fn new(
        id: MessageId,
        room_id: RoomId,
        user_id: UserId,
        body: MessageBody,
        parent_id: Option<MessageId>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            room_id,
            user_id,
            body,
            parent_id,
            is_deleted: false,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    /// 编辑消息正文。已删除的消息不可编辑。
    pub fn edit(&mut self, body: MessageBody, now: Timestamp) -> Result<(), DomainError> {
        if self.is_deleted {
            return Err(DomainError::AlreadyDeleted);
        }
        self.body = body;
        self.updated_at = now;
        Ok(())
    }

    /// 软删除。重复删除是状态机误用。
    pub fn mark_deleted(&mut self, now: Timestamp) -> Result<(), DomainError> {
        if self.is_deleted {
            return Err(DomainError::AlreadyDeleted);
        }
        self.is_deleted = true;
        self.updated_at = now;
        Ok(())
    }
}
