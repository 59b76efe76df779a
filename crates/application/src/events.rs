//! 实时事件词汇表
//!
//! 网关推送给客户端的所有事件。`type` 字段即事件名，与 HTTP API 的
//! DTO 共用同一套序列化结构，避免两条出口各自漂移。

use serde::{Deserialize, Serialize};

use domain::{MessageId, RoomId, Timestamp, UserId};

use crate::dto::{InvitationDto, MessageDto, UserSummary};
use crate::presence::OnlineUser;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// 连接认证成功的确认，带用户公开身份
    Connected { user: UserSummary },
    /// 连接认证失败
    Unauthorized { message: String },
    /// 加入房间成功的确认，带当前在线用户快照（不含自己）
    RoomJoined {
        room_id: RoomId,
        room_name: String,
        online_users: Vec<OnlineUser>,
    },
    /// 离开房间成功的确认
    RoomLeft { room_id: RoomId },
    /// 房间级操作失败
    RoomError {
        room_id: Option<RoomId>,
        message: String,
    },
    /// 连接级操作失败
    Error { message: String },
    NewMessage { message: MessageDto },
    MessageUpdated { message: MessageDto },
    MessageDeleted {
        message_id: MessageId,
        room_id: RoomId,
        /// 管理员删除与作者自删区分开，客户端可以分别渲染
        deleted_by_admin: bool,
    },
    /// 线程回复数变化
    ReplyAdded {
        parent_id: MessageId,
        room_id: RoomId,
        replies_count: u64,
    },
    UserOnline {
        user_id: UserId,
        username: String,
        room_id: RoomId,
        timestamp: Timestamp,
    },
    UserOffline {
        user_id: UserId,
        username: String,
        room_id: RoomId,
        timestamp: Timestamp,
    },
    UserTyping {
        user_id: UserId,
        username: String,
        room_id: RoomId,
        is_typing: bool,
        timestamp: Timestamp,
    },
    /// 推送到被邀请人个人通知通道
    RoomInvitation { invitation: InvitationDto },
    /// 邀请被接受后推送到房间
    MemberJoined {
        room_id: RoomId,
        user: UserSummary,
        timestamp: Timestamp,
    },
}

impl ChatEvent {
    /// 事件名（与序列化后的 `type` 字段一致），用于日志
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Unauthorized { .. } => "unauthorized",
            Self::RoomJoined { .. } => "room_joined",
            Self::RoomLeft { .. } => "room_left",
            Self::RoomError { .. } => "room_error",
            Self::Error { .. } => "error",
            Self::NewMessage { .. } => "new_message",
            Self::MessageUpdated { .. } => "message_updated",
            Self::MessageDeleted { .. } => "message_deleted",
            Self::ReplyAdded { .. } => "reply_added",
            Self::UserOnline { .. } => "user_online",
            Self::UserOffline { .. } => "user_offline",
            Self::UserTyping { .. } => "user_typing",
            Self::RoomInvitation { .. } => "room_invitation",
            Self::MemberJoined { .. } => "member_joined",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_event_envelope_shape() {
        let event = ChatEvent::MessageDeleted {
            message_id: MessageId(Uuid::new_v4()),
            room_id: RoomId(Uuid::new_v4()),
            deleted_by_admin: true,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message_deleted");
        assert_eq!(json["deleted_by_admin"], true);
        assert_eq!(event.name(), "message_deleted");
    }

    #[test]
    fn test_typing_event_serialization() {
        let event = ChatEvent::UserTyping {
            user_id: UserId(Uuid::new_v4()),
            username: "alice".to_string(),
            room_id: RoomId(Uuid::new_v4()),
            is_typing: true,
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "user_typing");
        assert_eq!(json["username"], "alice");
    }
}
