use async_trait::async_trait;
use domain::{ConnectionId, RoomId, UserId};
use thiserror::Error;

use crate::events::ChatEvent;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcast failed: {0}")]
    Failed(String),
}

impl BroadcastError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// 事件扇出端口。
///
/// 以房间为键把事件投递给当前加入该房间的所有连接，或以用户为键投递
/// 到个人通知通道。目标列表为空是空操作，不是错误。
#[async_trait]
pub trait EventBroadcaster: Send + Sync {
    async fn broadcast_to_room(
        &self,
        room_id: RoomId,
        event: ChatEvent,
    ) -> Result<(), BroadcastError>;

    /// 同上，但跳过指定连接（打字提示、离开通知不发给本人）
    async fn broadcast_to_room_except(
        &self,
        room_id: RoomId,
        except: ConnectionId,
        event: ChatEvent,
    ) -> Result<(), BroadcastError>;

    /// 推送到某个用户的全部在线连接；用户不在线时是空操作
    async fn notify_user(&self, user_id: UserId, event: ChatEvent) -> Result<(), BroadcastError>;
}
