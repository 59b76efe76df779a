//! 连接路由与事件扇出
//!
//! 每个 WebSocket 连接注册一个发送通道；广播时以在线状态注册表的
//! 房间索引为准挑选目标连接。单进程实现——跨进程扇出需要在这里换成
//! 外部发布/订阅后端。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};

use application::{BroadcastError, ChatEvent, EventBroadcaster, PresenceRegistry};
use domain::{ConnectionId, RoomId, UserId};

/// 连接ID -> 出站事件通道
#[derive(Default)]
pub struct ConnectionRouter {
    senders: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<ChatEvent>>>,
}

impl ConnectionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册连接的发送端，返回网关写循环消费的接收端
    pub async fn register(&self, connection_id: ConnectionId) -> mpsc::UnboundedReceiver<ChatEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.write().await.insert(connection_id, tx);
        rx
    }

    pub async fn unregister(&self, connection_id: ConnectionId) {
        self.senders.write().await.remove(&connection_id);
    }

    /// 向单个连接投递事件。连接已消失时静默丢弃（断开清理和广播
    /// 天然存在竞争，不是错误）。
    pub async fn send_to(&self, connection_id: ConnectionId, event: ChatEvent) {
        let senders = self.senders.read().await;
        if let Some(sender) = senders.get(&connection_id) {
            if sender.send(event).is_err() {
                tracing::debug!(connection_id = %connection_id, "dropping event for closed connection");
            }
        }
    }
}

/// 进程内事件广播器：在线状态注册表给出目标集合，连接路由负责投递
pub struct RealtimeBroadcaster {
    router: Arc<ConnectionRouter>,
    presence: PresenceRegistry,
}

impl RealtimeBroadcaster {
    pub fn new(router: Arc<ConnectionRouter>, presence: PresenceRegistry) -> Self {
        Self { router, presence }
    }
}

#[async_trait]
impl EventBroadcaster for RealtimeBroadcaster {
    async fn broadcast_to_room(
        &self,
        room_id: RoomId,
        event: ChatEvent,
    ) -> Result<(), BroadcastError> {
        // 目标集合为空是空操作
        for connection_id in self.presence.connections_in_room(room_id).await {
            self.router.send_to(connection_id, event.clone()).await;
        }
        Ok(())
    }

    async fn broadcast_to_room_except(
        &self,
        room_id: RoomId,
        except: ConnectionId,
        event: ChatEvent,
    ) -> Result<(), BroadcastError> {
        for connection_id in self.presence.connections_in_room(room_id).await {
            if connection_id != except {
                self.router.send_to(connection_id, event.clone()).await;
            }
        }
        Ok(())
    }

    async fn notify_user(&self, user_id: UserId, event: ChatEvent) -> Result<(), BroadcastError> {
        // 用户不在线时没有目标连接，静默成功
        for connection_id in self.presence.connections_of_user(user_id).await {
            self.router.send_to(connection_id, event.clone()).await;
        }
        Ok(())
    }
}
