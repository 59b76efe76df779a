//! 在线状态与连接注册表
//!
//! 纯进程内内存，不落盘：关系存储才是成员关系和消息的唯一事实来源，
//! 这里只是"谁正连接在本进程"的缓存。多进程部署需要外部发布/订阅层
//! 做跨进程扇出，属于部署层面的扩展点。
//!
//! 在线状态以连接为粒度：同一用户可以同时持有多个连接（多设备），
//! 某房间的"下线"只在该用户最后一个位于房间内的连接离开时成立。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use domain::{ConnectionId, RoomId, UserId};

/// 房间内在线用户摘要。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineUser {
    pub user_id: UserId,
    pub username: String,
}

/// 单个连接的注册信息。
#[derive(Debug, Clone)]
struct ConnectionEntry {
    user_id: UserId,
    username: String,
    /// 该连接当前加入的房间集合
    rooms: HashSet<RoomId>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    /// 连接ID -> 连接信息
    connections: HashMap<ConnectionId, ConnectionEntry>,
    /// 房间ID -> 该房间内的连接集合（扇出索引）
    room_index: HashMap<RoomId, HashSet<ConnectionId>>,
}

impl RegistryInner {
    /// 判断某用户在房间内是否还有其他存活连接
    fn user_still_in_room(&self, room_id: RoomId, user_id: UserId, except: ConnectionId) -> bool {
        self.room_index
            .get(&room_id)
            .map(|connections| {
                connections.iter().any(|connection_id| {
                    *connection_id != except
                        && self
                            .connections
                            .get(connection_id)
                            .is_some_and(|entry| entry.user_id == user_id)
                })
            })
            .unwrap_or(false)
    }

    fn remove_from_room_index(&mut self, room_id: RoomId, connection_id: ConnectionId) {
        if let Some(connections) = self.room_index.get_mut(&room_id) {
            connections.remove(&connection_id);
            if connections.is_empty() {
                self.room_index.remove(&room_id);
            }
        }
    }
}

/// 在线状态注册表。
#[derive(Clone, Default)]
pub struct PresenceRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 连接认证成功后调用一次，建立空的已加入房间集合
    pub async fn register_connection(
        &self,
        connection_id: ConnectionId,
        user_id: UserId,
        username: impl Into<String>,
    ) {
        let mut inner = self.inner.write().await;
        inner.connections.insert(
            connection_id,
            ConnectionEntry {
                user_id,
                username: username.into(),
                rooms: HashSet::new(),
            },
        );
    }

    /// 把连接加入房间，返回加入前房间内的在线用户快照（不含加入者
    /// 本人的任何连接）。快照在插入之前采集，保证返回值永远不包含
    /// 加入者自己。
    pub async fn join(&self, connection_id: ConnectionId, room_id: RoomId) -> Vec<OnlineUser> {
        let mut inner = self.inner.write().await;

        let Some(user_id) = inner
            .connections
            .get(&connection_id)
            .map(|entry| entry.user_id)
        else {
            return Vec::new();
        };

        // 先采集快照，再登记加入者
        let snapshot = Self::collect_online_users(&inner, room_id, Some(user_id));

        if let Some(entry) = inner.connections.get_mut(&connection_id) {
            entry.rooms.insert(room_id);
        }
        inner
            .room_index
            .entry(room_id)
            .or_default()
            .insert(connection_id);

        snapshot
    }

    /// 把连接移出房间。返回 true 表示这是该用户在房间内的最后一个
    /// 连接，用户对这个房间而言已经下线。
    pub async fn leave(&self, connection_id: ConnectionId, room_id: RoomId) -> bool {
        let mut inner = self.inner.write().await;

        let Some(user_id) = inner
            .connections
            .get(&connection_id)
            .map(|entry| entry.user_id)
        else {
            return false;
        };

        let was_in_room = inner
            .connections
            .get_mut(&connection_id)
            .map(|entry| entry.rooms.remove(&room_id))
            .unwrap_or(false);
        if !was_in_room {
            return false;
        }

        inner.remove_from_room_index(room_id, connection_id);
        !inner.user_still_in_room(room_id, user_id, connection_id)
    }

    /// 连接断开：从所有房间索引中移除该连接并丢弃注册信息。
    /// 返回该用户因此下线的房间列表（其余连接仍在的房间不算）。
    pub async fn on_disconnect(&self, connection_id: ConnectionId) -> Vec<RoomId> {
        let mut inner = self.inner.write().await;

        let Some(entry) = inner.connections.remove(&connection_id) else {
            return Vec::new();
        };

        let mut offline_rooms = Vec::new();
        for room_id in entry.rooms {
            inner.remove_from_room_index(room_id, connection_id);
            if !inner.user_still_in_room(room_id, entry.user_id, connection_id) {
                offline_rooms.push(room_id);
            }
        }
        offline_rooms
    }

    /// 房间的扇出目标：当前加入该房间的所有连接
    pub async fn connections_in_room(&self, room_id: RoomId) -> Vec<ConnectionId> {
        let inner = self.inner.read().await;
        inner
            .room_index
            .get(&room_id)
            .map(|connections| connections.iter().copied().collect())
            .unwrap_or_default()
    }

    /// 某用户的全部在线连接（个人通知通道的扇出目标）
    pub async fn connections_of_user(&self, user_id: UserId) -> Vec<ConnectionId> {
        let inner = self.inner.read().await;
        inner
            .connections
            .iter()
            .filter(|(_, entry)| entry.user_id == user_id)
            .map(|(connection_id, _)| *connection_id)
            .collect()
    }

    /// 房间内在线用户列表（按用户去重）
    pub async fn online_users(&self, room_id: RoomId) -> Vec<OnlineUser> {
        let inner = self.inner.read().await;
        Self::collect_online_users(&inner, room_id, None)
    }

    /// 连接是否已加入指定房间
    pub async fn is_in_room(&self, connection_id: ConnectionId, room_id: RoomId) -> bool {
        let inner = self.inner.read().await;
        inner
            .connections
            .get(&connection_id)
            .map(|entry| entry.rooms.contains(&room_id))
            .unwrap_or(false)
    }

    fn collect_online_users(
        inner: &RegistryInner,
        room_id: RoomId,
        exclude_user: Option<UserId>,
    ) -> Vec<OnlineUser> {
        let Some(connections) = inner.room_index.get(&room_id) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut users = Vec::new();
        for connection_id in connections {
            let Some(entry) = inner.connections.get(connection_id) else {
                continue;
            };
            if exclude_user == Some(entry.user_id) {
                continue;
            }
            if seen.insert(entry.user_id) {
                users.push(OnlineUser {
                    user_id: entry.user_id,
                    username: entry.username.clone(),
                });
            }
        }
        users
    }
}
