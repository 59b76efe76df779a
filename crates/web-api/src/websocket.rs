//! WebSocket 实时网关
//!
//! 连接状态机：未认证 -> 已认证 -> 加入若干房间 -> 断开。凭证依次
//! 从查询参数、Authorization 头、首帧负载提取；认证失败发送
//! unauthorized 事件后关闭，不会留下半注册的在线状态。
//!
//! 所有处理器错误都折叠为房间级或连接级错误事件，绝不让连接或进程
//! 崩溃；消息校验与落库完全委托给消息服务，与 HTTP 入口共用同一条
//! 路径。

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header::AUTHORIZATION, HeaderMap},
    response::Response,
};
use chrono::Utc;
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use application::{
    ApplicationResult, AuthenticatedUser, ChatEvent, PostMessageRequest, UserSummary,
};
use domain::{ConnectionId, RoomId};

use crate::state::AppState;

/// 连接握手查询参数
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// 客户端入站消息
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// 凭证不在查询参数/请求头时，作为首帧提交
    Authenticate { token: String },
    JoinRoom { room_id: Uuid },
    LeaveRoom { room_id: Uuid },
    SendMessage {
        room_id: Option<Uuid>,
        content: Option<String>,
        image_url: Option<String>,
        parent_id: Option<Uuid>,
    },
    Typing {
        room_id: Uuid,
        #[serde(default)]
        is_typing: bool,
    },
}

/// 写循环的内部命令（保活回应走这里，避免两个任务争用 sink）
#[derive(Debug)]
enum WsCommand {
    Pong(Vec<u8>),
}

pub async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let header_token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    ws.on_upgrade(move |socket| handle_socket(socket, state, query.token, header_token))
}

async fn handle_socket(
    mut socket: WebSocket,
    state: AppState,
    query_token: Option<String>,
    header_token: Option<String>,
) {
    // 凭证来源依次为：查询参数、请求头、首帧负载
    let credential = match query_token.or(header_token) {
        Some(token) => Some(token),
        None => wait_for_auth_frame(&mut socket).await,
    };

    let user = match credential {
        Some(credential) => resolve_user(&state, &credential).await,
        None => None,
    };

    let Some(user) = user else {
        reject_connection(socket).await;
        return;
    };

    let connection_id = ConnectionId::generate();
    state
        .presence
        .register_connection(connection_id, user.id, user.username.as_str())
        .await;
    let mut outbound = state.connections.register(connection_id).await;

    tracing::info!(connection_id = %connection_id, user_id = %user.id, "WebSocket 连接已建立");

    let session = WsSession {
        state: state.clone(),
        connection_id,
        user,
    };

    session.auto_join_global().await;
    session
        .send_self(ChatEvent::Connected {
            user: session.user_summary(),
        })
        .await;

    let (mut sink, mut stream) = socket.split();
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<WsCommand>(8);

    // 写循环：路由器事件、保活 ping、pong 回应统一经过这里
    let ping_interval = Duration::from_secs(state.ws_ping_interval_secs.max(1));
    let send_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ping_interval);
        // 第一次 tick 立即返回，跳过
        ticker.tick().await;
        loop {
            tokio::select! {
                event = outbound.recv() => {
                    let Some(event) = event else { break };
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to serialize outbound event");
                            continue;
                        }
                    };
                    if sink.send(WsMessage::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Some(cmd) = cmd_rx.recv() => {
                    match cmd {
                        WsCommand::Pong(data) => {
                            if sink.send(WsMessage::Pong(data.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                _ = ticker.tick() => {
                    // 静默死连接在这里暴露：发送失败即退出，触发清理
                    if sink.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let recv_task = {
        let session = session.clone();
        tokio::spawn(async move {
            while let Some(Ok(frame)) = stream.next().await {
                match frame {
                    WsMessage::Text(text) => session.handle_text(text.as_str()).await,
                    WsMessage::Ping(data) => {
                        if cmd_tx.send(WsCommand::Pong(data.to_vec())).await.is_err() {
                            break;
                        }
                    }
                    WsMessage::Pong(_) => {}
                    WsMessage::Binary(_) => {
                        tracing::debug!("ignoring binary frame");
                    }
                    WsMessage::Close(_) => break,
                }
            }
        })
    };

    // 任一方向结束即视为连接断开
    tokio::select! {
        _ = send_task => {}
        _ = recv_task => {}
    }

    session.handle_disconnect().await;
    state.connections.unregister(connection_id).await;

    tracing::info!(connection_id = %connection_id, user_id = %session.user.id, "WebSocket 连接已清理");
}

/// 等待首帧认证消息。第一帧不是 authenticate 即视为未认证。
async fn wait_for_auth_frame(socket: &mut WebSocket) -> Option<String> {
    while let Some(Ok(frame)) = socket.recv().await {
        match frame {
            WsMessage::Text(text) => {
                return match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(ClientMessage::Authenticate { token }) => Some(token),
                    _ => None,
                };
            }
            WsMessage::Ping(data) => {
                if socket.send(WsMessage::Pong(data)).await.is_err() {
                    return None;
                }
            }
            WsMessage::Close(_) => return None,
            _ => {}
        }
    }
    None
}

/// 凭证 -> 用户；无效凭证和封禁账号都按未认证处理
async fn resolve_user(state: &AppState, credential: &str) -> Option<AuthenticatedUser> {
    match state.identity.authenticate(credential).await {
        Ok(Some(user)) if !user.is_banned => Some(user),
        Ok(Some(user)) => {
            tracing::info!(user_id = %user.id, "rejecting banned user at connection boundary");
            None
        }
        Ok(None) => None,
        Err(err) => {
            tracing::error!(error = %err, "identity backend failure during ws handshake");
            None
        }
    }
}

/// 发送 unauthorized 事件并关闭，不注册任何状态
async fn reject_connection(mut socket: WebSocket) {
    let event = ChatEvent::Unauthorized {
        message: "authentication failed".to_string(),
    };
    if let Ok(payload) = serde_json::to_string(&event) {
        let _ = socket.send(WsMessage::Text(payload.into())).await;
    }
    let _ = socket.close().await;
}

/// 单条连接的认证后会话状态。
///
/// 连接任务独占这份状态，事件之间不存在"会话丢失"——不需要源头
/// 系统那种事件中途重新认证的补救路径。
#[derive(Clone)]
struct WsSession {
    state: AppState,
    connection_id: ConnectionId,
    user: AuthenticatedUser,
}

impl WsSession {
    fn user_summary(&self) -> UserSummary {
        UserSummary {
            id: self.user.id,
            username: self.user.username.as_str().to_owned(),
            avatar_url: None,
            role: self.user.role,
            is_banned: self.user.is_banned,
        }
    }

    async fn send_self(&self, event: ChatEvent) {
        self.state
            .connections
            .send_to(self.connection_id, event)
            .await;
    }

    async fn room_error(&self, room_id: Option<Uuid>, message: String) {
        tracing::warn!(
            connection_id = %self.connection_id,
            room_id = ?room_id,
            error = %message,
            "ws handler error"
        );
        self.send_self(ChatEvent::RoomError {
            room_id: room_id.map(RoomId),
            message,
        })
        .await;
    }

    /// 连接建立即自动加入全局房间并在其中宣告上线
    async fn auto_join_global(&self) {
        let global = match self.state.room_service.global_room().await {
            Ok(room) => room,
            Err(err) => {
                tracing::error!(error = %err, "global room unavailable, skipping auto-join");
                return;
            }
        };

        self.state.presence.join(self.connection_id, global.id).await;
        self.broadcast_online(global.id).await;
    }

    async fn handle_text(&self, text: &str) {
        let message: ClientMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(err) => {
                self.send_self(ChatEvent::Error {
                    message: format!("malformed message: {err}"),
                })
                .await;
                return;
            }
        };

        match message {
            // 已认证连接上的重复认证帧：忽略
            ClientMessage::Authenticate { .. } => {}
            ClientMessage::JoinRoom { room_id } => {
                if let Err(err) = self.join_room(room_id).await {
                    self.room_error(Some(room_id), err.to_string()).await;
                }
            }
            ClientMessage::LeaveRoom { room_id } => {
                self.leave_room(room_id).await;
            }
            ClientMessage::SendMessage {
                room_id,
                content,
                image_url,
                parent_id,
            } => {
                if let Err(err) = self
                    .send_message(room_id, content, image_url, parent_id)
                    .await
                {
                    self.room_error(room_id, err.to_string()).await;
                }
            }
            ClientMessage::Typing { room_id, is_typing } => {
                self.typing(room_id, is_typing).await;
            }
        }
    }

    async fn join_room(&self, room_id: Uuid) -> ApplicationResult<()> {
        let room_id = RoomId(room_id);
        let access = self
            .state
            .room_service
            .check_access(self.user.id, room_id, false)
            .await?;

        // 快照在登记本连接之前采集，永远不含加入者自己
        let online_users = self.state.presence.join(self.connection_id, room_id).await;

        self.send_self(ChatEvent::RoomJoined {
            room_id,
            room_name: access.room.name,
            online_users,
        })
        .await;

        self.broadcast_online(room_id).await;
        Ok(())
    }

    async fn leave_room(&self, room_id: Uuid) {
        let room_id = RoomId(room_id);
        let went_offline = self.state.presence.leave(self.connection_id, room_id).await;

        // 下线通知不发给离开者本人；仅最后一个连接离开时发出
        if went_offline {
            self.broadcast_offline_except_self(room_id).await;
        }

        self.send_self(ChatEvent::RoomLeft { room_id }).await;
    }

    /// 与 HTTP 入口完全相同的校验和持久化路径
    async fn send_message(
        &self,
        room_id: Option<Uuid>,
        content: Option<String>,
        image_url: Option<String>,
        parent_id: Option<Uuid>,
    ) -> ApplicationResult<()> {
        self.state
            .message_service
            .post_message(PostMessageRequest {
                user_id: self.user.id.0,
                room_id,
                content,
                image_url,
                parent_id,
            })
            .await?;
        Ok(())
    }

    /// 打字提示：纯转发，不落库，不发给本人
    async fn typing(&self, room_id: Uuid, is_typing: bool) {
        let event = ChatEvent::UserTyping {
            user_id: self.user.id,
            username: self.user.username.as_str().to_owned(),
            room_id: RoomId(room_id),
            is_typing,
            timestamp: Utc::now(),
        };
        if let Err(err) = self
            .state
            .broadcaster
            .broadcast_to_room_except(RoomId(room_id), self.connection_id, event)
            .await
        {
            tracing::warn!(error = %err, "failed to relay typing event");
        }
    }

    /// 断开清理：注销所有房间，对确实下线的房间广播离线事件
    async fn handle_disconnect(&self) {
        let offline_rooms = self.state.presence.on_disconnect(self.connection_id).await;
        let now = Utc::now();

        for room_id in offline_rooms {
            let event = ChatEvent::UserOffline {
                user_id: self.user.id,
                username: self.user.username.as_str().to_owned(),
                room_id,
                timestamp: now,
            };
            if let Err(err) = self.state.broadcaster.broadcast_to_room(room_id, event).await {
                tracing::warn!(room_id = %room_id, error = %err, "failed to broadcast offline event");
            }
        }
    }

    async fn broadcast_online(&self, room_id: RoomId) {
        let event = ChatEvent::UserOnline {
            user_id: self.user.id,
            username: self.user.username.as_str().to_owned(),
            room_id,
            timestamp: Utc::now(),
        };
        if let Err(err) = self.state.broadcaster.broadcast_to_room(room_id, event).await {
            tracing::warn!(room_id = %room_id, error = %err, "failed to broadcast online event");
        }
    }

    async fn broadcast_offline_except_self(&self, room_id: RoomId) {
        let event = ChatEvent::UserOffline {
            user_id: self.user.id,
            username: self.user.username.as_str().to_owned(),
            room_id,
            timestamp: Utc::now(),
        };
        if let Err(err) = self
            .state
            .broadcaster
            .broadcast_to_room_except(room_id, self.connection_id, event)
            .await
        {
            tracing::warn!(room_id = %room_id, error = %err, "failed to broadcast offline event");
        }
    }
}
