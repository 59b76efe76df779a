//! 消息存储服务
//!
//! HTTP 路由和实时网关两条入口都汇聚到这里：同一套校验、同一次落库、
//! 同一条广播路径，杜绝两条入口各自漂移。广播永远发生在提交之后。

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use domain::{
    DomainError, ImageUrl, Message, MessageBody, MessageId, RoomId, User, UserId,
};

use crate::broadcaster::EventBroadcaster;
use crate::clock::Clock;
use crate::dto::{MessageDto, MessagePage, RepliesPage};
use crate::error::ApplicationResult;
use crate::events::ChatEvent;
use crate::repository::{MessageRepository, UserRepository};
use crate::services::room_service::RoomService;

const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct PostMessageRequest {
    pub user_id: Uuid,
    /// 缺省时投递到全局房间
    pub room_id: Option<Uuid>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct EditMessageRequest {
    pub user_id: Uuid,
    pub message_id: Uuid,
    pub content: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ListMessagesRequest {
    pub viewer_id: Uuid,
    pub room_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub page: u32,
    pub per_page: u32,
}

pub struct MessageServiceDependencies {
    pub room_service: Arc<RoomService>,
    pub messages: Arc<dyn MessageRepository>,
    pub users: Arc<dyn UserRepository>,
    pub clock: Arc<dyn Clock>,
    pub broadcaster: Arc<dyn EventBroadcaster>,
}

pub struct MessageService {
    deps: MessageServiceDependencies,
}

impl MessageService {
    pub fn new(deps: MessageServiceDependencies) -> Self {
        Self { deps }
    }

    /// 发布消息。两条入口（HTTP / WebSocket）共用的唯一路径。
    pub async fn post_message(&self, request: PostMessageRequest) -> ApplicationResult<MessageDto> {
        let user_id = UserId::from(request.user_id);
        let author = self.find_active_user(user_id).await?;

        let room_id = match request.room_id {
            Some(id) => RoomId::from(id),
            None => self.deps.room_service.global_room().await?.id,
        };

        self.deps
            .room_service
            .check_access(user_id, room_id, false)
            .await?;

        let body = Self::build_body(request.content, request.image_url)?;

        let parent_id = match request.parent_id {
            Some(parent_id) => Some(self.validate_parent(MessageId::from(parent_id), room_id).await?),
            None => None,
        };

        let now = self.deps.clock.now();
        let message = Message::new(
            MessageId(Uuid::new_v4()),
            room_id,
            user_id,
            body,
            parent_id,
            now,
        );
        let stored = self.deps.messages.create(message).await?;

        tracing::info!(message_id = %stored.id, room_id = %room_id, user_id = %user_id, "message posted");

        let dto = MessageDto::new(&stored, Some(&author), 0);

        // 先提交后广播：客户端看到的消息一定已经可以被读路径查到
        self.broadcast_room(
            room_id,
            ChatEvent::NewMessage {
                message: dto.clone(),
            },
        )
        .await;

        if let Some(parent_id) = stored.parent_id {
            self.broadcast_reply_count(parent_id, room_id).await;
        }

        Ok(dto)
    }

    /// 编辑消息（仅作者本人；已删除的消息不可编辑）
    pub async fn edit_message(&self, request: EditMessageRequest) -> ApplicationResult<MessageDto> {
        let user_id = UserId::from(request.user_id);
        let author = self.find_active_user(user_id).await?;

        let mut message = self
            .deps
            .messages
            .find_by_id(MessageId::from(request.message_id))
            .await?
            .ok_or(DomainError::MessageNotFound)?;

        if message.user_id != user_id {
            return Err(DomainError::InsufficientPermissions.into());
        }

        let body = Self::build_body(request.content, request.image_url)?;
        message.edit(body, self.deps.clock.now())?;

        let stored = self.deps.messages.update(message).await?;
        let replies_count = self.deps.messages.count_replies(stored.id).await?;
        let dto = MessageDto::new(&stored, Some(&author), replies_count);

        tracing::info!(message_id = %stored.id, user_id = %user_id, "message edited");

        self.broadcast_room(
            stored.room_id,
            ChatEvent::MessageUpdated {
                message: dto.clone(),
            },
        )
        .await;

        Ok(dto)
    }

    /// 作者删除自己的消息（软删除）
    pub async fn delete_message(&self, user_id: Uuid, message_id: Uuid) -> ApplicationResult<()> {
        let user_id = UserId::from(user_id);
        self.find_active_user(user_id).await?;

        let message = self
            .deps
            .messages
            .find_by_id(MessageId::from(message_id))
            .await?
            .ok_or(DomainError::MessageNotFound)?;

        if message.user_id != user_id {
            return Err(DomainError::InsufficientPermissions.into());
        }

        self.soft_delete(message, false).await
    }

    /// 管理员删除任意消息（软删除，广播区分管理员删除）
    pub async fn admin_delete_message(
        &self,
        admin_id: Uuid,
        message_id: Uuid,
    ) -> ApplicationResult<()> {
        let admin_id = UserId::from(admin_id);
        let admin = self.find_active_user(admin_id).await?;
        if !admin.is_admin() {
            return Err(DomainError::InsufficientPermissions.into());
        }

        let message = self
            .deps
            .messages
            .find_by_id(MessageId::from(message_id))
            .await?
            .ok_or(DomainError::MessageNotFound)?;

        self.soft_delete(message, true).await
    }

    /// 分页列出消息。
    ///
    /// 顶层消息按时间倒序取页、正序返回（最新一页、聊天顺序展示）；
    /// 指定 `parent_id` 时取该线程的回复，保持倒序。
    pub async fn list_messages(
        &self,
        request: ListMessagesRequest,
    ) -> ApplicationResult<MessagePage> {
        let viewer_id = UserId::from(request.viewer_id);
        let room_id = RoomId::from(request.room_id);

        self.deps
            .room_service
            .check_access(viewer_id, room_id, false)
            .await?;

        let (page, per_page) = Self::normalize_page(request.page, request.per_page);
        let offset = (page - 1).saturating_mul(per_page);
        let parent = request.parent_id.map(MessageId::from);

        let mut messages = self
            .deps
            .messages
            .list_page(room_id, parent, per_page, offset)
            .await?;

        if parent.is_none() {
            messages.reverse();
        }

        let total = match parent {
            Some(parent_id) => self.deps.messages.count_replies(parent_id).await?,
            None => self.deps.messages.count_top_level(room_id).await?,
        };

        let dtos = self.to_dtos(&messages, parent.is_none()).await?;

        Ok(MessagePage {
            messages: dtos,
            page,
            per_page,
            total,
        })
    }

    /// 某条消息的回复，按时间正序分页
    pub async fn list_replies(
        &self,
        viewer_id: Uuid,
        message_id: Uuid,
        page: u32,
        per_page: u32,
    ) -> ApplicationResult<RepliesPage> {
        let viewer_id = UserId::from(viewer_id);

        let parent = self
            .deps
            .messages
            .find_by_id(MessageId::from(message_id))
            .await?
            .filter(|message| !message.is_deleted)
            .ok_or(DomainError::MessageNotFound)?;

        self.deps
            .room_service
            .check_access(viewer_id, parent.room_id, false)
            .await?;

        let (page, per_page) = Self::normalize_page(page, per_page);
        let offset = (page - 1).saturating_mul(per_page);

        let replies = self
            .deps
            .messages
            .list_replies(parent.id, per_page, offset)
            .await?;
        let total = self.deps.messages.count_replies(parent.id).await?;

        let parent_dto = {
            let author = self.deps.users.find_by_id(parent.user_id).await?;
            MessageDto::new(&parent, author.as_ref(), total)
        };
        let reply_dtos = self.to_dtos(&replies, false).await?;

        Ok(RepliesPage {
            parent: parent_dto,
            replies: reply_dtos,
            page,
            per_page,
            total,
        })
    }

    async fn soft_delete(&self, mut message: Message, by_admin: bool) -> ApplicationResult<()> {
        message.mark_deleted(self.deps.clock.now())?;
        let stored = self.deps.messages.update(message).await?;

        tracing::info!(message_id = %stored.id, room_id = %stored.room_id, by_admin, "message deleted");

        self.broadcast_room(
            stored.room_id,
            ChatEvent::MessageDeleted {
                message_id: stored.id,
                room_id: stored.room_id,
                deleted_by_admin: by_admin,
            },
        )
        .await;

        // 已删除的回复退出父消息的回复计数
        if let Some(parent_id) = stored.parent_id {
            self.broadcast_reply_count(parent_id, stored.room_id).await;
        }

        Ok(())
    }

    fn build_body(
        content: Option<String>,
        image_url: Option<String>,
    ) -> Result<MessageBody, DomainError> {
        let image_url = image_url
            .filter(|url| !url.trim().is_empty())
            .map(ImageUrl::parse)
            .transpose()?;
        MessageBody::new(content, image_url)
    }

    /// 回复必须指向同一房间内未删除的顶层消息；不允许嵌套回复
    async fn validate_parent(
        &self,
        parent_id: MessageId,
        room_id: RoomId,
    ) -> ApplicationResult<MessageId> {
        let parent = self
            .deps
            .messages
            .find_by_id(parent_id)
            .await?
            .filter(|message| !message.is_deleted && message.room_id == room_id)
            .ok_or(DomainError::MessageNotFound)?;

        if parent.is_reply() {
            return Err(DomainError::invalid_input(
                "parent_id",
                "replies to replies are not allowed",
            )
            .into());
        }
        Ok(parent.id)
    }

    async fn to_dtos(
        &self,
        messages: &[Message],
        with_reply_counts: bool,
    ) -> ApplicationResult<Vec<MessageDto>> {
        let mut author_ids: Vec<UserId> = messages.iter().map(|message| message.user_id).collect();
        author_ids.sort_by_key(|id| id.0);
        author_ids.dedup();

        let authors: HashMap<UserId, User> = self
            .deps
            .users
            .find_many(&author_ids)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        let mut dtos = Vec::with_capacity(messages.len());
        for message in messages {
            let replies_count = if with_reply_counts {
                self.deps.messages.count_replies(message.id).await?
            } else {
                0
            };
            dtos.push(MessageDto::new(
                message,
                authors.get(&message.user_id),
                replies_count,
            ));
        }
        Ok(dtos)
    }

    fn normalize_page(page: u32, per_page: u32) -> (u32, u32) {
        let page = page.max(1);
        let per_page = if per_page == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            per_page.min(MAX_PAGE_SIZE)
        };
        (page, per_page)
    }

    async fn find_active_user(&self, user_id: UserId) -> ApplicationResult<User> {
        let user = self
            .deps
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(DomainError::UserNotFound)?;
        if user.is_banned {
            return Err(DomainError::AccountBanned.into());
        }
        Ok(user)
    }

    async fn broadcast_room(&self, room_id: RoomId, event: ChatEvent) {
        if let Err(err) = self.deps.broadcaster.broadcast_to_room(room_id, event).await {
            tracing::warn!(room_id = %room_id, error = %err, "room broadcast failed");
        }
    }

    async fn broadcast_reply_count(&self, parent_id: MessageId, room_id: RoomId) {
        match self.deps.messages.count_replies(parent_id).await {
            Ok(replies_count) => {
                self.broadcast_room(
                    room_id,
                    ChatEvent::ReplyAdded {
                        parent_id,
                        room_id,
                        replies_count,
                    },
                )
                .await;
            }
            Err(err) => {
                tracing::warn!(parent_id = %parent_id, error = %err, "failed to recount replies");
            }
        }
    }
}
