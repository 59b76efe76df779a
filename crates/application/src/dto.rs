//! 面向客户端的数据传输对象
//!
//! 实体在这里被反规范化：消息带上作者信息和回复数，房间带上成员数、
//! 消息数和调用者的角色，邀请带上房间与双方用户的摘要。

use serde::{Deserialize, Serialize};

use domain::{
    Invitation, InvitationId, InvitationStatus, Message, MessageId, Room, RoomId, RoomKind,
    RoomMember, RoomRole, Timestamp, User, UserId, UserRole,
};

/// 用户摘要（嵌入消息、成员、邀请等负载）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub avatar_url: Option<String>,
    pub role: UserRole,
    pub is_banned: bool,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.as_str().to_owned(),
            avatar_url: user.avatar_url.clone(),
            role: user.role,
            is_banned: user.is_banned,
        }
    }
}

/// 房间摘要（嵌入邀请负载）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: RoomId,
    pub name: String,
    pub description: Option<String>,
}

impl From<&Room> for RoomSummary {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id,
            name: room.name.clone(),
            description: room.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDto {
    pub id: RoomId,
    pub name: String,
    pub description: Option<String>,
    pub kind: RoomKind,
    pub created_at: Timestamp,
    pub member_count: u64,
    pub message_count: u64,
    /// 调用者在房间中的角色；全局房间固定为 member
    pub your_role: Option<RoomRole>,
    pub is_member: bool,
    pub owner: Option<UserSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberDto {
    pub user_id: UserId,
    pub username: String,
    pub avatar_url: Option<String>,
    pub role: RoomRole,
    pub joined_at: Timestamp,
}

impl MemberDto {
    pub fn new(member: &RoomMember, user: &User) -> Self {
        Self {
            user_id: member.user_id,
            username: user.username.as_str().to_owned(),
            avatar_url: user.avatar_url.clone(),
            role: member.role,
            joined_at: member.joined_at,
        }
    }
}

/// 房间详情：基础信息加成员列表（owner -> admin -> member 排序）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDetailsDto {
    #[serde(flatten)]
    pub room: RoomDto,
    pub members: Vec<MemberDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: MessageId,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub parent_id: Option<MessageId>,
    pub replies_count: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub user: Option<UserSummary>,
}

impl MessageDto {
    pub fn new(message: &Message, author: Option<&User>, replies_count: u64) -> Self {
        Self {
            id: message.id,
            room_id: message.room_id,
            user_id: message.user_id,
            content: message.body.content().map(str::to_owned),
            image_url: message.body.image_url().map(|url| url.as_str().to_owned()),
            parent_id: message.parent_id,
            replies_count,
            created_at: message.created_at,
            updated_at: message.updated_at,
            user: author.map(UserSummary::from),
        }
    }
}

/// 一页消息加分页信息。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePage {
    pub messages: Vec<MessageDto>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

/// 一页回复，连同父消息本身。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepliesPage {
    pub parent: MessageDto,
    pub replies: Vec<MessageDto>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationDto {
    pub id: InvitationId,
    pub room_id: RoomId,
    pub inviter_id: UserId,
    pub invitee_id: UserId,
    pub status: InvitationStatus,
    pub created_at: Timestamp,
    pub responded_at: Option<Timestamp>,
    pub room: Option<RoomSummary>,
    pub inviter: Option<UserSummary>,
    pub invitee: Option<UserSummary>,
}

impl InvitationDto {
    pub fn new(
        invitation: &Invitation,
        room: Option<&Room>,
        inviter: Option<&User>,
        invitee: Option<&User>,
    ) -> Self {
        Self {
            id: invitation.id,
            room_id: invitation.room_id,
            inviter_id: invitation.inviter_id,
            invitee_id: invitation.invitee_id,
            status: invitation.status,
            created_at: invitation.created_at,
            responded_at: invitation.responded_at,
            room: room.map(RoomSummary::from),
            inviter: inviter.map(UserSummary::from),
            invitee: invitee.map(UserSummary::from),
        }
    }
}
