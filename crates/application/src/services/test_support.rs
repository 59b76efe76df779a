//! 服务层测试夹具：内存仓储、捕获型广播器、可控时钟

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use domain::{
    ConnectionId, Invitation, InvitationId, Message, MessageId, RepositoryError,
    RepositoryResult, Room, RoomId, RoomKind, RoomMember, RoomRole, Timestamp, User, UserId,
    UserRole, Username,
};

use crate::broadcaster::{BroadcastError, EventBroadcaster};
use crate::clock::Clock;
use crate::events::ChatEvent;
use crate::repository::{
    InvitationRepository, MessageRepository, RoomMemberRepository, RoomRepository, UserRepository,
};
use crate::services::{
    InvitationService, InvitationServiceDependencies, MessageService, MessageServiceDependencies,
    RoomService, RoomServiceDependencies,
};

/// 每次取值前进 1 毫秒，保证时间戳单调且可比较
pub struct FixedClock {
    now: Mutex<Timestamp>,
}

impl FixedClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        let mut now = self.now.lock().unwrap();
        *now += Duration::milliseconds(1);
        *now
    }
}

/// 广播目标，用于断言事件投递到了正确的通道
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentTo {
    Room(RoomId),
    RoomExcept(RoomId, ConnectionId),
    User(UserId),
}

#[derive(Default)]
pub struct CapturingBroadcaster {
    sent: Mutex<Vec<(SentTo, ChatEvent)>>,
}

impl CapturingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room_events(&self, room_id: RoomId) -> Vec<ChatEvent> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(target, _)| matches!(target, SentTo::Room(id) if *id == room_id))
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn user_events(&self, user_id: UserId) -> Vec<ChatEvent> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(target, _)| matches!(target, SentTo::User(id) if *id == user_id))
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn room_event_names(&self, room_id: RoomId) -> Vec<&'static str> {
        self.room_events(room_id)
            .iter()
            .map(|event| event.name())
            .collect()
    }
}

#[async_trait]
impl EventBroadcaster for CapturingBroadcaster {
    async fn broadcast_to_room(
        &self,
        room_id: RoomId,
        event: ChatEvent,
    ) -> Result<(), BroadcastError> {
        self.sent.lock().unwrap().push((SentTo::Room(room_id), event));
        Ok(())
    }

    async fn broadcast_to_room_except(
        &self,
        room_id: RoomId,
        except: ConnectionId,
        event: ChatEvent,
    ) -> Result<(), BroadcastError> {
        self.sent
            .lock()
            .unwrap()
            .push((SentTo::RoomExcept(room_id, except), event));
        Ok(())
    }

    async fn notify_user(&self, user_id: UserId, event: ChatEvent) -> Result<(), BroadcastError> {
        self.sent.lock().unwrap().push((SentTo::User(user_id), event));
        Ok(())
    }
}

/// 五个仓储端口的共享内存实现，冲突语义与 Postgres 实现一致
#[derive(Default)]
pub struct InMemoryStore {
    pub users: Mutex<HashMap<UserId, User>>,
    pub rooms: Mutex<HashMap<RoomId, Room>>,
    pub members: Mutex<HashMap<(RoomId, UserId), RoomMember>>,
    pub invitations: Mutex<HashMap<InvitationId, Invitation>>,
    pub messages: Mutex<HashMap<MessageId, Message>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) {
        self.users.lock().unwrap().insert(user.id, user);
    }

    pub fn member_rows(&self, room_id: RoomId) -> Vec<RoomMember> {
        self.members
            .lock()
            .unwrap()
            .values()
            .filter(|member| member.room_id == room_id)
            .cloned()
            .collect()
    }

    pub fn invitation_rows(&self, room_id: RoomId, invitee_id: UserId) -> Vec<Invitation> {
        self.invitations
            .lock()
            .unwrap()
            .values()
            .filter(|inv| inv.room_id == room_id && inv.invitee_id == invitee_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, id: UserId) -> RepositoryResult<Option<User>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|user| user.username.as_str() == username)
            .cloned())
    }

    async fn find_many(&self, ids: &[UserId]) -> RepositoryResult<Vec<User>> {
        let users = self.users.lock().unwrap();
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }
}

#[async_trait]
impl RoomRepository for InMemoryStore {
    async fn create_with_owner(&self, room: Room, owner: RoomMember) -> RepositoryResult<Room> {
        let mut rooms = self.rooms.lock().unwrap();
        if rooms.values().any(|existing| existing.name == room.name) {
            return Err(RepositoryError::Conflict);
        }
        rooms.insert(room.id, room.clone());
        self.members
            .lock()
            .unwrap()
            .insert((owner.room_id, owner.user_id), owner);
        Ok(room)
    }

    async fn find_by_id(&self, id: RoomId) -> RepositoryResult<Option<Room>> {
        Ok(self.rooms.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Room>> {
        Ok(self
            .rooms
            .lock()
            .unwrap()
            .values()
            .find(|room| room.name == name)
            .cloned())
    }

    async fn find_global(&self) -> RepositoryResult<Option<Room>> {
        Ok(self
            .rooms
            .lock()
            .unwrap()
            .values()
            .find(|room| room.is_global())
            .cloned())
    }

    async fn list_for_user(&self, user_id: UserId) -> RepositoryResult<Vec<Room>> {
        let members = self.members.lock().unwrap();
        let rooms = self.rooms.lock().unwrap();
        let mut result: Vec<Room> = rooms
            .values()
            .filter(|room| members.contains_key(&(room.id, user_id)))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn list_public(&self) -> RepositoryResult<Vec<Room>> {
        let mut result: Vec<Room> = self
            .rooms
            .lock()
            .unwrap()
            .values()
            .filter(|room| room.kind.is_public())
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn delete(&self, id: RoomId) -> RepositoryResult<()> {
        self.rooms.lock().unwrap().remove(&id);
        self.members
            .lock()
            .unwrap()
            .retain(|(room_id, _), _| *room_id != id);
        self.messages
            .lock()
            .unwrap()
            .retain(|_, message| message.room_id != id);
        self.invitations
            .lock()
            .unwrap()
            .retain(|_, invitation| invitation.room_id != id);
        Ok(())
    }
}

#[async_trait]
impl RoomMemberRepository for InMemoryStore {
    async fn insert_if_absent(&self, member: RoomMember) -> RepositoryResult<RoomMember> {
        let mut members = self.members.lock().unwrap();
        let key = (member.room_id, member.user_id);
        Ok(members.entry(key).or_insert(member).clone())
    }

    async fn insert(&self, member: RoomMember) -> RepositoryResult<RoomMember> {
        let mut members = self.members.lock().unwrap();
        let key = (member.room_id, member.user_id);
        if members.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        members.insert(key, member.clone());
        Ok(member)
    }

    async fn find(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> RepositoryResult<Option<RoomMember>> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(&(room_id, user_id))
            .cloned())
    }

    async fn update_role(
        &self,
        room_id: RoomId,
        user_id: UserId,
        role: RoomRole,
    ) -> RepositoryResult<RoomMember> {
        let mut members = self.members.lock().unwrap();
        let member = members
            .get_mut(&(room_id, user_id))
            .ok_or(RepositoryError::NotFound)?;
        member.role = role;
        Ok(member.clone())
    }

    async fn remove(&self, room_id: RoomId, user_id: UserId) -> RepositoryResult<()> {
        self.members.lock().unwrap().remove(&(room_id, user_id));
        Ok(())
    }

    async fn list_members(&self, room_id: RoomId) -> RepositoryResult<Vec<RoomMember>> {
        Ok(self.member_rows(room_id))
    }
}

#[async_trait]
impl InvitationRepository for InMemoryStore {
    async fn create(&self, invitation: Invitation) -> RepositoryResult<Invitation> {
        let mut invitations = self.invitations.lock().unwrap();
        let duplicate = invitations.values().any(|existing| {
            existing.room_id == invitation.room_id
                && existing.invitee_id == invitation.invitee_id
                && existing.is_pending()
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        invitations.insert(invitation.id, invitation.clone());
        Ok(invitation)
    }

    async fn find_by_id(&self, id: InvitationId) -> RepositoryResult<Option<Invitation>> {
        Ok(self.invitations.lock().unwrap().get(&id).cloned())
    }

    async fn find_pending_for(
        &self,
        room_id: RoomId,
        invitee_id: UserId,
    ) -> RepositoryResult<Option<Invitation>> {
        Ok(self
            .invitations
            .lock()
            .unwrap()
            .values()
            .find(|inv| inv.room_id == room_id && inv.invitee_id == invitee_id && inv.is_pending())
            .cloned())
    }

    async fn delete_resolved_for(
        &self,
        room_id: RoomId,
        invitee_id: UserId,
    ) -> RepositoryResult<()> {
        self.invitations.lock().unwrap().retain(|_, inv| {
            !(inv.room_id == room_id && inv.invitee_id == invitee_id && !inv.is_pending())
        });
        Ok(())
    }

    async fn list_pending_for_user(
        &self,
        invitee_id: UserId,
    ) -> RepositoryResult<Vec<Invitation>> {
        let mut result: Vec<Invitation> = self
            .invitations
            .lock()
            .unwrap()
            .values()
            .filter(|inv| inv.invitee_id == invitee_id && inv.is_pending())
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn resolve(
        &self,
        invitation: Invitation,
        new_member: Option<RoomMember>,
    ) -> RepositoryResult<Invitation> {
        let mut invitations = self.invitations.lock().unwrap();
        // 模拟 UPDATE ... WHERE status = 'pending' 的 check-and-set
        let stored = invitations
            .get_mut(&invitation.id)
            .ok_or(RepositoryError::NotFound)?;
        if !stored.is_pending() {
            return Err(RepositoryError::Conflict);
        }
        *stored = invitation.clone();
        drop(invitations);

        if let Some(member) = new_member {
            // 与 Pg 实现的 ON CONFLICT DO NOTHING 语义一致
            let mut members = self.members.lock().unwrap();
            let key = (member.room_id, member.user_id);
            members.entry(key).or_insert(member);
        }
        Ok(invitation)
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn create(&self, message: Message) -> RepositoryResult<Message> {
        self.messages
            .lock()
            .unwrap()
            .insert(message.id, message.clone());
        Ok(message)
    }

    async fn find_by_id(&self, id: MessageId) -> RepositoryResult<Option<Message>> {
        Ok(self.messages.lock().unwrap().get(&id).cloned())
    }

    async fn update(&self, message: Message) -> RepositoryResult<Message> {
        let mut messages = self.messages.lock().unwrap();
        if !messages.contains_key(&message.id) {
            return Err(RepositoryError::NotFound);
        }
        messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn list_page(
        &self,
        room_id: RoomId,
        parent: Option<MessageId>,
        limit: u32,
        offset: u32,
    ) -> RepositoryResult<Vec<Message>> {
        let mut result: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .values()
            .filter(|message| {
                message.room_id == room_id
                    && !message.is_deleted
                    && message.parent_id == parent
            })
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn list_replies(
        &self,
        parent: MessageId,
        limit: u32,
        offset: u32,
    ) -> RepositoryResult<Vec<Message>> {
        let mut result: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .values()
            .filter(|message| message.parent_id == Some(parent) && !message.is_deleted)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(result
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_live_in_room(&self, room_id: RoomId) -> RepositoryResult<u64> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .values()
            .filter(|message| message.room_id == room_id && !message.is_deleted)
            .count() as u64)
    }

    async fn count_top_level(&self, room_id: RoomId) -> RepositoryResult<u64> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .values()
            .filter(|message| {
                message.room_id == room_id && !message.is_deleted && message.parent_id.is_none()
            })
            .count() as u64)
    }

    async fn count_replies(&self, parent: MessageId) -> RepositoryResult<u64> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .values()
            .filter(|message| message.parent_id == Some(parent) && !message.is_deleted)
            .count() as u64)
    }
}

/// 组装好三个服务的测试上下文，预置全局房间
pub struct TestContext {
    pub store: Arc<InMemoryStore>,
    pub broadcaster: Arc<CapturingBroadcaster>,
    pub clock: Arc<FixedClock>,
    pub rooms: Arc<RoomService>,
    pub invitations: InvitationService,
    pub messages: MessageService,
    pub global_room_id: RoomId,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let broadcaster = Arc::new(CapturingBroadcaster::new());
        let clock = Arc::new(FixedClock::new());

        let global_room_id = RoomId(Uuid::new_v4());
        let global = Room::new(
            global_room_id,
            "General",
            Some("Site-wide chat".to_string()),
            RoomKind::Global,
            clock.now(),
        )
        .unwrap();
        store.rooms.lock().unwrap().insert(global.id, global);

        let rooms = Arc::new(RoomService::new(RoomServiceDependencies {
            rooms: store.clone(),
            members: store.clone(),
            users: store.clone(),
            messages: store.clone(),
            clock: clock.clone(),
        }));

        let invitations = InvitationService::new(InvitationServiceDependencies {
            room_service: rooms.clone(),
            rooms: store.clone(),
            invitations: store.clone(),
            members: store.clone(),
            users: store.clone(),
            clock: clock.clone(),
            broadcaster: broadcaster.clone(),
        });

        let messages = MessageService::new(MessageServiceDependencies {
            room_service: rooms.clone(),
            messages: store.clone(),
            users: store.clone(),
            clock: clock.clone(),
            broadcaster: broadcaster.clone(),
        });

        Self {
            store,
            broadcaster,
            clock,
            rooms,
            invitations,
            messages,
            global_room_id,
        }
    }

    pub fn add_user(&self, username: &str) -> Uuid {
        self.add_user_with(username, UserRole::Member, false)
    }

    pub fn add_admin(&self, username: &str) -> Uuid {
        self.add_user_with(username, UserRole::Admin, false)
    }

    pub fn add_banned_user(&self, username: &str) -> Uuid {
        self.add_user_with(username, UserRole::Member, true)
    }

    fn add_user_with(&self, username: &str, role: UserRole, is_banned: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.store.insert_user(User {
            id: UserId(id),
            username: Username::parse(username).unwrap(),
            role,
            is_banned,
            avatar_url: None,
            created_at: self.clock.now(),
        });
        id
    }
}

/// 创建公开或私密房间并返回房间ID
pub async fn create_room(ctx: &TestContext, creator: Uuid, name: &str, is_public: bool) -> Uuid {
    let details = ctx
        .rooms
        .create_room(crate::services::CreateRoomRequest {
            creator_id: creator,
            name: name.to_string(),
            description: None,
            is_public,
        })
        .await
        .unwrap();
    details.room.id.0
}
