use async_trait::async_trait;
use domain::{
    Invitation, InvitationId, Message, MessageId, RepositoryResult, Room, RoomId, RoomMember,
    RoomRole, User, UserId,
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> RepositoryResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>>;
    async fn find_many(&self, ids: &[UserId]) -> RepositoryResult<Vec<User>>;
}

#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// 原子地创建房间和房主成员记录；名称冲突返回 `Conflict`
    async fn create_with_owner(&self, room: Room, owner: RoomMember) -> RepositoryResult<Room>;
    async fn find_by_id(&self, id: RoomId) -> RepositoryResult<Option<Room>>;
    async fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Room>>;
    async fn find_global(&self) -> RepositoryResult<Option<Room>>;
    async fn list_for_user(&self, user_id: UserId) -> RepositoryResult<Vec<Room>>;
    async fn list_public(&self) -> RepositoryResult<Vec<Room>>;
    /// 删除房间并级联硬删除成员、消息和邀请
    async fn delete(&self, id: RoomId) -> RepositoryResult<()>;
}

#[async_trait]
pub trait RoomMemberRepository: Send + Sync {
    /// 幂等插入：记录已存在时返回现有记录而不是报错。
    /// 公开房间的自动加入依赖这里的 check-and-set 语义，并发重复访问
    /// 也只会产生一条成员记录。
    async fn insert_if_absent(&self, member: RoomMember) -> RepositoryResult<RoomMember>;
    /// 严格插入：记录已存在时返回 `Conflict`
    async fn insert(&self, member: RoomMember) -> RepositoryResult<RoomMember>;
    async fn find(&self, room_id: RoomId, user_id: UserId)
        -> RepositoryResult<Option<RoomMember>>;
    async fn update_role(
        &self,
        room_id: RoomId,
        user_id: UserId,
        role: RoomRole,
    ) -> RepositoryResult<RoomMember>;
    async fn remove(&self, room_id: RoomId, user_id: UserId) -> RepositoryResult<()>;
    async fn list_members(&self, room_id: RoomId) -> RepositoryResult<Vec<RoomMember>>;
}

#[async_trait]
pub trait InvitationRepository: Send + Sync {
    /// 插入新的 pending 邀请；同一 (房间, 被邀请人) 已有 pending 记录时
    /// 返回 `Conflict`（由部分唯一索引兜底并发竞争）
    async fn create(&self, invitation: Invitation) -> RepositoryResult<Invitation>;
    async fn find_by_id(&self, id: InvitationId) -> RepositoryResult<Option<Invitation>>;
    async fn find_pending_for(
        &self,
        room_id: RoomId,
        invitee_id: UserId,
    ) -> RepositoryResult<Option<Invitation>>;
    /// 清理该 (房间, 被邀请人) 的已终结记录，为新邀请让路
    async fn delete_resolved_for(
        &self,
        room_id: RoomId,
        invitee_id: UserId,
    ) -> RepositoryResult<()>;
    async fn list_pending_for_user(
        &self,
        invitee_id: UserId,
    ) -> RepositoryResult<Vec<Invitation>>;
    /// 原子地写回邀请终态，并在需要时一并插入成员记录（接受且尚未是
    /// 成员的场景）。两个写入在同一事务中提交。
    async fn resolve(
        &self,
        invitation: Invitation,
        new_member: Option<RoomMember>,
    ) -> RepositoryResult<Invitation>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, message: Message) -> RepositoryResult<Message>;
    async fn find_by_id(&self, id: MessageId) -> RepositoryResult<Option<Message>>;
    async fn update(&self, message: Message) -> RepositoryResult<Message>;
    /// 按创建时间倒序分页列出未删除消息；`parent` 为 `None` 时只取
    /// 顶层消息，否则取指定线程的回复
    async fn list_page(
        &self,
        room_id: RoomId,
        parent: Option<MessageId>,
        limit: u32,
        offset: u32,
    ) -> RepositoryResult<Vec<Message>>;
    /// 按创建时间正序分页列出某条消息的未删除回复
    async fn list_replies(
        &self,
        parent: MessageId,
        limit: u32,
        offset: u32,
    ) -> RepositoryResult<Vec<Message>>;
    /// 房间内全部未删除消息数（含回复）
    async fn count_live_in_room(&self, room_id: RoomId) -> RepositoryResult<u64>;
    /// 房间内未删除顶层消息数
    async fn count_top_level(&self, room_id: RoomId) -> RepositoryResult<u64>;
    /// 某条消息的未删除回复数
    async fn count_replies(&self, parent: MessageId) -> RepositoryResult<u64>;
}
