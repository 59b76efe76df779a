//! PostgreSQL 仓储实现
//!
//! 字符串类型的角色/状态列在这一层映射回领域枚举；跨行的原子写入
//! （房间+房主、邀请终态+成员）使用显式事务。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

use application::{
    InvitationRepository, MessageRepository, RoomMemberRepository, RoomRepository, UserRepository,
};
use domain::{
    ImageUrl, Invitation, InvitationId, InvitationStatus, Message, MessageBody, MessageId,
    RepositoryError, RepositoryResult, Room, RoomId, RoomKind, RoomMember, RoomRole, User, UserId,
    UserRole, Username,
};

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict,
        _ => RepositoryError::storage(err.to_string()),
    }
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

#[derive(Debug, FromRow)]
struct UserRecord {
    id: Uuid,
    username: String,
    role: String,
    is_banned: bool,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRecord> for User {
    type Error = RepositoryError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        let username =
            Username::parse(value.username).map_err(|err| invalid_data(err.to_string()))?;
        let role = UserRole::parse(&value.role).map_err(|err| invalid_data(err.to_string()))?;

        Ok(User {
            id: UserId(value.id),
            username,
            role,
            is_banned: value.is_banned,
            avatar_url: value.avatar_url,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct RoomRecord {
    id: Uuid,
    name: String,
    description: Option<String>,
    is_global: bool,
    is_public: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RoomRecord> for Room {
    fn from(value: RoomRecord) -> Self {
        Room {
            id: RoomId(value.id),
            name: value.name,
            description: value.description,
            kind: RoomKind::from_flags(value.is_global, value.is_public),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct MemberRecord {
    room_id: Uuid,
    user_id: Uuid,
    role: String,
    joined_at: DateTime<Utc>,
}

impl TryFrom<MemberRecord> for RoomMember {
    type Error = RepositoryError;

    fn try_from(value: MemberRecord) -> Result<Self, Self::Error> {
        let role = RoomRole::parse(&value.role).map_err(|err| invalid_data(err.to_string()))?;
        Ok(RoomMember {
            room_id: RoomId(value.room_id),
            user_id: UserId(value.user_id),
            role,
            joined_at: value.joined_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct InvitationRecord {
    id: Uuid,
    room_id: Uuid,
    inviter_id: Uuid,
    invitee_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
    responded_at: Option<DateTime<Utc>>,
}

impl TryFrom<InvitationRecord> for Invitation {
    type Error = RepositoryError;

    fn try_from(value: InvitationRecord) -> Result<Self, Self::Error> {
        let status =
            InvitationStatus::parse(&value.status).map_err(|err| invalid_data(err.to_string()))?;
        Ok(Invitation {
            id: InvitationId(value.id),
            room_id: RoomId(value.room_id),
            inviter_id: UserId(value.inviter_id),
            invitee_id: UserId(value.invitee_id),
            status,
            created_at: value.created_at,
            responded_at: value.responded_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    room_id: Uuid,
    user_id: Uuid,
    content: Option<String>,
    image_url: Option<String>,
    parent_id: Option<Uuid>,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let image_url = value
            .image_url
            .map(ImageUrl::parse)
            .transpose()
            .map_err(|err| invalid_data(err.to_string()))?;
        let body = MessageBody::new(value.content, image_url)
            .map_err(|err| invalid_data(err.to_string()))?;

        Ok(Message {
            id: MessageId(value.id),
            room_id: RoomId(value.room_id),
            user_id: UserId(value.user_id),
            body,
            parent_id: value.parent_id.map(MessageId),
            is_deleted: value.is_deleted,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

const USER_COLUMNS: &str = "id, username, role, is_banned, avatar_url, created_at";
const ROOM_COLUMNS: &str = "id, name, description, is_global, is_public, created_at, updated_at";
const MEMBER_COLUMNS: &str = "room_id, user_id, role, joined_at";
const INVITATION_COLUMNS: &str =
    "id, room_id, inviter_id, invitee_id, status, created_at, responded_at";
const MESSAGE_COLUMNS: &str =
    "id, room_id, user_id, content, image_url, parent_id, is_deleted, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: UserId) -> RepositoryResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }

    async fn find_many(&self, ids: &[UserId]) -> RepositoryResult<Vec<User>> {
        let raw_ids: Vec<Uuid> = ids.iter().map(|id| id.0).collect();
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(&raw_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(User::try_from).collect()
    }
}

#[derive(Clone)]
pub struct PgRoomRepository {
    pool: PgPool,
}

impl PgRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    async fn create_with_owner(&self, room: Room, owner: RoomMember) -> RepositoryResult<Room> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        let record = sqlx::query_as::<_, RoomRecord>(&format!(
            "INSERT INTO chat_rooms (id, name, description, is_global, is_public, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {ROOM_COLUMNS}"
        ))
        .bind(room.id.0)
        .bind(&room.name)
        .bind(&room.description)
        .bind(room.kind.is_global())
        .bind(room.kind.is_public())
        .bind(room.created_at)
        .bind(room.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        sqlx::query(
            "INSERT INTO room_members (room_id, user_id, role, joined_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(owner.room_id.0)
        .bind(owner.user_id.0)
        .bind(owner.role.as_str())
        .bind(owner.joined_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(Room::from(record))
    }

    async fn find_by_id(&self, id: RoomId) -> RepositoryResult<Option<Room>> {
        let record = sqlx::query_as::<_, RoomRecord>(&format!(
            "SELECT {ROOM_COLUMNS} FROM chat_rooms WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.map(Room::from))
    }

    async fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Room>> {
        let record = sqlx::query_as::<_, RoomRecord>(&format!(
            "SELECT {ROOM_COLUMNS} FROM chat_rooms WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.map(Room::from))
    }

    async fn find_global(&self) -> RepositoryResult<Option<Room>> {
        let record = sqlx::query_as::<_, RoomRecord>(&format!(
            "SELECT {ROOM_COLUMNS} FROM chat_rooms WHERE is_global LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.map(Room::from))
    }

    async fn list_for_user(&self, user_id: UserId) -> RepositoryResult<Vec<Room>> {
        let records = sqlx::query_as::<_, RoomRecord>(&format!(
            "SELECT r.{} FROM chat_rooms r
             JOIN room_members m ON m.room_id = r.id
             WHERE m.user_id = $1
             ORDER BY r.is_global DESC, r.name ASC",
            ROOM_COLUMNS.replace(", ", ", r."),
        ))
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(records.into_iter().map(Room::from).collect())
    }

    async fn list_public(&self) -> RepositoryResult<Vec<Room>> {
        let records = sqlx::query_as::<_, RoomRecord>(&format!(
            "SELECT {ROOM_COLUMNS} FROM chat_rooms
             WHERE is_public AND NOT is_global
             ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(records.into_iter().map(Room::from).collect())
    }

    async fn delete(&self, id: RoomId) -> RepositoryResult<()> {
        // 成员、消息和邀请由外键级联删除
        sqlx::query("DELETE FROM chat_rooms WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgRoomMemberRepository {
    pool: PgPool,
}

impl PgRoomMemberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomMemberRepository for PgRoomMemberRepository {
    async fn insert_if_absent(&self, member: RoomMember) -> RepositoryResult<RoomMember> {
        // 幂等 check-and-set：冲突时保留现有行（包括其角色）
        sqlx::query(
            "INSERT INTO room_members (room_id, user_id, role, joined_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (room_id, user_id) DO NOTHING",
        )
        .bind(member.room_id.0)
        .bind(member.user_id.0)
        .bind(member.role.as_str())
        .bind(member.joined_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        let record = sqlx::query_as::<_, MemberRecord>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM room_members WHERE room_id = $1 AND user_id = $2"
        ))
        .bind(member.room_id.0)
        .bind(member.user_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        RoomMember::try_from(record)
    }

    async fn insert(&self, member: RoomMember) -> RepositoryResult<RoomMember> {
        let record = sqlx::query_as::<_, MemberRecord>(&format!(
            "INSERT INTO room_members (room_id, user_id, role, joined_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(member.room_id.0)
        .bind(member.user_id.0)
        .bind(member.role.as_str())
        .bind(member.joined_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        RoomMember::try_from(record)
    }

    async fn find(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> RepositoryResult<Option<RoomMember>> {
        let record = sqlx::query_as::<_, MemberRecord>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM room_members WHERE room_id = $1 AND user_id = $2"
        ))
        .bind(room_id.0)
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(RoomMember::try_from).transpose()
    }

    async fn update_role(
        &self,
        room_id: RoomId,
        user_id: UserId,
        role: RoomRole,
    ) -> RepositoryResult<RoomMember> {
        let record = sqlx::query_as::<_, MemberRecord>(&format!(
            "UPDATE room_members SET role = $3
             WHERE room_id = $1 AND user_id = $2
             RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(room_id.0)
        .bind(user_id.0)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?
        .ok_or(RepositoryError::NotFound)?;

        RoomMember::try_from(record)
    }

    async fn remove(&self, room_id: RoomId, user_id: UserId) -> RepositoryResult<()> {
        sqlx::query("DELETE FROM room_members WHERE room_id = $1 AND user_id = $2")
            .bind(room_id.0)
            .bind(user_id.0)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn list_members(&self, room_id: RoomId) -> RepositoryResult<Vec<RoomMember>> {
        let records = sqlx::query_as::<_, MemberRecord>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM room_members WHERE room_id = $1"
        ))
        .bind(room_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(RoomMember::try_from).collect()
    }
}

#[derive(Clone)]
pub struct PgInvitationRepository {
    pool: PgPool,
}

impl PgInvitationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvitationRepository for PgInvitationRepository {
    async fn create(&self, invitation: Invitation) -> RepositoryResult<Invitation> {
        // 并发竞争由 (room_id, invitee_id) WHERE status='pending' 的
        // 部分唯一索引裁决，违反映射为 Conflict
        let record = sqlx::query_as::<_, InvitationRecord>(&format!(
            "INSERT INTO room_invitations (id, room_id, inviter_id, invitee_id, status, created_at, responded_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {INVITATION_COLUMNS}"
        ))
        .bind(invitation.id.0)
        .bind(invitation.room_id.0)
        .bind(invitation.inviter_id.0)
        .bind(invitation.invitee_id.0)
        .bind(invitation.status.as_str())
        .bind(invitation.created_at)
        .bind(invitation.responded_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Invitation::try_from(record)
    }

    async fn find_by_id(&self, id: InvitationId) -> RepositoryResult<Option<Invitation>> {
        let record = sqlx::query_as::<_, InvitationRecord>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM room_invitations WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Invitation::try_from).transpose()
    }

    async fn find_pending_for(
        &self,
        room_id: RoomId,
        invitee_id: UserId,
    ) -> RepositoryResult<Option<Invitation>> {
        let record = sqlx::query_as::<_, InvitationRecord>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM room_invitations
             WHERE room_id = $1 AND invitee_id = $2 AND status = 'pending'"
        ))
        .bind(room_id.0)
        .bind(invitee_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Invitation::try_from).transpose()
    }

    async fn delete_resolved_for(
        &self,
        room_id: RoomId,
        invitee_id: UserId,
    ) -> RepositoryResult<()> {
        sqlx::query(
            "DELETE FROM room_invitations
             WHERE room_id = $1 AND invitee_id = $2 AND status <> 'pending'",
        )
        .bind(room_id.0)
        .bind(invitee_id.0)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn list_pending_for_user(
        &self,
        invitee_id: UserId,
    ) -> RepositoryResult<Vec<Invitation>> {
        let records = sqlx::query_as::<_, InvitationRecord>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM room_invitations
             WHERE invitee_id = $1 AND status = 'pending'
             ORDER BY created_at DESC"
        ))
        .bind(invitee_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Invitation::try_from).collect()
    }

    async fn resolve(
        &self,
        invitation: Invitation,
        new_member: Option<RoomMember>,
    ) -> RepositoryResult<Invitation> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        // check-and-set：只有仍处于 pending 的行可以被终结，
        // 并发的第二次接受/拒绝在这里落败
        let updated = sqlx::query(
            "UPDATE room_invitations SET status = $2, responded_at = $3
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(invitation.id.0)
        .bind(invitation.status.as_str())
        .bind(invitation.responded_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::Conflict);
        }

        if let Some(member) = new_member {
            sqlx::query(
                "INSERT INTO room_members (room_id, user_id, role, joined_at)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (room_id, user_id) DO NOTHING",
            )
            .bind(member.room_id.0)
            .bind(member.user_id.0)
            .bind(member.role.as_str())
            .bind(member.joined_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        }

        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(invitation)
    }
}

#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: Message) -> RepositoryResult<Message> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            "INSERT INTO messages (id, room_id, user_id, content, image_url, parent_id, is_deleted, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(message.id.0)
        .bind(message.room_id.0)
        .bind(message.user_id.0)
        .bind(message.body.content())
        .bind(message.body.image_url().map(|url| url.as_str()))
        .bind(message.parent_id.map(|id| id.0))
        .bind(message.is_deleted)
        .bind(message.created_at)
        .bind(message.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Message::try_from(record)
    }

    async fn find_by_id(&self, id: MessageId) -> RepositoryResult<Option<Message>> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Message::try_from).transpose()
    }

    async fn update(&self, message: Message) -> RepositoryResult<Message> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            "UPDATE messages
             SET content = $2, image_url = $3, is_deleted = $4, updated_at = $5
             WHERE id = $1
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(message.id.0)
        .bind(message.body.content())
        .bind(message.body.image_url().map(|url| url.as_str()))
        .bind(message.is_deleted)
        .bind(message.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?
        .ok_or(RepositoryError::NotFound)?;

        Message::try_from(record)
    }

    async fn list_page(
        &self,
        room_id: RoomId,
        parent: Option<MessageId>,
        limit: u32,
        offset: u32,
    ) -> RepositoryResult<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE room_id = $1 AND NOT is_deleted AND parent_id IS NOT DISTINCT FROM $2
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(room_id.0)
        .bind(parent.map(|id| id.0))
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Message::try_from).collect()
    }

    async fn list_replies(
        &self,
        parent: MessageId,
        limit: u32,
        offset: u32,
    ) -> RepositoryResult<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE parent_id = $1 AND NOT is_deleted
             ORDER BY created_at ASC, id ASC
             LIMIT $2 OFFSET $3"
        ))
        .bind(parent.0)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Message::try_from).collect()
    }

    async fn count_live_in_room(&self, room_id: RoomId) -> RepositoryResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages WHERE room_id = $1 AND NOT is_deleted",
        )
        .bind(room_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(count as u64)
    }

    async fn count_top_level(&self, room_id: RoomId) -> RepositoryResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages
             WHERE room_id = $1 AND NOT is_deleted AND parent_id IS NULL",
        )
        .bind(room_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(count as u64)
    }

    async fn count_replies(&self, parent: MessageId) -> RepositoryResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages WHERE parent_id = $1 AND NOT is_deleted",
        )
        .bind(parent.0)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(count as u64)
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
