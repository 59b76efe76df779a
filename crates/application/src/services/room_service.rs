//! 房间目录服务
//!
//! 房间实体、成员关系和角色分配的唯一管理入口。所有需要成员资格或
//! 管理权限的路径都经过 `check_access` 这一个授权判定点。

use std::sync::Arc;

use uuid::Uuid;

use domain::{DomainError, Room, RoomId, RoomKind, RoomMember, RoomRole, User, UserId};

use crate::clock::Clock;
use crate::dto::{MemberDto, RoomDetailsDto, RoomDto, UserSummary};
use crate::error::{ApplicationError, ApplicationResult};
use crate::repository::{MessageRepository, RoomMemberRepository, RoomRepository, UserRepository};

#[derive(Debug, Clone)]
pub struct CreateRoomRequest {
    pub creator_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
}

#[derive(Debug, Clone)]
pub struct AddMemberRequest {
    pub actor_id: Uuid,
    pub room_id: Uuid,
    pub username: String,
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct UpdateMemberRoleRequest {
    pub actor_id: Uuid,
    pub room_id: Uuid,
    pub member_id: Uuid,
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct RemoveMemberRequest {
    pub actor_id: Uuid,
    pub room_id: Uuid,
    pub member_id: Uuid,
}

/// `check_access` 的结果：房间与调用者的有效角色。
#[derive(Debug, Clone)]
pub struct RoomAccess {
    pub room: Room,
    pub role: RoomRole,
}

/// `add_member` 的结果。
///
/// 私密房间不允许直接写入成员记录，调用方需要转入邀请流程。
#[derive(Debug, Clone)]
pub enum AddMemberOutcome {
    Added(MemberDto),
    InvitationRequired,
}

pub struct RoomServiceDependencies {
    pub rooms: Arc<dyn RoomRepository>,
    pub members: Arc<dyn RoomMemberRepository>,
    pub users: Arc<dyn UserRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub clock: Arc<dyn Clock>,
}

pub struct RoomService {
    deps: RoomServiceDependencies,
}

impl RoomService {
    pub fn new(deps: RoomServiceDependencies) -> Self {
        Self { deps }
    }

    /// 统一的授权判定点。
    ///
    /// - 全局房间：任何用户都可访问，角色视为 member；
    /// - 公开房间：非成员首次访问时隐式加入（幂等写入成员记录）；
    /// - 私密房间：必须已有成员记录；
    /// - `require_admin` 额外要求房间内角色为 owner/admin。
    pub async fn check_access(
        &self,
        user_id: UserId,
        room_id: RoomId,
        require_admin: bool,
    ) -> ApplicationResult<RoomAccess> {
        let room = self
            .deps
            .rooms
            .find_by_id(room_id)
            .await?
            .ok_or(DomainError::RoomNotFound)?;

        let role = if room.is_global() {
            RoomRole::Member
        } else {
            match self.deps.members.find(room_id, user_id).await? {
                Some(member) => member.role,
                None if room.kind.is_public() => {
                    let member = RoomMember::new(
                        room_id,
                        user_id,
                        RoomRole::Member,
                        self.deps.clock.now(),
                    );
                    let stored = self.deps.members.insert_if_absent(member).await?;
                    tracing::info!(user_id = %user_id, room_id = %room_id, "auto-joined public room on first access");
                    stored.role
                }
                None => return Err(DomainError::NotMember.into()),
            }
        };

        if require_admin && !role.has_admin_access() {
            return Err(DomainError::InsufficientPermissions.into());
        }

        Ok(RoomAccess { room, role })
    }

    pub async fn create_room(
        &self,
        request: CreateRoomRequest,
    ) -> ApplicationResult<RoomDetailsDto> {
        let creator_id = UserId::from(request.creator_id);
        let creator = self.find_active_user(creator_id).await?;

        if self
            .deps
            .rooms
            .find_by_name(request.name.trim())
            .await?
            .is_some()
        {
            return Err(DomainError::DuplicateName.into());
        }

        let now = self.deps.clock.now();
        let kind = if request.is_public {
            RoomKind::Public
        } else {
            RoomKind::Private
        };
        let room = Room::new(
            RoomId(Uuid::new_v4()),
            request.name,
            request.description,
            kind,
            now,
        )?;
        let owner = RoomMember::new(room.id, creator.id, RoomRole::Owner, now);

        // 房间和房主成员记录在同一事务中落库；名称唯一约束兜底并发竞争
        let stored = self
            .deps
            .rooms
            .create_with_owner(room, owner)
            .await
            .map_err(|err| match err {
                domain::RepositoryError::Conflict => ApplicationError::from(DomainError::DuplicateName),
                other => other.into(),
            })?;

        tracing::info!(room_id = %stored.id, kind = stored.kind.as_str(), creator = %creator_id, "room created");
        self.room_details(&stored, Some(creator_id)).await
    }

    pub async fn get_room(
        &self,
        room_id: Uuid,
        viewer_id: Uuid,
    ) -> ApplicationResult<RoomDetailsDto> {
        let viewer_id = UserId::from(viewer_id);
        let access = self
            .check_access(viewer_id, RoomId::from(room_id), false)
            .await?;
        self.room_details(&access.room, Some(viewer_id)).await
    }

    /// 当前用户的房间列表；全局房间总在首位
    pub async fn list_rooms(&self, user_id: Uuid) -> ApplicationResult<Vec<RoomDto>> {
        let user_id = UserId::from(user_id);
        let mut rooms = self.deps.rooms.list_for_user(user_id).await?;

        if let Some(global) = self.deps.rooms.find_global().await? {
            if !rooms.iter().any(|room| room.id == global.id) {
                rooms.insert(0, global);
            }
        }

        let mut dtos = Vec::with_capacity(rooms.len());
        for room in &rooms {
            dtos.push(self.room_dto(room, Some(user_id)).await?);
        }
        Ok(dtos)
    }

    /// 公开房间发现列表
    pub async fn list_public_rooms(&self, viewer_id: Uuid) -> ApplicationResult<Vec<RoomDto>> {
        let viewer_id = UserId::from(viewer_id);
        let rooms = self.deps.rooms.list_public().await?;

        let mut dtos = Vec::with_capacity(rooms.len());
        for room in &rooms {
            dtos.push(self.room_dto(room, Some(viewer_id)).await?);
        }
        Ok(dtos)
    }

    /// 显式加入公开房间。已是成员时幂等成功。
    pub async fn join_public_room(
        &self,
        user_id: Uuid,
        room_id: Uuid,
    ) -> ApplicationResult<RoomDto> {
        let user_id = UserId::from(user_id);
        let room_id = RoomId::from(room_id);

        let room = self
            .deps
            .rooms
            .find_by_id(room_id)
            .await?
            .ok_or(DomainError::RoomNotFound)?;

        if room.kind.is_private() {
            return Err(DomainError::InsufficientPermissions.into());
        }

        // 全局房间的成员资格是隐式的，不落成员记录
        if !room.is_global() {
            let member =
                RoomMember::new(room_id, user_id, RoomRole::Member, self.deps.clock.now());
            self.deps.members.insert_if_absent(member).await?;
        }

        self.room_dto(&room, Some(user_id)).await
    }

    /// 向房间添加成员（admin/owner 权限）。
    ///
    /// 公开/全局房间直接写入成员记录；私密房间改走邀请流程，返回
    /// `InvitationRequired` 由调用方转交邀请服务。
    pub async fn add_member(
        &self,
        request: AddMemberRequest,
    ) -> ApplicationResult<AddMemberOutcome> {
        let actor_id = UserId::from(request.actor_id);
        let room_id = RoomId::from(request.room_id);

        let access = self.check_access(actor_id, room_id, true).await?;

        let role = RoomRole::parse(&request.role)?;
        if matches!(role, RoomRole::Owner) {
            return Err(DomainError::invalid_input("role", "cannot assign owner").into());
        }

        if access.room.kind.is_private() {
            return Ok(AddMemberOutcome::InvitationRequired);
        }

        let target = self
            .deps
            .users
            .find_by_username(&request.username)
            .await?
            .ok_or(DomainError::UserNotFound)?;
        if target.is_banned {
            return Err(DomainError::AccountBanned.into());
        }

        if self.deps.members.find(room_id, target.id).await?.is_some() {
            return Err(DomainError::AlreadyMember.into());
        }

        let member = RoomMember::new(room_id, target.id, role, self.deps.clock.now());
        let stored = self
            .deps
            .members
            .insert(member)
            .await
            .map_err(|err| match err {
                domain::RepositoryError::Conflict => ApplicationError::from(DomainError::AlreadyMember),
                other => other.into(),
            })?;

        tracing::info!(room_id = %room_id, user_id = %target.id, role = stored.role.as_str(), "member added");
        Ok(AddMemberOutcome::Added(MemberDto::new(&stored, &target)))
    }

    /// 调整成员角色。仅房主可以调用；房主自身的角色不可变。
    pub async fn update_member_role(
        &self,
        request: UpdateMemberRoleRequest,
    ) -> ApplicationResult<MemberDto> {
        let actor_id = UserId::from(request.actor_id);
        let room_id = RoomId::from(request.room_id);
        let member_id = UserId::from(request.member_id);

        let requester = self
            .deps
            .members
            .find(room_id, actor_id)
            .await?
            .ok_or(DomainError::NotMember)?;
        if !requester.is_owner() {
            return Err(DomainError::InsufficientPermissions.into());
        }

        let role = RoomRole::parse(&request.role)?;
        if matches!(role, RoomRole::Owner) {
            return Err(DomainError::invalid_input("role", "cannot assign owner").into());
        }

        let target = self
            .deps
            .members
            .find(room_id, member_id)
            .await?
            .ok_or(DomainError::UserNotFound)?;
        if target.is_owner() {
            return Err(DomainError::InsufficientPermissions.into());
        }

        let updated = self
            .deps
            .members
            .update_role(room_id, member_id, role)
            .await?;
        let user = self
            .deps
            .users
            .find_by_id(member_id)
            .await?
            .ok_or(DomainError::UserNotFound)?;

        tracing::info!(room_id = %room_id, user_id = %member_id, role = role.as_str(), "member role updated");
        Ok(MemberDto::new(&updated, &user))
    }

    /// 移除成员（admin/owner 权限；admin 不能移除 admin；房主不可
    /// 移除；移除自己请走 `leave_room`）。
    pub async fn remove_member(&self, request: RemoveMemberRequest) -> ApplicationResult<()> {
        let actor_id = UserId::from(request.actor_id);
        let room_id = RoomId::from(request.room_id);
        let member_id = UserId::from(request.member_id);

        let requester = self
            .deps
            .members
            .find(room_id, actor_id)
            .await?
            .ok_or(DomainError::NotMember)?;
        if !requester.is_admin() {
            return Err(DomainError::InsufficientPermissions.into());
        }

        if actor_id == member_id {
            return Err(DomainError::invalid_input(
                "member_id",
                "use the leave endpoint to leave the room",
            )
            .into());
        }

        let target = self
            .deps
            .members
            .find(room_id, member_id)
            .await?
            .ok_or(DomainError::UserNotFound)?;

        if !requester.can_remove(target.role) {
            return Err(DomainError::InsufficientPermissions.into());
        }

        self.deps.members.remove(room_id, member_id).await?;
        tracing::info!(room_id = %room_id, user_id = %member_id, removed_by = %actor_id, "member removed");
        Ok(())
    }

    pub async fn leave_room(&self, user_id: Uuid, room_id: Uuid) -> ApplicationResult<()> {
        let user_id = UserId::from(user_id);
        let room_id = RoomId::from(room_id);

        let room = self
            .deps
            .rooms
            .find_by_id(room_id)
            .await?
            .ok_or(DomainError::RoomNotFound)?;
        if room.is_global() {
            return Err(DomainError::CannotLeaveGlobal.into());
        }

        let member = self
            .deps
            .members
            .find(room_id, user_id)
            .await?
            .ok_or(DomainError::NotMember)?;
        if member.is_owner() {
            return Err(DomainError::OwnerMustTransferOrDelete.into());
        }

        self.deps.members.remove(room_id, user_id).await?;
        tracing::info!(room_id = %room_id, user_id = %user_id, "member left room");
        Ok(())
    }

    /// 删除房间（仅房主）。级联硬删除成员、消息和邀请。
    pub async fn delete_room(&self, owner_id: Uuid, room_id: Uuid) -> ApplicationResult<()> {
        let owner_id = UserId::from(owner_id);
        let room_id = RoomId::from(room_id);

        let room = self
            .deps
            .rooms
            .find_by_id(room_id)
            .await?
            .ok_or(DomainError::RoomNotFound)?;
        if room.is_global() {
            return Err(DomainError::CannotDeleteGlobal.into());
        }

        let member = self
            .deps
            .members
            .find(room_id, owner_id)
            .await?
            .ok_or(DomainError::InsufficientPermissions)?;
        if !member.is_owner() {
            return Err(DomainError::InsufficientPermissions.into());
        }

        self.deps.rooms.delete(room_id).await?;
        tracing::info!(room_id = %room_id, owner_id = %owner_id, "room deleted");
        Ok(())
    }

    /// 全局房间。部署时由迁移脚本种子化，缺失视为基础设施故障。
    pub async fn global_room(&self) -> ApplicationResult<Room> {
        self.deps
            .rooms
            .find_global()
            .await?
            .ok_or_else(|| ApplicationError::infrastructure("global room is not seeded"))
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

    async fn room_dto(&self, room: &Room, viewer: Option<UserId>) -> ApplicationResult<RoomDto> {
        let members = self.deps.members.list_members(room.id).await?;
        let message_count = self.deps.messages.count_live_in_room(room.id).await?;

        let owner = match members.iter().find(|member| member.is_owner()) {
            Some(member) => self
                .deps
                .users
                .find_by_id(member.user_id)
                .await?
                .as_ref()
                .map(UserSummary::from),
            None => None,
        };

        let (your_role, is_member) = match viewer {
            Some(_) if room.is_global() => (Some(RoomRole::Member), true),
            Some(viewer_id) => members
                .iter()
                .find(|member| member.user_id == viewer_id)
                .map(|member| (Some(member.role), true))
                .unwrap_or((None, false)),
            None => (None, false),
        };

        Ok(RoomDto {
            id: room.id,
            name: room.name.clone(),
            description: room.description.clone(),
            kind: room.kind,
            created_at: room.created_at,
            member_count: members.len() as u64,
            message_count,
            your_role,
            is_member,
            owner,
        })
    }

    async fn room_details(
        &self,
        room: &Room,
        viewer: Option<UserId>,
    ) -> ApplicationResult<RoomDetailsDto> {
        let dto = self.room_dto(room, viewer).await?;

        let mut members = self.deps.members.list_members(room.id).await?;
        members.sort_by_key(|member| (member.role.sort_weight(), member.joined_at));

        let users = self
            .deps
            .users
            .find_many(&members.iter().map(|member| member.user_id).collect::<Vec<_>>())
            .await?;

        let member_dtos = members
            .iter()
            .filter_map(|member| {
                users
                    .iter()
                    .find(|user| user.id == member.user_id)
                    .map(|user| MemberDto::new(member, user))
            })
            .collect();

        Ok(RoomDetailsDto {
            room: dto,
            members: member_dtos,
        })
    }
}
