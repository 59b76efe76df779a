//! 私密房间邀请流程
//!
//! 成员资格进入私密房间的唯一通道。邀请的创建经过房间目录的管理员
//! 授权门，接受/拒绝只允许被邀请人本人操作，接受时的成员写入与状态
//! 回写在同一事务中提交。

use std::sync::Arc;

use uuid::Uuid;

use domain::{
    DomainError, Invitation, InvitationId, RepositoryError, RoomId, RoomMember, RoomRole, UserId,
};

use crate::broadcaster::EventBroadcaster;
use crate::clock::Clock;
use crate::dto::{InvitationDto, UserSummary};
use crate::error::{ApplicationError, ApplicationResult};
use crate::events::ChatEvent;
use crate::repository::{
    InvitationRepository, RoomMemberRepository, RoomRepository, UserRepository,
};
use crate::services::room_service::RoomService;

#[derive(Debug, Clone)]
pub struct InviteRequest {
    pub actor_id: Uuid,
    pub room_id: Uuid,
    pub invitee_username: String,
}

pub struct InvitationServiceDependencies {
    pub room_service: Arc<RoomService>,
    pub rooms: Arc<dyn RoomRepository>,
    pub invitations: Arc<dyn InvitationRepository>,
    pub members: Arc<dyn RoomMemberRepository>,
    pub users: Arc<dyn UserRepository>,
    pub clock: Arc<dyn Clock>,
    pub broadcaster: Arc<dyn EventBroadcaster>,
}

pub struct InvitationService {
    deps: InvitationServiceDependencies,
}

impl InvitationService {
    pub fn new(deps: InvitationServiceDependencies) -> Self {
        Self { deps }
    }

    /// 发出邀请。
    ///
    /// 同一 (房间, 被邀请人) 的待处理邀请最多一条；旧的终态记录在此
    /// 被清理，状态机重新开始。推送通知是尽力而为：失败只记日志，
    /// 不影响邀请本身。
    pub async fn invite(&self, request: InviteRequest) -> ApplicationResult<InvitationDto> {
        let actor_id = UserId::from(request.actor_id);
        let room_id = RoomId::from(request.room_id);

        let access = self
            .deps
            .room_service
            .check_access(actor_id, room_id, true)
            .await?;

        // 公开/全局房间直接加入，从不走邀请
        if !access.room.kind.is_private() {
            return Err(DomainError::invalid_input(
                "room_id",
                "invitations apply only to private rooms",
            )
            .into());
        }

        let invitee = self
            .deps
            .users
            .find_by_username(&request.invitee_username)
            .await?
            .ok_or(DomainError::UserNotFound)?;
        if invitee.is_banned {
            return Err(DomainError::AccountBanned.into());
        }

        if self
            .deps
            .members
            .find(room_id, invitee.id)
            .await?
            .is_some()
        {
            return Err(DomainError::AlreadyMember.into());
        }

        if self
            .deps
            .invitations
            .find_pending_for(room_id, invitee.id)
            .await?
            .is_some()
        {
            return Err(DomainError::DuplicatePending.into());
        }

        // 旧的 accepted/rejected 记录让位给新邀请
        self.deps
            .invitations
            .delete_resolved_for(room_id, invitee.id)
            .await?;

        let invitation = Invitation::new(
            InvitationId(Uuid::new_v4()),
            room_id,
            actor_id,
            invitee.id,
            self.deps.clock.now(),
        );
        let stored = self
            .deps
            .invitations
            .create(invitation)
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict => ApplicationError::from(DomainError::DuplicatePending),
                other => other.into(),
            })?;

        tracing::info!(
            invitation_id = %stored.id,
            room_id = %room_id,
            invitee = %invitee.id,
            inviter = %actor_id,
            "invitation created"
        );

        let dto = self.enrich(&stored).await?;

        let event = ChatEvent::RoomInvitation {
            invitation: dto.clone(),
        };
        if let Err(err) = self.deps.broadcaster.notify_user(invitee.id, event).await {
            tracing::warn!(invitee = %invitee.id, error = %err, "failed to push invitation notification");
        }

        Ok(dto)
    }

    /// 接受邀请。已是成员时不再写入重复的成员记录，但邀请照常转入
    /// accepted 终态。
    pub async fn accept(
        &self,
        user_id: Uuid,
        invitation_id: Uuid,
    ) -> ApplicationResult<InvitationDto> {
        let user_id = UserId::from(user_id);
        let mut invitation = self.find_own_invitation(user_id, invitation_id).await?;

        let now = self.deps.clock.now();
        invitation.accept(now)?;

        let already_member = self
            .deps
            .members
            .find(invitation.room_id, user_id)
            .await?
            .is_some();
        let new_member = (!already_member)
            .then(|| RoomMember::new(invitation.room_id, user_id, RoomRole::Member, now));

        let stored = self
            .deps
            .invitations
            .resolve(invitation, new_member)
            .await
            .map_err(|err| match err {
                // 并发接受/拒绝由存储层的 check-and-set 裁决
                RepositoryError::Conflict => ApplicationError::from(DomainError::AlreadyResolved),
                other => other.into(),
            })?;

        tracing::info!(invitation_id = %stored.id, room_id = %stored.room_id, user_id = %user_id, "invitation accepted");

        if let Some(user) = self.deps.users.find_by_id(user_id).await? {
            let event = ChatEvent::MemberJoined {
                room_id: stored.room_id,
                user: UserSummary::from(&user),
                timestamp: now,
            };
            if let Err(err) = self
                .deps
                .broadcaster
                .broadcast_to_room(stored.room_id, event)
                .await
            {
                tracing::warn!(room_id = %stored.room_id, error = %err, "failed to broadcast member_joined");
            }
        }

        self.enrich(&stored).await
    }

    /// 拒绝邀请。不产生任何成员变更。
    pub async fn reject(
        &self,
        user_id: Uuid,
        invitation_id: Uuid,
    ) -> ApplicationResult<InvitationDto> {
        let user_id = UserId::from(user_id);
        let mut invitation = self.find_own_invitation(user_id, invitation_id).await?;

        invitation.reject(self.deps.clock.now())?;

        let stored = self
            .deps
            .invitations
            .resolve(invitation, None)
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict => ApplicationError::from(DomainError::AlreadyResolved),
                other => other.into(),
            })?;

        tracing::info!(invitation_id = %stored.id, user_id = %user_id, "invitation rejected");
        self.enrich(&stored).await
    }

    /// 当前用户的全部待处理邀请，带房间与双方用户摘要
    pub async fn list_pending(&self, user_id: Uuid) -> ApplicationResult<Vec<InvitationDto>> {
        let user_id = UserId::from(user_id);
        let invitations = self.deps.invitations.list_pending_for_user(user_id).await?;

        let mut dtos = Vec::with_capacity(invitations.len());
        for invitation in &invitations {
            dtos.push(self.enrich(invitation).await?);
        }
        Ok(dtos)
    }

    async fn find_own_invitation(
        &self,
        user_id: UserId,
        invitation_id: Uuid,
    ) -> ApplicationResult<Invitation> {
        let invitation = self
            .deps
            .invitations
            .find_by_id(InvitationId::from(invitation_id))
            .await?
            .ok_or(DomainError::InvitationNotFound)?;

        if invitation.invitee_id != user_id {
            return Err(DomainError::InsufficientPermissions.into());
        }
        Ok(invitation)
    }

    async fn enrich(&self, invitation: &Invitation) -> ApplicationResult<InvitationDto> {
        let room = self.deps.rooms.find_by_id(invitation.room_id).await?;
        let users = self
            .deps
            .users
            .find_many(&[invitation.inviter_id, invitation.invitee_id])
            .await?;
        let inviter = users.iter().find(|user| user.id == invitation.inviter_id);
        let invitee = users.iter().find(|user| user.id == invitation.invitee_id);

        Ok(InvitationDto::new(invitation, room.as_ref(), inviter, invitee))
    }
}
