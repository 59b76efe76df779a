use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use application::{
    AddMemberOutcome, AddMemberRequest, CreateRoomRequest, EditMessageRequest, InvitationDto,
    InviteRequest, ListMessagesRequest, MessageDto, MessagePage, PostMessageRequest,
    RemoveMemberRequest, RepliesPage, RoomDetailsDto, RoomDto, UpdateMemberRoleRequest,
};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::websocket;

#[derive(Debug, Deserialize)]
struct CreateRoomPayload {
    name: String,
    description: Option<String>,
    #[serde(default)]
    is_public: bool,
}

fn default_member_role() -> String {
    "member".to_string()
}

#[derive(Debug, Deserialize)]
struct AddMemberPayload {
    username: String,
    #[serde(default = "default_member_role")]
    role: String,
}

#[derive(Debug, Deserialize)]
struct UpdateRolePayload {
    role: String,
}

#[derive(Debug, Deserialize)]
struct SendMessagePayload {
    room_id: Option<Uuid>,
    content: Option<String>,
    image_url: Option<String>,
    parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct EditMessagePayload {
    content: Option<String>,
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesQuery {
    parent_id: Option<Uuid>,
    #[serde(default)]
    page: u32,
    #[serde(default)]
    per_page: u32,
}

#[derive(Debug, Deserialize)]
struct RepliesQuery {
    #[serde(default)]
    page: u32,
    #[serde(default)]
    per_page: u32,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", post(create_room).get(list_rooms))
        .route("/rooms/public", get(list_public_rooms))
        .route("/rooms/{room_id}", get(get_room).delete(delete_room))
        .route("/rooms/{room_id}/join", post(join_room))
        .route("/rooms/{room_id}/leave", post(leave_room))
        .route("/rooms/{room_id}/members", post(add_member))
        .route(
            "/rooms/{room_id}/members/{member_id}/role",
            put(update_member_role),
        )
        .route("/rooms/{room_id}/members/{member_id}", delete(remove_member))
        .route("/rooms/{room_id}/messages", get(list_messages))
        .route("/messages", post(send_message))
        .route(
            "/messages/{message_id}",
            put(edit_message).delete(delete_message),
        )
        .route("/messages/{message_id}/replies", get(list_replies))
        .route("/admin/messages/{message_id}", delete(admin_delete_message))
        .route("/invitations", get(list_invitations))
        .route("/invitations/{invitation_id}/accept", post(accept_invitation))
        .route("/invitations/{invitation_id}/reject", post(reject_invitation))
        .route("/ws", get(websocket::websocket_upgrade))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn create_room(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateRoomPayload>,
) -> Result<(StatusCode, Json<RoomDetailsDto>), ApiError> {
    let dto = state
        .room_service
        .create_room(CreateRoomRequest {
            creator_id: user.id.0,
            name: payload.name,
            description: payload.description,
            is_public: payload.is_public,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(dto)))
}

async fn list_rooms(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<RoomDto>>, ApiError> {
    let rooms = state.room_service.list_rooms(user.id.0).await?;
    Ok(Json(rooms))
}

async fn list_public_rooms(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<RoomDto>>, ApiError> {
    let rooms = state.room_service.list_public_rooms(user.id.0).await?;
    Ok(Json(rooms))
}

async fn get_room(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(room_id): Path<Uuid>,
) -> Result<Json<RoomDetailsDto>, ApiError> {
    let dto = state.room_service.get_room(room_id, user.id.0).await?;
    Ok(Json(dto))
}

async fn delete_room(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(room_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.room_service.delete_room(user.id.0, room_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn join_room(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(room_id): Path<Uuid>,
) -> Result<Json<RoomDto>, ApiError> {
    let dto = state
        .room_service
        .join_public_room(user.id.0, room_id)
        .await?;
    Ok(Json(dto))
}

async fn leave_room(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(room_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.room_service.leave_room(user.id.0, room_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 公开/全局房间直接添加成员；私密房间转入邀请流程
async fn add_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(room_id): Path<Uuid>,
    Json(payload): Json<AddMemberPayload>,
) -> Result<Response, ApiError> {
    let outcome = state
        .room_service
        .add_member(AddMemberRequest {
            actor_id: user.id.0,
            room_id,
            username: payload.username.clone(),
            role: payload.role,
        })
        .await?;

    match outcome {
        AddMemberOutcome::Added(member) => {
            Ok((StatusCode::CREATED, Json(member)).into_response())
        }
        AddMemberOutcome::InvitationRequired => {
            let invitation = state
                .invitation_service
                .invite(InviteRequest {
                    actor_id: user.id.0,
                    room_id,
                    invitee_username: payload.username,
                })
                .await?;
            Ok((StatusCode::CREATED, Json(invitation)).into_response())
        }
    }
}

async fn update_member_role(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((room_id, member_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateRolePayload>,
) -> Result<Json<application::MemberDto>, ApiError> {
    let member = state
        .room_service
        .update_member_role(UpdateMemberRoleRequest {
            actor_id: user.id.0,
            room_id,
            member_id,
            role: payload.role,
        })
        .await?;
    Ok(Json(member))
}

async fn remove_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((room_id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    state
        .room_service
        .remove_member(RemoveMemberRequest {
            actor_id: user.id.0,
            room_id,
            member_id,
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_messages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(room_id): Path<Uuid>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<MessagePage>, ApiError> {
    let page = state
        .message_service
        .list_messages(ListMessagesRequest {
            viewer_id: user.id.0,
            room_id,
            parent_id: query.parent_id,
            page: query.page,
            per_page: query.per_page,
        })
        .await?;
    Ok(Json(page))
}

async fn send_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<SendMessagePayload>,
) -> Result<(StatusCode, Json<MessageDto>), ApiError> {
    let dto = state
        .message_service
        .post_message(PostMessageRequest {
            user_id: user.id.0,
            room_id: payload.room_id,
            content: payload.content,
            image_url: payload.image_url,
            parent_id: payload.parent_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(dto)))
}

async fn edit_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(message_id): Path<Uuid>,
    Json(payload): Json<EditMessagePayload>,
) -> Result<Json<MessageDto>, ApiError> {
    let dto = state
        .message_service
        .edit_message(EditMessageRequest {
            user_id: user.id.0,
            message_id,
            content: payload.content,
            image_url: payload.image_url,
        })
        .await?;
    Ok(Json(dto))
}

async fn delete_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(message_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .message_service
        .delete_message(user.id.0, message_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_replies(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(message_id): Path<Uuid>,
    Query(query): Query<RepliesQuery>,
) -> Result<Json<RepliesPage>, ApiError> {
    let thread = state
        .message_service
        .list_replies(user.id.0, message_id, query.page, query.per_page)
        .await?;
    Ok(Json(thread))
}

async fn admin_delete_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(message_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .message_service
        .admin_delete_message(user.id.0, message_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_invitations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<InvitationDto>>, ApiError> {
    let invitations = state.invitation_service.list_pending(user.id.0).await?;
    Ok(Json(invitations))
}

async fn accept_invitation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(invitation_id): Path<Uuid>,
) -> Result<Json<InvitationDto>, ApiError> {
    let dto = state
        .invitation_service
        .accept(user.id.0, invitation_id)
        .await?;
    Ok(Json(dto))
}

async fn reject_invitation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(invitation_id): Path<Uuid>,
) -> Result<Json<InvitationDto>, ApiError> {
    let dto = state
        .invitation_service
        .reject(user.id.0, invitation_id)
        .await?;
    Ok(Json(dto))
}
