mod invitation_service;
mod message_service;
mod room_service;

pub use invitation_service::{InvitationService, InvitationServiceDependencies, InviteRequest};
pub use message_service::{
    EditMessageRequest, ListMessagesRequest, MessageService, MessageServiceDependencies,
    PostMessageRequest,
};
pub use room_service::{
    AddMemberOutcome, AddMemberRequest, CreateRoomRequest, RemoveMemberRequest, RoomAccess,
    RoomService, RoomServiceDependencies, UpdateMemberRoleRequest,
};

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod message_service_tests;
