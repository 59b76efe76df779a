use std::sync::Arc;

use application::{
    EventBroadcaster, IdentityProvider, InvitationService, MessageService, PresenceRegistry,
    RoomService,
};
use infrastructure::ConnectionRouter;

#[derive(Clone)]
pub struct AppState {
    pub room_service: Arc<RoomService>,
    pub invitation_service: Arc<InvitationService>,
    pub message_service: Arc<MessageService>,
    pub identity: Arc<dyn IdentityProvider>,
    pub presence: PresenceRegistry,
    pub connections: Arc<ConnectionRouter>,
    pub broadcaster: Arc<dyn EventBroadcaster>,
    /// 服务端保活 ping 的发送间隔（秒）
    pub ws_ping_interval_secs: u64,
}
