//! 主应用程序入口
//!
//! 装配仓储、服务、实时网关并启动 Axum 服务。

use std::sync::Arc;

use application::{
    InvitationService, InvitationServiceDependencies, MessageService, MessageServiceDependencies,
    PresenceRegistry, RoomService, RoomServiceDependencies, SystemClock,
};
use config::AppConfig;
use infrastructure::{
    create_pg_pool, ConnectionRouter, JwtIdentityProvider, JwtService, PgInvitationRepository,
    PgMessageRepository, PgRoomMemberRepository, PgRoomRepository, PgUserRepository,
    RealtimeBroadcaster,
};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app_config = AppConfig::from_env_with_defaults();
    app_config.validate()?;

    tracing::info!(
        "连接数据库: {}",
        app_config.database.url.split('@').next_back().unwrap_or("unknown")
    );

    let pg_pool = create_pg_pool(&app_config.database.url, app_config.database.max_connections)
        .await?;

    // 运行迁移
    sqlx::migrate!("../../migrations").run(&pg_pool).await?;

    // 仓储
    let user_repository = Arc::new(PgUserRepository::new(pg_pool.clone()));
    let room_repository = Arc::new(PgRoomRepository::new(pg_pool.clone()));
    let member_repository = Arc::new(PgRoomMemberRepository::new(pg_pool.clone()));
    let invitation_repository = Arc::new(PgInvitationRepository::new(pg_pool.clone()));
    let message_repository = Arc::new(PgMessageRepository::new(pg_pool));

    let clock = Arc::new(SystemClock);

    // 实时基础设施：在线状态注册表 + 连接路由 + 事件扇出
    let presence = PresenceRegistry::new();
    let connections = Arc::new(ConnectionRouter::new());
    let broadcaster = Arc::new(RealtimeBroadcaster::new(
        connections.clone(),
        presence.clone(),
    ));

    // 应用层服务
    let room_service = Arc::new(RoomService::new(RoomServiceDependencies {
        rooms: room_repository.clone(),
        members: member_repository.clone(),
        users: user_repository.clone(),
        messages: message_repository.clone(),
        clock: clock.clone(),
    }));

    let invitation_service = Arc::new(InvitationService::new(InvitationServiceDependencies {
        room_service: room_service.clone(),
        rooms: room_repository,
        invitations: invitation_repository,
        members: member_repository,
        users: user_repository.clone(),
        clock: clock.clone(),
        broadcaster: broadcaster.clone(),
    }));

    let message_service = Arc::new(MessageService::new(MessageServiceDependencies {
        room_service: room_service.clone(),
        messages: message_repository,
        users: user_repository.clone(),
        clock,
        broadcaster: broadcaster.clone(),
    }));

    // 连接层身份解析
    let jwt_service = Arc::new(JwtService::new(infrastructure::JwtConfig {
        secret: app_config.jwt.secret.clone(),
        expiration_hours: app_config.jwt.expiration_hours,
    }));
    let identity = Arc::new(JwtIdentityProvider::new(jwt_service, user_repository));

    let state = AppState {
        room_service,
        invitation_service,
        message_service,
        identity,
        presence,
        connections,
        broadcaster,
        ws_ping_interval_secs: app_config.server.ws_ping_interval_secs,
    };

    let app = router(state);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("聊天服务启动在 http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
