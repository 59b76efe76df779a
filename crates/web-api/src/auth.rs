//! 请求级认证
//!
//! 从 `Authorization` 头提取 bearer 凭证并解析为用户身份。封禁状态
//! 不在这里拦截：读路径对封禁用户开放，写路径的封禁门在服务层。

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};

use application::AuthenticatedUser;

use crate::error::ApiError;
use crate::state::AppState;

/// 已认证的请求方，供各个处理器以提取器形式获取
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthenticatedUser);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let credential = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("missing authorization header"))?;

        let user = state
            .identity
            .authenticate(credential)
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "identity backend failure");
                ApiError::internal_server_error("authentication backend unavailable")
            })?
            .ok_or_else(|| ApiError::unauthorized("invalid or expired token"))?;

        Ok(CurrentUser(user))
    }
}
