//! JWT 身份解析
//!
//! 把携带在连接握手或请求头里的 bearer 凭证解析为用户记录。令牌的
//! 签发（登录）属于身份服务，这里只负责校验与查找。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use application::{AuthenticatedUser, IdentityError, IdentityProvider, UserRepository};
use domain::UserId;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// 用户ID
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("invalid token")]
    InvalidToken,
    #[error("token creation failed: {0}")]
    Creation(String),
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_hours: i64,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            expiration_hours: config.expiration_hours,
        }
    }

    pub fn issue_token(&self, user_id: UserId) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.expiration_hours)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| JwtError::Creation(err.to_string()))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| JwtError::InvalidToken)
    }
}

/// 基于 JWT + 用户仓储的身份服务实现。
///
/// 凭证无效、用户不存在都归为"未认证"（返回 None），只有存储故障
/// 才是错误。封禁判断留给调用方，网关和路由层需要区分这两种拒绝。
pub struct JwtIdentityProvider {
    jwt: Arc<JwtService>,
    users: Arc<dyn UserRepository>,
}

impl JwtIdentityProvider {
    pub fn new(jwt: Arc<JwtService>, users: Arc<dyn UserRepository>) -> Self {
        Self { jwt, users }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn authenticate(
        &self,
        credential: &str,
    ) -> Result<Option<AuthenticatedUser>, IdentityError> {
        let token = credential.strip_prefix("Bearer ").unwrap_or(credential);

        let Ok(claims) = self.jwt.validate_token(token) else {
            return Ok(None);
        };
        let Ok(user_id) = Uuid::parse_str(&claims.sub) else {
            return Ok(None);
        };

        let user = self
            .users
            .find_by_id(UserId(user_id))
            .await
            .map_err(|err| IdentityError::backend(err.to_string()))?;

        Ok(user.map(|user| AuthenticatedUser {
            id: user.id,
            username: user.username,
            role: user.role,
            is_banned: user.is_banned,
        }))
    }
}
