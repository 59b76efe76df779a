use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

/// 统一的时间戳类型。
pub type Timestamp = DateTime<Utc>;

/// 用户唯一标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UserId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<UserId> for Uuid {
    fn from(value: UserId) -> Self {
        value.0
    }
}

/// 房间唯一标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(pub Uuid);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RoomId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<RoomId> for Uuid {
    fn from(value: RoomId) -> Self {
        value.0
    }
}

/// 消息唯一标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for MessageId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<MessageId> for Uuid {
    fn from(value: MessageId) -> Self {
        value.0
    }
}

/// 邀请唯一标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvitationId(pub Uuid);

impl fmt::Display for InvitationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for InvitationId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<InvitationId> for Uuid {
    fn from(value: InvitationId) -> Self {
        value.0
    }
}

/// 实时连接唯一标识，仅在连接存活期间有效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 经过验证的用户名。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Username(String);

impl Username {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_owned();
        if value.is_empty() {
            return Err(DomainError::invalid_input("username", "cannot be empty"));
        }
        if value.len() > 50 {
            return Err(DomainError::invalid_input("username", "too long"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 消息图片允许的扩展名。
const ALLOWED_IMAGE_EXTENSIONS: [&str; 5] = [".png", ".jpg", ".jpeg", ".gif", ".webp"];

/// 经过验证的消息图片地址。
///
/// 对象存储本身由外部服务负责，这里只校验引用格式：http/https 协议、
/// 有主机名、扩展名在允许列表内。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl(String);

impl ImageUrl {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_owned();
        if value.is_empty() {
            return Err(DomainError::invalid_input("image_url", "cannot be empty"));
        }

        let rest = value
            .strip_prefix("https://")
            .or_else(|| value.strip_prefix("http://"))
            .ok_or_else(|| {
                DomainError::invalid_input("image_url", "must be an http(s) URL")
            })?;

        let host = rest.split('/').next().unwrap_or("");
        if host.is_empty() {
            return Err(DomainError::invalid_input("image_url", "missing host"));
        }

        let lowered = value.to_lowercase();
        if !ALLOWED_IMAGE_EXTENSIONS
            .iter()
            .any(|ext| lowered.ends_with(ext))
        {
            return Err(DomainError::invalid_input(
                "image_url",
                "must end with .png, .jpg, .jpeg, .gif or .webp",
            ));
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 消息正文长度上限（按字符计）。
pub const MAX_MESSAGE_CONTENT_CHARS: usize = 1000;

/// 消息正文：文本、图片，或两者皆有。
///
/// 不变量：文本和图片不能同时为空。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    content: Option<String>,
    image_url: Option<ImageUrl>,
}

impl MessageBody {
    pub fn new(
        content: Option<String>,
        image_url: Option<ImageUrl>,
    ) -> Result<Self, DomainError> {
        // 空白文本视同缺失
        let content = content
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty());

        if content.is_none() && image_url.is_none() {
            return Err(DomainError::invalid_input(
                "content",
                "content or image_url is required",
            ));
        }

        if let Some(ref text) = content {
            if text.chars().count() > MAX_MESSAGE_CONTENT_CHARS {
                return Err(DomainError::invalid_input(
                    "content",
                    format!("too long (max {} characters)", MAX_MESSAGE_CONTENT_CHARS),
                ));
            }
        }

        Ok(Self { content, image_url })
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn image_url(&self) -> Option<&ImageUrl> {
        self.image_url.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_validation() {
        assert!(Username::parse("alice").is_ok());
        assert_eq!(Username::parse("  alice  ").unwrap().as_str(), "alice");

        assert!(Username::parse("").is_err());
        assert!(Username::parse("   ").is_err());
        assert!(Username::parse("a".repeat(51)).is_err());
    }

    #[test]
    fn test_image_url_validation() {
        // 有效地址
        assert!(ImageUrl::parse("https://cdn.example.com/cat.png").is_ok());
        assert!(ImageUrl::parse("http://cdn.example.com/a/b/photo.JPEG").is_ok());
        assert!(ImageUrl::parse("https://cdn.example.com/x.webp").is_ok());

        // 无效地址
        assert!(ImageUrl::parse("ftp://cdn.example.com/cat.png").is_err());
        assert!(ImageUrl::parse("https:///cat.png").is_err());
        assert!(ImageUrl::parse("https://cdn.example.com/cat.pdf").is_err());
        assert!(ImageUrl::parse("cat.png").is_err());
    }

    #[test]
    fn test_message_body_requires_content_or_image() {
        assert!(MessageBody::new(None, None).is_err());
        assert!(MessageBody::new(Some("   ".to_string()), None).is_err());

        // 仅图片也是合法消息
        let image = ImageUrl::parse("https://cdn.example.com/cat.png").unwrap();
        let body = MessageBody::new(None, Some(image)).unwrap();
        assert!(body.content().is_none());
        assert!(body.image_url().is_some());
    }

    #[test]
    fn test_message_body_length_limit() {
        // 恰好 1000 字符：接受
        let exact = "x".repeat(MAX_MESSAGE_CONTENT_CHARS);
        assert!(MessageBody::new(Some(exact), None).is_ok());

        // 1001 字符：拒绝
        let over = "x".repeat(MAX_MESSAGE_CONTENT_CHARS + 1);
        assert!(MessageBody::new(Some(over), None).is_err());

        // 多字节字符按字符数计
        let wide = "好".repeat(MAX_MESSAGE_CONTENT_CHARS);
        assert!(MessageBody::new(Some(wide), None).is_ok());
    }

    #[test]
    fn test_message_body_trims_content() {
        let body = MessageBody::new(Some("  hello  ".to_string()), None).unwrap();
        assert_eq!(body.content(), Some("hello"));
    }
}
