//! 消息服务单元测试
//!
//! 覆盖两条入口共用的校验规则、软删除语义、回复计数和广播顺序。

#[cfg(test)]
mod message_service_tests {
    use crate::error::ApplicationError;
    use crate::events::ChatEvent;
    use crate::services::test_support::*;
    use crate::services::*;
    use domain::{DomainError, RoomId, UserId, MAX_MESSAGE_CONTENT_CHARS};
    use uuid::Uuid;

    fn assert_domain_err(
        result: Result<impl std::fmt::Debug, ApplicationError>,
        expected: DomainError,
    ) {
        match result {
            Err(ApplicationError::Domain(err)) => assert_eq!(err, expected),
            other => panic!("expected {:?}, got {:?}", expected, other),
        }
    }

    fn text_message(user_id: Uuid, room_id: Uuid, content: &str) -> PostMessageRequest {
        PostMessageRequest {
            user_id,
            room_id: Some(room_id),
            content: Some(content.to_string()),
            image_url: None,
            parent_id: None,
        }
    }

    #[tokio::test]
    async fn test_post_message_persists_then_broadcasts() {
        let ctx = TestContext::new();
        let alice = ctx.add_user("alice");
        let room_id = create_room(&ctx, alice, "Club", true).await;

        let dto = ctx
            .messages
            .post_message(text_message(alice, room_id, "hello"))
            .await
            .unwrap();

        assert_eq!(dto.content, Some("hello".to_string()));
        assert_eq!(dto.user.as_ref().unwrap().username, "alice");
        assert!(ctx
            .store
            .messages
            .lock()
            .unwrap()
            .contains_key(&dto.id));

        let events = ctx.broadcaster.room_events(RoomId(room_id));
        assert_eq!(events.len(), 1);
        match &events[0] {
            ChatEvent::NewMessage { message } => assert_eq!(message.id, dto.id),
            other => panic!("expected new_message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_content_length_boundary() {
        let ctx = TestContext::new();
        let alice = ctx.add_user("alice");
        let room_id = create_room(&ctx, alice, "Club", true).await;

        // 恰好 1000 字符：接受
        let exact = "x".repeat(MAX_MESSAGE_CONTENT_CHARS);
        assert!(ctx
            .messages
            .post_message(text_message(alice, room_id, &exact))
            .await
            .is_ok());

        // 1001 字符：拒绝
        let over = "x".repeat(MAX_MESSAGE_CONTENT_CHARS + 1);
        let result = ctx
            .messages
            .post_message(text_message(alice, room_id, &over))
            .await;
        assert!(matches!(
            result,
            Err(ApplicationError::Domain(DomainError::InvalidInput { .. }))
        ));
    }

    #[tokio::test]
    async fn test_content_or_image_required() {
        let ctx = TestContext::new();
        let alice = ctx.add_user("alice");
        let room_id = create_room(&ctx, alice, "Club", true).await;

        // 两者皆空：拒绝
        let result = ctx
            .messages
            .post_message(PostMessageRequest {
                user_id: alice,
                room_id: Some(room_id),
                content: None,
                image_url: None,
                parent_id: None,
            })
            .await;
        assert!(matches!(
            result,
            Err(ApplicationError::Domain(DomainError::InvalidInput { .. }))
        ));

        // 仅图片：接受
        let dto = ctx
            .messages
            .post_message(PostMessageRequest {
                user_id: alice,
                room_id: Some(room_id),
                content: None,
                image_url: Some("https://cdn.example.com/cat.png".to_string()),
                parent_id: None,
            })
            .await
            .unwrap();
        assert!(dto.content.is_none());
        assert_eq!(
            dto.image_url,
            Some("https://cdn.example.com/cat.png".to_string())
        );

        // 非法图片地址：拒绝
        let result = ctx
            .messages
            .post_message(PostMessageRequest {
                user_id: alice,
                room_id: Some(room_id),
                content: None,
                image_url: Some("https://cdn.example.com/cat.exe".to_string()),
                parent_id: None,
            })
            .await;
        assert!(matches!(
            result,
            Err(ApplicationError::Domain(DomainError::InvalidInput { .. }))
        ));
    }

    #[tokio::test]
    async fn test_post_requires_access_and_active_account() {
        let ctx = TestContext::new();
        let alice = ctx.add_user("alice");
        let bob = ctx.add_user("bob");
        let banned = ctx.add_banned_user("troll");
        let room_id = create_room(&ctx, alice, "Secret", false).await;

        let result = ctx
            .messages
            .post_message(text_message(bob, room_id, "let me in"))
            .await;
        assert_domain_err(result, DomainError::NotMember);

        let result = ctx
            .messages
            .post_message(text_message(banned, room_id, "spam"))
            .await;
        assert_domain_err(result, DomainError::AccountBanned);
    }

    #[tokio::test]
    async fn test_post_defaults_to_global_room() {
        let ctx = TestContext::new();
        let alice = ctx.add_user("alice");

        let dto = ctx
            .messages
            .post_message(PostMessageRequest {
                user_id: alice,
                room_id: None,
                content: Some("hello world".to_string()),
                image_url: None,
                parent_id: None,
            })
            .await
            .unwrap();

        assert_eq!(dto.room_id, ctx.global_room_id);
    }

    #[tokio::test]
    async fn test_reply_updates_parent_count() {
        let ctx = TestContext::new();
        let alice = ctx.add_user("alice");
        let room_id = create_room(&ctx, alice, "Club", true).await;

        let parent = ctx
            .messages
            .post_message(text_message(alice, room_id, "thread root"))
            .await
            .unwrap();

        ctx.messages
            .post_message(PostMessageRequest {
                user_id: alice,
                room_id: Some(room_id),
                content: Some("first reply".to_string()),
                image_url: None,
                parent_id: Some(parent.id.0),
            })
            .await
            .unwrap();

        let names = ctx.broadcaster.room_event_names(RoomId(room_id));
        assert_eq!(names, vec!["new_message", "new_message", "reply_added"]);

        let events = ctx.broadcaster.room_events(RoomId(room_id));
        match events.last().unwrap() {
            ChatEvent::ReplyAdded {
                parent_id,
                replies_count,
                ..
            } => {
                assert_eq!(*parent_id, parent.id);
                assert_eq!(*replies_count, 1);
            }
            other => panic!("expected reply_added, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_replies_cannot_nest() {
        let ctx = TestContext::new();
        let alice = ctx.add_user("alice");
        let room_id = create_room(&ctx, alice, "Club", true).await;

        let parent = ctx
            .messages
            .post_message(text_message(alice, room_id, "root"))
            .await
            .unwrap();
        let reply = ctx
            .messages
            .post_message(PostMessageRequest {
                user_id: alice,
                room_id: Some(room_id),
                content: Some("reply".to_string()),
                image_url: None,
                parent_id: Some(parent.id.0),
            })
            .await
            .unwrap();

        // 回复的回复被显式拒绝
        let result = ctx
            .messages
            .post_message(PostMessageRequest {
                user_id: alice,
                room_id: Some(room_id),
                content: Some("nested".to_string()),
                image_url: None,
                parent_id: Some(reply.id.0),
            })
            .await;
        assert!(matches!(
            result,
            Err(ApplicationError::Domain(DomainError::InvalidInput { .. }))
        ));
    }

    #[tokio::test]
    async fn test_parent_must_be_live_and_in_same_room() {
        let ctx = TestContext::new();
        let alice = ctx.add_user("alice");
        let room_a = create_room(&ctx, alice, "A", true).await;
        let room_b = create_room(&ctx, alice, "B", true).await;

        let parent = ctx
            .messages
            .post_message(text_message(alice, room_a, "root"))
            .await
            .unwrap();

        // 跨房间回复
        let result = ctx
            .messages
            .post_message(PostMessageRequest {
                user_id: alice,
                room_id: Some(room_b),
                content: Some("wrong room".to_string()),
                image_url: None,
                parent_id: Some(parent.id.0),
            })
            .await;
        assert_domain_err(result, DomainError::MessageNotFound);

        // 已删除的父消息
        ctx.messages
            .delete_message(alice, parent.id.0)
            .await
            .unwrap();
        let result = ctx
            .messages
            .post_message(PostMessageRequest {
                user_id: alice,
                room_id: Some(room_a),
                content: Some("late reply".to_string()),
                image_url: None,
                parent_id: Some(parent.id.0),
            })
            .await;
        assert_domain_err(result, DomainError::MessageNotFound);
    }

    #[tokio::test]
    async fn test_edit_message() {
        let ctx = TestContext::new();
        let alice = ctx.add_user("alice");
        let bob = ctx.add_user("bob");
        let room_id = create_room(&ctx, alice, "Club", true).await;

        let posted = ctx
            .messages
            .post_message(text_message(alice, room_id, "draft"))
            .await
            .unwrap();

        // 作者编辑
        let edited = ctx
            .messages
            .edit_message(EditMessageRequest {
                user_id: alice,
                message_id: posted.id.0,
                content: Some("final".to_string()),
                image_url: None,
            })
            .await
            .unwrap();
        assert_eq!(edited.content, Some("final".to_string()));
        assert!(edited.updated_at > posted.created_at);

        let names = ctx.broadcaster.room_event_names(RoomId(room_id));
        assert!(names.contains(&"message_updated"));

        // 非作者不能编辑
        ctx.rooms
            .check_access(UserId(bob), RoomId(room_id), false)
            .await
            .unwrap();
        let result = ctx
            .messages
            .edit_message(EditMessageRequest {
                user_id: bob,
                message_id: posted.id.0,
                content: Some("hijack".to_string()),
                image_url: None,
            })
            .await;
        assert_domain_err(result, DomainError::InsufficientPermissions);

        // 删除后不能编辑
        ctx.messages
            .delete_message(alice, posted.id.0)
            .await
            .unwrap();
        let result = ctx
            .messages
            .edit_message(EditMessageRequest {
                user_id: alice,
                message_id: posted.id.0,
                content: Some("too late".to_string()),
                image_url: None,
            })
            .await;
        assert_domain_err(result, DomainError::AlreadyDeleted);
    }

    #[tokio::test]
    async fn test_delete_is_soft_and_single_shot() {
        let ctx = TestContext::new();
        let alice = ctx.add_user("alice");
        let room_id = create_room(&ctx, alice, "Club", true).await;

        let posted = ctx
            .messages
            .post_message(text_message(alice, room_id, "oops"))
            .await
            .unwrap();

        ctx.messages
            .delete_message(alice, posted.id.0)
            .await
            .unwrap();

        // 记录仍在，只是打了删除标记
        let stored = ctx
            .store
            .messages
            .lock()
            .unwrap()
            .get(&posted.id)
            .cloned()
            .unwrap();
        assert!(stored.is_deleted);

        // 重复删除失败
        let result = ctx.messages.delete_message(alice, posted.id.0).await;
        assert_domain_err(result, DomainError::AlreadyDeleted);

        // 广播带自删标记
        let events = ctx.broadcaster.room_events(RoomId(room_id));
        match events.last().unwrap() {
            ChatEvent::MessageDeleted {
                deleted_by_admin, ..
            } => assert!(!deleted_by_admin),
            other => panic!("expected message_deleted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_admin_delete() {
        let ctx = TestContext::new();
        let alice = ctx.add_user("alice");
        let bob = ctx.add_user("bob");
        let admin = ctx.add_admin("moderator");
        let room_id = create_room(&ctx, alice, "Club", true).await;

        let posted = ctx
            .messages
            .post_message(text_message(alice, room_id, "reported"))
            .await
            .unwrap();

        // 普通用户不能用管理员通道
        let result = ctx.messages.admin_delete_message(bob, posted.id.0).await;
        assert_domain_err(result, DomainError::InsufficientPermissions);

        // 站点管理员可以删除任何人的消息
        ctx.messages
            .admin_delete_message(admin, posted.id.0)
            .await
            .unwrap();

        let events = ctx.broadcaster.room_events(RoomId(room_id));
        match events.last().unwrap() {
            ChatEvent::MessageDeleted {
                deleted_by_admin, ..
            } => assert!(deleted_by_admin),
            other => panic!("expected message_deleted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_deleted_messages_excluded_from_listing_and_counts() {
        let ctx = TestContext::new();
        let alice = ctx.add_user("alice");
        let room_id = create_room(&ctx, alice, "Club", true).await;

        let root = ctx
            .messages
            .post_message(text_message(alice, room_id, "root"))
            .await
            .unwrap();
        let reply = ctx
            .messages
            .post_message(PostMessageRequest {
                user_id: alice,
                room_id: Some(room_id),
                content: Some("reply".to_string()),
                image_url: None,
                parent_id: Some(root.id.0),
            })
            .await
            .unwrap();

        // 删除回复：父消息回复计数归零，线程结构不受破坏
        ctx.messages.delete_message(alice, reply.id.0).await.unwrap();

        let page = ctx
            .messages
            .list_messages(ListMessagesRequest {
                viewer_id: alice,
                room_id,
                parent_id: None,
                page: 1,
                per_page: 50,
            })
            .await
            .unwrap();
        assert_eq!(page.messages.len(), 1);
        assert_eq!(page.messages[0].id, root.id);
        assert_eq!(page.messages[0].replies_count, 0);

        // 删除顶层消息后列表为空
        ctx.messages.delete_message(alice, root.id.0).await.unwrap();
        let page = ctx
            .messages
            .list_messages(ListMessagesRequest {
                viewer_id: alice,
                room_id,
                parent_id: None,
                page: 1,
                per_page: 50,
            })
            .await
            .unwrap();
        assert!(page.messages.is_empty());
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_top_level_listing_is_chronological() {
        let ctx = TestContext::new();
        let alice = ctx.add_user("alice");
        let room_id = create_room(&ctx, alice, "Club", true).await;

        for text in ["first", "second", "third"] {
            ctx.messages
                .post_message(text_message(alice, room_id, text))
                .await
                .unwrap();
        }

        let page = ctx
            .messages
            .list_messages(ListMessagesRequest {
                viewer_id: alice,
                room_id,
                parent_id: None,
                page: 1,
                per_page: 50,
            })
            .await
            .unwrap();

        let contents: Vec<_> = page
            .messages
            .iter()
            .map(|message| message.content.clone().unwrap())
            .collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn test_listing_pagination() {
        let ctx = TestContext::new();
        let alice = ctx.add_user("alice");
        let room_id = create_room(&ctx, alice, "Club", true).await;

        for index in 0..5 {
            ctx.messages
                .post_message(text_message(alice, room_id, &format!("msg-{}", index)))
                .await
                .unwrap();
        }

        // 每页 2 条，第 1 页是最新的两条（按时间正序展示）
        let page = ctx
            .messages
            .list_messages(ListMessagesRequest {
                viewer_id: alice,
                room_id,
                parent_id: None,
                page: 1,
                per_page: 2,
            })
            .await
            .unwrap();
        let contents: Vec<_> = page
            .messages
            .iter()
            .map(|message| message.content.clone().unwrap())
            .collect();
        assert_eq!(contents, vec!["msg-3", "msg-4"]);
        assert_eq!(page.total, 5);

        let page = ctx
            .messages
            .list_messages(ListMessagesRequest {
                viewer_id: alice,
                room_id,
                parent_id: None,
                page: 3,
                per_page: 2,
            })
            .await
            .unwrap();
        let contents: Vec<_> = page
            .messages
            .iter()
            .map(|message| message.content.clone().unwrap())
            .collect();
        assert_eq!(contents, vec!["msg-0"]);
    }

    #[tokio::test]
    async fn test_list_replies_chronological() {
        let ctx = TestContext::new();
        let alice = ctx.add_user("alice");
        let room_id = create_room(&ctx, alice, "Club", true).await;

        let root = ctx
            .messages
            .post_message(text_message(alice, room_id, "root"))
            .await
            .unwrap();
        for text in ["r1", "r2"] {
            ctx.messages
                .post_message(PostMessageRequest {
                    user_id: alice,
                    room_id: Some(room_id),
                    content: Some(text.to_string()),
                    image_url: None,
                    parent_id: Some(root.id.0),
                })
                .await
                .unwrap();
        }

        let thread = ctx
            .messages
            .list_replies(alice, root.id.0, 1, 20)
            .await
            .unwrap();
        assert_eq!(thread.parent.id, root.id);
        assert_eq!(thread.total, 2);
        let contents: Vec<_> = thread
            .replies
            .iter()
            .map(|message| message.content.clone().unwrap())
            .collect();
        assert_eq!(contents, vec!["r1", "r2"]);
    }
}
