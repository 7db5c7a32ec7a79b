//! 开店流程集成测试

use std::sync::Arc;

use shopd_core::models::{queues, tasks, TenantStatus, UserRole};
use shopd_core::services::{CreateTenantRequest, TaskDispatcher, TenantService};
use shopd_core::traits::MessageQueue;
use shopd_core::ShopError;
use shopd_infrastructure::InMemoryMessageQueue;
use shopd_testing_utils::{InMemoryStore, MockTenantRepository, MockUserRepository};

fn build_service() -> (Arc<InMemoryStore>, Arc<InMemoryMessageQueue>, TenantService) {
    let store = InMemoryStore::new();
    let queue = Arc::new(InMemoryMessageQueue::new());
    let service = TenantService::new(
        Arc::new(MockTenantRepository::new(Arc::clone(&store))),
        Arc::new(MockUserRepository::new(Arc::clone(&store))),
        TaskDispatcher::new(queue.clone() as Arc<dyn MessageQueue>),
    );
    (store, queue, service)
}

fn request(slug: &str, email: &str) -> CreateTenantRequest {
    CreateTenantRequest {
        name: "我的店铺".to_string(),
        slug: slug.to_string(),
        description: None,
        owner_email: email.to_string(),
        owner_full_name: "张三".to_string(),
    }
}

#[tokio::test]
async fn test_create_tenant_creates_owner_and_sends_welcome() {
    let (_store, queue, service) = build_service();

    let (tenant, owner) = service
        .create_tenant(request("my-shop", "owner@example.com"))
        .await
        .unwrap();

    assert_eq!(tenant.status, TenantStatus::Trial);
    assert_eq!(tenant.owner_id, Some(owner.id));
    assert_eq!(owner.role, UserRole::TenantOwner);
    assert_eq!(owner.tenant_id, Some(tenant.id));

    let messages = queue.consume_messages(queues::EMAIL).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].task_name, tasks::SEND_WELCOME_EMAIL);
    assert_eq!(messages[0].payload["email"], "owner@example.com");
}

#[tokio::test]
async fn test_duplicate_slug_rejected() {
    let (_store, _queue, service) = build_service();
    service
        .create_tenant(request("my-shop", "first@example.com"))
        .await
        .unwrap();

    let err = service
        .create_tenant(request("my-shop", "second@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::Conflict(_)));
}

#[tokio::test]
async fn test_duplicate_owner_email_rejected() {
    let (_store, _queue, service) = build_service();
    service
        .create_tenant(request("shop-a", "owner@example.com"))
        .await
        .unwrap();

    let err = service
        .create_tenant(request("shop-b", "owner@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::Conflict(_)));
}
