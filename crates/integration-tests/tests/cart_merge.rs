//! Integration tests for merge-on-login.
//!
//! Each test drives the merge directly (no session watcher) so the
//! sequencing is deterministic; watcher-driven behavior is covered in
//! `session_watcher.rs`.

use kuppam_cart::CartEvent;
use kuppam_integration_tests::{TestContext, wait_for_event};

#[tokio::test]
async fn test_merge_into_empty_remote_cart() {
    let ctx = TestContext::new().await;
    ctx.cart
        .add(TestContext::snapshot("p1"), 2)
        .await
        .expect("anonymous add failed");

    ctx.login().await;
    let merged = ctx.cart.merge_on_login().await.expect("merge failed");

    assert_eq!(merged, 1);
    assert_eq!(ctx.api.quantity_of("p1"), Some(2));
    assert!(ctx.local().is_empty());

    // The engine now serves the server cart
    let lines = ctx.cart.lines().await.expect("read failed");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines.first().expect("no line").quantity, 2);
}

#[tokio::test]
async fn test_merge_accumulates_existing_remote_quantity() {
    let ctx = TestContext::new().await;
    ctx.api.seed_item("p1", 3);
    ctx.cart
        .add(TestContext::snapshot("p1"), 2)
        .await
        .expect("anonymous add failed");

    ctx.login().await;
    ctx.cart.merge_on_login().await.expect("merge failed");

    assert_eq!(ctx.api.quantity_of("p1"), Some(5));
    assert!(ctx.local().is_empty());
}

#[tokio::test]
async fn test_merge_with_empty_local_cart_is_noop() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    let merged = ctx.cart.merge_on_login().await.expect("merge failed");

    assert_eq!(merged, 0);
    // Not even the fresh read happens
    assert_eq!(ctx.api.state().get_cart_calls, 0);
}

#[tokio::test]
async fn test_merge_preserves_local_order() {
    let ctx = TestContext::new().await;
    for id in ["p1", "p2", "p3"] {
        ctx.cart
            .add(TestContext::snapshot(id), 1)
            .await
            .expect("anonymous add failed");
    }

    ctx.login().await;
    ctx.cart.merge_on_login().await.expect("merge failed");

    let order: Vec<String> = ctx
        .api
        .state()
        .items
        .iter()
        .map(|item| item.product_id.clone())
        .collect();
    assert_eq!(order, vec!["p1", "p2", "p3"]);
}

#[tokio::test]
async fn test_partial_failure_preserves_unmerged_lines_and_retries_exactly_once() {
    let ctx = TestContext::new().await;
    ctx.cart
        .add(TestContext::snapshot("p1"), 1)
        .await
        .expect("add p1 failed");
    ctx.cart
        .add(TestContext::snapshot("p2"), 1)
        .await
        .expect("add p2 failed");

    ctx.api.fail_product("p2");
    ctx.login().await;

    let mut events = ctx.cart.subscribe();
    assert!(ctx.cart.merge_on_login().await.is_err());
    wait_for_event(&mut events, CartEvent::MergeFailed).await;

    // p1 landed and was committed out of the local cart; p2 survived locally
    assert_eq!(ctx.api.quantity_of("p1"), Some(1));
    assert_eq!(ctx.api.quantity_of("p2"), None);
    let remaining = ctx.local().lines();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining.first().expect("no line").product_id().as_str(), "p2");

    // The retry pushes only what is missing - p1 is not counted twice
    ctx.api.heal();
    let merged = ctx.cart.merge_on_login().await.expect("retry merge failed");
    assert_eq!(merged, 1);
    assert_eq!(ctx.api.quantity_of("p1"), Some(1));
    assert_eq!(ctx.api.quantity_of("p2"), Some(1));
    assert!(ctx.local().is_empty());
}

#[tokio::test]
async fn test_fetch_failure_aborts_with_local_cart_intact() {
    let ctx = TestContext::new().await;
    ctx.cart
        .add(TestContext::snapshot("p1"), 2)
        .await
        .expect("anonymous add failed");

    ctx.login().await;
    // The fresh read itself fails: backend stops honoring the token
    ctx.api.state().valid_tokens.clear();

    assert!(ctx.cart.merge_on_login().await.is_err());

    let local = ctx.local().lines();
    assert_eq!(local.len(), 1);
    assert_eq!(local.first().expect("no line").quantity, 2);
    assert!(ctx.api.state().items.is_empty());
}

#[tokio::test]
async fn test_merge_emits_completion_event() {
    let ctx = TestContext::new().await;
    ctx.cart
        .add(TestContext::snapshot("p1"), 1)
        .await
        .expect("anonymous add failed");

    ctx.login().await;
    let mut events = ctx.cart.subscribe();
    ctx.cart.merge_on_login().await.expect("merge failed");

    wait_for_event(&mut events, CartEvent::MergeCompleted).await;
}
