use nahs_protocol::{CorrelationError, InstanceKey};
use nahs_reasoner::CorrelationRegistry;
use std::sync::Arc;
use std::time::Duration;

fn key(s: &str) -> InstanceKey {
    InstanceKey::new(s)
}

#[tokio::test]
async fn resolve_delivers_to_the_registered_waiter() {
    let registry = Arc::new(CorrelationRegistry::<u32>::new());
    let a = registry.register(key("a")).await.unwrap();
    let b = registry.register(key("b")).await.unwrap();

    registry.resolve(&key("b"), 2).await.unwrap();
    registry.resolve(&key("a"), 1).await.unwrap();

    assert_eq!(a.wait().await.unwrap(), 1);
    assert_eq!(b.wait().await.unwrap(), 2);
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn waiter_suspends_until_resolved() {
    let registry = Arc::new(CorrelationRegistry::<String>::new());
    let waiter = registry.register(key("k")).await.unwrap();

    let r = Arc::clone(&registry);
    let handle = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        r.resolve(&key("k"), "done".into()).await
    });

    assert_eq!(waiter.wait().await.unwrap(), "done");
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn second_register_for_same_key_fails() {
    let registry = CorrelationRegistry::<u32>::new();
    let _waiter = registry.register(key("k")).await.unwrap();
    let err = registry.register(key("k")).await.unwrap_err();
    assert_eq!(err, CorrelationError::AlreadyPending("k".into()));
}

#[tokio::test]
async fn resolve_without_waiter_is_rejected() {
    let registry = CorrelationRegistry::<u32>::new();
    let err = registry.resolve(&key("ghost"), 7).await.unwrap_err();
    assert_eq!(err, CorrelationError::NotPending("ghost".into()));
}

#[tokio::test]
async fn resolve_consumes_the_entry() {
    let registry = CorrelationRegistry::<u32>::new();
    let waiter = registry.register(key("k")).await.unwrap();
    registry.resolve(&key("k"), 1).await.unwrap();
    assert!(registry.resolve(&key("k"), 2).await.is_err());
    assert_eq!(waiter.wait().await.unwrap(), 1);
}

#[tokio::test]
async fn discard_cancels_the_waiter() {
    let registry = CorrelationRegistry::<u32>::new();
    let waiter = registry.register(key("k")).await.unwrap();

    assert!(registry.discard(&key("k"), "peer left").await);
    assert!(!registry.discard(&key("k"), "again").await);

    let err = waiter.wait().await.unwrap_err();
    assert_eq!(
        err,
        CorrelationError::Cancelled {
            reason: "peer left".into()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn deadline_expiry_releases_the_entry() {
    let registry = CorrelationRegistry::<u32>::new();
    let waiter = registry.register(key("slow")).await.unwrap();

    let err = waiter
        .wait_for(Some(Duration::from_secs(2)))
        .await
        .unwrap_err();
    assert_eq!(err, CorrelationError::TimedOut("slow".into()));
    assert!(!registry.is_pending(&key("slow")).await);
    assert!(!registry.discard(&key("slow"), "timed out").await);
}

#[tokio::test]
async fn dropped_waiter_releases_its_entry() {
    let registry = CorrelationRegistry::<u32>::new();
    let waiter = registry.register(key("k")).await.unwrap();
    drop(waiter);

    assert!(!registry.is_pending(&key("k")).await);
    assert!(registry.is_empty().await);
    assert!(registry.register(key("k")).await.is_ok());
}

#[tokio::test]
async fn dropped_waiter_leaves_a_newer_entry_alone() {
    let registry = CorrelationRegistry::<u32>::new();
    let old = registry.register(key("k")).await.unwrap();
    registry.resolve(&key("k"), 1).await.unwrap();
    let new = registry.register(key("k")).await.unwrap();

    drop(old);
    assert!(registry.is_pending(&key("k")).await);

    registry.resolve(&key("k"), 2).await.unwrap();
    assert_eq!(new.wait().await.unwrap(), 2);
}

#[tokio::test]
async fn abandoned_wait_releases_its_entry() {
    let registry = CorrelationRegistry::<u32>::new();
    let waiter = registry.register(key("k")).await.unwrap();

    let waited = tokio::time::timeout(Duration::from_millis(10), waiter.wait()).await;
    assert!(waited.is_err());
    assert!(!registry.is_pending(&key("k")).await);
    assert!(registry.resolve(&key("k"), 3).await.is_err());
}

#[tokio::test]
async fn no_deadline_waits_for_delivery() {
    let registry = CorrelationRegistry::<u32>::new();
    let waiter = registry.register(key("k")).await.unwrap();
    registry.resolve(&key("k"), 9).await.unwrap();
    assert_eq!(waiter.wait_for(None).await.unwrap(), 9);
}
