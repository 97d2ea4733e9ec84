use nahs_reasoner::ResourcePool;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

#[tokio::test]
async fn reserve_takes_in_queue_order() {
    let pool = ResourcePool::new(["b1", "b2"]);
    assert_eq!(pool.reserve().await.as_deref(), Some("b1"));
    assert_eq!(pool.reserve().await.as_deref(), Some("b2"));
    assert_eq!(pool.reserve().await, None);
    assert_eq!(pool.reserved().await, 2);
}

#[tokio::test]
async fn release_removes_from_reserved_only() {
    let pool = ResourcePool::new(["b1"]);
    let id = pool.reserve().await.unwrap();
    assert!(pool.has(&id).await);
    assert!(pool.release(&id).await);
    assert!(!pool.has(&id).await);
    assert!(!pool.release(&id).await);
}

#[tokio::test]
async fn dock_is_idempotent() {
    let pool = ResourcePool::new(["b1"]);
    assert!(!pool.dock("b1").await);
    assert!(pool.dock("b2").await);
    assert!(!pool.dock("b2").await);
    assert_eq!(pool.available_ids().await, vec!["b1", "b2"]);
}

#[tokio::test]
async fn dock_returns_reserved_resource() {
    let pool = ResourcePool::new(["b1"]);
    let id = pool.reserve().await.unwrap();
    assert!(pool.dock(&id).await);
    assert_eq!(pool.available().await, 1);
    assert_eq!(pool.reserved().await, 0);
}

#[tokio::test]
async fn reserve_many_is_all_or_nothing() {
    let pool = ResourcePool::new(["b1", "b2"]);
    assert_eq!(pool.reserve_many(3).await, None);
    assert_eq!(pool.available().await, 2);
    assert_eq!(pool.reserve_many(2).await.unwrap(), vec!["b1", "b2"]);
    assert_eq!(pool.available().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reserve_hands_out_single_resource_once() {
    let pool = Arc::new(ResourcePool::new(["only"]));
    let a = tokio::spawn({
        let pool = Arc::clone(&pool);
        async move { pool.reserve().await }
    });
    let b = tokio::spawn({
        let pool = Arc::clone(&pool);
        async move { pool.reserve().await }
    });
    let results = [a.await.unwrap(), b.await.unwrap()];
    assert_eq!(results.iter().filter(|r| r.is_some()).count(), 1);
    assert_eq!(results.iter().filter(|r| r.is_none()).count(), 1);
}

#[derive(Debug, Clone)]
enum Op {
    Reserve,
    Release(usize),
    Dock(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Reserve),
        (0usize..6).prop_map(Op::Release),
        (0usize..6).prop_map(Op::Dock),
    ]
}

proptest! {
    #[test]
    fn never_available_and_reserved_at_once(ops in proptest::collection::vec(op(), 0..40)) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let ids: Vec<String> = (0..6).map(|i| format!("b{i}")).collect();
            let pool = ResourcePool::new(ids.iter().take(3).cloned());
            let mut handed_out = HashSet::new();
            for op in ops {
                match op {
                    Op::Reserve => {
                        if let Some(id) = pool.reserve().await {
                            // a reserved id is never handed out again until docked
                            assert!(handed_out.insert(id));
                        }
                    }
                    Op::Release(i) => {
                        pool.release(&ids[i]).await;
                    }
                    Op::Dock(i) => {
                        pool.dock(&ids[i]).await;
                        handed_out.remove(&ids[i]);
                    }
                }
                let available: HashSet<String> = pool.available_ids().await.into_iter().collect();
                assert_eq!(available.len(), pool.available().await);
                assert!(available.is_disjoint(&handed_out));
            }
        });
    }
}
