//! Permit acquisition and release across whole operations.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use resilience_profile::admission::{
    AdmissionError, LifecycleState, OperationContext, OperationError, PermitLifecycleManager,
    PoolRegistry, RejectReason, ResourceTag, TagRegistry,
};

mod common;

use common::{acquired, released, CountingPool, Event};

struct Harness {
    manager: PermitLifecycleManager,
    events: Arc<Mutex<Vec<Event>>>,
}

impl Harness {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

fn harness(pools: Vec<Arc<CountingPool>>, events: Arc<Mutex<Vec<Event>>>) -> Harness {
    let mut registry = PoolRegistry::new();
    for pool in pools {
        registry.insert(pool);
    }
    let tags = TagRegistry::new();
    tags.register_docs(
        "Checkout::pay",
        r#"@Bulkhead(pool="db", lane="writes") @Bulkhead(pool="api")"#,
        "",
    );
    tags.register_docs("Checkout::broken", r#"@Bulkhead(pool="db") @Bulkhead(pool="missing")"#, "");
    tags.register_docs("Checkout::refused", r#"@Bulkhead(pool="db") @Bulkhead(pool="full")"#, "");
    tags.register_docs("Checkout::slow", r#"@Bulkhead(pool="db") @Bulkhead(pool="slow")"#, "");
    tags.register("Reports::daily", vec![ResourceTag::new("db")]);

    Harness {
        manager: PermitLifecycleManager::new(Arc::new(registry), Arc::new(tags)),
        events,
    }
}

fn shared_events() -> Arc<Mutex<Vec<Event>>> {
    Arc::new(Mutex::new(Vec::new()))
}

#[tokio::test]
async fn test_acquires_in_tag_order_and_releases_once() {
    let events = shared_events();
    let db = CountingPool::new("db", events.clone());
    let api = CountingPool::new("api", events.clone());
    let h = harness(vec![db.clone(), api.clone()], events);

    let mut ctx = OperationContext::new("Checkout::pay").with_route("checkout");
    assert_eq!(h.manager.begin(&mut ctx).await.unwrap(), 2);
    assert_eq!(
        ctx.held_lanes(),
        vec![("db".into(), "writes".into()), ("api".into(), "checkout".into())]
    );

    assert_eq!(h.manager.on_success(&mut ctx), 2);
    assert_eq!(h.manager.on_failure(&mut ctx), 0);
    assert_eq!(h.manager.on_success(&mut ctx), 0);

    assert_eq!(
        h.events(),
        vec![
            acquired("db", "writes"),
            acquired("api", "checkout"),
            released("db", "writes"),
            released("api", "checkout"),
        ]
    );
    assert_eq!(db.held() + api.held(), 0);
}

#[tokio::test]
async fn test_lane_defaults_without_route() {
    let events = shared_events();
    let h = harness(vec![CountingPool::new("db", events.clone())], events);

    let mut ctx = OperationContext::new("Reports::daily");
    h.manager.begin(&mut ctx).await.unwrap();
    assert_eq!(ctx.held_lanes(), vec![("db".into(), "default".into())]);
    h.manager.on_failure(&mut ctx);

    let mut ctx = OperationContext::new("Reports::daily").with_route("reports");
    h.manager.begin(&mut ctx).await.unwrap();
    assert_eq!(ctx.held_lanes(), vec![("db".into(), "reports".into())]);
}

#[tokio::test]
async fn test_unknown_pool_releases_earlier_permits() {
    let events = shared_events();
    let db = CountingPool::new("db", events.clone());
    let h = harness(vec![db.clone()], events);

    let mut ctx = OperationContext::new("Checkout::broken");
    let err = h.manager.begin(&mut ctx).await.unwrap_err();

    assert_eq!(err, AdmissionError::UnknownPool("missing".into()));
    assert_eq!(ctx.state(), LifecycleState::Released);
    assert_eq!(h.events(), vec![acquired("db", "default"), released("db", "default")]);
    assert_eq!(db.held(), 0);
    assert_eq!(h.manager.on_failure(&mut ctx), 0);
}

#[tokio::test]
async fn test_rejection_releases_earlier_permits() {
    let events = shared_events();
    let db = CountingPool::new("db", events.clone());
    let full = CountingPool::rejecting("full", RejectReason::Timeout, events.clone());
    let h = harness(vec![db.clone(), full], events);

    let mut ctx = OperationContext::new("Checkout::refused");
    let err = h.manager.begin(&mut ctx).await.unwrap_err();

    assert_eq!(err, AdmissionError::rejected("full", "default", RejectReason::Timeout));
    assert_eq!(db.held(), 0);
    assert_eq!(h.events(), vec![acquired("db", "default"), released("db", "default")]);
}

#[tokio::test]
async fn test_cancelled_admission_releases() {
    let events = shared_events();
    let db = CountingPool::new("db", events.clone());
    let slow = CountingPool::slow("slow", Duration::from_secs(60), events.clone());
    let h = harness(vec![db.clone(), slow.clone()], events);

    let mut ctx = OperationContext::new("Checkout::slow");
    let pending = tokio::time::timeout(Duration::from_millis(20), h.manager.begin(&mut ctx)).await;
    assert!(pending.is_err());

    // The db permit is still owned by the context until it is completed or dropped.
    assert_eq!(ctx.state(), LifecycleState::Acquiring);
    assert_eq!(db.held(), 1);
    drop(ctx);

    assert_eq!(db.held(), 0);
    assert_eq!(slow.held(), 0);
}

#[tokio::test]
async fn test_untagged_handler_acquires_nothing() {
    let events = shared_events();
    let h = harness(vec![CountingPool::new("db", events.clone())], events);

    let mut ctx = OperationContext::new("Health::check");
    assert_eq!(h.manager.begin(&mut ctx).await.unwrap(), 0);
    assert_eq!(h.manager.on_success(&mut ctx), 0);
    assert!(h.events().is_empty());
}

#[tokio::test]
async fn test_run_releases_on_error_and_skips_operation_when_refused() {
    let events = shared_events();
    let db = CountingPool::new("db", events.clone());
    let h = harness(vec![db.clone()], events);

    let result: Result<(), OperationError<std::fmt::Error>> = h
        .manager
        .run(OperationContext::new("Reports::daily"), async { Err(std::fmt::Error) })
        .await;
    assert!(matches!(result, Err(OperationError::Operation(_))));
    assert_eq!(db.held(), 0);

    let ran = Arc::new(Mutex::new(false));
    let flag = ran.clone();
    let result: Result<(), OperationError<std::fmt::Error>> = h
        .manager
        .run(OperationContext::new("Checkout::broken"), async move {
            *flag.lock().unwrap() = true;
            Ok(())
        })
        .await;
    assert!(matches!(result, Err(OperationError::Admission(AdmissionError::UnknownPool(_)))));
    assert!(!*ran.lock().unwrap());
    assert_eq!(db.held(), 0);
}

#[tokio::test]
async fn test_concurrent_operations_balance() {
    let events = shared_events();
    let db = CountingPool::new("db", events.clone());
    let api = CountingPool::new("api", events.clone());
    let h = Arc::new(harness(vec![db.clone(), api.clone()], events));

    let mut tasks = Vec::new();
    for i in 0..16 {
        let h = h.clone();
        tasks.push(tokio::spawn(async move {
            let mut ctx = OperationContext::new("Checkout::pay");
            h.manager.begin(&mut ctx).await.unwrap();
            tokio::task::yield_now().await;
            if i % 2 == 0 {
                h.manager.on_success(&mut ctx)
            } else {
                h.manager.on_failure(&mut ctx)
            }
        }));
    }

    for task in tasks {
        assert_eq!(task.await.unwrap(), 2);
    }
    assert_eq!(db.held(), 0);
    assert_eq!(api.held(), 0);

    let all = h.events();
    let acquires = all.iter().filter(|e| matches!(e, Event::Acquired { .. })).count();
    let releases = all.iter().filter(|e| matches!(e, Event::Released { .. })).count();
    assert_eq!(acquires, 32);
    assert_eq!(releases, 32);
}
