//! Controller integration tests: watch source → queue → workers → routing table.

use std::sync::Arc;
use std::time::Duration;

use ingress_gateway::config::ControllerConfig;
use ingress_gateway::controller::{Controller, ControllerError, Event, RateLimiter, Reconciler, WorkQueue};
use ingress_gateway::lifecycle::Shutdown;
use ingress_gateway::resource::ResourceKey;
use ingress_gateway::routing::{RouteKey, RouteTarget, RoutingTable};
use ingress_gateway::watch::{MemoryWatchSource, WatchSource};

mod common;

use common::{eventually, rule_object, within, FailingSource};

fn fast_config(workers: usize) -> ControllerConfig {
    ControllerConfig {
        workers,
        base_delay_ms: 1,
        max_delay_ms: 20,
        queue_qps: 1000,
        queue_burst: 1000,
        cache_sync_timeout_secs: 5,
        ..Default::default()
    }
}

fn start<S: WatchSource>(
    source: Arc<S>,
    config: &ControllerConfig,
) -> (Arc<Controller<S>>, Shutdown, tokio::task::JoinHandle<Result<(), ControllerError>>) {
    let controller = Arc::new(Controller::new(source, RoutingTable::new(), config));
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(controller.clone().run(shutdown.subscribe()));
    (controller, shutdown, handle)
}

#[tokio::test]
async fn test_add_then_delete_through_workers() {
    let source = Arc::new(MemoryWatchSource::new());
    source.mark_synced();
    let (controller, shutdown, handle) = start(source.clone(), &fast_config(2));

    let obj = rule_object("web", "d3os", "example.com", "/app", "backend1", 8080);
    source.apply(obj.clone());

    let key = RouteKey::from("example.com/app");
    eventually("route added", || controller.table().lookup(&key).is_some()).await;
    assert_eq!(
        controller.table().lookup(&key),
        Some(RouteTarget::from("backend1.default:8080"))
    );

    source.delete(&obj.key());
    eventually("route removed", || controller.table().lookup(&key).is_none()).await;

    shutdown.trigger();
    within(handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_other_class_never_routes() {
    let source = Arc::new(MemoryWatchSource::new());
    source.mark_synced();
    // One worker keeps processing in enqueue order.
    let (controller, shutdown, handle) = start(source.clone(), &fast_config(1));

    source.apply(rule_object("foreign", "other", "other.com", "/x", "svc", 80));
    source.apply(rule_object("marker", "d3os", "marker.com", "/", "svc", 80));

    let marker = RouteKey::from("marker.com/");
    eventually("marker routed", || controller.table().lookup(&marker).is_some()).await;
    assert_eq!(controller.table().len(), 1);
    assert!(controller.table().lookup(&RouteKey::from("other.com/x")).is_none());

    shutdown.trigger();
    within(handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_failing_key_is_retried_five_times_then_dropped() {
    let key = ResourceKey::new("default", "broken");
    let source = Arc::new(FailingSource::new(vec![Event::Add(key.clone())]));
    let (controller, shutdown, handle) = start(source.clone(), &fast_config(2));

    // One initial attempt plus five retries.
    eventually("six lookups", || source.lookups() >= 6).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(source.lookups(), 6);
    assert_eq!(controller.queue().num_requeues(&key), 0);
    assert!(controller.queue().is_empty());

    shutdown.trigger();
    within(handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_distinct_keys_are_order_independent() {
    let objects: Vec<_> = (0..40)
        .map(|i| {
            rule_object(
                &format!("obj-{}", i),
                "d3os",
                &format!("host{}.example", i),
                &format!("/path{}", i),
                &format!("svc{}", i),
                8000 + i as u16,
            )
        })
        .collect();

    // Sequential reference.
    let reference_source = Arc::new(MemoryWatchSource::new());
    let reference = Reconciler::new(reference_source.clone(), RoutingTable::new(), "d3os");
    for obj in &objects {
        let event = reference_source.apply(obj.clone());
        reference.reconcile(&event).unwrap();
    }
    let expected = reference.table().snapshot();

    // Concurrent workers.
    let source = Arc::new(MemoryWatchSource::new());
    source.mark_synced();
    let (controller, shutdown, handle) = start(source.clone(), &fast_config(4));
    for obj in &objects {
        source.apply(obj.clone());
    }

    eventually("all routes", || controller.table().len() == objects.len()).await;
    assert_eq!(controller.table().snapshot(), expected);

    shutdown.trigger();
    within(handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_two_workers_apply_distinct_keys() {
    let source = Arc::new(MemoryWatchSource::new());
    source.mark_synced();
    let (controller, shutdown, handle) = start(source.clone(), &fast_config(2));

    source.apply(rule_object("a", "d3os", "hostA", "/pathA", "svc-a", 80));
    source.apply(rule_object("b", "d3os", "hostB", "/pathB", "svc-b", 81));

    eventually("both routes", || controller.table().len() == 2).await;
    assert_eq!(
        controller.table().lookup(&RouteKey::from("hostA/pathA")),
        Some(RouteTarget::from("svc-a.default:80"))
    );
    assert_eq!(
        controller.table().lookup(&RouteKey::from("hostB/pathB")),
        Some(RouteTarget::from("svc-b.default:81"))
    );

    shutdown.trigger();
    within(handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_workers_wait_for_cache_sync() {
    let source = Arc::new(MemoryWatchSource::new());
    let (controller, shutdown, handle) = start(source.clone(), &fast_config(2));
    let ready = controller.subscribe_ready();

    source.apply(rule_object("web", "d3os", "example.com", "/app", "backend1", 8080));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(controller.table().is_empty());
    assert!(!*ready.borrow());

    source.mark_synced();
    eventually("route after sync", || controller.table().len() == 1).await;
    assert!(*ready.borrow());

    shutdown.trigger();
    within(handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_cache_sync_timeout_is_fatal() {
    let source = Arc::new(MemoryWatchSource::new());
    let config = ControllerConfig {
        cache_sync_timeout_secs: 1,
        ..fast_config(1)
    };
    let (controller, _shutdown, handle) = start(source, &config);

    let result = within(handle).await.unwrap();
    assert!(matches!(result, Err(ControllerError::CacheSyncTimeout(_))));
    assert!(controller.queue().is_shutting_down());
}

#[tokio::test]
async fn test_shutdown_drains_queued_work() {
    let source = Arc::new(MemoryWatchSource::new());
    source.mark_synced();
    let (controller, shutdown, handle) = start(source.clone(), &fast_config(1));
    let mut ready = controller.subscribe_ready();
    within(ready.wait_for(|r| *r)).await.unwrap();

    for i in 0..10 {
        source.apply(rule_object(&format!("o{}", i), "d3os", &format!("h{}", i), "/", "svc", 80));
    }
    eventually("events queued", || controller.queue().len() + controller.table().len() >= 1).await;

    shutdown.trigger();
    within(handle).await.unwrap().unwrap();
    assert!(controller.queue().is_empty());
}

#[tokio::test]
async fn test_delete_then_recreate_removes_old_routes() {
    let source = Arc::new(MemoryWatchSource::new());
    let reconciler = Reconciler::new(source.clone(), RoutingTable::new(), "d3os");
    let queue = WorkQueue::new(RateLimiter::new(1, 20, 1000, 1000));

    let v1 = rule_object("web", "d3os", "example.com", "/app", "backend1", 8080);
    let added = source.apply(v1.clone());
    reconciler.reconcile(&added).unwrap();

    // Deleted and recreated before any worker sees the Delete.
    queue.add(source.delete(&v1.key()).unwrap());
    let v2 = rule_object("web", "d3os", "example.com", "/v2", "backend2", 8080);
    queue.add(source.apply(v2));

    let mut delivered = Vec::new();
    while !queue.is_empty() {
        let event = within(queue.get()).await.unwrap();
        reconciler.reconcile(&event).unwrap();
        queue.done(event.key());
        delivered.push(event.kind().as_str());
    }

    assert_eq!(delivered, vec!["delete", "add"]);
    let routes = reconciler.table().snapshot();
    assert_eq!(routes.len(), 1);
    assert_eq!(
        routes.get(&RouteKey::from("example.com/v2")),
        Some(&RouteTarget::from("backend2.default:8080"))
    );
}
