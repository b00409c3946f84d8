// Topic Cache Tests
// Join-once semantics, failure handling and host attachment

use std::sync::Arc;
use std::time::{Duration, Instant};

use chainrelay::host::{MockOverlayHost, OverlayHost};
use chainrelay::topic::{TopicCache, TopicError, TopicName, MAX_TOPIC_LENGTH};

fn topic(name: &str) -> TopicName {
    TopicName::new(name).unwrap()
}

// ============================================================================
// TOPIC NAMES
// ============================================================================

#[test]
fn test_topic_name_validation() {
    assert!(TopicName::new("msgs/v1").is_ok());
    assert!(TopicName::new("/chainrelay/msgs/v1").is_ok());
    assert!(matches!(TopicName::new(""), Err(TopicError::InvalidName(_))));
    assert!(TopicName::new("bad\ttopic").is_err());
    assert!(TopicName::new("x".repeat(MAX_TOPIC_LENGTH)).is_ok());
    assert!(TopicName::new("x".repeat(MAX_TOPIC_LENGTH + 1)).is_err());
}

// ============================================================================
// RESOLVE
// ============================================================================

#[tokio::test]
async fn test_sequential_resolve_joins_once() {
    let host = Arc::new(MockOverlayHost::new());
    let cache = TopicCache::with_host(host.clone());
    let name = topic("msgs/v1");

    let first = cache.resolve(&name).await.unwrap();
    assert_eq!(host.join_calls(), 1);

    let second = cache.resolve(&name).await.unwrap();
    assert_eq!(host.join_calls(), 1);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_concurrent_resolve_joins_once() {
    let host = Arc::new(MockOverlayHost::new().with_join_delay(Duration::from_millis(50)));
    let cache = Arc::new(TopicCache::with_host(host.clone()));
    let name = topic("msgs/v1");

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let cache = cache.clone();
        let name = name.clone();
        tasks.push(tokio::spawn(async move { cache.resolve(&name).await }));
    }

    let mut handles = Vec::new();
    for task in tasks {
        handles.push(task.await.unwrap().unwrap());
    }

    assert_eq!(host.join_calls(), 1);
    assert!(handles.iter().all(|h| *h == handles[0]));
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_distinct_topics_get_distinct_channels() {
    let host = Arc::new(MockOverlayHost::new());
    let cache = TopicCache::with_host(host.clone());

    let a = cache.resolve(&topic("a")).await.unwrap();
    let b = cache.resolve(&topic("b")).await.unwrap();

    assert_ne!(a, b);
    assert_eq!(host.join_calls(), 2);
    assert_eq!(cache.topics(), vec![topic("a"), topic("b")]);
}

#[tokio::test]
async fn test_failed_join_leaves_cache_empty_and_retry_succeeds() {
    let host = Arc::new(MockOverlayHost::new().with_join_failure("subscription refused"));
    let cache = TopicCache::with_host(host.clone());
    let name = topic("msgs/v1");

    let result = cache.resolve(&name).await;
    assert!(matches!(result, Err(TopicError::JoinFailed { .. })));
    assert!(cache.is_empty());
    assert!(cache.get(&name).is_none());

    host.clear_join_failure();
    let channel = cache.resolve(&name).await.unwrap();
    assert_eq!(channel.name(), &name);
    assert_eq!(host.join_calls(), 2);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_cached_read_does_not_wait_for_join() {
    let delay = Duration::from_millis(300);
    let host = Arc::new(MockOverlayHost::new().with_join_delay(delay));
    let cache = Arc::new(TopicCache::with_host(host.clone()));
    cache.resolve(&topic("a")).await.unwrap();

    let slow = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.resolve(&topic("b")).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = Instant::now();
    cache.resolve(&topic("a")).await.unwrap();
    assert!(started.elapsed() < delay / 3);

    slow.await.unwrap().unwrap();
    assert_eq!(host.join_calls(), 2);
}

#[tokio::test]
async fn test_joins_of_distinct_topics_are_serialized() {
    let delay = Duration::from_millis(150);
    let host = Arc::new(MockOverlayHost::new().with_join_delay(delay));
    let cache = TopicCache::with_host(host.clone());
    let (x, y) = (topic("x"), topic("y"));

    let started = Instant::now();
    let (first, second) = tokio::join!(cache.resolve(&x), cache.resolve(&y));

    assert!(first.is_ok() && second.is_ok());
    assert!(started.elapsed() >= delay * 2);
    assert_eq!(host.join_calls(), 2);
}

// ============================================================================
// HOST ATTACHMENT
// ============================================================================

#[tokio::test]
async fn test_resolve_before_attach_fails() {
    let cache = TopicCache::new();
    assert!(!cache.is_attached());
    assert!(matches!(cache.resolve(&topic("msgs/v1")).await, Err(TopicError::NotInitialized)));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_attach_then_resolve() {
    let cache = TopicCache::new();
    let host = Arc::new(MockOverlayHost::new());
    cache.attach_host(host.clone()).unwrap();

    assert!(cache.is_attached());
    assert_eq!(cache.host().unwrap().local_peer_id(), host.local_peer_id());
    cache.resolve(&topic("msgs/v1")).await.unwrap();
    assert_eq!(host.join_calls(), 1);
}

#[test]
fn test_second_attach_rejected() {
    let cache = TopicCache::new();
    cache.attach_host(Arc::new(MockOverlayHost::new())).unwrap();

    let result = cache.attach_host(Arc::new(MockOverlayHost::new()));
    assert!(matches!(result, Err(TopicError::AlreadyAttached)));
}
