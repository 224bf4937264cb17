//! Integration tests for prefetching and route preloading
mod common;

use common::TestApp;
use pretty_assertions::assert_eq;
use rhtmx_navigator::{GotoOptions, NavigationOutcome};

#[tokio::test]
async fn test_navigation_adopts_prefetch() {
    let app = TestApp::started("/").await;

    let pending = app.navigator.prefetch("/blog/first").await.unwrap();
    let prefetched = pending.await;
    assert_eq!(prefetched.props.level(2).unwrap().props["id"], "first");
    assert_eq!(app.calls.count("post:first"), 1);

    let outcome = app
        .navigator
        .goto("/blog/first", GotoOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome, NavigationOutcome::Rendered { id: 2 });
    assert_eq!(app.calls.count("post:first"), 1);
    assert_eq!(app.calls.count("blog"), 1);
    assert_eq!(app.renders.last().level(2).unwrap().props["id"], "first");
}

#[tokio::test]
async fn test_repeated_prefetch_is_single_flight() {
    let app = TestApp::started("/").await;

    let first = app.navigator.prefetch("/posts/9").await.unwrap();
    let second = app.navigator.prefetch("/posts/9").await.unwrap();
    first.await;
    second.await;

    assert_eq!(app.calls.count("post:9"), 1);
}

#[tokio::test]
async fn test_newer_prefetch_replaces_slot() {
    let app = TestApp::started("/").await;

    app.navigator.prefetch("/posts/1").await.unwrap().await;
    app.navigator.prefetch("/posts/2").await.unwrap().await;

    app.navigator
        .goto("/posts/1", GotoOptions::default())
        .await
        .unwrap();

    assert_eq!(app.calls.count("post:1"), 2);
    assert_eq!(app.calls.count("post:2"), 1);
}

#[tokio::test]
async fn test_prefetch_of_unroutable_href() {
    let app = TestApp::started("/").await;

    assert!(app.navigator.prefetch("https://other.example/").await.is_none());
    assert!(app.navigator.prefetch("/api/posts").await.is_none());
    assert!(app.navigator.prefetch("/nowhere").await.is_none());
}

#[tokio::test]
async fn test_prefetch_routes_loads_components_once() {
    let app = TestApp::new("/");

    app.navigator.prefetch_routes(None).await.unwrap();
    for name in ["Index", "About", "Login", "Private", "Loop", "Conflict", "Slow", "BlogLayout", "Post"] {
        assert_eq!(app.calls.count(&format!("load:{}", name)), 1, "{}", name);
    }

    app.navigator.start().await.unwrap();
    assert_eq!(app.calls.count("load:Index"), 1);
}

#[tokio::test]
async fn test_prefetch_routes_for_paths() {
    let app = TestApp::new("/");

    app.navigator
        .prefetch_routes(Some(&["/blog/hello".to_string()]))
        .await
        .unwrap();

    assert_eq!(app.calls.count("load:BlogLayout"), 1);
    assert_eq!(app.calls.count("load:Post"), 1);
    assert_eq!(app.calls.count("load:About"), 0);
    assert!(app
        .calls
        .all()
        .iter()
        .all(|call| call.starts_with("load:")));
}
