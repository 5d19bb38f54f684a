//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the social API and drive the
//! scheduler, account processor and entity fetcher end-to-end against an
//! in-memory status store.

use reel_harvester::api::HttpSocialApi;
use reel_harvester::crawler::{AccountProcessor, CrawlPolicy, CrawlScheduler};
use reel_harvester::retry::{DelayRange, RetryPolicy};
use reel_harvester::storage::{SqliteStore, StatusStore};
use reel_harvester::CompletionFlag;
use serde_json::{json, Value};
use std::ops::Range;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-token";
const USER_ID: &str = "100";

fn api_for(server: &MockServer) -> HttpSocialApi {
    HttpSocialApi::new(reqwest::Client::new(), &server.uri(), TOKEN).expect("valid base URL")
}

fn scheduler(api: &HttpSocialApi) -> CrawlScheduler<'_, HttpSocialApi> {
    let processor = AccountProcessor::new(
        api,
        RetryPolicy::immediate(2),
        CrawlPolicy::default(),
        DelayRange::none(),
    );
    CrawlScheduler::new(processor, DelayRange::none())
}

fn store_with(handles: &[&str]) -> SqliteStore {
    let mut store = SqliteStore::open_in_memory().expect("in-memory store");
    let handles: Vec<String> = handles.iter().map(|h| h.to_string()).collect();
    store.insert_handles(&handles).expect("insert handles");
    store
}

fn profile_body(followers: i64, following: i64) -> Value {
    json!({
        "user": {
            "pk": 100,
            "username": "alice",
            "full_name": "Alice Example",
            "biography": "short videos",
            "follower_count": followers,
            "following_count": following,
            "profile_pic_url": null
        }
    })
}

/// Clip items with ids 1000+i and play counts 10*i
fn clips_body(ids: Range<i64>, next_page_id: Option<&str>) -> Value {
    let items: Vec<Value> = ids
        .map(|i| {
            json!({
                "media": {
                    "pk": 1000 + i,
                    "code": format!("C{}", i),
                    "caption": {"text": format!("clip {}", i)},
                    "taken_at": 1_700_000_000 + i,
                    "play_count": i * 10,
                    "like_count": i,
                    "comment_count": 1,
                    "video_url": format!("https://cdn.example.com/{}.mp4", 1000 + i),
                    "thumbnail_url": format!("https://cdn.example.com/{}.jpg", 1000 + i)
                }
            })
        })
        .collect();
    json!({"response": {"items": items}, "next_page_id": next_page_id})
}

fn following_body(ids: &[i64], next_page_id: Option<&str>) -> Value {
    let users: Vec<Value> = ids
        .iter()
        .map(|id| json!({"pk": id, "username": format!("user{}", id)}))
        .collect();
    json!({"response": {"users": users}, "next_page_id": next_page_id})
}

async fn mount_profile(server: &MockServer, followers: i64, following: i64) {
    Mock::given(method("GET"))
        .and(path("/v2/user/by/username"))
        .and(query_param("username", "alice"))
        .and(header("x-access-key", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body(followers, following)))
        .mount(server)
        .await;
}

/// Mounts the cursor page first: the first mounted matching mock wins
async fn mount_clips(server: &MockServer, first: Value, second: Option<(&str, Value)>) {
    if let Some((cursor, body)) = second {
        Mock::given(method("GET"))
            .and(path("/v2/user/clips"))
            .and(query_param("page_id", cursor))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/v2/user/clips"))
        .and(query_param("user_id", USER_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(first))
        .mount(server)
        .await;
}

async fn requests_to(server: &MockServer, endpoint: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == endpoint)
        .count()
}

#[tokio::test]
async fn test_two_pages_then_no_cursor() {
    let server = MockServer::start().await;
    mount_profile(&server, 50_000, 100).await;
    mount_clips(
        &server,
        clips_body(0..30, Some("page-2")),
        Some(("page-2", clips_body(30..60, None))),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/v2/user/following"))
        .respond_with(ResponseTemplate::new(200).set_body_json(following_body(&[7, 8, 9], None)))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let mut store = store_with(&["alice"]);
    let summary = scheduler(&api).run(&mut store).await.expect("crawl succeeds");

    assert_eq!(summary.accounts_processed, 1);
    assert_eq!(summary.posts_saved, 60);
    assert_eq!(summary.edges_inserted, 3);

    let account = store.get_account("alice").unwrap().unwrap();
    assert_eq!(account.account_id.as_deref(), Some(USER_ID));
    assert_eq!(account.follower_count, Some(50_000));
    assert!(account.reels_complete);
    assert!(account.following_complete);

    assert_eq!(store.count_posts_for_owner(USER_ID).unwrap(), 60);
    assert_eq!(
        store.get_selected_posts("alice").unwrap(),
        vec!["1059", "1058", "1057", "1056", "1055"]
    );

    let post = store.get_post("1042").unwrap().unwrap();
    assert_eq!(post.caption.as_deref(), Some("clip 42"));
    assert_eq!(post.play_count, 420);
    assert_eq!(requests_to(&server, "/v2/user/clips").await, 2);
}

#[tokio::test]
async fn test_zero_posts_sets_both_flags() {
    let server = MockServer::start().await;
    mount_profile(&server, 50_000, 100).await;
    mount_clips(&server, json!({"response": {"items": []}, "next_page_id": null}), None).await;
    Mock::given(method("GET"))
        .and(path("/v2/user/following"))
        .respond_with(ResponseTemplate::new(200).set_body_json(following_body(&[7], None)))
        .expect(0)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let mut store = store_with(&["alice"]);
    let summary = scheduler(&api).run(&mut store).await.expect("crawl succeeds");

    assert_eq!(summary.no_posts, 1);
    let account = store.get_account("alice").unwrap().unwrap();
    assert!(account.reels_complete && account.following_complete);
    assert_eq!(store.count_edges().unwrap(), 0);
    assert!(store.get_selected_posts("alice").unwrap().is_empty());
}

#[tokio::test]
async fn test_first_page_without_media_counts_as_zero_posts() {
    let server = MockServer::start().await;
    mount_profile(&server, 50_000, 100).await;
    mount_clips(
        &server,
        json!({
            "response": {"items": [{"layout": "suggested"}, {"layout": "ad"}]},
            "next_page_id": "page-2"
        }),
        Some(("page-2", clips_body(0..5, None))),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/v2/user/following"))
        .respond_with(ResponseTemplate::new(200).set_body_json(following_body(&[7], None)))
        .expect(0)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let mut store = store_with(&["alice"]);
    let summary = scheduler(&api).run(&mut store).await.expect("crawl succeeds");

    assert_eq!(summary.no_posts, 1);
    let account = store.get_account("alice").unwrap().unwrap();
    assert!(account.reels_complete && account.following_complete);
    assert_eq!(store.count_posts_for_owner(USER_ID).unwrap(), 0);
    assert_eq!(requests_to(&server, "/v2/user/clips").await, 1);
}

#[tokio::test]
async fn test_skip_policy_makes_no_fetcher_calls() {
    let server = MockServer::start().await;
    mount_profile(&server, 50_000, 2000).await;
    Mock::given(method("GET"))
        .and(path("/v2/user/clips"))
        .respond_with(ResponseTemplate::new(200).set_body_json(clips_body(0..5, None)))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/user/following"))
        .respond_with(ResponseTemplate::new(200).set_body_json(following_body(&[7], None)))
        .expect(0)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let mut store = store_with(&["alice"]);
    let summary = scheduler(&api).run(&mut store).await.expect("crawl succeeds");

    assert_eq!(summary.skipped, 1);
    let account = store.get_account("alice").unwrap().unwrap();
    assert!(account.reels_complete && account.following_complete);
    assert_eq!(account.following_count, Some(2000));
}

#[tokio::test]
async fn test_reels_complete_account_gets_no_posts_request() {
    let server = MockServer::start().await;
    mount_profile(&server, 50_000, 100).await;
    Mock::given(method("GET"))
        .and(path("/v2/user/clips"))
        .respond_with(ResponseTemplate::new(200).set_body_json(clips_body(0..5, None)))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/user/following"))
        .respond_with(ResponseTemplate::new(200).set_body_json(following_body(&[7, 8], None)))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let mut store = store_with(&["alice"]);
    store
        .mark_flag("alice", CompletionFlag::Reels, true)
        .unwrap();

    let summary = scheduler(&api).run(&mut store).await.expect("crawl succeeds");

    assert_eq!(summary.edges_inserted, 2);
    assert!(!store.get_account("alice").unwrap().unwrap().is_pending());
}

#[tokio::test]
async fn test_second_crawl_creates_no_duplicates() {
    let server = MockServer::start().await;
    mount_profile(&server, 50_000, 100).await;
    mount_clips(&server, clips_body(0..20, None), None).await;
    Mock::given(method("GET"))
        .and(path("/v2/user/following"))
        .respond_with(ResponseTemplate::new(200).set_body_json(following_body(&[7, 8], None)))
        .mount(&server)
        .await;

    let api = api_for(&server);
    let mut store = store_with(&["alice"]);
    scheduler(&api).run(&mut store).await.expect("first crawl");
    let selected = store.get_selected_posts("alice").unwrap();

    // Reopen both phases so the second crawl refetches everything
    for flag in CompletionFlag::both() {
        store.mark_flag("alice", flag, false).unwrap();
    }
    let second = scheduler(&api).run(&mut store).await.expect("second crawl");

    assert_eq!(second.edges_inserted, 0);
    assert_eq!(store.count_posts_for_owner(USER_ID).unwrap(), 20);
    assert_eq!(store.count_edges().unwrap(), 2);
    assert_eq!(store.get_selected_posts("alice").unwrap(), selected);
    assert!(!store.get_account("alice").unwrap().unwrap().is_pending());

    // Nothing is pending now, so a third crawl sends no requests at all
    let before = server.received_requests().await.unwrap_or_default().len();
    let third = scheduler(&api).run(&mut store).await.expect("third crawl");
    let after = server.received_requests().await.unwrap_or_default().len();
    assert_eq!(third.accounts_processed, 0);
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_profile_server_error_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/user/by/username"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let mut store = store_with(&["alice", "bob"]);
    let err = scheduler(&api).run(&mut store).await.unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(store.get_pending_accounts().unwrap().len(), 2);
}

#[tokio::test]
async fn test_first_posts_page_error_is_fatal() {
    let server = MockServer::start().await;
    mount_profile(&server, 50_000, 100).await;
    Mock::given(method("GET"))
        .and(path("/v2/user/clips"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/user/following"))
        .respond_with(ResponseTemplate::new(200).set_body_json(following_body(&[7], None)))
        .expect(0)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let mut store = store_with(&["alice"]);
    let err = scheduler(&api).run(&mut store).await.unwrap_err();

    assert!(err.is_fatal());
    assert!(!store.get_account("alice").unwrap().unwrap().reels_complete);
}

#[tokio::test]
async fn test_later_posts_page_error_keeps_partial_data() {
    let server = MockServer::start().await;
    mount_profile(&server, 50_000, 100).await;
    Mock::given(method("GET"))
        .and(path("/v2/user/clips"))
        .and(query_param("page_id", "page-2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;
    mount_clips(&server, clips_body(0..30, Some("page-2")), None).await;
    Mock::given(method("GET"))
        .and(path("/v2/user/following"))
        .respond_with(ResponseTemplate::new(200).set_body_json(following_body(&[], None)))
        .mount(&server)
        .await;

    let api = api_for(&server);
    let mut store = store_with(&["alice"]);
    let summary = scheduler(&api).run(&mut store).await.expect("crawl succeeds");

    assert_eq!(summary.posts_saved, 30);
    let account = store.get_account("alice").unwrap().unwrap();
    assert!(account.reels_complete && account.following_complete);
    assert_eq!(store.get_selected_posts("alice").unwrap().len(), 5);
}

#[tokio::test]
async fn test_unknown_account_is_marked_complete() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/user/by/username"))
        .and(query_param("username", "ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "detail": "Target user not found",
            "exc_type": "UserNotFound"
        })))
        .mount(&server)
        .await;
    mount_profile(&server, 50_000, 100).await;
    mount_clips(&server, clips_body(0..3, None), None).await;
    Mock::given(method("GET"))
        .and(path("/v2/user/following"))
        .respond_with(ResponseTemplate::new(200).set_body_json(following_body(&[], None)))
        .mount(&server)
        .await;

    let api = api_for(&server);
    let mut store = store_with(&["ghost", "alice"]);
    let summary = scheduler(&api).run(&mut store).await.expect("crawl succeeds");

    assert_eq!(summary.not_found, 1);
    assert_eq!(summary.accounts_processed, 2);
    let ghost = store.get_account("ghost").unwrap().unwrap();
    assert!(ghost.reels_complete && ghost.following_complete);
    assert!(ghost.account_id.is_none());
    assert_eq!(store.count_posts_for_owner(USER_ID).unwrap(), 3);
}

#[tokio::test]
async fn test_following_pages_until_cursor_ends() {
    let server = MockServer::start().await;
    mount_profile(&server, 50_000, 100).await;
    mount_clips(&server, clips_body(0..3, None), None).await;
    Mock::given(method("GET"))
        .and(path("/v2/user/following"))
        .and(query_param("page_id", "f-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(following_body(&[8, 9], None)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/user/following"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(following_body(&[7, 8], Some("f-2"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let mut store = store_with(&["alice"]);
    let summary = scheduler(&api).run(&mut store).await.expect("crawl succeeds");

    // Edge 100 -> 8 appears on both pages but is stored once
    assert_eq!(summary.edges_inserted, 3);
    assert_eq!(store.count_edges_for(USER_ID).unwrap(), 3);
}

#[tokio::test]
async fn test_empty_following_page_with_cursor_is_terminal() {
    let server = MockServer::start().await;
    mount_profile(&server, 50_000, 100).await;
    mount_clips(&server, clips_body(0..3, None), None).await;
    Mock::given(method("GET"))
        .and(path("/v2/user/following"))
        .respond_with(ResponseTemplate::new(200).set_body_json(following_body(&[], Some("again"))))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let mut store = store_with(&["alice"]);
    scheduler(&api).run(&mut store).await.expect("crawl succeeds");

    assert!(store.get_account("alice").unwrap().unwrap().following_complete);
}
