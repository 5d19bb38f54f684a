//! Integration tests for the download manager
//!
//! A wiremock server plays the media origin; files land in a temporary
//! directory and outcomes are checked in an in-memory status store.

use reel_harvester::download::{part_path, DownloadManager, DownloadSettings, HttpMediaSource};
use reel_harvester::retry::{DelayRange, RetryPolicy};
use reel_harvester::storage::{PostRecord, ProfileRecord, SqliteStore, StatusStore};
use reel_harvester::PostStatus;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OWNER_ID: &str = "100";

fn settings(dir: &Path) -> DownloadSettings {
    DownloadSettings {
        max_concurrent: 5,
        failure_threshold: 3,
        cooldown: Duration::ZERO,
        media_dir: dir.join("reels"),
        thumbnail_dir: dir.join("thumbnails"),
        account_delay: DelayRange::none(),
    }
}

fn source() -> HttpMediaSource {
    HttpMediaSource::new(reqwest::Client::new(), 64 * 1024)
}

fn post(server: &MockServer, id: &str, with_thumbnail: bool) -> PostRecord {
    PostRecord {
        id: id.to_string(),
        owner_id: OWNER_ID.to_string(),
        code: None,
        caption: None,
        taken_at: None,
        play_count: 100,
        like_count: 0,
        comment_count: 0,
        video_url: Some(format!("{}/media/{}.mp4", server.uri(), id)),
        thumbnail_url: with_thumbnail.then(|| format!("{}/thumbs/{}.jpg", server.uri(), id)),
        downloaded: false,
        unavailable: false,
    }
}

/// Seeds one account whose selected set is exactly `posts`, in order
fn seed(store: &mut SqliteStore, handle: &str, owner_id: &str, posts: &[PostRecord]) {
    store.insert_handles(&[handle.to_string()]).unwrap();
    store
        .upsert_profile(&ProfileRecord {
            handle: handle.to_string(),
            account_id: owner_id.to_string(),
            full_name: None,
            biography: None,
            follower_count: 50_000,
            following_count: 100,
            profile_pic_url: None,
            profile_url: format!("https://www.instagram.com/{}/", handle),
        })
        .unwrap();
    store.upsert_posts(owner_id, posts).unwrap();
    let ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();
    store.set_selected_posts(handle, &ids).unwrap();
}

async fn serve(server: &MockServer, route: &str, status: u16, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

fn status_of(store: &SqliteStore, id: &str) -> PostStatus {
    store.get_post(id).unwrap().unwrap().status()
}

#[tokio::test]
async fn test_local_file_present_skips_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/1.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"video".to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("reels")).unwrap();
    std::fs::write(dir.path().join("reels").join("1.mp4"), b"existing").unwrap();

    let mut store = SqliteStore::open_in_memory().unwrap();
    seed(&mut store, "alice", OWNER_ID, &[post(&server, "1", false)]);

    let media = source();
    let manager = DownloadManager::new(&media, settings(dir.path()), RetryPolicy::immediate(1));
    let summary = manager.run(&mut store).await.unwrap();

    assert_eq!(summary.totals.already_present, 1);
    assert_eq!(summary.totals.downloaded, 0);
    assert_eq!(status_of(&store, "1"), PostStatus::Downloaded);
    assert_eq!(
        std::fs::read(dir.path().join("reels").join("1.mp4")).unwrap(),
        b"existing"
    );
}

#[tokio::test]
async fn test_three_failures_then_success() {
    let server = MockServer::start().await;
    for id in ["1", "2", "3"] {
        serve(&server, &format!("/media/{}.mp4", id), 404, b"").await;
    }
    serve(&server, "/media/4.mp4", 200, b"video-4").await;

    let dir = tempfile::tempdir().unwrap();
    let mut store = SqliteStore::open_in_memory().unwrap();
    let posts: Vec<PostRecord> = ["1", "2", "3", "4"]
        .iter()
        .map(|id| post(&server, id, false))
        .collect();
    seed(&mut store, "alice", OWNER_ID, &posts);

    let media = source();
    let manager = DownloadManager::new(&media, settings(dir.path()), RetryPolicy::immediate(1));
    let report = manager.download_posts(&mut store, &posts).await.unwrap();

    assert_eq!(report.downloaded, 1);
    assert_eq!(report.unavailable, 3);
    for id in ["1", "2", "3"] {
        assert_eq!(status_of(&store, id), PostStatus::Unavailable);
        assert!(!manager.media_path(id).exists());
    }
    assert_eq!(status_of(&store, "4"), PostStatus::Downloaded);

    let written = manager.media_path("4");
    assert_eq!(std::fs::read(&written).unwrap(), b"video-4");
    assert!(!part_path(&written).exists());
}

#[tokio::test]
async fn test_failures_across_batches_share_one_streak() {
    let server = MockServer::start().await;
    serve(&server, "/media/1.mp4", 200, b"ok").await;
    serve(&server, "/media/2.mp4", 500, b"").await;
    serve(&server, "/media/3.mp4", 500, b"").await;
    serve(&server, "/media/4.mp4", 200, b"ok").await;
    serve(&server, "/media/5.mp4", 403, b"").await;

    let dir = tempfile::tempdir().unwrap();
    let mut store = SqliteStore::open_in_memory().unwrap();
    let posts: Vec<PostRecord> = ["1", "2", "3", "4", "5"]
        .iter()
        .map(|id| post(&server, id, false))
        .collect();
    seed(&mut store, "alice", OWNER_ID, &posts);

    let media = source();
    let mut batches_of_two = settings(dir.path());
    batches_of_two.max_concurrent = 2;
    let manager = DownloadManager::new(&media, batches_of_two, RetryPolicy::immediate(1));
    manager.download_posts(&mut store, &posts).await.unwrap();

    assert_eq!(status_of(&store, "1"), PostStatus::Downloaded);
    assert_eq!(status_of(&store, "2"), PostStatus::Unavailable);
    assert_eq!(status_of(&store, "3"), PostStatus::Unavailable);
    assert_eq!(status_of(&store, "4"), PostStatus::Downloaded);
    // Trailing failure is flushed when the work-list ends
    assert_eq!(status_of(&store, "5"), PostStatus::Unavailable);
}

#[tokio::test]
async fn test_transient_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/1.mp4"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    serve(&server, "/media/1.mp4", 200, b"second try").await;

    let dir = tempfile::tempdir().unwrap();
    let mut store = SqliteStore::open_in_memory().unwrap();
    let posts = vec![post(&server, "1", false)];
    seed(&mut store, "alice", OWNER_ID, &posts);

    let media = source();
    let manager = DownloadManager::new(&media, settings(dir.path()), RetryPolicy::immediate(2));
    let report = manager.download_posts(&mut store, &posts).await.unwrap();

    assert_eq!(report.downloaded, 1);
    assert_eq!(status_of(&store, "1"), PostStatus::Downloaded);
    assert_eq!(
        std::fs::read(manager.media_path("1")).unwrap(),
        b"second try"
    );
}

#[tokio::test]
async fn test_thumbnail_downloaded_alongside_video() {
    let server = MockServer::start().await;
    serve(&server, "/media/1.mp4", 200, b"video").await;
    serve(&server, "/thumbs/1.jpg", 200, b"jpeg").await;
    serve(&server, "/media/2.mp4", 200, b"video").await;
    serve(&server, "/thumbs/2.jpg", 404, b"").await;

    let dir = tempfile::tempdir().unwrap();
    let mut store = SqliteStore::open_in_memory().unwrap();
    let posts = vec![post(&server, "1", true), post(&server, "2", true)];
    seed(&mut store, "alice", OWNER_ID, &posts);

    let media = source();
    let manager = DownloadManager::new(&media, settings(dir.path()), RetryPolicy::immediate(1));
    let report = manager.download_posts(&mut store, &posts).await.unwrap();

    assert_eq!(report.downloaded, 2);
    assert_eq!(report.thumbnails, 1);
    assert_eq!(std::fs::read(manager.thumbnail_path("1")).unwrap(), b"jpeg");
    // A missing thumbnail never affects the post's status
    assert_eq!(status_of(&store, "2"), PostStatus::Downloaded);
}

#[tokio::test]
async fn test_run_visits_only_pending_selected_posts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/1.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"one".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/2.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"two".to_vec()))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/3.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"three".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut store = SqliteStore::open_in_memory().unwrap();
    seed(
        &mut store,
        "alice",
        OWNER_ID,
        &[post(&server, "1", false), post(&server, "2", false)],
    );
    seed(&mut store, "bob", "200", &[post(&server, "3", false)]);
    store.mark_unavailable("2").unwrap();

    let media = source();
    let manager = DownloadManager::new(&media, settings(dir.path()), RetryPolicy::immediate(1));

    let first = manager.run(&mut store).await.unwrap();
    assert_eq!(first.accounts, 2);
    assert_eq!(first.totals.downloaded, 2);

    // Every selected post is terminal now; a second pass does nothing
    let second = manager.run(&mut store).await.unwrap();
    assert_eq!(second.accounts, 0);
    assert_eq!(status_of(&store, "2"), PostStatus::Unavailable);
}
