//! 集成测试模块
//! 通过 HTTP 处理函数测试解析、下载、交付的完整流程

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::extract::rejection::FormRejection;
    use axum::extract::{ConnectInfo, FromRequest, State};
    use axum::http::{Method, Request};
    use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE, SET_COOKIE, USER_AGENT};
    use axum::http::{HeaderMap, HeaderValue, StatusCode};
    use axum::response::Response;
    use axum::Form;
    use std::net::SocketAddr;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use crate::commands::download::{download, serve_download, DownloadForm};
    use crate::commands::system::{cloudflare_export, health, not_found};
    use crate::commands::youtube::{get_video_info, VideoInfoForm};
    use crate::commands::ClientSession;
    use crate::core::config::ServerConfig;
    use crate::core::engine::RawMediaInfo;
    use crate::core::error_handling::{
        MSG_EXPIRED_ARTIFACT, MSG_INVALID_FORM, MSG_INVALID_URL, MSG_MISSING_FORMAT, MSG_MISSING_SESSION_URL,
        MSG_NOT_FOUND,
    };
    use crate::core::format_selector::{AUDIO_SELECTOR, VIDEO_SELECTOR};
    use crate::core::session::InMemorySessionStore;
    use crate::core::storage::wait_until_removed;
    use crate::core::test_support::{StubEngine, STUB_MEDIA_BYTES};
    use crate::AppState;

    const VIDEO_URL: &str = "https://youtu.be/abcdefghijk";

    /// 创建测试用的应用状态
    fn create_test_state(tmp: &Path, engine: Arc<StubEngine>) -> AppState {
        let mut config = ServerConfig::default();
        config.storage.downloads_root = tmp.join("downloads");
        config.storage.download_log_path = tmp.join("logs/downloads.log");
        config.export.source_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let sessions = Arc::new(InMemorySessionStore::new(config.session.ttl()));
        AppState::with_engine(config, engine, sessions).unwrap()
    }

    fn peer() -> ConnectInfo<SocketAddr> {
        ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 51000)))
    }

    fn browser_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("test-agent/1.0"));
        headers
    }

    fn download_form(format: &str, kind: &str) -> Result<Form<DownloadForm>, FormRejection> {
        Ok(Form(DownloadForm {
            format: Some(format.to_string()),
            kind: Some(kind.to_string()),
            is_playlist: Some("false".to_string()),
        }))
    }

    /// 以错误的 Content-Type 提交表单，取得提取器的拒绝结果
    async fn rejected_form<T>() -> Result<Form<T>, FormRejection>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        let request = Request::builder()
            .method(Method::POST)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"url": "https://youtu.be/abcdefghijk"}"#))
            .unwrap();
        Form::<T>::from_request(request, &()).await
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    async fn resolve(state: &AppState, session: ClientSession, url: &str) -> Response {
        get_video_info(
            State(state.clone()),
            session,
            Ok(Form(VideoInfoForm {
                url: Some(url.to_string()),
            })),
        )
        .await
    }

    fn working_dirs(state: &AppState) -> Vec<PathBuf> {
        std::fs::read_dir(state.downloads_root().path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    #[tokio::test]
    async fn test_audio_end_to_end() {
        crate::utils::logging::init_test_tracing();
        let tmp = tempfile::tempdir().unwrap();
        let engine = Arc::new(StubEngine::titled("Song"));
        let state = create_test_state(tmp.path(), engine.clone());

        // 1. 解析
        let session = ClientSession::fresh();
        let response = resolve(&state, session, VIDEO_URL).await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.contains(&session.id.to_string()));
        let info = body_json(response).await;
        assert_eq!(info["title"], "Song");
        assert_eq!(info["is_playlist"], false);
        assert_eq!(info["video_count"], 1);
        assert_eq!(info["duration"], "3:32");

        // 2. 下载
        let session = ClientSession::existing(session.id);
        let response = download(
            State(state.clone()),
            peer(),
            browser_headers(),
            session,
            download_form(AUDIO_SELECTOR, "audio"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(SET_COOKIE).is_none());
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["download_link"], "/serve_download");
        assert_eq!(body["filename"], "Song.mp3");

        let dirs = working_dirs(&state);
        assert_eq!(dirs.len(), 1);
        assert!(dirs[0].join("Song.mp3").exists());

        let job = &engine.jobs()[0];
        assert_eq!(job.url, VIDEO_URL);
        assert!(!job.allow_collection);
        assert_eq!(job.audio.map(|a| a.codec), Some("mp3"));

        // 3. 交付
        let response = serve_download(State(state.clone()), session).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "audio/mpeg");
        let disposition = response.headers()[CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.starts_with("attachment"));
        assert!(disposition.contains("Song.mp3"));
        assert_eq!(body_bytes(response).await, STUB_MEDIA_BYTES);
        assert!(wait_until_removed(&dirs[0]).await);

        // 4. 第二次请求
        let response = serve_download(State(state.clone()), session).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_bytes(response).await, MSG_EXPIRED_ARTIFACT.as_bytes());

        // 5. 下载日志
        let log = std::fs::read_to_string(tmp.path().join("logs/downloads.log")).unwrap();
        assert_eq!(log.lines().count(), 1);
        assert!(log.contains("Video: Song | IP: 127.0.0.1 | Agent: test-agent/1.0"));
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected_without_engine_call() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = Arc::new(StubEngine::titled("x"));
        let state = create_test_state(tmp.path(), engine.clone());

        let response = resolve(&state, ClientSession::fresh(), "https://example.com/watch?v=abcdefghijk").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(SET_COOKIE).is_none());
        assert_eq!(body_json(response).await["error"], MSG_INVALID_URL);
        assert_eq!(engine.probe_calls(), 0);
    }

    #[tokio::test]
    async fn test_download_requires_resolved_url_and_format() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = Arc::new(StubEngine::titled("x"));
        let state = create_test_state(tmp.path(), engine.clone());
        let session = ClientSession::fresh();

        let response = download(
            State(state.clone()),
            peer(),
            HeaderMap::new(),
            session,
            download_form(VIDEO_SELECTOR, "video"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], MSG_MISSING_SESSION_URL);

        resolve(&state, session, VIDEO_URL).await;
        let response = download(
            State(state.clone()),
            peer(),
            HeaderMap::new(),
            ClientSession::existing(session.id),
            Ok(Form(DownloadForm::default())),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], MSG_MISSING_FORMAT);
        assert_eq!(engine.download_calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_forms_get_json_error() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = Arc::new(StubEngine::titled("x"));
        let state = create_test_state(tmp.path(), engine.clone());

        let response = get_video_info(
            State(state.clone()),
            ClientSession::fresh(),
            rejected_form::<VideoInfoForm>().await,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], MSG_INVALID_FORM);

        let response = download(
            State(state.clone()),
            peer(),
            HeaderMap::new(),
            ClientSession::fresh(),
            rejected_form::<DownloadForm>().await,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], MSG_INVALID_FORM);
        assert_eq!(engine.probe_calls() + engine.download_calls(), 0);
    }

    #[tokio::test]
    async fn test_second_fetch_replaces_undelivered_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = Arc::new(StubEngine::titled("Clip"));
        let state = create_test_state(tmp.path(), engine.clone());
        let session = ClientSession::fresh();
        resolve(&state, session, VIDEO_URL).await;
        let session = ClientSession::existing(session.id);

        let first = download(
            State(state.clone()),
            peer(),
            HeaderMap::new(),
            session,
            download_form(VIDEO_SELECTOR, "video"),
        )
        .await;
        assert_eq!(first.status(), StatusCode::OK);
        let first_dir = working_dirs(&state);
        assert_eq!(first_dir.len(), 1);

        let second = download(
            State(state.clone()),
            peer(),
            HeaderMap::new(),
            session,
            download_form(AUDIO_SELECTOR, "audio"),
        )
        .await;
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(body_json(second).await["filename"], "Clip.mp3");

        let dirs = working_dirs(&state);
        assert_eq!(dirs.len(), 1);
        assert!(!first_dir[0].exists());

        let response = serve_download(State(state.clone()), session).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, STUB_MEDIA_BYTES);
        assert!(wait_until_removed(&dirs[0]).await);
    }

    #[tokio::test]
    async fn test_engine_failure_leaves_no_working_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = Arc::new(StubEngine::failing("ERROR: Video unavailable"));
        let state = create_test_state(tmp.path(), engine);
        let session = ClientSession::fresh();
        state
            .sessions
            .set_resolved_url(session.id, VIDEO_URL.to_string());

        let response = download(
            State(state.clone()),
            peer(),
            HeaderMap::new(),
            ClientSession::existing(session.id),
            download_form(VIDEO_SELECTOR, "video"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await["error"],
            "Download fehlgeschlagen: ERROR: Video unavailable"
        );
        assert!(working_dirs(&state).is_empty());
    }

    #[tokio::test]
    async fn test_playlist_fetch_delivers_one_representative_file() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = RawMediaInfo {
            title: Some("Mix".to_string()),
            entries: Some(vec![
                Some(RawMediaInfo {
                    title: Some("First".to_string()),
                    ..Default::default()
                }),
                None,
                Some(RawMediaInfo {
                    title: Some("Second".to_string()),
                    ..Default::default()
                }),
            ]),
            ..Default::default()
        };
        let engine = Arc::new(StubEngine::with_metadata(raw).writing(&["Second.mp4", "First.mp4"]));
        let state = create_test_state(tmp.path(), engine.clone());
        let session = ClientSession::fresh();

        let info = body_json(
            resolve(&state, session, "https://www.youtube.com/playlist?list=PLabc123").await,
        )
        .await;
        assert_eq!(info["is_playlist"], true);
        assert_eq!(info["playlist_title"], "Mix");
        assert_eq!(info["video_count"], 3);
        assert_eq!(info["title"], "First");

        let response = download(
            State(state.clone()),
            peer(),
            HeaderMap::new(),
            ClientSession::existing(session.id),
            Ok(Form(DownloadForm {
                format: Some(VIDEO_SELECTOR.to_string()),
                kind: Some("video".to_string()),
                is_playlist: Some("true".to_string()),
            })),
        )
        .await;
        let body = body_json(response).await;
        assert_eq!(body["filename"], "First.mp4");
        assert!(engine.jobs()[0].allow_collection);

        let log = std::fs::read_to_string(tmp.path().join("logs/downloads.log")).unwrap();
        assert!(log.contains("Video: Mix | IP: 127.0.0.1 | Agent: Unknown"));
    }

    #[tokio::test]
    async fn test_concurrent_sessions_do_not_leak() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = Arc::new(StubEngine::titled("Same"));
        let state = create_test_state(tmp.path(), engine.clone());
        let a = ClientSession::fresh();
        let b = ClientSession::fresh();

        let (ra, rb) = tokio::join!(
            resolve(&state, a, "https://youtu.be/aaaaaaaaaaa"),
            resolve(&state, b, "https://youtu.be/bbbbbbbbbbb")
        );
        assert_eq!(ra.status(), StatusCode::OK);
        assert_eq!(rb.status(), StatusCode::OK);

        let a = ClientSession::existing(a.id);
        let b = ClientSession::existing(b.id);
        let (ra, rb) = tokio::join!(
            download(
                State(state.clone()),
                peer(),
                HeaderMap::new(),
                a,
                download_form(VIDEO_SELECTOR, "video"),
            ),
            download(
                State(state.clone()),
                peer(),
                HeaderMap::new(),
                b,
                download_form(AUDIO_SELECTOR, "audio"),
            )
        );
        assert_eq!(body_json(ra).await["filename"], "Same.mp4");
        assert_eq!(body_json(rb).await["filename"], "Same.mp3");

        let mut urls: Vec<String> = engine.jobs().into_iter().map(|j| j.url).collect();
        urls.sort();
        assert_eq!(
            urls,
            vec!["https://youtu.be/aaaaaaaaaaa", "https://youtu.be/bbbbbbbbbbb"]
        );
        assert_eq!(working_dirs(&state).len(), 2);

        let response = serve_download(State(state.clone()), a).await;
        assert_eq!(response.headers()[CONTENT_TYPE], "video/mp4");
        body_bytes(response).await;

        let response = serve_download(State(state.clone()), b).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "audio/mpeg");
        body_bytes(response).await;

        let response = serve_download(State(state.clone()), ClientSession::fresh()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_export_and_system_routes() {
        let tmp = tempfile::tempdir().unwrap();
        let state = create_test_state(tmp.path(), Arc::new(StubEngine::titled("x")));

        let response = cloudflare_export(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/zip");
        let bytes = body_bytes(response).await;
        assert!(bytes.starts_with(b"PK"));

        let health = health().await.0;
        assert_eq!(health["status"], "ok");

        let response = not_found().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], MSG_NOT_FOUND);

        for _ in 0..100 {
            if working_dirs(&state).is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(working_dirs(&state).is_empty());
    }
}
