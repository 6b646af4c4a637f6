use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{
    app, Command, Guild, KickChannel, LogEntry, SearchResult, SpotifyShow, TwitchChannel, YouTubeChannel, FAULT_HEADER,
};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

// --- commands ---

#[tokio::test]
async fn list_commands_returns_seeded_set() {
    let resp = app().oneshot(get("/api/commands/1")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let commands: Vec<Command> = body_json(resp).await;
    assert_eq!(commands.len(), 3);
    assert!(commands.iter().all(|c| c.is_enabled));
}

#[tokio::test]
async fn put_unknown_command_returns_404() {
    let resp = app()
        .oneshot(json_request("PUT", "/api/commands/nope/1", r#"{"isEnabled":false}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn put_command_with_bad_body_returns_400() {
    let resp = app()
        .oneshot(json_request("PUT", "/api/commands/8ball/1", r#"{"enabled":false}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn restore_known_command_returns_204() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/commands/ping/1/restore")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

// --- guilds ---

#[tokio::test]
async fn get_guild_not_found() {
    let resp = app().oneshot(get("/api/discord/guilds/999")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_seeded_guild() {
    let resp = app().oneshot(get("/api/discord/guilds/1")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let guild: Guild = body_json(resp).await;
    assert_eq!(guild.name, "Butler HQ");
    assert!(guild.icon_url.is_none());
}

// --- logs and search ---

#[tokio::test]
async fn logs_filter_by_date() {
    let resp = app().oneshot(get("/api/logs?date=2024-05-01")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let entries: Vec<LogEntry> = body_json(resp).await;
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn logs_without_date_returns_400() {
    let resp = app().oneshot(get("/api/logs")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_matches_case_insensitively() {
    let resp = app().oneshot(get("/api/search/twitch?query=BUTLER")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let results: Vec<SearchResult> = body_json(resp).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "1001");
}

#[tokio::test]
async fn search_unknown_service_returns_400() {
    let resp = app().oneshot(get("/api/search/myspace?query=x")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- faults ---

#[tokio::test]
async fn fault_header_forces_500_with_empty_body() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/api/commands/1")
                .header(FAULT_HEADER, "internal-error")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn drift_fault_drops_required_fields() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/api/commands/1")
                .header(FAULT_HEADER, "drift")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let raw: serde_json::Value = body_json(resp).await;
    assert!(raw[0].get("description").is_none());
}

// --- follow lifecycle ---

#[tokio::test]
async fn twitch_follow_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    // follow an unknown channel
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/api/twitch/1/channels",
            r#"{"id":"9999","notificationChannelId":"c1","notificationRoleId":null}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // follow a known channel
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/api/twitch/1/channels",
            r#"{"id":"1001","notificationChannelId":"c1","notificationRoleId":"r1"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    // list
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get("/api/twitch/1/channels"))
        .await
        .unwrap();
    let channels: Vec<TwitchChannel> = body_json(resp).await;
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].name, "butlerstream");
    assert_eq!(channels[0].notification_config.notification_role_id.as_deref(), Some("r1"));

    // delete twice
    let delete = || {
        Request::builder()
            .method("DELETE")
            .uri("/api/twitch/1/channels/1001")
            .body(String::new())
            .unwrap()
    };
    let resp = ServiceExt::ready(&mut app).await.unwrap().call(delete()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = ServiceExt::ready(&mut app).await.unwrap().call(delete()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn youtube_follow_keeps_live_stream_flag() {
    use tower::Service;

    let mut app = app().into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/api/youtube/1/channels",
            r#"{"channelId":"UCbutler","includeLiveStreams":true,"notificationChannelId":"c1","notificationRoleId":null}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get("/api/youtube/1/channels"))
        .await
        .unwrap();
    let channels: Vec<YouTubeChannel> = body_json(resp).await;
    assert!(channels[0].notification_config.include_live_streams);
}

#[tokio::test]
async fn kick_follow_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/api/kick/1/channels",
            r#"{"broadcasterUserId":77,"notificationChannelId":"c1","notificationRoleId":null}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get("/api/kick/1/channels"))
        .await
        .unwrap();
    let channels: Vec<KickChannel> = body_json(resp).await;
    assert_eq!(channels[0].name, "kickbutler");
    assert_eq!(channels[0].url, "https://kick.com/kickbutler");

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(
            Request::builder()
                .method("DELETE")
                .uri("/api/kick/1/channels/77")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn spotify_follow_unknown_show_returns_404() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/api/spotify/1/shows",
            r#"{"showId":"nope","notificationChannelId":"c1","notificationRoleId":null}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn spotify_shows_start_empty() {
    let resp = app().oneshot(get("/api/spotify/1/shows")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let shows: Vec<SpotifyShow> = body_json(resp).await;
    assert!(shows.is_empty());
}

#[tokio::test]
async fn unfollow_in_unknown_guild_returns_404() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/youtube/999/channels/UCbutler")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
