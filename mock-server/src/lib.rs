//! In-memory stand-in for the Butleren bot API.
//!
//! Serves one seeded guild with its commands, modules, followed channels
//! and shows.
//! A request carrying the [`FAULT_HEADER`] header short-circuits the router
//! so clients can observe server failures and schema drift.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{rejection::JsonRejection, Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// `internal-error` answers 500, `drift` answers 200 with a body missing
/// required fields, `not-json` answers 200 with an HTML page.
pub const FAULT_HEADER: &str = "x-mock-fault";

pub const SEEDED_GUILD: &str = "1";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub slug: String,
    pub description: String,
    pub is_locked: bool,
    pub is_enabled: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toggle {
    pub is_enabled: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub is_locked: bool,
    pub settings: Toggle,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GuildSettings {
    pub nickname: Option<String>,
    pub color: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Guild {
    pub id: String,
    pub name: String,
    #[serde(rename = "iconURL")]
    pub icon_url: Option<String>,
    pub settings: GuildSettings,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwitchNotificationConfig {
    pub id: String,
    pub notification_channel_id: String,
    pub notification_role_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwitchChannel {
    pub id: String,
    pub name: String,
    pub url: String,
    pub notification_config: TwitchNotificationConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YouTubeNotificationConfig {
    pub channel_id: String,
    #[serde(default)]
    pub include_live_streams: bool,
    pub notification_channel_id: String,
    pub notification_role_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YouTubeChannel {
    pub channel_id: String,
    pub name: String,
    pub notification_config: YouTubeNotificationConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KickNotificationConfig {
    pub broadcaster_user_id: u64,
    pub notification_channel_id: String,
    pub notification_role_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KickChannel {
    pub broadcaster_user_id: u64,
    pub name: String,
    pub url: String,
    pub notification_config: KickNotificationConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotifyNotificationConfig {
    pub show_id: String,
    pub notification_channel_id: String,
    pub notification_role_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotifyShow {
    pub show_id: String,
    pub name: String,
    pub notification_config: SpotifyNotificationConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub settings: UserSettings,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserSettings {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub timestamp: String,
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub name: String,
    #[serde(rename = "imageURL")]
    pub image_url: String,
}

/// Channels the mock "streaming services" know about, as `(service, id, name)`.
const CATALOG: &[(&str, &str, &str)] = &[
    ("twitch", "1001", "butlerstream"),
    ("twitch", "1002", "speedrunner"),
    ("youtube", "UCbutler", "Butler Tutorials"),
    ("youtube", "UCmusic", "Lo-fi Radio"),
    ("kick", "77", "kickbutler"),
    ("spotify", "4rOoJ6Egrf8K2IrywzwOMk", "The Butler Podcast"),
];

#[derive(Debug)]
pub struct Store {
    guilds: BTreeMap<String, Guild>,
    commands: Vec<Command>,
    modules: Vec<Module>,
    /// Per-guild overrides keyed by `(guild_id, slug)`.
    command_state: HashMap<(String, String), bool>,
    module_state: HashMap<(String, String), bool>,
    twitch: BTreeMap<String, Vec<TwitchChannel>>,
    youtube: BTreeMap<String, Vec<YouTubeChannel>>,
    kick: BTreeMap<String, Vec<KickChannel>>,
    spotify: BTreeMap<String, Vec<SpotifyShow>>,
    users: Vec<User>,
    logs: Vec<LogEntry>,
}

impl Store {
    pub fn seeded() -> Self {
        let guild = Guild {
            id: SEEDED_GUILD.to_string(),
            name: "Butler HQ".to_string(),
            icon_url: None,
            settings: GuildSettings {
                nickname: None,
                color: "#5865f2".to_string(),
            },
        };
        let command = |slug: &str, description: &str, is_locked: bool| Command {
            slug: slug.to_string(),
            description: description.to_string(),
            is_locked,
            is_enabled: true,
        };
        let module = |slug: &str, name: &str, description: &str| Module {
            slug: slug.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            is_locked: false,
            settings: Toggle { is_enabled: true },
        };
        let log = |timestamp: &str, level: &str, message: &str| LogEntry {
            id: Uuid::new_v4(),
            timestamp: timestamp.to_string(),
            level: level.to_string(),
            service: Some("bot".to_string()),
            message: message.to_string(),
        };

        Self {
            guilds: BTreeMap::from([(guild.id.clone(), guild)]),
            commands: vec![
                command("ping", "Check that the bot is alive", true),
                command("8ball", "Ask the magic 8 ball", false),
                command("weather", "Show the forecast for your location", false),
            ],
            modules: vec![
                module("notifications", "Notifications", "Stream and podcast alerts"),
                module("fun", "Fun", "Games and jokes"),
            ],
            command_state: HashMap::new(),
            module_state: HashMap::new(),
            twitch: BTreeMap::new(),
            youtube: BTreeMap::new(),
            kick: BTreeMap::new(),
            spotify: BTreeMap::new(),
            users: vec![User {
                id: "42".to_string(),
                display_name: "Alfred".to_string(),
                settings: UserSettings {
                    lat: Some(51.5),
                    lon: Some(-0.12),
                },
            }],
            logs: vec![
                log("2024-05-01T08:00:00+00:00", "info", "ready"),
                log("2024-05-01T08:05:12+00:00", "warn", "twitch rate limit reached"),
                log("2024-05-02T09:00:00+00:00", "info", "ready"),
            ],
        }
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::seeded()));
    Router::new()
        .route("/api/commands/{guild_id}", get(list_commands))
        .route("/api/commands/{name}/{guild_id}", put(put_command))
        .route("/api/commands/{name}/{guild_id}/restore", post(restore_command))
        .route("/api/discord/guilds", get(list_guilds))
        .route("/api/discord/guilds/{guild_id}", get(get_guild).put(put_guild))
        .route("/api/modules/{guild_id}", get(list_modules))
        .route("/api/modules/{slug}/{guild_id}", put(put_module))
        .route("/api/twitch/{guild_id}/channels", get(list_twitch).post(add_twitch))
        .route("/api/twitch/{guild_id}/channels/{channel_id}", delete(delete_twitch))
        .route("/api/youtube/{guild_id}/channels", get(list_youtube).post(add_youtube))
        .route("/api/youtube/{guild_id}/channels/{channel_id}", delete(delete_youtube))
        .route("/api/kick/{guild_id}/channels", get(list_kick).post(add_kick))
        .route("/api/kick/{guild_id}/channels/{broadcaster_user_id}", delete(delete_kick))
        .route("/api/spotify/{guild_id}/shows", get(list_spotify).post(add_spotify))
        .route("/api/spotify/{guild_id}/shows/{show_id}", delete(delete_spotify))
        .route("/api/logs", get(get_logs))
        .route("/api/search/{service}", get(search))
        .route("/api/users", get(list_users))
        .layer(middleware::from_fn(inject_fault))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn inject_fault(request: Request, next: Next) -> Response {
    let fault = request
        .headers()
        .get(FAULT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    match fault.as_deref() {
        Some("internal-error") => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Some("drift") => Json(json!([{ "slug": "drifted" }])).into_response(),
        Some("not-json") => (StatusCode::OK, "<html>down for maintenance</html>").into_response(),
        Some(other) => {
            tracing::warn!(fault = other, "unknown fault requested");
            next.run(request).await
        }
        None => next.run(request).await,
    }
}

fn known(service: &str, id: &str) -> Option<&'static str> {
    CATALOG
        .iter()
        .find(|(s, i, _)| *s == service && *i == id)
        .map(|(_, _, name)| *name)
}

async fn list_commands(State(db): State<Db>, Path(guild_id): Path<String>) -> Json<Vec<Command>> {
    let store = db.read().await;
    let commands = store
        .commands
        .iter()
        .map(|c| {
            let key = (guild_id.clone(), c.slug.clone());
            Command {
                is_enabled: store.command_state.get(&key).copied().unwrap_or(c.is_enabled),
                ..c.clone()
            }
        })
        .collect();
    Json(commands)
}

async fn put_command(
    State(db): State<Db>,
    Path((name, guild_id)): Path<(String, String)>,
    body: Result<Json<Toggle>, JsonRejection>,
) -> StatusCode {
    let Ok(Json(toggle)) = body else {
        return StatusCode::BAD_REQUEST;
    };
    let mut store = db.write().await;
    if !store.commands.iter().any(|c| c.slug == name) {
        return StatusCode::NOT_FOUND;
    }
    tracing::info!(%guild_id, command = %name, enabled = toggle.is_enabled, "command toggled");
    store.command_state.insert((guild_id, name), toggle.is_enabled);
    StatusCode::NO_CONTENT
}

async fn restore_command(
    State(db): State<Db>,
    Path((name, guild_id)): Path<(String, String)>,
) -> StatusCode {
    let store = db.read().await;
    if !store.commands.iter().any(|c| c.slug == name) {
        return StatusCode::NOT_FOUND;
    }
    tracing::info!(%guild_id, command = %name, "command restored");
    StatusCode::NO_CONTENT
}

async fn list_guilds(State(db): State<Db>) -> Json<Vec<Guild>> {
    Json(db.read().await.guilds.values().cloned().collect())
}

async fn get_guild(
    State(db): State<Db>,
    Path(guild_id): Path<String>,
) -> Result<Json<Guild>, StatusCode> {
    let store = db.read().await;
    store.guilds.get(&guild_id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn put_guild(
    State(db): State<Db>,
    Path(guild_id): Path<String>,
    body: Result<Json<GuildSettings>, JsonRejection>,
) -> StatusCode {
    let Ok(Json(settings)) = body else {
        return StatusCode::BAD_REQUEST;
    };
    let mut store = db.write().await;
    match store.guilds.get_mut(&guild_id) {
        Some(guild) => {
            guild.settings = settings;
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn list_modules(State(db): State<Db>, Path(guild_id): Path<String>) -> Json<Vec<Module>> {
    let store = db.read().await;
    let modules = store
        .modules
        .iter()
        .map(|m| {
            let key = (guild_id.clone(), m.slug.clone());
            let is_enabled = store
                .module_state
                .get(&key)
                .copied()
                .unwrap_or(m.settings.is_enabled);
            Module {
                settings: Toggle { is_enabled },
                ..m.clone()
            }
        })
        .collect();
    Json(modules)
}

async fn put_module(
    State(db): State<Db>,
    Path((slug, guild_id)): Path<(String, String)>,
    body: Result<Json<Toggle>, JsonRejection>,
) -> StatusCode {
    let Ok(Json(toggle)) = body else {
        return StatusCode::BAD_REQUEST;
    };
    let mut store = db.write().await;
    if !store.modules.iter().any(|m| m.slug == slug) {
        return StatusCode::NOT_FOUND;
    }
    store.module_state.insert((guild_id, slug), toggle.is_enabled);
    StatusCode::NO_CONTENT
}

async fn list_twitch(State(db): State<Db>, Path(guild_id): Path<String>) -> Json<Vec<TwitchChannel>> {
    let store = db.read().await;
    Json(store.twitch.get(&guild_id).cloned().unwrap_or_default())
}

async fn add_twitch(
    State(db): State<Db>,
    Path(guild_id): Path<String>,
    body: Result<Json<TwitchNotificationConfig>, JsonRejection>,
) -> StatusCode {
    let Ok(Json(config)) = body else {
        return StatusCode::BAD_REQUEST;
    };
    let Some(name) = known("twitch", &config.id) else {
        return StatusCode::NOT_FOUND;
    };
    tracing::info!(%guild_id, channel = name, "twitch channel followed");
    let channel = TwitchChannel {
        id: config.id.clone(),
        name: name.to_string(),
        url: format!("https://twitch.tv/{name}"),
        notification_config: config,
    };
    let mut store = db.write().await;
    let followed = store.twitch.entry(guild_id).or_default();
    followed.retain(|c| c.id != channel.id);
    followed.push(channel);
    StatusCode::CREATED
}

async fn delete_twitch(
    State(db): State<Db>,
    Path((guild_id, channel_id)): Path<(String, String)>,
) -> StatusCode {
    let mut store = db.write().await;
    unfollow(&mut store.twitch, &guild_id, |c| c.id == channel_id)
}

async fn list_youtube(State(db): State<Db>, Path(guild_id): Path<String>) -> Json<Vec<YouTubeChannel>> {
    let store = db.read().await;
    Json(store.youtube.get(&guild_id).cloned().unwrap_or_default())
}

async fn add_youtube(
    State(db): State<Db>,
    Path(guild_id): Path<String>,
    body: Result<Json<YouTubeNotificationConfig>, JsonRejection>,
) -> StatusCode {
    let Ok(Json(config)) = body else {
        return StatusCode::BAD_REQUEST;
    };
    let Some(name) = known("youtube", &config.channel_id) else {
        return StatusCode::NOT_FOUND;
    };
    tracing::info!(%guild_id, channel = name, live = config.include_live_streams, "youtube channel followed");
    let channel = YouTubeChannel {
        channel_id: config.channel_id.clone(),
        name: name.to_string(),
        notification_config: config,
    };
    let mut store = db.write().await;
    let followed = store.youtube.entry(guild_id).or_default();
    followed.retain(|c| c.channel_id != channel.channel_id);
    followed.push(channel);
    StatusCode::CREATED
}

async fn delete_youtube(
    State(db): State<Db>,
    Path((guild_id, channel_id)): Path<(String, String)>,
) -> StatusCode {
    let mut store = db.write().await;
    unfollow(&mut store.youtube, &guild_id, |c| c.channel_id == channel_id)
}

async fn list_kick(State(db): State<Db>, Path(guild_id): Path<String>) -> Json<Vec<KickChannel>> {
    let store = db.read().await;
    Json(store.kick.get(&guild_id).cloned().unwrap_or_default())
}

async fn add_kick(
    State(db): State<Db>,
    Path(guild_id): Path<String>,
    body: Result<Json<KickNotificationConfig>, JsonRejection>,
) -> StatusCode {
    let Ok(Json(config)) = body else {
        return StatusCode::BAD_REQUEST;
    };
    let Some(name) = known("kick", &config.broadcaster_user_id.to_string()) else {
        return StatusCode::NOT_FOUND;
    };
    tracing::info!(%guild_id, channel = name, "kick channel followed");
    let channel = KickChannel {
        broadcaster_user_id: config.broadcaster_user_id,
        name: name.to_string(),
        url: format!("https://kick.com/{name}"),
        notification_config: config,
    };
    let mut store = db.write().await;
    let followed = store.kick.entry(guild_id).or_default();
    followed.retain(|c| c.broadcaster_user_id != channel.broadcaster_user_id);
    followed.push(channel);
    StatusCode::CREATED
}

async fn delete_kick(
    State(db): State<Db>,
    Path((guild_id, broadcaster_user_id)): Path<(String, u64)>,
) -> StatusCode {
    let mut store = db.write().await;
    unfollow(&mut store.kick, &guild_id, |c| c.broadcaster_user_id == broadcaster_user_id)
}

async fn list_spotify(State(db): State<Db>, Path(guild_id): Path<String>) -> Json<Vec<SpotifyShow>> {
    let store = db.read().await;
    Json(store.spotify.get(&guild_id).cloned().unwrap_or_default())
}

async fn add_spotify(
    State(db): State<Db>,
    Path(guild_id): Path<String>,
    body: Result<Json<SpotifyNotificationConfig>, JsonRejection>,
) -> StatusCode {
    let Ok(Json(config)) = body else {
        return StatusCode::BAD_REQUEST;
    };
    let Some(name) = known("spotify", &config.show_id) else {
        return StatusCode::NOT_FOUND;
    };
    tracing::info!(%guild_id, show = name, "spotify show followed");
    let show = SpotifyShow {
        show_id: config.show_id.clone(),
        name: name.to_string(),
        notification_config: config,
    };
    let mut store = db.write().await;
    let followed = store.spotify.entry(guild_id).or_default();
    followed.retain(|s| s.show_id != show.show_id);
    followed.push(show);
    StatusCode::CREATED
}

async fn delete_spotify(
    State(db): State<Db>,
    Path((guild_id, show_id)): Path<(String, String)>,
) -> StatusCode {
    let mut store = db.write().await;
    unfollow(&mut store.spotify, &guild_id, |s| s.show_id == show_id)
}

/// Drops the matching entries of one guild; `NOT_FOUND` when nothing matched.
fn unfollow<T>(followed: &mut BTreeMap<String, Vec<T>>, guild_id: &str, matches: impl Fn(&T) -> bool) -> StatusCode {
    let Some(channels) = followed.get_mut(guild_id) else {
        return StatusCode::NOT_FOUND;
    };
    let before = channels.len();
    channels.retain(|c| !matches(c));
    if channels.len() == before {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::NO_CONTENT
    }
}

#[derive(Deserialize)]
struct LogQuery {
    date: String,
}

async fn get_logs(State(db): State<Db>, Query(query): Query<LogQuery>) -> Json<Vec<LogEntry>> {
    let store = db.read().await;
    let entries = store
        .logs
        .iter()
        .filter(|e| e.timestamp.starts_with(&query.date))
        .cloned()
        .collect();
    Json(entries)
}

#[derive(Deserialize)]
struct SearchQuery {
    query: String,
}

async fn search(
    Path(service): Path<String>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<SearchResult>>, StatusCode> {
    if !["youtube", "kick", "twitch", "spotify"].contains(&service.as_str()) {
        return Err(StatusCode::BAD_REQUEST);
    }
    let needle = params.query.to_lowercase();
    let results = CATALOG
        .iter()
        .filter(|(s, _, name)| *s == service && name.to_lowercase().contains(&needle))
        .map(|(_, id, name)| SearchResult {
            id: id.to_string(),
            name: name.to_string(),
            image_url: format!("https://img.example/{service}/{id}.png"),
        })
        .collect();
    Ok(Json(results))
}

async fn list_users(State(db): State<Db>) -> Json<Vec<User>> {
    Json(db.read().await.users.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guild_serializes_icon_url_as_upper_case() {
        let store = Store::seeded();
        let json = serde_json::to_value(&store.guilds[SEEDED_GUILD]).unwrap();
        assert_eq!(json["iconURL"], serde_json::Value::Null);
        assert_eq!(json["settings"]["color"], "#5865f2");
    }

    #[test]
    fn youtube_config_defaults_live_streams_off() {
        let config: YouTubeNotificationConfig = serde_json::from_str(
            r#"{"channelId":"UCbutler","notificationChannelId":"c1","notificationRoleId":null}"#,
        )
        .unwrap();
        assert!(!config.include_live_streams);
    }

    #[test]
    fn catalog_lookup_is_per_service() {
        assert_eq!(known("twitch", "1001"), Some("butlerstream"));
        assert_eq!(known("youtube", "1001"), None);
    }

    #[test]
    fn unfollow_in_unknown_guild_leaves_store_untouched() {
        let mut store = Store::seeded();
        let status = unfollow(&mut store.twitch, "999", |c| c.id == "1001");
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(store.twitch.is_empty());
    }

    #[test]
    fn kick_catalog_is_keyed_by_broadcaster_id() {
        assert_eq!(known("kick", &77u64.to_string()), Some("kickbutler"));
    }

    #[test]
    fn seeded_logs_carry_offsets() {
        let store = Store::seeded();
        assert!(store.logs.iter().all(|e| e.timestamp.ends_with("+00:00")));
    }
}
