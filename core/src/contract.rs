//! The Butleren guild-bot API contract.
//!
//! # Design
//! One canonical contract version: notification settings are nested under
//! `notificationConfig`, and every object schema is passthrough so extra
//! vendor fields survive validation. Schemas are built once in [`Schemas`]
//! and shared by `Arc` between the endpoints that return them.

use std::sync::Arc;

use serde_json::json;

use crate::descriptor::EndpointDescriptor;
use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::registry::Registry;
use crate::schema::{ObjectSchema, Schema, SchemaRef};

/// Registry keys for every endpoint in the contract.
pub mod alias {
    pub const LIST_COMMANDS: &str = "getApicommandsGuildId";
    pub const PUT_COMMAND: &str = "putApicommandsNameGuildId";
    pub const RESTORE_COMMAND: &str = "postApicommandsNameGuildIdrestore";
    pub const LIST_GUILDS: &str = "getApidiscordguilds";
    pub const GET_GUILD: &str = "getApidiscordguildsGuildId";
    pub const PUT_GUILD: &str = "putApidiscordguildsGuildId";
    pub const LIST_KICK_CHANNELS: &str = "getApikickGuildIdchannels";
    pub const ADD_KICK_CHANNEL: &str = "postApikickGuildIdchannels";
    pub const DELETE_KICK_CHANNEL: &str = "deleteApikickGuildIdchannelsBroadcasterUserId";
    pub const GET_LOGS: &str = "getApilogs";
    pub const LIST_MODULES: &str = "getApimodulesGuildId";
    pub const PUT_MODULE: &str = "putApimodulesSlugGuildId";
    pub const SEARCH: &str = "getApisearchService";
    pub const LIST_SPOTIFY_SHOWS: &str = "getApispotifyGuildIdshows";
    pub const ADD_SPOTIFY_SHOW: &str = "postApispotifyGuildIdshows";
    pub const DELETE_SPOTIFY_SHOW: &str = "deleteApispotifyGuildIdshowsShowId";
    pub const LIST_TWITCH_CHANNELS: &str = "getApitwitchGuildIdchannels";
    pub const ADD_TWITCH_CHANNEL: &str = "postApitwitchGuildIdchannels";
    pub const DELETE_TWITCH_CHANNEL: &str = "deleteApitwitchGuildIdchannelsChannelId";
    pub const LIST_USERS: &str = "getApiusers";
    pub const LIST_YOUTUBE_CHANNELS: &str = "getApiyoutubeGuildIdchannels";
    pub const ADD_YOUTUBE_CHANNEL: &str = "postApiyoutubeGuildIdchannels";
    pub const DELETE_YOUTUBE_CHANNEL: &str = "deleteApiyoutubeGuildIdchannelsChannelId";
}

/// Every named schema of the contract.
#[derive(Debug, Clone)]
pub struct Schemas {
    pub guild_settings: SchemaRef,
    pub guild: SchemaRef,
    pub user_settings: SchemaRef,
    pub user: SchemaRef,
    pub log_entry: SchemaRef,
    pub search_result: SchemaRef,
    pub module_settings: SchemaRef,
    pub module: SchemaRef,
    pub command: SchemaRef,
    pub command_settings: SchemaRef,
    pub twitch_notification_config: SchemaRef,
    pub twitch_channel: SchemaRef,
    pub kick_notification_config: SchemaRef,
    pub kick_channel: SchemaRef,
    pub youtube_notification_config: SchemaRef,
    pub youtube_channel: SchemaRef,
    pub spotify_notification_config: SchemaRef,
    pub spotify_show: SchemaRef,
    pub chat_request_body: SchemaRef,
    pub guild_db_entry: SchemaRef,
    pub user_db_entry: SchemaRef,
    pub module_db_entry: SchemaRef,
    pub command_db_entry: SchemaRef,
    pub twitch_channel_db_entry: SchemaRef,
    pub kick_channel_db_entry: SchemaRef,
    pub youtube_channel_db_entry: SchemaRef,
    pub spotify_show_db_entry: SchemaRef,
}

fn object(name: &str) -> ObjectSchema {
    ObjectSchema::passthrough().named(name)
}

fn toggle(name: &str) -> SchemaRef {
    object(name).field("isEnabled", Schema::boolean()).build().shared()
}

/// SQLite stores booleans as 0/1.
fn sqlite_bool() -> Schema {
    Schema::union([Schema::literal(0), Schema::literal(1)])
}

fn owned_by_guild() -> Schema {
    ObjectSchema::passthrough().field("guildId", Schema::string()).build()
}

impl Schemas {
    pub fn new() -> Self {
        let guild_settings = object("GuildSettings")
            .field("nickname", Schema::string().nullable())
            .field("color", Schema::string())
            .build()
            .shared();

        let channel = ObjectSchema::passthrough()
            .field("id", Schema::string())
            .field("name", Schema::string())
            .field(
                "type",
                Schema::enumeration(["ANNOUNCEMENT", "TEXT", "VOICE", "CATEGORY"]),
            )
            .partial()
            .build();
        let role = ObjectSchema::passthrough()
            .field("id", Schema::string())
            .field("name", Schema::string())
            .partial()
            .build();
        let guild = object("Guild")
            .field("id", Schema::string())
            .field("name", Schema::string())
            .field("iconURL", Schema::string().nullable())
            .field("settings", Arc::clone(&guild_settings))
            .optional_field("channels", Schema::array(channel))
            .optional_field("roles", Schema::array(role))
            .build()
            .shared();

        let user_settings = object("UserSettings")
            .field("lat", Schema::number().nullable())
            .field("lon", Schema::number().nullable())
            .build()
            .shared();
        let user = object("User")
            .field("id", Schema::string())
            .field("displayName", Schema::string())
            .field("settings", Arc::clone(&user_settings))
            .build()
            .shared();

        let log_entry = object("LogEntry")
            .field("id", Schema::string())
            .field("timestamp", Schema::datetime_offset())
            .field("level", Schema::enumeration(["info", "warn", "error", "debug"]))
            .optional_field("service", Schema::string())
            .field("message", Schema::string())
            .optional_field("rest", Schema::array(Schema::string()))
            .build()
            .shared();

        let search_result = object("SearchResult")
            .field("id", Schema::string())
            .field("name", Schema::string())
            .field("imageURL", Schema::string())
            .build()
            .shared();

        let module_settings = toggle("ModuleSettings");
        let module = object("Module")
            .field("slug", Schema::string())
            .field("name", Schema::string())
            .field("description", Schema::string())
            .field("isLocked", Schema::boolean())
            .field("settings", Arc::clone(&module_settings))
            .build()
            .shared();

        let command = object("Command")
            .field("slug", Schema::string())
            .field("description", Schema::string())
            .field("isLocked", Schema::boolean())
            .field("isEnabled", Schema::boolean())
            .build()
            .shared();
        let command_settings = toggle("CommandSettings");

        let twitch_notification_config = object("TwitchNotificationConfig")
            .field("id", Schema::string_min(1))
            .field("notificationChannelId", Schema::string())
            .field("notificationRoleId", Schema::string().nullable())
            .build()
            .shared();
        let twitch_channel = object("TwitchChannel")
            .field("id", Schema::string())
            .field("name", Schema::string())
            .optional_field("description", Schema::string())
            .field("url", Schema::string())
            .field("notificationConfig", Arc::clone(&twitch_notification_config))
            .build()
            .shared();

        let kick_notification_config = object("KickNotificationConfig")
            .field("broadcasterUserId", Schema::number_gte(1.0))
            .field("notificationChannelId", Schema::string())
            .field("notificationRoleId", Schema::string().nullable())
            .build()
            .shared();
        let kick_channel = object("KickChannel")
            .field("broadcasterUserId", Schema::number())
            .field("name", Schema::string())
            .optional_field("description", Schema::string())
            .field("url", Schema::string())
            .field("notificationConfig", Arc::clone(&kick_notification_config))
            .build()
            .shared();

        let youtube_notification_config = object("YouTubeNotificationConfig")
            .field("channelId", Schema::string_min(1))
            .default_field("includeLiveStreams", Schema::boolean(), json!(false))
            .field("notificationChannelId", Schema::string())
            .field("notificationRoleId", Schema::string().nullable())
            .build()
            .shared();
        let youtube_channel = object("YouTubeChannel")
            .field("channelId", Schema::string())
            .field("name", Schema::string())
            .field("notificationConfig", Arc::clone(&youtube_notification_config))
            .build()
            .shared();

        let spotify_notification_config = object("SpotifyNotificationConfig")
            .field("showId", Schema::string_min(1))
            .field("notificationChannelId", Schema::string())
            .field("notificationRoleId", Schema::string().nullable())
            .build()
            .shared();
        let spotify_show = object("SpotifyShow")
            .field("showId", Schema::string())
            .field("name", Schema::string())
            .field("notificationConfig", Arc::clone(&spotify_notification_config))
            .build()
            .shared();

        let chat_request_body = object("ChatRequestBody")
            .field("message", Schema::string())
            .build()
            .shared();

        let guild_db_entry = Schema::intersection([
            Arc::clone(&guild_settings),
            ObjectSchema::passthrough().field("id", Schema::string()).build().shared(),
        ])
        .shared();
        let user_db_entry = Schema::intersection([
            Arc::clone(&user_settings),
            ObjectSchema::passthrough().field("id", Schema::string()).build().shared(),
        ])
        .shared();
        let module_db_entry = object("ModuleDBEntry")
            .field("guildId", Schema::string())
            .field("slug", Schema::string())
            .field("isEnabled", sqlite_bool())
            .build()
            .shared();
        let command_db_entry = object("CommandDBEntry")
            .field("guildId", Schema::string())
            .field("slug", Schema::string())
            .field("isEnabled", sqlite_bool())
            .build()
            .shared();
        let twitch_channel_db_entry =
            Schema::intersection([Arc::clone(&twitch_notification_config), owned_by_guild().shared()])
                .shared();
        let kick_channel_db_entry =
            Schema::intersection([Arc::clone(&kick_notification_config), owned_by_guild().shared()])
                .shared();
        let youtube_channel_db_entry = object("YouTubeChannelDBEntry")
            .field("channelId", Schema::string())
            .field("guildId", Schema::string())
            .field("includeLiveStreams", sqlite_bool())
            .field("notificationChannelId", Schema::string())
            .field("notificationRoleId", Schema::string().nullable())
            .build()
            .shared();
        let spotify_show_db_entry =
            Schema::intersection([Arc::clone(&spotify_notification_config), owned_by_guild().shared()])
                .shared();

        Self {
            guild_settings,
            guild,
            user_settings,
            user,
            log_entry,
            search_result,
            module_settings,
            module,
            command,
            command_settings,
            twitch_notification_config,
            twitch_channel,
            kick_notification_config,
            kick_channel,
            youtube_notification_config,
            youtube_channel,
            spotify_notification_config,
            spotify_show,
            chat_request_body,
            guild_db_entry,
            user_db_entry,
            module_db_entry,
            command_db_entry,
            twitch_channel_db_entry,
            kick_channel_db_entry,
            youtube_channel_db_entry,
            spotify_show_db_entry,
        }
    }

    /// Named schemas, in declaration order.
    pub fn catalog(&self) -> Vec<(&'static str, SchemaRef)> {
        vec![
            ("GuildSettings", Arc::clone(&self.guild_settings)),
            ("Guild", Arc::clone(&self.guild)),
            ("UserSettings", Arc::clone(&self.user_settings)),
            ("User", Arc::clone(&self.user)),
            ("LogEntry", Arc::clone(&self.log_entry)),
            ("SearchResult", Arc::clone(&self.search_result)),
            ("ModuleSettings", Arc::clone(&self.module_settings)),
            ("Module", Arc::clone(&self.module)),
            ("Command", Arc::clone(&self.command)),
            ("CommandSettings", Arc::clone(&self.command_settings)),
            ("TwitchNotificationConfig", Arc::clone(&self.twitch_notification_config)),
            ("TwitchChannel", Arc::clone(&self.twitch_channel)),
            ("KickNotificationConfig", Arc::clone(&self.kick_notification_config)),
            ("KickChannel", Arc::clone(&self.kick_channel)),
            ("YouTubeNotificationConfig", Arc::clone(&self.youtube_notification_config)),
            ("YouTubeChannel", Arc::clone(&self.youtube_channel)),
            ("SpotifyNotificationConfig", Arc::clone(&self.spotify_notification_config)),
            ("SpotifyShow", Arc::clone(&self.spotify_show)),
            ("ChatRequestBody", Arc::clone(&self.chat_request_body)),
            ("GuildDBEntry", Arc::clone(&self.guild_db_entry)),
            ("UserDBEntry", Arc::clone(&self.user_db_entry)),
            ("ModuleDBEntry", Arc::clone(&self.module_db_entry)),
            ("CommandDBEntry", Arc::clone(&self.command_db_entry)),
            ("TwitchChannelDBEntry", Arc::clone(&self.twitch_channel_db_entry)),
            ("KickChannelDBEntry", Arc::clone(&self.kick_channel_db_entry)),
            ("YouTubeChannelDBEntry", Arc::clone(&self.youtube_channel_db_entry)),
            ("SpotifyShowDBEntry", Arc::clone(&self.spotify_show_db_entry)),
        ]
    }
}

impl Default for Schemas {
    fn default() -> Self {
        Self::new()
    }
}

/// Every named schema of a freshly built [`Schemas`], in declaration order.
pub fn schema_catalog() -> Vec<(&'static str, SchemaRef)> {
    Schemas::new().catalog()
}

const BAD_REQUEST: &str = "Bad request";
const INTERNAL_ERROR: &str = "Internal server error";

/// Builds the registry holding every endpoint of the contract.
pub fn registry() -> Result<Registry, ApiError> {
    registry_with(&Schemas::new())
}

/// Builds the registry from an existing schema set, sharing its schemas.
pub fn registry_with(s: &Schemas) -> Result<Registry, ApiError> {
    let void = Schema::void().shared();
    let id = Schema::string;
    let mut registry = Registry::new();

    let endpoints = [
        EndpointDescriptor::builder(HttpMethod::Get, "/api/commands/:guildId", alias::LIST_COMMANDS)
            .description("List the commands available in a guild")
            .path_param("guildId", id())
            .response(Schema::array(Arc::clone(&s.command)))
            .error(500, INTERNAL_ERROR, Arc::clone(&void)),
        EndpointDescriptor::builder(HttpMethod::Put, "/api/commands/:name/:guildId", alias::PUT_COMMAND)
            .description("Enable or disable a command in a guild")
            .body(Arc::clone(&s.command_settings))
            .path_param("guildId", id())
            .path_param("name", id())
            .error(404, "Command not found", Arc::clone(&void))
            .error(500, INTERNAL_ERROR, Arc::clone(&void)),
        EndpointDescriptor::builder(
            HttpMethod::Post,
            "/api/commands/:name/:guildId/restore",
            alias::RESTORE_COMMAND,
        )
        .description("Re-register a command with Discord")
        .path_param("guildId", id())
        .path_param("name", id())
        .error(404, "Command not found", Arc::clone(&void))
        .error(500, INTERNAL_ERROR, Arc::clone(&void)),
        EndpointDescriptor::builder(HttpMethod::Get, "/api/discord/guilds", alias::LIST_GUILDS)
            .description("List the guilds the bot is a member of")
            .response(Schema::array(Arc::clone(&s.guild)))
            .error(500, INTERNAL_ERROR, Arc::clone(&void)),
        EndpointDescriptor::builder(HttpMethod::Get, "/api/discord/guilds/:guildId", alias::GET_GUILD)
            .description("Fetch one guild")
            .path_param("guildId", id())
            .response(Arc::clone(&s.guild))
            .error(404, "Guild not found", Arc::clone(&void))
            .error(500, INTERNAL_ERROR, Arc::clone(&void)),
        EndpointDescriptor::builder(HttpMethod::Put, "/api/discord/guilds/:guildId", alias::PUT_GUILD)
            .description("Update the bot's settings in a guild")
            .body(Arc::clone(&s.guild_settings))
            .path_param("guildId", id())
            .error(404, "Guild not found", Arc::clone(&void))
            .error(500, INTERNAL_ERROR, Arc::clone(&void)),
        EndpointDescriptor::builder(HttpMethod::Get, "/api/kick/:guildId/channels", alias::LIST_KICK_CHANNELS)
            .description("List Kick channels followed in a guild")
            .path_param("guildId", id())
            .response(Schema::array(Arc::clone(&s.kick_channel)))
            .error(500, INTERNAL_ERROR, Arc::clone(&void)),
        EndpointDescriptor::builder(HttpMethod::Post, "/api/kick/:guildId/channels", alias::ADD_KICK_CHANNEL)
            .description("Follow a Kick channel")
            .body(Arc::clone(&s.kick_notification_config))
            .path_param("guildId", id())
            .error(400, BAD_REQUEST, Arc::clone(&void))
            .error(404, "Channel not found", Arc::clone(&void))
            .error(500, INTERNAL_ERROR, Arc::clone(&void)),
        EndpointDescriptor::builder(
            HttpMethod::Delete,
            "/api/kick/:guildId/channels/:broadcasterUserId",
            alias::DELETE_KICK_CHANNEL,
        )
        .description("Stop following a Kick channel")
        .path_param("guildId", id())
        .path_param("broadcasterUserId", Schema::integer())
        .error(404, "Channel not found", Arc::clone(&void))
        .error(500, INTERNAL_ERROR, Arc::clone(&void)),
        EndpointDescriptor::builder(HttpMethod::Get, "/api/logs", alias::GET_LOGS)
            .description("Read the bot's log entries for one day")
            .query_param("date", Schema::string())
            .response(Schema::array(Arc::clone(&s.log_entry))),
        EndpointDescriptor::builder(HttpMethod::Get, "/api/modules/:guildId", alias::LIST_MODULES)
            .description("List the modules available in a guild")
            .path_param("guildId", id())
            .response(Schema::array(Arc::clone(&s.module)))
            .error(500, INTERNAL_ERROR, Arc::clone(&void)),
        EndpointDescriptor::builder(HttpMethod::Put, "/api/modules/:slug/:guildId", alias::PUT_MODULE)
            .description("Enable or disable a module in a guild")
            .body(Arc::clone(&s.module_settings))
            .path_param("guildId", id())
            .path_param("slug", id())
            .error(404, "Module not found", Arc::clone(&void))
            .error(500, INTERNAL_ERROR, Arc::clone(&void)),
        EndpointDescriptor::builder(HttpMethod::Get, "/api/search/:service", alias::SEARCH)
            .description("Search a streaming service for channels or shows")
            .path_param("service", Schema::enumeration(["youtube", "kick", "twitch", "spotify"]))
            .query_param("query", Schema::string())
            .response(Schema::array(Arc::clone(&s.search_result)))
            .error(400, BAD_REQUEST, Arc::clone(&void))
            .error(500, INTERNAL_ERROR, Arc::clone(&void)),
        EndpointDescriptor::builder(HttpMethod::Get, "/api/spotify/:guildId/shows", alias::LIST_SPOTIFY_SHOWS)
            .description("List Spotify shows followed in a guild")
            .path_param("guildId", id())
            .response(Schema::array(Arc::clone(&s.spotify_show)))
            .error(500, INTERNAL_ERROR, Arc::clone(&void)),
        EndpointDescriptor::builder(HttpMethod::Post, "/api/spotify/:guildId/shows", alias::ADD_SPOTIFY_SHOW)
            .description("Follow a Spotify show")
            .body(Arc::clone(&s.spotify_notification_config))
            .path_param("guildId", id())
            .error(400, BAD_REQUEST, Arc::clone(&void))
            .error(404, "Channel not found", Arc::clone(&void))
            .error(500, INTERNAL_ERROR, Arc::clone(&void)),
        EndpointDescriptor::builder(
            HttpMethod::Delete,
            "/api/spotify/:guildId/shows/:showId",
            alias::DELETE_SPOTIFY_SHOW,
        )
        .description("Stop following a Spotify show")
        .path_param("guildId", id())
        .path_param("showId", id())
        .error(404, "Channel not found", Arc::clone(&void))
        .error(500, INTERNAL_ERROR, Arc::clone(&void)),
        EndpointDescriptor::builder(HttpMethod::Get, "/api/twitch/:guildId/channels", alias::LIST_TWITCH_CHANNELS)
            .description("List Twitch channels followed in a guild")
            .path_param("guildId", id())
            .response(Schema::array(Arc::clone(&s.twitch_channel)))
            .error(500, INTERNAL_ERROR, Arc::clone(&void)),
        EndpointDescriptor::builder(HttpMethod::Post, "/api/twitch/:guildId/channels", alias::ADD_TWITCH_CHANNEL)
            .description("Follow a Twitch channel")
            .body(Arc::clone(&s.twitch_notification_config))
            .path_param("guildId", id())
            .error(400, BAD_REQUEST, Arc::clone(&void))
            .error(404, "Channel not found", Arc::clone(&void))
            .error(500, INTERNAL_ERROR, Arc::clone(&void)),
        EndpointDescriptor::builder(
            HttpMethod::Delete,
            "/api/twitch/:guildId/channels/:channelId",
            alias::DELETE_TWITCH_CHANNEL,
        )
        .description("Stop following a Twitch channel")
        .path_param("guildId", id())
        .path_param("channelId", id())
        .error(404, "Channel not found", Arc::clone(&void))
        .error(500, INTERNAL_ERROR, Arc::clone(&void)),
        EndpointDescriptor::builder(HttpMethod::Get, "/api/users", alias::LIST_USERS)
            .description("List users known to the bot")
            .response(Schema::array(Arc::clone(&s.user)))
            .error(500, INTERNAL_ERROR, Arc::clone(&void)),
        EndpointDescriptor::builder(
            HttpMethod::Get,
            "/api/youtube/:guildId/channels",
            alias::LIST_YOUTUBE_CHANNELS,
        )
        .description("List YouTube channels followed in a guild")
        .path_param("guildId", id())
        .response(Schema::array(Arc::clone(&s.youtube_channel)))
        .error(500, INTERNAL_ERROR, Arc::clone(&void)),
        EndpointDescriptor::builder(
            HttpMethod::Post,
            "/api/youtube/:guildId/channels",
            alias::ADD_YOUTUBE_CHANNEL,
        )
        .description("Follow a YouTube channel")
        .body(Arc::clone(&s.youtube_notification_config))
        .path_param("guildId", id())
        .error(400, BAD_REQUEST, Arc::clone(&void))
        .error(404, "Channel not found", Arc::clone(&void))
        .error(500, INTERNAL_ERROR, Arc::clone(&void)),
        EndpointDescriptor::builder(
            HttpMethod::Delete,
            "/api/youtube/:guildId/channels/:channelId",
            alias::DELETE_YOUTUBE_CHANNEL,
        )
        .description("Stop following a YouTube channel")
        .path_param("guildId", id())
        .path_param("channelId", id())
        .error(404, "Channel not found", Arc::clone(&void))
        .error(500, INTERNAL_ERROR, Arc::clone(&void)),
    ];

    for builder in endpoints {
        registry.register(builder.build()?)?;
    }
    Ok(registry)
}
