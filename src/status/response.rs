//! Status response document and its collaborators.
//!
//! The status response is a JSON document sent in reply to a server list
//! query:
//!
//! ```json
//! {
//!   "version": { "name": "Server 1.8.x-1.12.x", "protocol": 340 },
//!   "players": { "online": 3, "max": 20 },
//!   "description": { "text": "A game server" },
//!   "favicon": "data:image/png;base64,..."
//! }
//! ```
//!
//! `favicon` is omitted when the server has none.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Data-URI prefix for the favicon field.
pub const FAVICON_PREFIX: &str = "data:image/png;base64,";

/// Server registry view consulted for every status request.
pub trait ServerInfo: Send + Sync {
    /// Message of the day.
    fn description(&self) -> String;

    /// Players currently online.
    fn online_players(&self) -> u32;

    /// Player limit.
    fn max_players(&self) -> u32;

    /// Raw PNG bytes of the server icon, if any.
    fn favicon_png(&self) -> Option<Bytes>;
}

/// Plugin hook run before a status response is serialized.
pub trait PingHook: Send + Sync {
    /// Inspect or rewrite the status values for this client.
    fn on_server_ping(&self, peer: &str, status: &mut StatusFields);
}

/// The four values a ping hook may rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFields {
    /// Description text.
    pub description: String,
    /// Players online.
    pub online_players: i32,
    /// Player limit.
    pub max_players: i32,
    /// Base64-encoded PNG, empty for none.
    pub favicon: String,
}

impl StatusFields {
    /// Snapshot the current values from the server registry.
    pub fn from_server(info: &dyn ServerInfo) -> Self {
        Self {
            description: info.description(),
            online_players: clamp_count(info.online_players()),
            max_players: clamp_count(info.max_players()),
            favicon: info
                .favicon_png()
                .map(|png| BASE64.encode(&png))
                .unwrap_or_default(),
        }
    }
}

fn clamp_count(count: u32) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

/// Fixed server values.
#[derive(Debug, Clone, Default)]
pub struct StaticServerInfo {
    /// Description text.
    pub description: String,
    /// Players online.
    pub online_players: u32,
    /// Player limit.
    pub max_players: u32,
    /// Raw PNG icon.
    pub favicon: Option<Bytes>,
}

impl StaticServerInfo {
    /// Create with a description and player limit, nobody online.
    pub fn new(description: impl Into<String>, max_players: u32) -> Self {
        Self {
            description: description.into(),
            online_players: 0,
            max_players,
            favicon: None,
        }
    }
}

impl ServerInfo for StaticServerInfo {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn online_players(&self) -> u32 {
        self.online_players
    }

    fn max_players(&self) -> u32 {
        self.max_players
    }

    fn favicon_png(&self) -> Option<Bytes> {
        self.favicon.clone()
    }
}

/// `version` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub name: String,
    pub protocol: u32,
}

/// `players` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayersInfo {
    pub online: i32,
    pub max: i32,
}

/// Chat-component text, used for `description` and disconnect notices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextComponent {
    pub text: String,
}

impl TextComponent {
    /// Wrap plain text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Full status response document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: VersionInfo,
    pub players: PlayersInfo,
    pub description: TextComponent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

impl StatusResponse {
    /// Assemble the document from (possibly hook-rewritten) fields.
    pub fn new(version_name: &str, protocol: u32, fields: StatusFields) -> Self {
        Self {
            version: VersionInfo {
                name: version_name.to_string(),
                protocol,
            },
            players: PlayersInfo {
                online: fields.online_players,
                max: fields.max_players,
            },
            description: TextComponent::new(fields.description),
            favicon: if fields.favicon.is_empty() {
                None
            } else {
                Some(format!("{}{}", FAVICON_PREFIX, fields.favicon))
            },
        }
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// JSON body of a disconnect notice: `{"text":"<reason>"}`.
pub fn disconnect_json(reason: &str) -> Result<String> {
    Ok(serde_json::to_string(&TextComponent::new(reason))?)
}
