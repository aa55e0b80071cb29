//! Status module - server list status for clients without a version handler.
//!
//! - [`StatusResponder`] - answers status and ping requests on a staged buffer
//! - [`StatusResponse`] - the JSON document returned to the client
//! - [`ServerInfo`] / [`PingHook`] - collaborators supplying and rewriting the values

mod responder;
mod response;

pub use responder::StatusResponder;
pub use response::{
    disconnect_json, PingHook, PlayersInfo, ServerInfo, StaticServerInfo, StatusFields,
    StatusResponse, TextComponent, VersionInfo, FAVICON_PREFIX,
};
