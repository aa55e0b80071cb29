//! Handler module - version-specific protocol handlers and their dispatch.
//!
//! Provides:
//! - [`VersionTable`] - maps wire versions to handler factories
//! - [`ProtocolHandler`] - the contract every version handler implements
//! - [`ClientConnection`] - what handlers and the recognizer need from a connection
//! - [`ProtocolVersion`] - the catalogue of known versions and their names
//!
//! # Example
//!
//! ```ignore
//! use mc_handshake::handler::{ProtocolVersion, VersionTable};
//!
//! // One handler type parameterised by version
//! let table = VersionTable::with_all(|version, handshake| {
//!     GameProtocol::new(version, handshake)
//! });
//!
//! assert!(table.contains(ProtocolVersion::V1_12_2.wire()));
//! ```

mod context;
mod registry;
mod version;

pub use context::{ClientConnection, MemoryClient};
pub use registry::{HandlerFactory, ProtocolHandler, VersionTable};
pub use version::{version_text, ProtocolVersion};
