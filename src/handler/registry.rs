//! Version dispatch table.
//!
//! Maps wire protocol versions to factories that build the matching
//! [`ProtocolHandler`]. The table is filled once at startup, wrapped in an
//! `Arc`, and only read afterwards, so any number of connections can share it.
//!
//! # Example
//!
//! ```ignore
//! use mc_handshake::{ProtocolVersion, VersionTable};
//!
//! let table = VersionTable::new()
//!     .handler(ProtocolVersion::V1_8, |hs| Protocol18::new(hs))
//!     .handler(ProtocolVersion::V1_12_2, |hs| Protocol1122::new(hs));
//!
//! assert_eq!(table.client_versions_text(), "1.8.x-1.12.x");
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use super::context::ClientConnection;
use super::version::ProtocolVersion;
use crate::protocol::Handshake;

/// A version-specific protocol implementation.
///
/// Once constructed it owns all further interpretation of the connection's
/// byte stream. The factory sees only the [`Handshake`] (address, port,
/// next state); the connection itself is handed over in
/// [`initialize`](Self::initialize) and again on every call after it.
pub trait ProtocolHandler: Send {
    /// Wire version this handler speaks.
    fn version(&self) -> u32;

    /// Called once, right after construction, with the connection the
    /// handshake arrived on. Its protocol version is already set.
    fn initialize(&mut self, client: &mut dyn ClientConnection);

    /// Bytes received after the handshake.
    fn data_received(&mut self, client: &mut dyn ClientConnection, data: &[u8]);
}

/// Boxed handler constructor.
///
/// Takes no connection; a handler that needs one at startup uses
/// [`ProtocolHandler::initialize`].
pub type HandlerFactory = Box<dyn Fn(Handshake) -> Box<dyn ProtocolHandler> + Send + Sync>;

/// Entry for a registered version.
struct VersionEntry {
    /// Catalogue entry, for names.
    version: ProtocolVersion,
    /// Handler constructor.
    factory: HandlerFactory,
}

/// Immutable-after-setup map from wire version to handler factory.
pub struct VersionTable {
    /// Entries keyed by wire version, ordered oldest first.
    entries: BTreeMap<u32, VersionEntry>,
}

impl VersionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register every catalogued version with one shared factory.
    ///
    /// The factory receives the version it is building for.
    pub fn with_all<F, H>(factory: F) -> Self
    where
        F: Fn(ProtocolVersion, Handshake) -> H + Send + Sync + 'static,
        H: ProtocolHandler + 'static,
    {
        let factory = Arc::new(factory);
        let mut table = Self::new();
        for version in ProtocolVersion::ALL {
            let factory = Arc::clone(&factory);
            table.register(version, move |hs| (*factory)(version, hs));
        }
        table
    }

    /// Register a version's factory, replacing any previous one.
    pub fn register<F, H>(&mut self, version: ProtocolVersion, factory: F)
    where
        F: Fn(Handshake) -> H + Send + Sync + 'static,
        H: ProtocolHandler + 'static,
    {
        self.entries.insert(
            version.wire(),
            VersionEntry {
                version,
                factory: Box::new(move |hs: Handshake| -> Box<dyn ProtocolHandler> {
                    Box::new(factory(hs))
                }),
            },
        );
    }

    /// Chaining form of [`register`](Self::register).
    pub fn handler<F, H>(mut self, version: ProtocolVersion, factory: F) -> Self
    where
        F: Fn(Handshake) -> H + Send + Sync + 'static,
        H: ProtocolHandler + 'static,
    {
        self.register(version, factory);
        self
    }

    /// Remove a version.
    pub fn unregister(&mut self, version: ProtocolVersion) -> bool {
        self.entries.remove(&version.wire()).is_some()
    }

    /// Build the handler for `handshake.protocol_version`, if registered.
    pub fn construct(&self, handshake: Handshake) -> Option<Box<dyn ProtocolHandler>> {
        self.entries
            .get(&handshake.protocol_version)
            .map(|entry| (entry.factory)(handshake))
    }

    /// Check if a wire version is registered.
    pub fn contains(&self, version: u32) -> bool {
        self.entries.contains_key(&version)
    }

    /// Release name of a registered wire version.
    pub fn version_name(&self, version: u32) -> Option<&'static str> {
        self.entries.get(&version).map(|e| e.version.name())
    }

    /// Registered versions, oldest first.
    pub fn versions(&self) -> impl Iterator<Item = ProtocolVersion> + '_ {
        self.entries.values().map(|e| e.version)
    }

    /// Newest registered version.
    pub fn latest(&self) -> Option<ProtocolVersion> {
        self.entries.values().next_back().map(|e| e.version)
    }

    /// Number of registered versions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no version is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Comma separated wire versions, e.g. `"47, 107, 340"`.
    pub fn supported_versions_text(&self) -> String {
        self.entries
            .keys()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Client release range, e.g. `"1.8.x-1.12.x"`.
    pub fn client_versions_text(&self) -> String {
        let oldest = self.entries.values().next().map(|e| e.version.family());
        let newest = self.entries.values().next_back().map(|e| e.version.family());
        match (oldest, newest) {
            (Some(oldest), Some(newest)) if oldest == newest => format!("{}.x", oldest),
            (Some(oldest), Some(newest)) => format!("{}.x-{}.x", oldest, newest),
            _ => "(none)".to_string(),
        }
    }
}

impl Default for VersionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VersionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionTable")
            .field("versions", &self.supported_versions_text())
            .finish()
    }
}
