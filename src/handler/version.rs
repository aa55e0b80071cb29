//! Protocol version catalogue.
//!
//! Numeric wire versions and the client release each one shipped with.

/// Protocol versions this crate knows by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum ProtocolVersion {
    V1_8 = 47,
    V1_9 = 107,
    V1_9_1 = 108,
    V1_9_2 = 109,
    V1_9_4 = 110,
    V1_10 = 210,
    V1_11 = 315,
    V1_11_1 = 316,
    V1_12 = 335,
    V1_12_1 = 338,
    V1_12_2 = 340,
    V1_13 = 393,
}

impl ProtocolVersion {
    /// Every catalogued version, oldest first.
    pub const ALL: [ProtocolVersion; 12] = [
        ProtocolVersion::V1_8,
        ProtocolVersion::V1_9,
        ProtocolVersion::V1_9_1,
        ProtocolVersion::V1_9_2,
        ProtocolVersion::V1_9_4,
        ProtocolVersion::V1_10,
        ProtocolVersion::V1_11,
        ProtocolVersion::V1_11_1,
        ProtocolVersion::V1_12,
        ProtocolVersion::V1_12_1,
        ProtocolVersion::V1_12_2,
        ProtocolVersion::V1_13,
    ];

    /// Look up a wire version number.
    pub fn from_wire(version: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.wire() == version)
    }

    /// Wire version number.
    #[inline]
    pub fn wire(self) -> u32 {
        self as u32
    }

    /// Client release name, e.g. `"1.12.2"`.
    pub fn name(self) -> &'static str {
        match self {
            ProtocolVersion::V1_8 => "1.8",
            ProtocolVersion::V1_9 => "1.9",
            ProtocolVersion::V1_9_1 => "1.9.1",
            ProtocolVersion::V1_9_2 => "1.9.2",
            ProtocolVersion::V1_9_4 => "1.9.4",
            ProtocolVersion::V1_10 => "1.10",
            ProtocolVersion::V1_11 => "1.11",
            ProtocolVersion::V1_11_1 => "1.11.1",
            ProtocolVersion::V1_12 => "1.12",
            ProtocolVersion::V1_12_1 => "1.12.1",
            ProtocolVersion::V1_12_2 => "1.12.2",
            ProtocolVersion::V1_13 => "1.13",
        }
    }

    /// Release family, e.g. `"1.12"` for 1.12.2.
    pub fn family(self) -> &'static str {
        let name = self.name();
        match name.match_indices('.').nth(1) {
            Some((idx, _)) => &name[..idx],
            None => name,
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Human-readable name for a wire version number.
///
/// # Example
///
/// ```
/// use mc_handshake::version_text;
///
/// assert_eq!(version_text(340), "1.12.2");
/// assert_eq!(version_text(4), "Unknown protocol (4)");
/// ```
pub fn version_text(version: u32) -> String {
    match ProtocolVersion::from_wire(version) {
        Some(v) => v.name().to_string(),
        None => format!("Unknown protocol ({})", version),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_round_trip_for_catalogue() {
        for version in ProtocolVersion::ALL {
            assert_eq!(ProtocolVersion::from_wire(version.wire()), Some(version));
        }
        assert_eq!(ProtocolVersion::from_wire(46), None);
    }

    #[test]
    fn test_catalogue_is_sorted() {
        let wires: Vec<u32> = ProtocolVersion::ALL.iter().map(|v| v.wire()).collect();
        let mut sorted = wires.clone();
        sorted.sort_unstable();
        assert_eq!(wires, sorted);
    }

    #[test]
    fn test_names() {
        assert_eq!(ProtocolVersion::V1_8.name(), "1.8");
        assert_eq!(ProtocolVersion::V1_12_2.to_string(), "1.12.2");
        assert_eq!(version_text(47), "1.8");
        assert_eq!(version_text(0), "Unknown protocol (0)");
    }

    #[test]
    fn test_family() {
        assert_eq!(ProtocolVersion::V1_8.family(), "1.8");
        assert_eq!(ProtocolVersion::V1_9_4.family(), "1.9");
        assert_eq!(ProtocolVersion::V1_12_2.family(), "1.12");
        assert_eq!(ProtocolVersion::V1_13.family(), "1.13");
    }
}
