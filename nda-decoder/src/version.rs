//! Format revision routing
//!
//! Character 14 of the server version string encodes the major format
//! revision. Revisions up to 7 use the legacy anchor-scanned stream,
//! revision 8 uses the fixed-block layout. Anything else is rejected before
//! any byte decoding starts; there is no best-effort fallback for layouts
//! whose geometry is not empirically known.

use crate::types::{DecodeError, Result};

/// Byte position of the revision digit within the server version string
const REVISION_CHAR: usize = 14;

/// Which decode path a file's format revision selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatRevision {
    /// Revisions 0-7: anchor-scanned 94-byte records
    Legacy(u8),
    /// Revision 8: 4096-byte fixed blocks
    FixedBlock,
}

/// Select the decode path for a server version string.
pub fn route(server: &str) -> Result<FormatRevision> {
    let digit = server
        .chars()
        .nth(REVISION_CHAR)
        .and_then(|c| c.to_digit(10))
        .ok_or_else(|| DecodeError::UnsupportedVersion(server.to_string()))?;

    match digit {
        0..=7 => Ok(FormatRevision::Legacy(digit as u8)),
        8 => Ok(FormatRevision::FixedBlock),
        _ => Err(DecodeError::UnsupportedVersion(server.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version_with(revision: char) -> String {
        format!("BTS Server9.9.{}.01.001", revision)
    }

    #[test]
    fn test_legacy_revisions_route_to_legacy() {
        for d in '0'..='7' {
            let v = version_with(d);
            assert_eq!(
                route(&v).unwrap(),
                FormatRevision::Legacy(d.to_digit(10).unwrap() as u8),
                "revision {}",
                d
            );
        }
    }

    #[test]
    fn test_revision_8_routes_to_fixed_block() {
        assert_eq!(route(&version_with('8')).unwrap(), FormatRevision::FixedBlock);
    }

    #[test]
    fn test_future_revision_is_rejected() {
        assert!(matches!(
            route(&version_with('9')),
            Err(DecodeError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_non_digit_and_short_strings_are_rejected() {
        assert!(route(&version_with('x')).is_err());
        assert!(route("short").is_err());
        assert!(route("").is_err());
    }
}
