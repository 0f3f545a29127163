//! Neware Log Decoder Library
//!
//! A stateless library for decoding the proprietary binary log formats
//! written by Neware battery cycling instruments (nda, ndc, ndax) into a
//! structured time-series table.
//!
//! # Architecture
//!
//! This library is intentionally minimal and focused on decoding:
//! - Locates record boundaries by fixed offsets or repeating identifier
//!   anchors and decodes each record's fixed little-endian layout
//! - Classifies the multi-variant auxiliary records of the legacy format
//! - Merges the three streams of the fixed-block format (samples, run-info,
//!   step summaries) into one table, forward-filling and interpolating the
//!   sparse columns
//!
//! The library does NOT:
//! - Interpret the values scientifically (capacity fade, cycle analysis)
//! - Write output files
//! - Guess at formats whose byte layout is not empirically known;
//!   unsupported revisions are rejected outright
//!
//! # Example Usage
//!
//! ```no_run
//! use std::path::Path;
//!
//! let table = nda_decoder::read_file(Path::new("cell_042.ndax")).unwrap();
//! for row in &table.rows {
//!     println!("{} {:.4} V {:.1} mA", row.index, row.voltage, row.current);
//! }
//! ```

// Public modules
pub mod tables;
pub mod types;
pub mod version;

// Re-export main types for convenience
pub use container::{read_file, read_ndax};
pub use types::{
    AuxReading, AuxRecord, AuxVariant, DecodeError, MainRecord, RecordRow, RecordTable, Result,
    RunInfoRecord, Sample, State, StepRecord,
};
pub use version::FormatRevision;

// Internal modules (not exposed in public API)
mod assemble;
mod container;
mod formats;
mod merge;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: unsupported revisions are rejected up front
        assert!(version::route("BTS Server9.9.9.01").is_err());
        assert!(!VERSION.is_empty());
    }
}
