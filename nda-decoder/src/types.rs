//! Core types for the Neware log decoder library
//!
//! This module defines the record types that the scanners emit, the assembled
//! output table returned to the caller, and the error type used throughout the
//! crate. All records are produced once during a scan and are immutable
//! afterwards; the merge step only fills in derived columns on the output rows.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Errors that can occur while reading a Neware log file
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("not a Neware file: {0}")]
    NotNeware(String),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("server version {0:?} is not supported")]
    UnsupportedVersion(String),

    #[error("archive entry not found: {0}")]
    MissingEntry(String),

    #[error("malformed version manifest: {0}")]
    BadManifest(String),

    #[error("unknown status code: {0}")]
    UnknownStatus(u8),

    #[error("unknown current range: {0}")]
    UnknownRange(i32),

    #[error("invalid timestamp in record {index}")]
    InvalidTimestamp { index: u32 },

    #[error("record truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("no data records found")]
    NoRecords,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Semantic state of the cell during a record, decoded from the raw status
/// byte via the lookup in [`crate::tables`]. Raw codes never reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum State {
    #[serde(rename = "CC_Chg")]
    CcChg,
    #[serde(rename = "CC_DChg")]
    CcDChg,
    Rest,
    #[serde(rename = "CCCV_Chg")]
    CcCvChg,
    Pause,
    #[serde(rename = "CV_DChg")]
    CvDChg,
    #[serde(rename = "CCCV_DChg")]
    CcCvDChg,
}

impl State {
    /// True for the charge states that open a new cycle
    pub fn is_charge(&self) -> bool {
        matches!(self, State::CcChg | State::CcCvChg)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::CcChg => "CC_Chg",
            State::CcDChg => "CC_DChg",
            State::Rest => "Rest",
            State::CcCvChg => "CCCV_Chg",
            State::Pause => "Pause",
            State::CvDChg => "CV_DChg",
            State::CcCvDChg => "CCCV_DChg",
        };
        write!(f, "{}", s)
    }
}

/// One fully decoded main record from a legacy-format stream.
///
/// All scale factors are already applied: voltage in V, current in mA,
/// capacities in mAh, energies in mWh, time in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct MainRecord {
    pub index: u32,
    pub cycle: u32,
    pub step: u32,
    pub status: State,
    pub time: f64,
    pub voltage: f64,
    pub current: f64,
    pub charge_capacity: f64,
    pub discharge_capacity: f64,
    pub charge_energy: f64,
    pub discharge_energy: f64,
    pub timestamp: NaiveDateTime,
}

/// Which auxiliary record layout a legacy stream carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxVariant {
    /// Type byte 0x65: voltage + temperature
    Temperature,
    /// Type byte 0x74: voltage + temperature + auxiliary time
    TemperatureTime,
}

/// One auxiliary-channel record from a legacy-format stream.
///
/// `index` is a foreign key into the main record stream; `time` is only
/// present for the [`AuxVariant::TemperatureTime`] layout.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxRecord {
    pub index: u32,
    pub channel: u8,
    pub voltage: f64,
    pub temperature: f64,
    pub time: Option<f64>,
}

/// One raw voltage/current sample from the fixed-block main stream.
/// Its index is implied by its 1-based position in the stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub voltage: f64,
    pub current: f64,
}

/// Per-step timing metadata from the fixed-block run-info stream.
///
/// `step` has already been normalized into a transition count by the scanner;
/// `timestamp` is in epoch seconds so the merger can interpolate it as an
/// integer before converting back to calendar form.
#[derive(Debug, Clone, PartialEq)]
pub struct RunInfoRecord {
    pub index: u32,
    pub time: f64,
    pub timestamp: i64,
    pub step: u32,
}

/// One step summary from the fixed-block step stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    /// 1-based sequence position, the join key against run-info steps
    pub step: u32,
    pub cycle: u32,
    pub step_index: u32,
    pub status: State,
}

/// An auxiliary channel's readings attached to one output row
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AuxReading {
    pub voltage: f64,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
}

/// One row of the assembled output table.
///
/// Columns that a given format cannot supply are `None`: the fixed-block path
/// has no capacity/energy columns, and its Step/Time/Timestamp columns are
/// absent before the first run-info record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordRow {
    pub index: u32,
    pub cycle: Option<u32>,
    pub step: Option<u32>,
    pub step_index: Option<u32>,
    pub status: Option<State>,
    pub time: Option<f64>,
    pub voltage: f64,
    pub current: f64,
    pub charge_capacity: Option<f64>,
    pub discharge_capacity: Option<f64>,
    pub charge_energy: Option<f64>,
    pub discharge_energy: Option<f64>,
    pub timestamp: Option<NaiveDateTime>,
    /// Pivoted auxiliary readings, keyed by channel number
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub aux: BTreeMap<u8, AuxReading>,
}

impl RecordRow {
    /// Build a row from a fully populated legacy main record
    pub fn from_main(rec: MainRecord) -> Self {
        RecordRow {
            index: rec.index,
            cycle: Some(rec.cycle),
            step: Some(rec.step),
            step_index: None,
            status: Some(rec.status),
            time: Some(rec.time),
            voltage: rec.voltage,
            current: rec.current,
            charge_capacity: Some(rec.charge_capacity),
            discharge_capacity: Some(rec.discharge_capacity),
            charge_energy: Some(rec.charge_energy),
            discharge_energy: Some(rec.discharge_energy),
            timestamp: Some(rec.timestamp),
            aux: BTreeMap::new(),
        }
    }
}

/// The assembled output table, one row per main record or sample.
///
/// Invariants: `index` values are unique and strictly increasing, and every
/// populated status column carries a [`State`], never a raw code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordTable {
    pub rows: Vec<RecordRow>,
    /// Distinct auxiliary channels observed, in ascending order
    pub aux_channels: Vec<u8>,
    /// True when the auxiliary records carry the secondary time field
    pub aux_has_time: bool,
}

impl RecordTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
