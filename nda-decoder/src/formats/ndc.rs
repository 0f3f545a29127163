//! Legacy ndc stream scanner (format revisions ≤ 7)
//!
//! Legacy files have no block structure. The 8 bytes at the start of the data
//! section form a repeating record identifier; each later occurrence of that
//! pattern anchors one fixed-size record. Records are routed by their leading
//! type byte: 0x55 is a main record, 0x65 and 0x74 are the two auxiliary
//! layouts. An unknown type byte is skipped with a warning so one stray
//! record cannot abort the scan.

use byteorder::{ByteOrder, LittleEndian as LE};
use chrono::{NaiveDate, NaiveDateTime};

use crate::tables;
use crate::types::{AuxRecord, AuxVariant, DecodeError, MainRecord, Result};

/// Length of every legacy record, main and auxiliary alike
pub const RECORD_LEN: usize = 94;

/// File offset where the data section and its identifier begin
const DATA_START: usize = 517;

/// Width of the record identifier pattern
const IDENTIFIER_LEN: usize = 8;

/// Type bytes for the three known record layouts
const TYPE_MAIN: u8 = 0x55;
const TYPE_AUX_TEMP: u8 = 0x65;
const TYPE_AUX_TEMP_TIME: u8 = 0x74;

/// Everything one pass over a legacy buffer produces
#[derive(Debug, Clone)]
pub struct NdcScan {
    pub records: Vec<MainRecord>,
    pub aux: Vec<AuxRecord>,
    /// Auxiliary layout of this stream, taken from the identifier's type byte
    pub aux_variant: Option<AuxVariant>,
}

/// Scan a legacy buffer and decode every anchored record.
pub fn scan(buf: &[u8]) -> Result<NdcScan> {
    if buf.len() < DATA_START + IDENTIFIER_LEN {
        return Err(DecodeError::Truncated {
            expected: DATA_START + IDENTIFIER_LEN,
            actual: buf.len(),
        });
    }
    let identifier = &buf[DATA_START..DATA_START + IDENTIFIER_LEN];
    let aux_variant = match identifier[0] {
        TYPE_AUX_TEMP => Some(AuxVariant::Temperature),
        TYPE_AUX_TEMP_TIME => Some(AuxVariant::TemperatureTime),
        _ => None,
    };

    let mut records = Vec::new();
    let mut aux = Vec::new();
    for slice in RecordSlices::new(buf, identifier) {
        match slice[0] {
            TYPE_MAIN => records.push(decode_main(slice)?),
            TYPE_AUX_TEMP => aux.push(decode_aux_temp(slice)?),
            TYPE_AUX_TEMP_TIME => aux.push(decode_aux_temp_time(slice)?),
            other => log::warn!("unknown record type 0x{:02x}, skipping", other),
        }
    }
    log::debug!(
        "legacy scan: {} main records, {} aux records",
        records.len(),
        aux.len()
    );

    Ok(NdcScan {
        records,
        aux,
        aux_variant,
    })
}

/// Lazy iterator over anchored record slices.
///
/// Yields the slice at the data start, then the slice at each following
/// occurrence of the identifier, searching at least one record length past
/// the previous match. Finite and not restartable; stops as soon as no
/// further occurrence leaves room for a whole record.
pub struct RecordSlices<'a> {
    buf: &'a [u8],
    identifier: &'a [u8],
    next_pos: Option<usize>,
}

impl<'a> RecordSlices<'a> {
    pub fn new(buf: &'a [u8], identifier: &'a [u8]) -> Self {
        RecordSlices {
            buf,
            identifier,
            next_pos: Some(DATA_START),
        }
    }
}

impl<'a> Iterator for RecordSlices<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let pos = self.next_pos?;
        if pos + RECORD_LEN > self.buf.len() {
            // truncated trailing record, stop cleanly
            self.next_pos = None;
            return None;
        }
        self.next_pos = find_pattern(self.buf, self.identifier, pos + RECORD_LEN);
        Some(&self.buf[pos..pos + RECORD_LEN])
    }
}

/// First occurrence of `pattern` at or after `from`
fn find_pattern(buf: &[u8], pattern: &[u8], from: usize) -> Option<usize> {
    if from >= buf.len() {
        return None;
    }
    buf[from..]
        .windows(pattern.len())
        .position(|w| w == pattern)
        .map(|i| from + i)
}

fn ensure_len(b: &[u8]) -> Result<()> {
    if b.len() < RECORD_LEN {
        return Err(DecodeError::Truncated {
            expected: RECORD_LEN,
            actual: b.len(),
        });
    }
    Ok(())
}

/// Decode one 0x55 main record.
pub fn decode_main(b: &[u8]) -> Result<MainRecord> {
    ensure_len(b)?;
    let index = LE::read_u32(&b[8..12]);
    let cycle = LE::read_u32(&b[12..16]) + 1;
    let step = u32::from(b[16]);
    let status = tables::state_from_code(b[17])?;
    let time = LE::read_u64(&b[23..31]) as f64 / 1000.0;
    let voltage = LE::read_i32(&b[31..35]) as f64 / 10000.0;
    let multiplier = tables::multiplier_for_range(LE::read_i32(&b[82..86]))?;
    let current = LE::read_i32(&b[35..39]) as f64 * multiplier;
    let charge_capacity = LE::read_i64(&b[43..51]) as f64 * multiplier / 3600.0;
    let discharge_capacity = LE::read_i64(&b[51..59]) as f64 * multiplier / 3600.0;
    let charge_energy = LE::read_i64(&b[59..67]) as f64 * multiplier / 3600.0;
    let discharge_energy = LE::read_i64(&b[67..75]) as f64 * multiplier / 3600.0;
    let timestamp = packed_datetime(&b[75..82], index)?;

    Ok(MainRecord {
        index,
        cycle,
        step,
        status,
        time,
        voltage,
        current,
        charge_capacity,
        discharge_capacity,
        charge_energy,
        discharge_energy,
        timestamp,
    })
}

/// Decode one 0x65 auxiliary record (voltage + temperature).
pub fn decode_aux_temp(b: &[u8]) -> Result<AuxRecord> {
    ensure_len(b)?;
    Ok(AuxRecord {
        index: LE::read_u32(&b[8..12]),
        channel: b[3],
        voltage: LE::read_i32(&b[31..35]) as f64 / 10000.0,
        temperature: LE::read_i16(&b[41..43]) as f64 / 10.0,
        time: None,
    })
}

/// Decode one 0x74 auxiliary record (voltage + temperature + aux time).
pub fn decode_aux_temp_time(b: &[u8]) -> Result<AuxRecord> {
    ensure_len(b)?;
    Ok(AuxRecord {
        index: LE::read_u32(&b[8..12]),
        channel: b[3],
        voltage: LE::read_i32(&b[31..35]) as f64 / 10000.0,
        temperature: LE::read_i16(&b[41..43]) as f64 / 10.0,
        time: Some(LE::read_i16(&b[43..45]) as f64 / 10.0),
    })
}

/// Assemble the six packed calendar fields into a timestamp.
/// Out-of-range values (month 0 and the like) are a decode error, not
/// something to clamp.
pub(crate) fn packed_datetime(b: &[u8], index: u32) -> Result<NaiveDateTime> {
    let year = i32::from(LE::read_u16(&b[0..2]));
    let (month, day) = (u32::from(b[2]), u32::from(b[3]));
    let (hour, minute, second) = (u32::from(b[4]), u32::from(b[5]), u32::from(b[6]));
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .ok_or(DecodeError::InvalidTimestamp { index })
}
