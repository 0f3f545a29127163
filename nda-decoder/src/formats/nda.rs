//! Legacy nda single-file scanner
//!
//! The self-contained `.nda` file predates the ndax container. It opens with
//! a `NEWARE` magic, optionally carries server/client version strings behind
//! a `BTSServer` marker, and stores 86-byte records in a data section located
//! by a fixed six-byte mark. Unlike the ndc stream there is no identifier
//! search: records are read back to back, and non-record bytes are filtered
//! by the 0x55 type byte.

use byteorder::{ByteOrder, LittleEndian as LE};
use chrono::DateTime;

use crate::formats::ndc::packed_datetime;
use crate::merge::count_transitions;
use crate::tables;
use crate::types::{DecodeError, MainRecord, Result, State};

/// Length of one nda record
pub const RECORD_LEN: usize = 86;

const MAGIC: &[u8] = b"NEWARE";
const VERSION_MARK: &[u8] = b"BTSServer";

/// Six-byte mark preceding the data section; data starts 4 bytes in
const SECTION_MARK: &[u8] = &[0x00, 0x00, 0x00, 0x00, 0x55, 0x00];

const TYPE_MAIN: u8 = 0x55;

/// Scan a whole nda buffer and return its post-processed records.
pub fn scan(buf: &[u8]) -> Result<Vec<MainRecord>> {
    if buf.len() < MAGIC.len() || &buf[..MAGIC.len()] != MAGIC {
        return Err(DecodeError::NotNeware(
            "missing NEWARE magic".to_string(),
        ));
    }
    log_version_info(buf);

    // The section mark can occur spuriously; the real data section is the
    // one where a second record follows at exactly one record length.
    let mut start = locate_mark(buf, 0)?;
    while buf.get(start + RECORD_LEN) != Some(&TYPE_MAIN) {
        start = locate_mark(buf, start)?;
    }

    let mut records = Vec::new();
    let mut pos = start;
    while pos + RECORD_LEN <= buf.len() {
        let slice = &buf[pos..pos + RECORD_LEN];
        if slice[0] == TYPE_MAIN {
            records.push(decode_record(slice)?);
        }
        pos += RECORD_LEN;
    }
    if records.is_empty() {
        return Err(DecodeError::NoRecords);
    }
    log::debug!("nda scan: {} records", records.len());

    // Step becomes a transition count, Cycle is regenerated from the
    // charge-state edges.
    let raw_steps: Vec<u32> = records.iter().map(|r| r.step).collect();
    for (rec, step) in records.iter_mut().zip(count_transitions(&raw_steps)) {
        rec.step = step;
    }
    let statuses: Vec<State> = records.iter().map(|r| r.status).collect();
    for (rec, cycle) in records.iter_mut().zip(generate_cycles(&statuses)) {
        rec.cycle = cycle;
    }
    Ok(records)
}

fn locate_mark(buf: &[u8], from: usize) -> Result<usize> {
    if from >= buf.len() {
        return Err(DecodeError::NoRecords);
    }
    buf[from..]
        .windows(SECTION_MARK.len())
        .position(|w| w == SECTION_MARK)
        .map(|i| from + i + 4)
        .ok_or(DecodeError::NoRecords)
}

/// Log the embedded server/client version strings when present.
fn log_version_info(buf: &[u8]) {
    let loc = match buf
        .windows(VERSION_MARK.len())
        .position(|w| w == VERSION_MARK)
    {
        Some(loc) => loc,
        None => {
            log::info!("file version not found");
            return;
        }
    };
    let field = |offset: usize| -> String {
        buf.get(loc + offset..loc + offset + 50)
            .map(|b| String::from_utf8_lossy(b).trim_matches('\0').to_string())
            .unwrap_or_default()
    };
    log::info!("server: {}", field(0));
    log::info!("client: {}", field(100));
}

/// Decode one 86-byte nda record.
fn decode_record(b: &[u8]) -> Result<MainRecord> {
    if b.len() < RECORD_LEN {
        return Err(DecodeError::Truncated {
            expected: RECORD_LEN,
            actual: b.len(),
        });
    }
    let index = LE::read_u32(&b[2..6]);
    let cycle = u32::from(b[6]) + 1;
    let step = u32::from(LE::read_u16(&b[10..12]));
    let status = tables::state_from_code(b[12])?;
    let time = LE::read_u64(&b[14..22]) as f64 / 1000.0;
    let voltage = LE::read_i32(&b[22..26]) as f64 / 10000.0;
    let multiplier = tables::multiplier_for_range(LE::read_i32(&b[78..82]))?;
    let current = LE::read_i32(&b[26..30]) as f64 * multiplier;
    let charge_capacity = LE::read_i64(&b[38..46]) as f64 * multiplier / 3600.0;
    let discharge_capacity = LE::read_i64(&b[46..54]) as f64 * multiplier / 3600.0;
    let charge_energy = LE::read_i64(&b[54..62]) as f64 * multiplier / 3600.0;
    let discharge_energy = LE::read_i64(&b[62..70]) as f64 * multiplier / 3600.0;

    // This format predates the strict calendar rule: invalid packed fields
    // fall back to reading the same bytes as a Unix timestamp.
    let timestamp = match packed_datetime(&b[70..77], index) {
        Ok(ts) => ts,
        Err(_) => {
            let epoch = LE::read_u64(&b[70..78]);
            DateTime::from_timestamp(epoch as i64, 0)
                .map(|dt| dt.naive_utc())
                .ok_or(DecodeError::InvalidTimestamp { index })?
        }
    };

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

/// Cycle numbers derived from the state sequence: a new cycle opens at every
/// transition into a charge state, and numbering starts at 1.
fn generate_cycles(statuses: &[State]) -> Vec<u32> {
    let mut out = Vec::with_capacity(statuses.len());
    let mut count = 0u32;
    let mut prev_charge = false;
    for (i, s) in statuses.iter().enumerate() {
        let charge = s.is_charge();
        if i > 0 && charge && !prev_charge {
            count += 1;
        }
        out.push(count.max(1));
        prev_charge = charge;
    }
    out
}
