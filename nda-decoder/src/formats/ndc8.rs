//! Fixed-block ndc scanner (format revision 8)
//!
//! Revision 8 splits one logical stream across three files that share the
//! same geometry: a 4096-byte header, then 4096-byte blocks to end of file.
//! Each block carries a packed array of small fixed-width sub-records in a
//! payload sub-range; the tail bytes outside the payload differ per
//! sub-format. A short trailing block is scanned for whole sub-records only.

use byteorder::{ByteOrder, LittleEndian as LE};

use crate::merge::count_transitions;
use crate::tables;
use crate::types::{Result, RunInfoRecord, Sample, StepRecord};

/// Block size shared by all three sub-formats
pub const BLOCK_LEN: usize = 4096;

/// Header skipped before the first block
const HEADER_LEN: usize = 4096;

/// Offset of the payload region within each block
const PAYLOAD_START: usize = 132;

/// Width of one run-info sub-record
const RUN_INFO_LEN: usize = 47;

/// Width of one step-summary sub-record
const STEP_LEN: usize = 37;

/// Iterate the data blocks of a buffer, header excluded.
/// The final block may be shorter than [`BLOCK_LEN`].
fn blocks(buf: &[u8]) -> impl Iterator<Item = &[u8]> {
    buf.get(HEADER_LEN..).unwrap_or(&[]).chunks(BLOCK_LEN)
}

/// Payload sub-range of one block, `tail` bytes trimmed from the end.
/// Empty when the block is too short to hold any payload.
fn payload(block: &[u8], tail: usize) -> &[u8] {
    let end = block.len().saturating_sub(tail);
    if end <= PAYLOAD_START {
        &[]
    } else {
        &block[PAYLOAD_START..end]
    }
}

/// Unpack the main sample stream: repeating voltage/current f32 pairs.
/// A sample's 1-based position in the stream is its index.
pub fn read_samples(buf: &[u8]) -> Vec<Sample> {
    let mut out = Vec::new();
    for block in blocks(buf) {
        for pair in payload(block, 4).chunks_exact(8) {
            out.push(Sample {
                voltage: f64::from(LE::read_f32(&pair[0..4])) / 10000.0,
                current: f64::from(LE::read_f32(&pair[4..8])),
            });
        }
    }
    log::debug!("fixed-block scan: {} samples", out.len());
    out
}

/// Unpack the run-info stream.
///
/// Sub-record layout: time i32 (ms), 29 reserved bytes, timestamp i32
/// (epoch seconds), raw step counter i32, index i32, 2 pad bytes. Entries
/// with a zero index are block padding and dropped. The raw step counter
/// only changes at step boundaries; it is replaced here by its transition
/// count so downstream joins see a dense 1-based step sequence.
pub fn read_run_info(buf: &[u8]) -> Vec<RunInfoRecord> {
    let mut out = Vec::new();
    for block in blocks(buf) {
        for rec in payload(block, 63).chunks_exact(RUN_INFO_LEN) {
            let index = LE::read_i32(&rec[41..45]);
            if index == 0 {
                continue;
            }
            out.push(RunInfoRecord {
                time: LE::read_i32(&rec[0..4]) as f64 / 1000.0,
                timestamp: i64::from(LE::read_i32(&rec[33..37])),
                step: LE::read_i32(&rec[37..41]) as u32,
                index: index as u32,
            });
        }
    }

    let raw_steps: Vec<u32> = out.iter().map(|r| r.step).collect();
    for (rec, step) in out.iter_mut().zip(count_transitions(&raw_steps)) {
        rec.step = step;
    }
    log::debug!("fixed-block scan: {} run-info records", out.len());
    out
}

/// Unpack the step-summary stream.
///
/// Sub-record layout: cycle i32 (zero-based), step_index i32, 16 reserved
/// bytes, status byte, 12 reserved bytes. Entries with a zero step_index are
/// padding and dropped; kept entries are numbered with a 1-based sequential
/// `step`, independent of the decoded fields.
pub fn read_steps(buf: &[u8]) -> Result<Vec<StepRecord>> {
    let mut out = Vec::new();
    for block in blocks(buf) {
        for rec in payload(block, 5).chunks_exact(STEP_LEN) {
            let step_index = LE::read_i32(&rec[4..8]);
            if step_index == 0 {
                continue;
            }
            out.push(StepRecord {
                step: 0, // assigned below
                cycle: (LE::read_i32(&rec[0..4]) + 1) as u32,
                step_index: step_index as u32,
                status: tables::state_from_code(rec[24])?,
            });
        }
    }
    for (i, rec) in out.iter_mut().enumerate() {
        rec.step = (i + 1) as u32;
    }
    log::debug!("fixed-block scan: {} step records", out.len());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DecodeError, State};

    /// A header plus one block sized to hold exactly `n` sub-records of
    /// `width` bytes plus the given tail.
    fn file_with_payload(payload_bytes: &[u8], tail: usize) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_LEN + PAYLOAD_START];
        buf.extend_from_slice(payload_bytes);
        buf.extend_from_slice(&vec![0u8; tail]);
        buf
    }

    fn run_info_bytes(time_ms: i32, timestamp: i32, step: i32, index: i32) -> [u8; RUN_INFO_LEN] {
        let mut b = [0u8; RUN_INFO_LEN];
        LE::write_i32(&mut b[0..4], time_ms);
        LE::write_i32(&mut b[33..37], timestamp);
        LE::write_i32(&mut b[37..41], step);
        LE::write_i32(&mut b[41..45], index);
        b
    }

    fn step_bytes(cycle: i32, step_index: i32, status: u8) -> [u8; STEP_LEN] {
        let mut b = [0u8; STEP_LEN];
        LE::write_i32(&mut b[0..4], cycle);
        LE::write_i32(&mut b[4..8], step_index);
        b[24] = status;
        b
    }

    #[test]
    fn test_read_samples_scales_voltage() {
        let mut payload = Vec::new();
        for (v, c) in [(36000.0f32, 500.0f32), (41000.0, -250.0)] {
            let mut pair = [0u8; 8];
            LE::write_f32(&mut pair[0..4], v);
            LE::write_f32(&mut pair[4..8], c);
            payload.extend_from_slice(&pair);
        }
        let samples = read_samples(&file_with_payload(&payload, 4));
        assert_eq!(samples.len(), 2);
        assert!((samples[0].voltage - 3.6).abs() < 1e-9);
        assert!((samples[0].current - 500.0).abs() < 1e-9);
        assert!((samples[1].voltage - 4.1).abs() < 1e-9);
        assert!((samples[1].current + 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_read_samples_ignores_partial_trailing_pair() {
        let mut payload = vec![0u8; 8];
        LE::write_f32(&mut payload[0..4], 10000.0);
        payload.extend_from_slice(&[0u8; 5]); // half a pair
        let samples = read_samples(&file_with_payload(&payload, 4));
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn test_read_samples_empty_and_header_only() {
        assert!(read_samples(&[]).is_empty());
        assert!(read_samples(&vec![0u8; HEADER_LEN]).is_empty());
        // block too short to reach the payload region
        assert!(read_samples(&vec![0u8; HEADER_LEN + 50]).is_empty());
    }

    #[test]
    fn test_read_run_info_drops_padding_and_counts_transitions() {
        let mut payload = Vec::new();
        for (i, raw_step) in [5i32, 5, 5, 7, 7, 9].iter().enumerate() {
            payload.extend_from_slice(&run_info_bytes(
                (i as i32 + 1) * 1000,
                1_600_000_000 + i as i32,
                *raw_step,
                i as i32 + 1,
            ));
        }
        // zero-index padding entry at the end
        payload.extend_from_slice(&run_info_bytes(0, 0, 0, 0));

        let recs = read_run_info(&file_with_payload(&payload, 63));
        assert_eq!(recs.len(), 6);
        assert_eq!(
            recs.iter().map(|r| r.step).collect::<Vec<_>>(),
            vec![1, 1, 1, 2, 2, 3]
        );
        assert!((recs[0].time - 1.0).abs() < 1e-9);
        assert_eq!(recs[0].timestamp, 1_600_000_000);
        assert_eq!(recs[5].index, 6);
    }

    #[test]
    fn test_read_steps_numbering_and_padding() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&step_bytes(0, 1, 1)); // CC_Chg
        payload.extend_from_slice(&step_bytes(0, 0, 0)); // padding
        payload.extend_from_slice(&step_bytes(0, 2, 4)); // Rest
        payload.extend_from_slice(&step_bytes(1, 3, 2)); // CC_DChg

        let steps = read_steps(&file_with_payload(&payload, 5)).unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(
            steps.iter().map(|s| s.step).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(steps[0].cycle, 1);
        assert_eq!(steps[0].status, State::CcChg);
        assert_eq!(steps[2].cycle, 2);
        assert_eq!(steps[2].step_index, 3);
        assert_eq!(steps[2].status, State::CcDChg);
    }

    #[test]
    fn test_read_steps_unknown_status_fails() {
        let payload = step_bytes(0, 1, 77);
        assert!(matches!(
            read_steps(&file_with_payload(&payload, 5)),
            Err(DecodeError::UnknownStatus(77))
        ));
    }

    #[test]
    fn test_multi_block_samples() {
        // Two full-size blocks; every pair must be collected in order
        let pairs_per_block = (BLOCK_LEN - PAYLOAD_START - 4) / 8;
        let mut buf = vec![0u8; HEADER_LEN];
        for block_no in 0..2u32 {
            let mut block = vec![0u8; BLOCK_LEN];
            for i in 0..pairs_per_block {
                let off = PAYLOAD_START + i * 8;
                LE::write_f32(&mut block[off..off + 4], 10000.0 * (block_no + 1) as f32);
                LE::write_f32(&mut block[off + 4..off + 8], i as f32);
            }
            buf.extend_from_slice(&block);
        }
        let samples = read_samples(&buf);
        assert_eq!(samples.len(), 2 * pairs_per_block);
        assert!((samples[0].voltage - 1.0).abs() < 1e-9);
        assert!((samples[pairs_per_block].voltage - 2.0).abs() < 1e-9);
    }
}
