//! Final assembly of decoded streams into the output table
//!
//! Both decode paths end here. The legacy path gets its duplicate indices
//! dropped (first occurrence wins), is sorted by index only when the scan
//! produced an out-of-order stream, and has its auxiliary records pivoted
//! on. The fixed-block path is truncated to the index range the run-info
//! stream vouches for, then merged and enriched with step summaries.

use crate::merge;
use crate::types::{
    AuxRecord, AuxVariant, MainRecord, RecordRow, RecordTable, Result, RunInfoRecord, Sample,
    StepRecord,
};
use std::collections::HashSet;

/// Assemble a legacy scan into the output table.
pub fn assemble_legacy(
    mut records: Vec<MainRecord>,
    aux: Vec<AuxRecord>,
    aux_variant: Option<AuxVariant>,
) -> RecordTable {
    let before = records.len();
    let mut seen = HashSet::new();
    records.retain(|r| seen.insert(r.index));
    if records.len() < before {
        log::debug!("dropped {} duplicate indices", before - records.len());
    }

    if !records.windows(2).all(|w| w[0].index < w[1].index) {
        records.sort_by_key(|r| r.index);
    }

    let mut rows: Vec<RecordRow> = records.into_iter().map(RecordRow::from_main).collect();
    merge::join_aux(&mut rows, &aux);

    let mut channels: Vec<u8> = aux.iter().map(|a| a.channel).collect();
    channels.sort_unstable();
    channels.dedup();

    RecordTable {
        rows,
        aux_channels: channels,
        aux_has_time: aux_variant == Some(AuxVariant::TemperatureTime)
            || aux.iter().any(|a| a.time.is_some()),
    }
}

/// Assemble the three fixed-block streams into the output table.
///
/// Run-info is authoritative for the valid index range: samples past its
/// last index are trailing block padding and cut off before the merge.
pub fn assemble_fixed_block(
    samples: Vec<Sample>,
    run_info: Vec<RunInfoRecord>,
    steps: Vec<StepRecord>,
) -> Result<RecordTable> {
    let last_index = run_info.last().map(|r| r.index as usize).unwrap_or(0);
    let valid = &samples[..last_index.min(samples.len())];
    if valid.len() < samples.len() {
        log::debug!(
            "truncated {} samples past run-info range",
            samples.len() - valid.len()
        );
    }

    let mut rows = merge::merge_run_info(valid, &run_info);
    merge::attach_steps(&mut rows, &steps);

    Ok(RecordTable {
        rows,
        aux_channels: Vec::new(),
        aux_has_time: false,
    })
}
