//! Joining and gap-filling of decoded record streams
//!
//! The fixed-block format spreads one event stream across three files; this
//! module reassembles them. Run-info records are sparse but authoritative:
//! their Step value is forward-filled across unmatched sample rows, and their
//! Time/Timestamp values are linearly interpolated (timestamps as integer
//! epoch seconds). The legacy path instead pivots auxiliary channel records
//! into per-channel column groups and left-joins them by index.
//!
//! Interpolation assumes the gaps between run-info records are evenly spaced
//! in time. That is a known approximation carried over from the instrument's
//! own export behavior, not something to refine here.

use std::collections::{BTreeMap, HashMap};

use chrono::DateTime;

use crate::types::{AuxReading, AuxRecord, RecordRow, RunInfoRecord, Sample, StepRecord};

/// Replace a series by the running count of its value transitions:
/// 1 for the first element, +1 whenever the value differs from its
/// predecessor. `[5,5,5,7,7,9]` becomes `[1,1,1,2,2,3]`.
pub fn count_transitions(values: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(values.len());
    let mut count = 0u32;
    let mut prev: Option<u32> = None;
    for &v in values {
        if prev != Some(v) {
            count += 1;
        }
        out.push(count);
        prev = Some(v);
    }
    out
}

/// Propagate the last known value into subsequent missing slots.
/// Leading missing slots stay missing.
pub fn forward_fill<T: Copy>(values: &mut [Option<T>]) {
    let mut last = None;
    for v in values.iter_mut() {
        match *v {
            Some(x) => last = Some(x),
            None => *v = last,
        }
    }
}

/// Fill gaps between known values by linear interpolation.
///
/// Interior gaps get evenly spaced values between their bracketing known
/// neighbours; a trailing gap carries the last known value forward; a leading
/// gap stays missing (there is nothing to anchor it to).
pub fn interpolate(values: &mut [Option<f64>]) {
    let mut prev: Option<(usize, f64)> = None;
    let mut i = 0;
    while i < values.len() {
        if let Some(v) = values[i] {
            prev = Some((i, v));
            i += 1;
            continue;
        }
        let next = (i + 1..values.len()).find_map(|j| values[j].map(|v| (j, v)));
        match (prev, next) {
            (Some((pi, pv)), Some((ni, nv))) => {
                for k in i..ni {
                    let frac = (k - pi) as f64 / (ni - pi) as f64;
                    values[k] = Some(pv + (nv - pv) * frac);
                }
                i = ni;
            }
            (Some((_, pv)), None) => {
                for v in values[i..].iter_mut() {
                    *v = Some(pv);
                }
                break;
            }
            (None, Some((ni, _))) => i = ni,
            (None, None) => break,
        }
    }
}

/// Left-join the sample stream with its run-info records by index, then fill
/// the gaps: Step forward-filled, Time and Timestamp interpolated.
///
/// Sample indices are their 1-based positions. Rows before the first run-info
/// record keep absent Step/Time/Timestamp.
pub fn merge_run_info(samples: &[Sample], run_info: &[RunInfoRecord]) -> Vec<RecordRow> {
    let by_index: HashMap<u32, &RunInfoRecord> =
        run_info.iter().map(|r| (r.index, r)).collect();

    let mut steps: Vec<Option<u32>> = Vec::with_capacity(samples.len());
    let mut times: Vec<Option<f64>> = Vec::with_capacity(samples.len());
    let mut stamps: Vec<Option<f64>> = Vec::with_capacity(samples.len());
    for i in 0..samples.len() {
        let info = by_index.get(&((i + 1) as u32));
        steps.push(info.map(|r| r.step));
        times.push(info.map(|r| r.time));
        stamps.push(info.map(|r| r.timestamp as f64));
    }
    forward_fill(&mut steps);
    interpolate(&mut times);
    interpolate(&mut stamps);

    samples
        .iter()
        .enumerate()
        .map(|(i, s)| RecordRow {
            index: (i + 1) as u32,
            cycle: None,
            step: steps[i],
            step_index: None,
            status: None,
            time: times[i],
            voltage: s.voltage,
            current: s.current,
            charge_capacity: None,
            discharge_capacity: None,
            charge_energy: None,
            discharge_energy: None,
            // interpolated as an integer second count, then back to calendar
            timestamp: stamps[i].and_then(|ts| {
                DateTime::from_timestamp(ts as i64, 0).map(|dt| dt.naive_utc())
            }),
            aux: BTreeMap::new(),
        })
        .collect()
}

/// Attach step summaries to merged rows by their Step number, filling the
/// Cycle/Step_Index/Status columns.
pub fn attach_steps(rows: &mut [RecordRow], steps: &[StepRecord]) {
    let by_step: HashMap<u32, &StepRecord> = steps.iter().map(|s| (s.step, s)).collect();
    for row in rows.iter_mut() {
        if let Some(rec) = row.step.and_then(|s| by_step.get(&s)) {
            row.cycle = Some(rec.cycle);
            row.step_index = Some(rec.step_index);
            row.status = Some(rec.status);
        }
    }
}

/// Pivot auxiliary records into per-channel groups and left-join them onto
/// the main rows by index. Duplicate (index, channel) pairs keep the first
/// reading; rows with no auxiliary match keep an empty group.
pub fn join_aux(rows: &mut [RecordRow], aux: &[AuxRecord]) {
    if aux.is_empty() {
        return;
    }
    let mut by_index: HashMap<u32, BTreeMap<u8, AuxReading>> = HashMap::new();
    for a in aux {
        by_index.entry(a.index).or_default().entry(a.channel).or_insert(AuxReading {
            voltage: a.voltage,
            temperature: a.temperature,
            time: a.time,
        });
    }
    for row in rows.iter_mut() {
        if let Some(group) = by_index.remove(&row.index) {
            row.aux = group;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::State;

    fn samples(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| Sample {
                voltage: 3.0 + i as f64 * 0.1,
                current: 100.0,
            })
            .collect()
    }

    fn info(index: u32, time: f64, timestamp: i64, step: u32) -> RunInfoRecord {
        RunInfoRecord {
            index,
            time,
            timestamp,
            step,
        }
    }

    #[test]
    fn test_count_transitions() {
        assert_eq!(
            count_transitions(&[5, 5, 5, 7, 7, 9]),
            vec![1, 1, 1, 2, 2, 3]
        );
        assert_eq!(count_transitions(&[]), Vec::<u32>::new());
        assert_eq!(count_transitions(&[3]), vec![1]);
        // a change on the very last element still counts
        assert_eq!(count_transitions(&[1, 1, 2]), vec![1, 1, 2]);
    }

    #[test]
    fn test_forward_fill() {
        let mut v = vec![None, Some(1), None, None, Some(4), None];
        forward_fill(&mut v);
        assert_eq!(v, vec![None, Some(1), Some(1), Some(1), Some(4), Some(4)]);
    }

    #[test]
    fn test_interpolate_interior_gap() {
        let mut v = vec![Some(10.0), None, None, Some(40.0)];
        interpolate(&mut v);
        assert_eq!(v, vec![Some(10.0), Some(20.0), Some(30.0), Some(40.0)]);
    }

    #[test]
    fn test_interpolate_leading_and_trailing() {
        let mut v = vec![None, Some(2.0), None, None];
        interpolate(&mut v);
        assert_eq!(v, vec![None, Some(2.0), Some(2.0), Some(2.0)]);
    }

    #[test]
    fn test_merge_run_info_fill_and_interpolation() {
        // Main samples 1..10, run-info at {2, 5, 8}
        let rows = merge_run_info(
            &samples(10),
            &[
                info(2, 10.0, 1000, 1),
                info(5, 40.0, 1030, 2),
                info(8, 70.0, 1060, 3),
            ],
        );
        assert_eq!(rows.len(), 10);

        // Row 1 precedes all run-info: nothing to fill from
        assert_eq!(rows[0].step, None);
        assert_eq!(rows[0].time, None);
        assert_eq!(rows[0].timestamp, None);

        // Step forward-filled between run-info rows
        let steps: Vec<Option<u32>> = rows.iter().map(|r| r.step).collect();
        assert_eq!(
            steps,
            vec![
                None,
                Some(1),
                Some(1),
                Some(1),
                Some(2),
                Some(2),
                Some(2),
                Some(3),
                Some(3),
                Some(3)
            ]
        );

        // Time interpolated between bracketing known values
        assert_eq!(rows[1].time, Some(10.0));
        assert_eq!(rows[2].time, Some(20.0));
        assert_eq!(rows[3].time, Some(30.0));
        assert_eq!(rows[4].time, Some(40.0));
        assert_eq!(rows[6].time, Some(60.0));
        // trailing rows carry the last known value
        assert_eq!(rows[9].time, Some(70.0));

        // Timestamps interpolated as integer epoch seconds
        let ts = |i: usize| rows[i].timestamp.unwrap().and_utc().timestamp();
        assert_eq!(ts(1), 1000);
        assert_eq!(ts(2), 1010);
        assert_eq!(ts(3), 1020);
        assert_eq!(ts(7), 1060);
        assert_eq!(ts(9), 1060);
    }

    #[test]
    fn test_attach_steps() {
        let mut rows = merge_run_info(
            &samples(4),
            &[info(1, 0.0, 1000, 1), info(3, 20.0, 1020, 2)],
        );
        attach_steps(
            &mut rows,
            &[
                StepRecord {
                    step: 1,
                    cycle: 1,
                    step_index: 1,
                    status: State::Rest,
                },
                StepRecord {
                    step: 2,
                    cycle: 1,
                    step_index: 2,
                    status: State::CcChg,
                },
            ],
        );
        assert_eq!(rows[0].status, Some(State::Rest));
        assert_eq!(rows[1].status, Some(State::Rest)); // via forward-filled step
        assert_eq!(rows[2].status, Some(State::CcChg));
        assert_eq!(rows[2].cycle, Some(1));
        assert_eq!(rows[3].step_index, Some(2));
    }

    #[test]
    fn test_join_aux_pivots_channels() {
        let mut rows: Vec<RecordRow> = merge_run_info(&samples(3), &[]);
        let aux = vec![
            AuxRecord {
                index: 3,
                channel: 1,
                voltage: 4.0,
                temperature: 25.0,
                time: None,
            },
            AuxRecord {
                index: 3,
                channel: 2,
                voltage: 4.1,
                temperature: 26.5,
                time: None,
            },
        ];
        join_aux(&mut rows, &aux);

        assert!(rows[0].aux.is_empty());
        assert!(rows[1].aux.is_empty());
        let group = &rows[2].aux;
        assert_eq!(group.len(), 2);
        assert_eq!(group[&1].temperature, 25.0);
        assert_eq!(group[&2].temperature, 26.5);
        assert_eq!(group[&2].voltage, 4.1);
    }
}
