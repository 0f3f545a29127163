//! Static layout lookups shared by all formats
//!
//! Two closed tables drive record decoding: the status byte → [`State`]
//! mapping and the current-range code → scale multiplier mapping. Both are
//! empirically known, finite sets; a code outside the table is a decode
//! error, never a default.

use crate::types::{DecodeError, Result, State};

/// Map a raw status byte to its semantic state.
pub fn state_from_code(code: u8) -> Result<State> {
    match code {
        1 => Ok(State::CcChg),
        2 => Ok(State::CcDChg),
        4 => Ok(State::Rest),
        7 => Ok(State::CcCvChg),
        13 => Ok(State::Pause),
        19 => Ok(State::CvDChg),
        20 => Ok(State::CcCvDChg),
        _ => Err(DecodeError::UnknownStatus(code)),
    }
}

/// Map an instrument range code to the scale multiplier applied to the
/// current, capacity and energy fields.
pub fn multiplier_for_range(range: i32) -> Result<f64> {
    match range {
        -20000 | -3000 => Ok(1e-2),
        -100 => Ok(1e-3),
        0 => Ok(1.0),
        10 => Ok(1e-3),
        100 | 200 => Ok(1e-2),
        1000 | 6000 | 12000 => Ok(1e-1),
        _ => Err(DecodeError::UnknownRange(range)),
    }
}
