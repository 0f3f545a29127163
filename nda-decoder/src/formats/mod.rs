//! Binary format scanners (nda, ndc, fixed-block ndc)
//!
//! Each scanner consumes a fully available byte buffer and produces typed
//! record streams; none of them performs I/O. The container module decides
//! which scanner a file routes to.

pub mod nda;
pub mod ndc;
pub mod ndc8;
