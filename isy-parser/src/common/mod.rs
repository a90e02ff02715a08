//! Shared decoding helpers used by every payload module.

pub mod fixed;
pub mod xml_decode;

pub use fixed::FixedPoint;
