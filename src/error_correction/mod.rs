pub mod convolutional;
pub mod fec;
pub mod golay;
pub mod hamming;
pub mod reed_solomon;

pub use fec::{FecScheme, available_codes};
