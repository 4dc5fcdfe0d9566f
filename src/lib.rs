pub mod device;
pub mod dsp;
pub mod error;
pub mod error_correction;
pub mod phy;
pub mod transmission;
pub mod utils;

pub use error::{ConfigError, FrameError, Result, TransferError};
