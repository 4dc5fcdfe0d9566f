// Sample channels: where complex baseband samples leave and enter the modem

pub mod audio;
pub mod loopback;
pub mod stream;

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use num_complex::Complex32;

use crate::error::ConfigError;
use crate::transmission::StopToken;

pub use audio::AudioChannel;
pub use loopback::{LoopbackReceiver, LoopbackSender, loopback};
pub use stream::StreamChannel;

/// Result of one channel read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// This many samples were stored at the front of the buffer
    Samples(usize),
    /// Nothing arrived within the channel timeout
    Starved,
    /// The far end is gone and no samples remain
    Closed,
}

pub trait SampleChannel: Send {
    /// Accepts a prefix of `samples`, returning how many were taken. `last`
    /// marks the final block of a transmission.
    fn write(&mut self, samples: &[Complex32], last: bool) -> io::Result<usize>;

    fn read(&mut self, samples: &mut [Complex32]) -> io::Result<ReadStatus>;

    /// Transfer unit the final block is padded to; 0 when there is none.
    fn mtu(&self) -> usize {
        0
    }

    /// Blocks until everything written has left the channel.
    fn wait_drained(&mut self, _stop: &StopToken) -> io::Result<()> {
        Ok(())
    }
}

/// Channel driver named on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioDriver {
    /// stdin for receiving, stdout for transmitting
    Io,
    File(PathBuf),
    /// In-process pair; built by the caller, see [`loopback`]
    Loopback,
}

impl RadioDriver {
    pub fn is_stream(&self) -> bool {
        matches!(self, RadioDriver::Io | RadioDriver::File(_))
    }
}

impl FromStr for RadioDriver {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            None if s == "io" => Ok(RadioDriver::Io),
            None if s == "loopback" => Ok(RadioDriver::Loopback),
            Some(("file", path)) if !path.is_empty() => Ok(RadioDriver::File(PathBuf::from(path))),
            _ => Err(ConfigError::UnsupportedRadio(s.to_string())),
        }
    }
}

impl fmt::Display for RadioDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioDriver::Io => write!(f, "io"),
            RadioDriver::File(path) => write!(f, "file={}", path.display()),
            RadioDriver::Loopback => write!(f, "loopback"),
        }
    }
}

/// True for errors a channel loop retries instead of giving up on.
pub fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
