// Physical layer: PN sequences, frame coding, DSSS frame generation and synchronization

pub mod coder;
pub mod crc;
pub mod detector;
pub mod frame;
pub mod generator;
pub mod pn;
pub mod synchronizer;

pub use coder::SymbolCoder;
pub use crc::CrcScheme;
pub use frame::{FrameConfig, FrameHeader, FrameProperties};
pub use generator::FrameGenerator;
pub use synchronizer::{FrameSynchronizer, ReceivedFrame, SyncState, SyncStats};
