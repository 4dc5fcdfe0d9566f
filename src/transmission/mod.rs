/// Transfer sessions: one direction of a link, driven block by block
pub mod config;
pub mod data;
pub mod receiver;
pub mod sender;
pub mod session;
pub mod stop;

pub use config::{Direction, SessionConfig, SessionParams};
pub use data::{BytesSource, PayloadSink, PayloadSource, ReaderSource, WriterSink};
pub use receiver::receive;
pub use sender::transmit;
pub use session::{Outcome, Payload, SessionReport, open_channel, run_session};
pub use stop::StopToken;
