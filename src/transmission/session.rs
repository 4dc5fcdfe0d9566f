// Pieces shared by the transmit and receive loops

use std::fmt;
use std::io;
use std::path::Path;

use num_complex::Complex32;
use tracing::{debug, info, warn};

use super::config::{Direction, SessionParams};
use super::data::{PayloadSink, PayloadSource};
use super::stop::StopToken;
use super::{receiver, sender};
use crate::device::{AudioChannel, RadioDriver, SampleChannel, StreamChannel, is_transient};
use crate::error::{Result, TransferError};
use crate::utils::dump::SampleDump;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every payload byte was sent
    Completed,
    /// The channel reported end of stream
    EndOfStream,
    /// No valid frame arrived within the timeout
    TimedOut,
    /// A stop token fired
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub outcome: Outcome,
    pub frames: u64,
    pub bytes: u64,
    pub header_errors: u64,
    pub payload_errors: u64,
    /// Frames whose Id differs from the session Id
    pub foreign_frames: u64,
}

impl SessionReport {
    pub(crate) fn new() -> Self {
        Self {
            outcome: Outcome::Completed,
            frames: 0,
            bytes: 0,
            header_errors: 0,
            payload_errors: 0,
            foreign_frames: 0,
        }
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}: {} frames, {} bytes, {} header errors, {} payload errors, {} foreign",
            self.outcome, self.frames, self.bytes, self.header_errors, self.payload_errors, self.foreign_frames
        )
    }
}

/// Opens the stream or audio channel a session's driver names.
pub fn open_channel(params: &SessionParams) -> Result<Box<dyn SampleChannel>> {
    let transmit = params.direction == Direction::Transmit;
    let channel: Box<dyn SampleChannel> = match (&params.driver, params.audio) {
        (RadioDriver::Io, None) if transmit => Box::new(StreamChannel::stdout()),
        (RadioDriver::Io, None) => Box::new(StreamChannel::stdin()),
        (RadioDriver::File(path), None) if transmit => Box::new(StreamChannel::create(path)?),
        (RadioDriver::File(path), None) => Box::new(StreamChannel::open(path)?),
        (RadioDriver::Io, Some(audio)) if transmit => {
            Box::new(AudioChannel::from_writer(io::stdout(), audio.gain_db))
        }
        (RadioDriver::Io, Some(audio)) => Box::new(AudioChannel::from_reader(io::stdin(), audio.gain_db)),
        (RadioDriver::File(path), Some(audio)) if transmit => {
            Box::new(AudioChannel::create(path, audio.rate, audio.gain_db)?)
        }
        (RadioDriver::File(path), Some(audio)) => Box::new(AudioChannel::open(path, audio.gain_db)?),
        (RadioDriver::Loopback, _) => {
            return Err(TransferError::Channel(
                "loopback channels are created in pairs by the caller".to_string(),
            ));
        }
    };
    info!("Opened {} channel", params.driver);
    Ok(channel)
}

/// Data end of a session
pub enum Payload<'a> {
    Source(&'a mut dyn PayloadSource),
    Sink(&'a mut dyn PayloadSink),
}

/// Runs one session to completion in the direction its parameters name.
pub fn run_session(
    params: &SessionParams,
    channel: &mut dyn SampleChannel,
    payload: Payload<'_>,
    stop: &StopToken,
) -> Result<SessionReport> {
    match (params.direction, payload) {
        (Direction::Transmit, Payload::Source(source)) => sender::transmit(params, channel, source, stop),
        (Direction::Receive, Payload::Sink(sink)) => receiver::receive(params, channel, sink, stop),
        (direction, _) => Err(TransferError::Channel(format!(
            "{direction:?} session given the wrong payload end"
        ))),
    }
}

/// Channel side of a session: optional dump plus retrying writes.
pub(crate) struct ChannelPort<'a> {
    channel: &'a mut dyn SampleChannel,
    dump: Option<SampleDump>,
}

impl<'a> ChannelPort<'a> {
    pub(crate) fn new(channel: &'a mut dyn SampleChannel, dump: Option<&Path>) -> Result<Self> {
        let dump = match dump {
            Some(path) => {
                info!("Dumping channel samples to {}", path.display());
                Some(SampleDump::create(path)?)
            }
            None => None,
        };
        Ok(Self { channel, dump })
    }

    pub(crate) fn channel(&mut self) -> &mut dyn SampleChannel {
        &mut *self.channel
    }

    pub(crate) fn record(&mut self, samples: &[Complex32]) -> Result<()> {
        if let Some(dump) = self.dump.as_mut() {
            dump.append(samples)?;
        }
        Ok(())
    }

    /// Writes the whole block unless stopped first. Returns false on stop.
    pub(crate) fn write_all(&mut self, samples: &[Complex32], last: bool, stop: &StopToken) -> Result<bool> {
        self.record(samples)?;
        let mut written = 0;
        while written < samples.len() {
            if stop.is_stopped() {
                debug!("Stopped with {} samples unwritten", samples.len() - written);
                return Ok(false);
            }
            match self.channel.write(&samples[written..], last) {
                Ok(n) => written += n,
                Err(e) if is_transient(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }

    pub(crate) fn finish(&mut self) {
        if let Some(dump) = self.dump.as_mut() {
            if let Err(e) = dump.flush() {
                warn!("Failed to flush sample dump: {}", e);
            } else {
                debug!("Dumped {} samples", dump.samples_written());
            }
        }
    }
}
