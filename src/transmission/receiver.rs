// Receive loop: channel -> mixer -> resampler -> frame synchronizer -> payload sink

use std::time::Instant;

use num_complex::Complex32;
use tracing::{debug, info, warn};

use super::config::SessionParams;
use super::data::PayloadSink;
use super::session::{ChannelPort, Outcome, SessionReport};
use super::stop::StopToken;
use crate::device::{ReadStatus, SampleChannel, is_transient};
use crate::dsp::{Nco, RationalResampler};
use crate::error::Result;
use crate::phy::frame::display_id;
use crate::phy::{FrameHeader, FrameSynchronizer, ReceivedFrame};

/// Channel samples to modem rate: mix down, resample.
pub(crate) struct RxPipeline {
    mixer: Nco,
    resampler: RationalResampler,
    output: Vec<Complex32>,
}

impl RxPipeline {
    pub(crate) fn new(params: &SessionParams) -> Result<Self> {
        let resampler = RationalResampler::from_rates(params.sample_rate, params.internal_rate)?;
        debug!(
            "RX resampler {:.6} ({} -> {}), delay {:.1} samples",
            resampler.rate(),
            params.sample_rate,
            params.internal_rate,
            resampler.delay()
        );
        Ok(Self {
            mixer: Nco::new(params.mixer_frequency()),
            resampler,
            output: Vec::new(),
        })
    }

    pub(crate) fn flush_len(&self) -> usize {
        self.resampler.delay().ceil() as usize
    }

    pub(crate) fn process(&mut self, block: &mut [Complex32]) -> &[Complex32] {
        self.mixer.mix_block_down(block);
        self.output.clear();
        self.resampler.execute(block, &mut self.output);
        &self.output
    }
}

/// Hands a frame to the sink when it passes its checks. Returns true when
/// the frame counts as activity for the receive timeout.
fn accept(
    frame: &ReceivedFrame,
    params: &SessionParams,
    sink: &mut dyn PayloadSink,
    report: &mut SessionReport,
) -> Result<bool> {
    let header = if frame.header_valid {
        FrameHeader::from_bytes(&frame.header)
    } else {
        None
    };
    match header {
        Some(header) if header.id != params.id => {
            report.foreign_frames += 1;
            debug!(
                "Dropping frame for id {:?} (ours is {:?})",
                display_id(&header.id),
                display_id(&params.id)
            );
            return Ok(false);
        }
        Some(_) => {}
        None => {
            report.header_errors += 1;
            warn!("Corrupted header (rssi {:.1} dB)", frame.stats.rssi_db);
        }
    }

    if !frame.payload_valid {
        report.payload_errors += 1;
        warn!(
            "Corrupted payload of {} bytes (evm {:.1} dB)",
            frame.payload.len(),
            frame.stats.evm_db
        );
        return Ok(false);
    }

    sink.write(&frame.payload)?;
    report.frames += 1;
    report.bytes += frame.payload.len() as u64;
    debug!(
        "Frame {} received: {} bytes, rssi {:.1} dB, cfo {:+.5} rad/sample, evm {:.1} dB",
        header.map_or_else(|| "?".to_string(), |h| h.counter.to_string()),
        frame.payload.len(),
        frame.stats.rssi_db,
        frame.stats.cfo,
        frame.stats.evm_db
    );
    Ok(header.is_some())
}

/// Receives frames until the channel ends, the timeout passes or a stop.
pub fn receive(
    params: &SessionParams,
    channel: &mut dyn SampleChannel,
    sink: &mut dyn PayloadSink,
    stop: &StopToken,
) -> Result<SessionReport> {
    info!("=== Receive Mode ===");
    let mut port = ChannelPort::new(channel, params.dump.as_deref())?;
    let mut pipeline = RxPipeline::new(params)?;

    let (frame_tx, frame_rx) = crossbeam_channel::unbounded::<ReceivedFrame>();
    let mut sync = FrameSynchronizer::new(params.frame.clone(), move |frame| {
        // The receiver outlives the synchronizer.
        let _ = frame_tx.send(frame);
    });

    let mut report = SessionReport::new();
    let mut block = vec![Complex32::default(); params.rx_block_len()];
    let mut deadline = params.timeout.map(|timeout| Instant::now() + timeout);

    loop {
        if stop.is_stopped() {
            report.outcome = Outcome::Stopped;
            break;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            info!("No frame within {:?}, giving up", params.timeout.unwrap_or_default());
            report.outcome = Outcome::TimedOut;
            break;
        }

        let n = match port.channel().read(&mut block) {
            Ok(ReadStatus::Samples(n)) => n,
            Ok(ReadStatus::Starved) => continue,
            Ok(ReadStatus::Closed) => {
                debug!("Channel closed");
                report.outcome = Outcome::EndOfStream;
                break;
            }
            Err(e) if is_transient(&e) => continue,
            Err(e) => return Err(e.into()),
        };
        if n == 0 {
            continue;
        }
        port.record(&block[..n])?;
        sync.execute(pipeline.process(&mut block[..n]));

        for frame in frame_rx.try_iter() {
            if accept(&frame, params, sink, &mut report)? {
                deadline = params.timeout.map(|timeout| Instant::now() + timeout);
            }
        }
    }

    if report.outcome != Outcome::Stopped {
        // Push what the resampler still holds, then let an open frame finish.
        let mut zeros = vec![Complex32::default(); pipeline.flush_len()];
        sync.execute(pipeline.process(&mut zeros));
        let silence = [Complex32::default()];
        while sync.is_frame_open() && !stop.is_stopped() {
            sync.execute(&silence);
        }
        for frame in frame_rx.try_iter() {
            accept(&frame, params, sink, &mut report)?;
        }
    }
    port.finish();

    info!("Receive finished: {}", report);
    Ok(report)
}
