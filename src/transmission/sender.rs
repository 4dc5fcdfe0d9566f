// Transmit loop: payload source -> frame generator -> resampler -> mixer -> channel

use std::thread;
use std::time::Duration;

use num_complex::Complex32;
use tracing::{debug, info, trace};

use super::config::SessionParams;
use super::data::PayloadSource;
use super::session::{ChannelPort, Outcome, SessionReport};
use super::stop::StopToken;
use crate::device::SampleChannel;
use crate::dsp::{Nco, RationalResampler};
use crate::error::Result;
use crate::phy::{FrameGenerator, FrameHeader};
use crate::utils::consts::{CHANNEL_TIMEOUT_MS, TX_PEAK_AMPLITUDE};

/// Baseband block to channel samples: normalize, resample, mix up.
pub(crate) struct TxPipeline {
    resampler: RationalResampler,
    mixer: Nco,
    scaled: Vec<Complex32>,
    output: Vec<Complex32>,
}

impl TxPipeline {
    pub(crate) fn new(params: &SessionParams) -> Result<Self> {
        let resampler = RationalResampler::from_rates(params.internal_rate, params.sample_rate)?;
        debug!(
            "TX resampler {:.6} ({} -> {}), delay {:.1} samples",
            resampler.rate(),
            params.internal_rate,
            params.sample_rate,
            resampler.delay()
        );
        Ok(Self {
            resampler,
            mixer: Nco::new(params.mixer_frequency()),
            scaled: Vec::new(),
            output: Vec::new(),
        })
    }

    /// Zero samples that push the resampler's history out
    pub(crate) fn flush_len(&self) -> usize {
        self.resampler.delay().ceil() as usize
    }

    pub(crate) fn process(&mut self, block: &[Complex32]) -> &mut Vec<Complex32> {
        normalize(block, &mut self.scaled);
        self.output.clear();
        self.resampler.execute(&self.scaled, &mut self.output);
        self.mixer.mix_block_up(&mut self.output);
        &mut self.output
    }
}

/// Scales `block` into `out` so that no sample magnitude exceeds
/// `TX_PEAK_AMPLITUDE`; blocks peaking below 1 are scaled by it alone.
fn normalize(block: &[Complex32], out: &mut Vec<Complex32>) {
    let peak = block.iter().map(|s| s.norm()).fold(0.0f32, f32::max);
    let scale = TX_PEAK_AMPLITUDE / peak.max(1.0);
    out.clear();
    out.extend(block.iter().map(|&s| s * scale));
}

/// Sends every payload the source yields, one frame per read.
pub fn transmit(
    params: &SessionParams,
    channel: &mut dyn SampleChannel,
    source: &mut dyn PayloadSource,
    stop: &StopToken,
) -> Result<SessionReport> {
    info!("=== Transmit Mode ===");
    let mut port = ChannelPort::new(channel, params.dump.as_deref())?;
    let mut pipeline = TxPipeline::new(params)?;
    let mut generator = FrameGenerator::new(params.frame.clone());

    let mut report = SessionReport::new();
    let mut payload = vec![0u8; params.frame.max_payload];
    let mut block = vec![Complex32::default(); params.tx_block_len()];
    let flush = vec![Complex32::default(); pipeline.flush_len()];
    let mut counter: u32 = 0;
    let mut underrun = false;

    loop {
        if stop.is_stopped() {
            report.outcome = Outcome::Stopped;
            break;
        }

        if !generator.is_assembled() {
            match source.read(&mut payload)? {
                None => break,
                Some(0) => {
                    // Push the tail of the last frame out once per starvation episode.
                    if !underrun {
                        underrun = true;
                        trace!("Payload underrun, flushing {} samples", flush.len());
                        let out = pipeline.process(&flush);
                        if !port.write_all(out, false, stop)? {
                            report.outcome = Outcome::Stopped;
                            break;
                        }
                    }
                    thread::sleep(Duration::from_millis(CHANNEL_TIMEOUT_MS));
                    continue;
                }
                Some(n) => {
                    underrun = false;
                    let header = FrameHeader::new(params.id, counter).to_bytes();
                    generator.assemble(&header, &payload[..n])?;
                    debug!("Frame {} queued: {} bytes", counter, n);
                    counter = counter.wrapping_add(1);
                    report.frames += 1;
                    report.bytes += n as u64;
                }
            }
        }

        let remaining = generator.remaining_samples();
        let used = if generator.write_samples(&mut block) {
            // zero padding after the frame stays off the channel
            remaining.min(block.len())
        } else {
            block.len()
        };
        let out = pipeline.process(&block[..used]);
        if !port.write_all(out, false, stop)? {
            report.outcome = Outcome::Stopped;
            break;
        }
    }

    if report.outcome != Outcome::Stopped {
        let mtu = port.channel().mtu();
        let out = pipeline.process(&flush);
        if mtu > 0 && out.len() % mtu != 0 {
            let padded = out.len().div_ceil(mtu) * mtu;
            out.resize(padded, Complex32::default());
        }
        port.write_all(out, true, stop)?;
        port.channel().wait_drained(stop)?;
        if !params.final_delay.is_zero() {
            debug!("Lingering {:?} after the last sample", params.final_delay);
            thread::sleep(params.final_delay);
        }
    }
    port.finish();

    info!("Transmit finished: {}", report);
    Ok(report)
}
