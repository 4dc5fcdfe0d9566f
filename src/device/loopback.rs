// In-process channel pair: whatever the sender writes, the receiver reads

use std::io;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, bounded};
use num_complex::Complex32;
use tracing::trace;

use super::{ReadStatus, SampleChannel};
use crate::transmission::StopToken;
use crate::utils::consts::CHANNEL_TIMEOUT_MS;

/// Creates a connected pair holding at most `depth` blocks in flight.
pub fn loopback(depth: usize) -> (LoopbackSender, LoopbackReceiver) {
    let (tx, rx) = bounded(depth.max(1));
    (
        LoopbackSender { tx, mtu: 0 },
        LoopbackReceiver {
            rx,
            pending: Vec::new(),
            offset: 0,
        },
    )
}

fn timeout() -> Duration {
    Duration::from_millis(CHANNEL_TIMEOUT_MS)
}

pub struct LoopbackSender {
    tx: Sender<Vec<Complex32>>,
    mtu: usize,
}

impl LoopbackSender {
    pub fn with_mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }
}

impl SampleChannel for LoopbackSender {
    fn write(&mut self, samples: &[Complex32], _last: bool) -> io::Result<usize> {
        if samples.is_empty() {
            return Ok(0);
        }
        match self.tx.send_timeout(samples.to_vec(), timeout()) {
            Ok(()) => Ok(samples.len()),
            Err(SendTimeoutError::Timeout(_)) => Ok(0),
            Err(SendTimeoutError::Disconnected(_)) => {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "loopback receiver dropped"))
            }
        }
    }

    fn read(&mut self, _samples: &mut [Complex32]) -> io::Result<ReadStatus> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "loopback sender cannot read"))
    }

    fn mtu(&self) -> usize {
        self.mtu
    }

    fn wait_drained(&mut self, stop: &StopToken) -> io::Result<()> {
        while !self.tx.is_empty() && !stop.is_stopped() {
            trace!("Waiting for {} loopback blocks to drain", self.tx.len());
            std::thread::sleep(timeout());
        }
        Ok(())
    }
}

pub struct LoopbackReceiver {
    rx: Receiver<Vec<Complex32>>,
    pending: Vec<Complex32>,
    offset: usize,
}

impl SampleChannel for LoopbackReceiver {
    fn write(&mut self, _samples: &[Complex32], _last: bool) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "loopback receiver cannot write"))
    }

    fn read(&mut self, samples: &mut [Complex32]) -> io::Result<ReadStatus> {
        if self.offset == self.pending.len() {
            match self.rx.recv_timeout(timeout()) {
                Ok(block) => {
                    self.pending = block;
                    self.offset = 0;
                }
                Err(RecvTimeoutError::Timeout) => return Ok(ReadStatus::Starved),
                Err(RecvTimeoutError::Disconnected) => return Ok(ReadStatus::Closed),
            }
        }
        let n = (self.pending.len() - self.offset).min(samples.len());
        samples[..n].copy_from_slice(&self.pending[self.offset..self.offset + n]);
        self.offset += n;
        Ok(ReadStatus::Samples(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_arrive_in_order_then_close() {
        let (mut tx, mut rx) = loopback(4);
        let a: Vec<Complex32> = (0..5).map(|i| Complex32::new(i as f32, 0.0)).collect();
        assert_eq!(tx.write(&a, false).unwrap(), 5);
        assert_eq!(tx.write(&a[..2], true).unwrap(), 2);
        drop(tx);

        let mut buf = [Complex32::default(); 3];
        assert_eq!(rx.read(&mut buf).unwrap(), ReadStatus::Samples(3));
        assert_eq!(rx.read(&mut buf).unwrap(), ReadStatus::Samples(2));
        assert_eq!(buf[1], a[4]);
        assert_eq!(rx.read(&mut buf).unwrap(), ReadStatus::Samples(2));
        assert_eq!(rx.read(&mut buf).unwrap(), ReadStatus::Closed);
    }

    #[test]
    fn test_idle_sender_starves_receiver() {
        let (_tx, mut rx) = loopback(4);
        let mut buf = [Complex32::default(); 8];
        assert_eq!(rx.read(&mut buf).unwrap(), ReadStatus::Starved);
    }

    #[test]
    fn test_full_channel_accepts_nothing() {
        let (mut tx, rx) = loopback(1);
        let block = [Complex32::default(); 4];
        assert_eq!(tx.write(&block, false).unwrap(), 4);
        assert_eq!(tx.write(&block, false).unwrap(), 0);
        drop(rx);
        assert!(tx.write(&block, false).is_err());
    }
}
