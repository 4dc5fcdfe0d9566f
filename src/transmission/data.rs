// Payload byte sources and sinks at the edge of a session

use std::io::{self, Read, Write};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};
use tracing::{debug, error};

/// Chunks a reader thread may queue ahead of the session
const READ_AHEAD: usize = 16;
const READ_CHUNK: usize = 4096;

pub trait PayloadSource: Send {
    /// `Some(n)` bytes were copied into `buf`, `Some(0)` means none are
    /// available right now, `None` means the input has ended.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>>;
}

pub trait PayloadSink: Send {
    fn write(&mut self, payload: &[u8]) -> io::Result<()>;
}

/// In-memory payload, handed out in order.
pub struct BytesSource {
    data: Vec<u8>,
    position: usize,
}

impl BytesSource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            position: 0,
        }
    }
}

impl PayloadSource for BytesSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        let remaining = &self.data[self.position..];
        if remaining.is_empty() {
            return Ok(None);
        }
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(Some(n))
    }
}

/// Reads a blocking reader (stdin, a pipe, a file) on a helper thread so
/// the transmit loop only ever polls.
pub struct ReaderSource {
    chunks: Receiver<io::Result<Vec<u8>>>,
    pending: Vec<u8>,
    offset: usize,
}

impl ReaderSource {
    pub fn spawn(mut reader: impl Read + Send + 'static) -> Self {
        let (tx, rx) = bounded(READ_AHEAD);
        thread::spawn(move || {
            let mut chunk = vec![0u8; READ_CHUNK];
            loop {
                let message = match reader.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => Ok(chunk[..n].to_vec()),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        error!("Payload input failed: {}", e);
                        Err(e)
                    }
                };
                let failed = message.is_err();
                if tx.send(message).is_err() || failed {
                    break;
                }
            }
            debug!("Payload input reached end of stream");
        });
        Self {
            chunks: rx,
            pending: Vec::new(),
            offset: 0,
        }
    }

    pub fn stdin() -> Self {
        Self::spawn(io::stdin())
    }
}

impl PayloadSource for ReaderSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        let mut filled = 0;
        while filled < buf.len() {
            if self.offset == self.pending.len() {
                match self.chunks.try_recv() {
                    Ok(chunk) => {
                        self.pending = chunk?;
                        self.offset = 0;
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) if filled == 0 => return Ok(None),
                    Err(TryRecvError::Disconnected) => break,
                }
            }
            let n = (self.pending.len() - self.offset).min(buf.len() - filled);
            buf[filled..filled + n].copy_from_slice(&self.pending[self.offset..self.offset + n]);
            self.offset += n;
            filled += n;
        }
        Ok(Some(filled))
    }
}

/// Writes each payload to a byte stream, flushing after every frame.
pub struct WriterSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> PayloadSink for WriterSink<W> {
    fn write(&mut self, payload: &[u8]) -> io::Result<()> {
        self.writer.write_all(payload)?;
        self.writer.flush()
    }
}

impl PayloadSink for Sender<Vec<u8>> {
    fn write(&mut self, payload: &[u8]) -> io::Result<()> {
        self.send(payload.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "payload receiver dropped"))
    }
}
