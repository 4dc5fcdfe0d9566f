// Complex f32 samples on a byte stream: stdin, stdout or a file

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use num_complex::Complex32;
use tracing::{debug, warn};

use super::{ReadStatus, SampleChannel};
use crate::utils::dump::{read_iq, write_iq};

pub struct StreamChannel {
    reader: Option<Box<dyn Read + Send>>,
    writer: Option<BufWriter<Box<dyn Write + Send>>>,
}

impl StreamChannel {
    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self {
            reader: Some(Box::new(reader)),
            writer: None,
        }
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        let writer: Box<dyn Write + Send> = Box::new(writer);
        Self {
            reader: None,
            writer: Some(BufWriter::new(writer)),
        }
    }

    pub fn stdin() -> Self {
        Self::from_reader(io::stdin())
    }

    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    pub fn open(path: &Path) -> io::Result<Self> {
        debug!("Reading samples from {}", path.display());
        Ok(Self::from_reader(BufReader::new(File::open(path)?)))
    }

    pub fn create(path: &Path) -> io::Result<Self> {
        debug!("Writing samples to {}", path.display());
        Ok(Self::from_writer(File::create(path)?))
    }
}

impl SampleChannel for StreamChannel {
    fn write(&mut self, samples: &[Complex32], last: bool) -> io::Result<usize> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "stream opened for reading"))?;
        write_iq(writer, samples)?;
        if last {
            writer.flush()?;
        }
        Ok(samples.len())
    }

    fn read(&mut self, samples: &mut [Complex32]) -> io::Result<ReadStatus> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "stream opened for writing"))?;
        match read_iq(reader, samples)? {
            0 if !samples.is_empty() => Ok(ReadStatus::Closed),
            n => Ok(ReadStatus::Samples(n)),
        }
    }
}

impl Drop for StreamChannel {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                warn!("Flushing sample stream on close failed: {}", e);
            }
        }
    }
}
