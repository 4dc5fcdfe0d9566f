use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use num_complex::Complex32;

/// Bytes of one complex sample on the wire (f32 I, f32 Q, little endian)
pub const IQ_SAMPLE_BYTES: usize = 8;

pub fn write_iq<W: Write>(writer: &mut W, samples: &[Complex32]) -> io::Result<()> {
    for sample in samples {
        writer.write_f32::<LittleEndian>(sample.re)?;
        writer.write_f32::<LittleEndian>(sample.im)?;
    }
    Ok(())
}

/// Decodes whole samples from `bytes`; a trailing partial sample is ignored.
pub fn decode_iq(bytes: &[u8], samples: &mut [Complex32]) -> usize {
    let count = (bytes.len() / IQ_SAMPLE_BYTES).min(samples.len());
    let mut cursor = io::Cursor::new(bytes);
    for sample in samples.iter_mut().take(count) {
        // The slice holds at least `count` whole samples.
        let re = cursor.read_f32::<LittleEndian>().unwrap_or_default();
        let im = cursor.read_f32::<LittleEndian>().unwrap_or_default();
        *sample = Complex32::new(re, im);
    }
    count
}

/// Reads up to `samples.len()` samples, returning 0 only at end of stream.
pub fn read_iq<R: Read>(reader: &mut R, samples: &mut [Complex32]) -> io::Result<usize> {
    let mut bytes = vec![0u8; samples.len() * IQ_SAMPLE_BYTES];
    let mut filled = 0;
    while filled < bytes.len() {
        match reader.read(&mut bytes[filled..]) {
            Ok(0) => break,
            Ok(n) => {
                filled += n;
                // Return as soon as at least one whole sample is available.
                if filled % IQ_SAMPLE_BYTES == 0 {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(decode_iq(&bytes[..filled], samples))
}

/// Raw copy of every block crossing the channel boundary.
pub struct SampleDump {
    writer: BufWriter<File>,
    samples: u64,
}

impl SampleDump {
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            samples: 0,
        })
    }

    pub fn append(&mut self, samples: &[Complex32]) -> io::Result<()> {
        write_iq(&mut self.writer, samples)?;
        self.samples += samples.len() as u64;
        Ok(())
    }

    pub fn samples_written(&self) -> u64 {
        self.samples
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
