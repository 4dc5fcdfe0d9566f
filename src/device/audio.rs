// Real PCM audio carrying the complex signal through a Hilbert converter

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use num_complex::Complex32;
use tracing::{debug, info};

use super::{ReadStatus, SampleChannel};
use crate::dsp::{HilbertDecimator, HilbertInterpolator};

const PCM_FULL_SCALE: f32 = 32767.0;

enum PcmSink {
    Raw(BufWriter<Box<dyn Write + Send>>),
    Wav(Option<WavWriter<BufWriter<File>>>),
}

enum PcmSource {
    Raw(BufReader<Box<dyn Read + Send>>),
    Wav(WavReader<BufReader<File>>),
}

fn wav_error(e: hound::Error) -> io::Error {
    match e {
        hound::Error::IoError(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

/// Signed 16-bit mono PCM at twice the complex sample rate. `gain` multiplies
/// samples in both directions, so a receiver can boost a quiet recording.
pub struct AudioChannel {
    gain: f32,
    sink: Option<PcmSink>,
    source: Option<PcmSource>,
    interpolator: HilbertInterpolator,
    decimator: HilbertDecimator,
    real: Vec<f32>,
    pending: Vec<Complex32>,
    offset: usize,
}

impl AudioChannel {
    fn new(gain_db: f32, sink: Option<PcmSink>, source: Option<PcmSource>) -> Self {
        Self {
            gain: 10f32.powf(gain_db / 20.0),
            sink,
            source,
            interpolator: HilbertInterpolator::new(),
            decimator: HilbertDecimator::new(),
            real: Vec::new(),
            pending: Vec::new(),
            offset: 0,
        }
    }

    pub fn from_writer(writer: impl Write + Send + 'static, gain_db: f32) -> Self {
        let writer: Box<dyn Write + Send> = Box::new(writer);
        Self::new(gain_db, Some(PcmSink::Raw(BufWriter::new(writer))), None)
    }

    pub fn from_reader(reader: impl Read + Send + 'static, gain_db: f32) -> Self {
        let reader: Box<dyn Read + Send> = Box::new(reader);
        Self::new(gain_db, None, Some(PcmSource::Raw(BufReader::new(reader))))
    }

    /// Raw PCM, or a WAV file when the name ends in `.wav`.
    pub fn create(path: &Path, audio_rate: u32, gain_db: f32) -> io::Result<Self> {
        if !is_wav(path) {
            return Ok(Self::from_writer(File::create(path)?, gain_db));
        }
        let spec = WavSpec {
            channels: 1,
            sample_rate: audio_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(path, spec).map_err(wav_error)?;
        info!("Writing {} Hz WAV to {}", audio_rate, path.display());
        Ok(Self::new(gain_db, Some(PcmSink::Wav(Some(writer))), None))
    }

    pub fn open(path: &Path, gain_db: f32) -> io::Result<Self> {
        if !is_wav(path) {
            return Ok(Self::from_reader(File::open(path)?, gain_db));
        }
        let reader = WavReader::open(path).map_err(wav_error)?;
        let spec = reader.spec();
        if spec.channels != 1 || spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{}: expected 16-bit mono PCM", path.display()),
            ));
        }
        info!("Reading {} Hz WAV from {}", spec.sample_rate, path.display());
        Ok(Self::new(gain_db, None, Some(PcmSource::Wav(reader))))
    }

    fn to_pcm(&self, sample: f32) -> i16 {
        (sample * self.gain * PCM_FULL_SCALE)
            .round()
            .clamp(-PCM_FULL_SCALE, PCM_FULL_SCALE) as i16
    }

    /// Reads up to `count` PCM samples into `self.real`; false at end of input.
    fn fill_real(&mut self, count: usize) -> io::Result<bool> {
        self.real.clear();
        let scale = self.gain / PCM_FULL_SCALE;
        let Some(source) = self.source.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "audio opened for writing"));
        };
        match source {
            PcmSource::Raw(reader) => {
                while self.real.len() < count {
                    match reader.read_i16::<LittleEndian>() {
                        Ok(v) => self.real.push(v as f32 * scale),
                        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                        Err(e) => return Err(e),
                    }
                }
            }
            PcmSource::Wav(reader) => {
                for v in reader.samples::<i16>().take(count) {
                    self.real.push(v.map_err(wav_error)? as f32 * scale);
                }
            }
        }
        Ok(!self.real.is_empty())
    }
}

impl SampleChannel for AudioChannel {
    fn write(&mut self, samples: &[Complex32], last: bool) -> io::Result<usize> {
        self.real.clear();
        self.interpolator.execute(samples, &mut self.real);
        let pcm: Vec<i16> = self.real.iter().map(|&x| self.to_pcm(x)).collect();

        let Some(sink) = self.sink.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "audio opened for reading"));
        };
        match sink {
            PcmSink::Raw(writer) => {
                for v in pcm {
                    writer.write_i16::<LittleEndian>(v)?;
                }
                if last {
                    writer.flush()?;
                }
            }
            PcmSink::Wav(slot) => {
                if let Some(writer) = slot.as_mut() {
                    for v in pcm {
                        writer.write_sample(v).map_err(wav_error)?;
                    }
                }
                if last {
                    if let Some(writer) = slot.take() {
                        debug!("Finalizing WAV");
                        writer.finalize().map_err(wav_error)?;
                    }
                }
            }
        }
        Ok(samples.len())
    }

    fn read(&mut self, samples: &mut [Complex32]) -> io::Result<ReadStatus> {
        if self.offset == self.pending.len() {
            self.pending.clear();
            self.offset = 0;
            if !self.fill_real(2 * samples.len())? {
                return Ok(ReadStatus::Closed);
            }
            self.decimator.execute(&self.real, &mut self.pending);
        }
        let n = (self.pending.len() - self.offset).min(samples.len());
        samples[..n].copy_from_slice(&self.pending[self.offset..self.offset + n]);
        self.offset += n;
        Ok(ReadStatus::Samples(n))
    }
}
