use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use dsss_transfer::error::Result;
use dsss_transfer::error_correction::available_codes;
use dsss_transfer::transmission::{
    Direction, Payload, PayloadSink, PayloadSource, ReaderSource, SessionConfig, StopToken,
    WriterSink, open_channel, run_session,
};
use dsss_transfer::utils::logging::init_logging;

/// DSSS modem: bytes in, spread-spectrum samples out, and back
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// PCM audio instead of complex samples
    #[arg(short = 'a')]
    audio: bool,

    /// Bit rate (b/s)
    #[arg(short = 'b', default_value_t = 100)]
    bit_rate: u32,

    /// Clock correction (ppm)
    #[arg(short = 'c', default_value_t = 0.0, allow_negative_numbers = true)]
    ppm: f64,

    /// Copy of every channel sample, complex f32
    #[arg(short = 'd')]
    dump: Option<PathBuf>,

    /// Inner[,outer] forward error correction
    #[arg(short = 'e', default_value = "h128,none")]
    fec: String,

    /// Center frequency (Hz)
    #[arg(short = 'f', default_value_t = 434_000_000)]
    frequency: u64,

    /// Gain (dB)
    #[arg(short = 'g', default_value = "0", allow_hyphen_values = true)]
    gain: String,

    /// Session id, at most 4 bytes
    #[arg(short = 'i', default_value = "")]
    id: String,

    /// Spreading factor
    #[arg(short = 'n', default_value_t = 64)]
    spreading_factor: usize,

    /// Frequency offset (Hz)
    #[arg(short = 'o', default_value_t = 0.0, allow_negative_numbers = true)]
    frequency_offset: f64,

    /// Radio driver: io or file=<path>
    #[arg(short = 'r', default_value = "io")]
    radio: String,

    /// Sample rate (S/s)
    #[arg(short = 's', default_value_t = 2_000_000)]
    sample_rate: u64,

    /// Seconds without a frame before receiving stops (0 = never)
    #[arg(short = 'T', default_value_t = 0)]
    timeout: u64,

    /// Transmit instead of receive
    #[arg(short = 't')]
    transmit: bool,

    /// Verbose logging
    #[arg(short = 'v')]
    verbose: bool,

    /// Seconds to wait after transmitting
    #[arg(short = 'w', default_value_t = 0.0)]
    final_delay: f64,

    /// List the forward error correction codes and exit
    #[arg(long)]
    list_codes: bool,

    /// Payload input (transmit) or output (receive) instead of stdin/stdout
    filename: Option<PathBuf>,
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            radio: self.radio.clone(),
            transmit: self.transmit,
            sample_rate: self.sample_rate,
            bit_rate: self.bit_rate,
            frequency: self.frequency,
            frequency_offset: self.frequency_offset,
            gain: self.gain.clone(),
            ppm: self.ppm,
            spreading_factor: self.spreading_factor,
            fec: self.fec.clone(),
            id: self.id.clone(),
            dump: self.dump.clone(),
            timeout: self.timeout,
            audio: self.audio,
            final_delay: self.final_delay,
            ..SessionConfig::default()
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let params = cli.session_config().validate()?;

    let stop = StopToken::new();
    let handler_stop = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_stop.stop()) {
        error!("Failed to install signal handler: {}", e);
    }

    let mut channel = open_channel(&params)?;
    let report = match params.direction {
        Direction::Transmit => {
            let mut source: Box<dyn PayloadSource> = match &cli.filename {
                Some(path) => Box::new(ReaderSource::spawn(File::open(path)?)),
                None => Box::new(ReaderSource::stdin()),
            };
            run_session(&params, channel.as_mut(), Payload::Source(source.as_mut()), &stop)?
        }
        Direction::Receive => {
            let mut sink: Box<dyn PayloadSink> = match &cli.filename {
                Some(path) => Box::new(WriterSink::new(File::create(path)?)),
                None => Box::new(WriterSink::new(std::io::stdout())),
            };
            run_session(&params, channel.as_mut(), Payload::Sink(sink.as_mut()), &stop)?
        }
    };
    info!("{}", report);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.list_codes {
        println!("Available forward error correction codes:");
        println!("{}", available_codes());
        return ExitCode::SUCCESS;
    }

    init_logging(cli.verbose);
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_match_session_defaults() {
        let cli = Cli::try_parse_from(["dsss-transfer"]).unwrap();
        assert_eq!(cli.session_config(), SessionConfig::default());
        assert!(cli.filename.is_none());
        assert!(!cli.list_codes);
    }

    #[test]
    fn test_transmit_options() {
        let cli = Cli::try_parse_from([
            "dsss-transfer", "-t", "-a", "-b", "2400", "-n", "16", "-e", "none,secded3932", "-i", "TEST",
            "-g", "-6", "-c", "-1.5", "-r", "file=out.wav", "-s", "48000", "-f", "12000", "payload.bin",
        ])
        .unwrap();
        let config = cli.session_config();
        assert!(config.transmit && config.audio);
        assert_eq!(config.bit_rate, 2400);
        assert_eq!(config.spreading_factor, 16);
        assert_eq!(config.gain, "-6");
        assert_eq!(config.ppm, -1.5);
        assert_eq!(config.radio, "file=out.wav");
        assert_eq!(cli.filename, Some(PathBuf::from("payload.bin")));
    }
}
