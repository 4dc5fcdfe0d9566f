use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;

use clap::Parser;
use serde::Deserialize;
use tracing::{debug, error, info};

use dsss_transfer::device::{RadioDriver, SampleChannel, loopback};
use dsss_transfer::error::{Result, TransferError};
use dsss_transfer::transmission::{
    PayloadSink, PayloadSource, ReaderSource, SessionConfig, SessionReport, StopToken, WriterSink,
    open_channel, receive, transmit,
};
use dsss_transfer::utils::consts::LOOPBACK_DEPTH;
use dsss_transfer::utils::logging::init_logging;

/// Runs a downlink (receive) and an uplink (transmit) session side by side
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file with "downlink" and "uplink" session configurations
    config: PathBuf,

    #[arg(short = 'v')]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
struct DuplexConfig {
    downlink: SessionConfig,
    uplink: SessionConfig,
    /// Received payloads; stdout when absent
    downlink_output: Option<PathBuf>,
    /// Payload to send; stdin when absent
    uplink_input: Option<PathBuf>,
}

fn load(path: &Path) -> Result<DuplexConfig> {
    let text = fs::read_to_string(path)?;
    debug!("Loading duplex configuration from {}", path.display());
    Ok(serde_json::from_str(&text)?)
}

fn run(cli: &Cli) -> Result<()> {
    let config = load(&cli.config)?;
    let uplink = SessionConfig {
        transmit: true,
        ..config.uplink
    }
    .validate()?;
    let downlink = SessionConfig {
        transmit: false,
        ..config.downlink
    }
    .validate()?;

    // Two loopback drivers are wired to each other.
    let (tx_channel, rx_channel): (Box<dyn SampleChannel>, Box<dyn SampleChannel>) =
        match (&uplink.driver, &downlink.driver) {
            (RadioDriver::Loopback, RadioDriver::Loopback) => {
                let (tx, rx) = loopback(LOOPBACK_DEPTH);
                (Box::new(tx) as Box<dyn SampleChannel>, Box::new(rx) as Box<dyn SampleChannel>)
            }
            _ => (open_channel(&uplink)?, open_channel(&downlink)?),
        };

    let mut source: Box<dyn PayloadSource> = match &config.uplink_input {
        Some(path) => Box::new(ReaderSource::spawn(File::open(path)?)),
        None => Box::new(ReaderSource::stdin()),
    };
    let mut sink: Box<dyn PayloadSink> = match &config.downlink_output {
        Some(path) => Box::new(WriterSink::new(File::create(path)?)),
        None => Box::new(WriterSink::new(std::io::stdout())),
    };

    let root = StopToken::new();
    let handler_stop = root.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_stop.stop()) {
        error!("Failed to install signal handler: {}", e);
    }

    let uplink_stop = root.child();
    let downlink_stop = root.child();
    let uplink_thread = thread::spawn(move || -> Result<SessionReport> {
        let mut channel = tx_channel;
        transmit(&uplink, channel.as_mut(), source.as_mut(), &uplink_stop)
    });
    let downlink_thread = thread::spawn(move || -> Result<SessionReport> {
        let mut channel = rx_channel;
        receive(&downlink, channel.as_mut(), sink.as_mut(), &downlink_stop)
    });

    let mut failed = None;
    for (name, handle) in [("uplink", uplink_thread), ("downlink", downlink_thread)] {
        match handle.join() {
            Ok(Ok(report)) => info!("{}: {}", name, report),
            Ok(Err(e)) => {
                error!("{} failed: {}", name, e);
                // Nothing left to talk to.
                root.stop();
                failed.get_or_insert(e);
            }
            Err(_) => {
                root.stop();
                failed.get_or_insert(TransferError::Channel(format!("{name} thread panicked")));
            }
        }
    }
    failed.map_or(Ok(()), Err)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
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

    fn write_config(name: &str, text: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("duplex-{}-{}.json", std::process::id(), name));
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_load_reads_both_directions() {
        let path = write_config(
            "ok",
            r#"{"downlink": {"spreading_factor": 8}, "uplink": {"id": "UP"}, "uplink_input": "in.bin"}"#,
        );
        let config = load(&path).unwrap();
        assert_eq!(config.downlink.spreading_factor, 8);
        assert_eq!(config.uplink.id, "UP");
        assert_eq!(config.uplink_input, Some(PathBuf::from("in.bin")));
        assert!(config.downlink_output.is_none());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_load_reports_malformed_json() {
        let path = write_config("bad", r#"{"downlink": {"spreading_factor": "eight"}"#);
        assert!(matches!(load(&path), Err(TransferError::ConfigFile(_))));
        let _ = fs::remove_file(path);
    }
}
