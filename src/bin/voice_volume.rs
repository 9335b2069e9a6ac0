use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::broadcast::{self, error::TryRecvError};

use voice_volume::audio::{
    microphone_factory, AudioCaptureSource, CaptureSourceFactory, SignalPattern, SyntheticSource,
    WavSource,
};
use voice_volume::channel::LevelReceiver;
use voice_volume::engine::CalibrationResult;
use voice_volume::error::AudioCaptureError;
use voice_volume::logging::LoggingContext;
use voice_volume::monitor::LevelMonitor;
use voice_volume::volume::{self, SoftwareVolume, VolumeController};
use voice_volume::{AppConfig, StreamState, StreamSupervisor, SupervisorEvent};

const TICK: Duration = Duration::from_millis(100);
const DEFAULT_CONFIG: &str = "voice_volume.json";

const EXIT_OK: u8 = 0;
const EXIT_CALIBRATION_FAILED: u8 = 2;
const EXIT_FAILED: u8 = 3;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "voice_volume", about = "Drive the output volume from microphone loudness")]
struct Cli {
    /// Configuration file (JSON); missing files fall back to defaults
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Live microphone controlling the system volume
    Monitor {
        /// Override the configured sensitivity (0.1 - 2.0)
        #[arg(long)]
        sensitivity: Option<f64>,
        /// Run a calibration session first and save its thresholds
        #[arg(long)]
        calibrate: bool,
    },
    /// Synthetic input driving an in-memory volume
    Simulate {
        #[arg(long, default_value_t = 10)]
        seconds: u64,
        #[arg(long, value_enum, default_value_t = Pattern::Ramp)]
        pattern: Pattern,
    },
    /// Replay a WAV file through the pipeline
    Replay {
        #[arg(long)]
        wav: PathBuf,
    },
    /// Run one calibration session and save the thresholds
    Calibrate {
        #[arg(long, value_enum, default_value_t = SourceKind::Mic)]
        source: SourceKind,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Pattern {
    Silence,
    Tone,
    Noisy,
    Ramp,
}

impl Pattern {
    fn signal(self) -> SignalPattern {
        match self {
            Pattern::Silence => SignalPattern::Silence,
            Pattern::Tone => SignalPattern::Tone {
                frequency: 440.0,
                amplitude: 0.3,
            },
            Pattern::Noisy => SignalPattern::NoisyTone {
                frequency: 220.0,
                amplitude: 0.2,
                noise: 0.05,
            },
            Pattern::Ramp => SignalPattern::Ramp {
                frequency: 440.0,
                from: 0.001,
                to: 0.8,
                period: Duration::from_secs(4),
            },
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SourceKind {
    Mic,
    Synthetic,
}

/// Why the tick loop returned
enum LoopExit {
    Interrupted,
    Elapsed,
    Calibrated(CalibrationResult),
    Failed(String),
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = AppConfig::load_from_file(&cli.config);
    let logging = LoggingContext::new(&config.logging);
    let _guard = logging.enter();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    match cli.command {
        Commands::Monitor {
            sensitivity,
            calibrate,
        } => {
            let mut config = config;
            if let Some(sensitivity) = sensitivity {
                config.mapping = config.mapping.with_sensitivity(sensitivity);
            }
            let controller = volume::platform_default().context("selecting volume controller")?;
            let session = Session::start(config, microphone_factory(), controller, &logging)?;
            runtime.block_on(session.monitor(&cli.config, calibrate))
        }
        Commands::Simulate { seconds, pattern } => {
            let factory = synthetic_factory(pattern.signal());
            let session = Session::start(config, factory, Box::new(SoftwareVolume::new(0.0)), &logging)?;
            runtime.block_on(session.run_for(Some(Duration::from_secs(seconds))))
        }
        Commands::Replay { wav } => {
            let length = WavSource::duration_of(&wav)
                .with_context(|| format!("reading {}", wav.display()))?;
            let path = wav.clone();
            let factory = move || -> Result<Box<dyn AudioCaptureSource>, AudioCaptureError> {
                Ok(Box::new(WavSource::new(&path).realtime(true)))
            };
            let session = Session::start(config, factory, Box::new(SoftwareVolume::new(0.0)), &logging)?;
            runtime.block_on(session.run_for(Some(length + TICK * 2)))
        }
        Commands::Calibrate { source } => {
            let controller: Box<dyn VolumeController> = Box::new(SoftwareVolume::new(0.0));
            let session = match source {
                SourceKind::Mic => Session::start(config, microphone_factory(), controller, &logging)?,
                SourceKind::Synthetic => Session::start(
                    config,
                    synthetic_factory(Pattern::Noisy.signal()),
                    controller,
                    &logging,
                )?,
            };
            runtime.block_on(session.calibrate_only(&cli.config))
        }
    }
}

fn synthetic_factory(pattern: SignalPattern) -> impl CaptureSourceFactory + 'static {
    move || -> Result<Box<dyn AudioCaptureSource>, AudioCaptureError> {
        Ok(Box::new(SyntheticSource::new(pattern).realtime(true)))
    }
}

/// A running supervisor plus the consumer side
struct Session {
    supervisor: StreamSupervisor,
    receiver: LevelReceiver,
    monitor: LevelMonitor,
    events: broadcast::Receiver<SupervisorEvent>,
}

impl Session {
    fn start<F>(
        config: AppConfig,
        factory: F,
        controller: Box<dyn VolumeController>,
        logging: &LoggingContext,
    ) -> Result<Self>
    where
        F: CaptureSourceFactory + 'static,
    {
        let (supervisor, receiver) = StreamSupervisor::new(config, factory, controller);
        let mut supervisor = supervisor.with_logging(logging.clone());
        let events = supervisor.subscribe();
        supervisor.start().context("starting capture")?;
        Ok(Self {
            supervisor,
            receiver,
            monitor: LevelMonitor::default(),
            events,
        })
    }

    async fn monitor(mut self, config_path: &Path, calibrate: bool) -> Result<ExitCode> {
        if calibrate {
            match self.calibrate(config_path).await? {
                Some(code) => return self.finish(code),
                None => println!("Calibration saved; monitoring. Press Ctrl+C to stop."),
            }
        }
        let exit = self.tick_loop(None, false).await?;
        self.finish(exit_code(&exit))
    }

    async fn run_for(mut self, limit: Option<Duration>) -> Result<ExitCode> {
        let exit = self.tick_loop(limit, false).await?;
        self.finish(exit_code(&exit))
    }

    async fn calibrate_only(mut self, config_path: &Path) -> Result<ExitCode> {
        let code = self.calibrate(config_path).await?.unwrap_or(EXIT_OK);
        self.finish(code)
    }

    /// Run one session; `None` means it completed and was saved
    async fn calibrate(&mut self, config_path: &Path) -> Result<Option<u8>> {
        let seconds = self.supervisor.config().calibration.duration_secs;
        println!("Calibrating for {:.1}s: speak normally...", seconds);
        self.supervisor.start_calibration().context("starting calibration")?;

        match self.tick_loop(None, true).await? {
            LoopExit::Calibrated(Ok(outcome)) => {
                println!(
                    "Noise floor {:.2} dB, min {:.2} dB, max {:.2} dB ({} samples, {} outliers)",
                    outcome.noise_floor,
                    outcome.min_intensity,
                    outcome.max_intensity,
                    outcome.samples_used,
                    outcome.outliers_rejected
                );
                let mut config = AppConfig::load_from_file(config_path);
                config.apply_calibration(&outcome);
                config
                    .save_to_file(config_path)
                    .with_context(|| format!("saving {}", config_path.display()))?;
                Ok(None)
            }
            LoopExit::Interrupted => Ok(Some(EXIT_INTERRUPTED)),
            other => Ok(Some(exit_code(&other))),
        }
    }

    async fn tick_loop(&mut self, limit: Option<Duration>, until_calibrated: bool) -> Result<LoopExit> {
        let mut interval = tokio::time::interval(TICK);
        let deadline = limit.map(|d| tokio::time::Instant::now() + d);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                signal = &mut ctrl_c => {
                    signal.context("listening for Ctrl+C")?;
                    return Ok(LoopExit::Interrupted);
                }
                _ = interval.tick() => {
                    if self.monitor.tick(&mut self.receiver) > 0 {
                        if let Some(line) = self.monitor.status_line() {
                            println!("{}", line);
                        }
                    }
                    if let Some(exit) = self.poll_events(until_calibrated) {
                        return Ok(exit);
                    }
                    if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
                        return Ok(LoopExit::Elapsed);
                    }
                }
            }
        }
    }

    fn poll_events(&mut self, until_calibrated: bool) -> Option<LoopExit> {
        let mut progress = None;
        loop {
            match self.events.try_recv() {
                Ok(SupervisorEvent::CalibrationProgress { percent, samples }) => {
                    progress = Some((percent, samples));
                }
                Ok(SupervisorEvent::CalibrationFinished(result)) if until_calibrated => {
                    return Some(LoopExit::Calibrated(result));
                }
                Ok(SupervisorEvent::Failed { reason }) => return Some(LoopExit::Failed(reason)),
                Ok(SupervisorEvent::RecoveryScheduled {
                    attempt,
                    delay_ms,
                    cause,
                }) => {
                    eprintln!("Recovering (attempt {attempt}, {delay_ms} ms): {cause}");
                }
                Ok(_) | Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => {
                    if let Some((percent, samples)) = progress {
                        println!("Calibrating: {:.0}% ({} samples)", percent, samples);
                    }
                    return None;
                }
            }
        }
    }

    fn finish(mut self, code: u8) -> Result<ExitCode> {
        let failed = self.supervisor.state() == StreamState::Failed;
        let reason = self.supervisor.failure();
        self.supervisor.stop().context("stopping capture")?;
        if self.receiver.dropped() > 0 {
            eprintln!("{} samples dropped by a slow consumer", self.receiver.dropped());
        }
        if failed && code == EXIT_OK {
            bail!("capture failed: {}", reason.unwrap_or_else(|| "unknown".to_string()));
        }
        Ok(ExitCode::from(code))
    }
}

fn exit_code(exit: &LoopExit) -> u8 {
    match exit {
        LoopExit::Failed(reason) => {
            eprintln!("Monitoring failed: {}", reason);
            EXIT_FAILED
        }
        LoopExit::Calibrated(Err(err)) => {
            eprintln!("Calibration failed: {}", err);
            EXIT_CALIBRATION_FAILED
        }
        LoopExit::Interrupted | LoopExit::Elapsed | LoopExit::Calibrated(Ok(_)) => EXIT_OK,
    }
}
