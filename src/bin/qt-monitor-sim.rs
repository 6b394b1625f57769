use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use qt_monitor::{
    algorithms::{FilterVariant, RPeakEvent},
    runtime::{Clock, MetricSink, Monitor, StreamLine},
    synth::Scenario,
    Capabilities, MonitorConfig, SmoothedMetrics,
};
use serde::Serialize;
use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

#[derive(Parser)]
#[command(
    name = "qt-monitor-sim",
    version,
    about = "Runs the beat metric pipeline on a synthetic ECG/PPG recording"
)]
struct Cli {
    /// Length of the recording
    #[arg(long, default_value_t = 10.0)]
    seconds: f32,
    #[arg(long, default_value_t = 75.0)]
    bpm: f32,
    /// QRS onset to T wave end of the generated signal
    #[arg(long, default_value_t = 330.0)]
    qt_ms: f32,
    /// R apex to PPG pulse foot of the generated signal
    #[arg(long, default_value_t = 200.0)]
    pat_ms: f32,
    /// Mains hum amplitude in ADC codes
    #[arg(long, default_value_t = 0.0)]
    hum: f32,
    #[arg(long, value_enum)]
    filter: Option<FilterArg>,
    /// Monitor configuration as JSON; missing fields take their defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Run without the PPG channel
    #[arg(long)]
    no_ppg: bool,
    /// Print every sample as "<ecg> <ppg>"
    #[arg(long)]
    stream: bool,
    /// Pace the loop with the wall clock instead of running as fast as possible
    #[arg(long)]
    realtime: bool,
    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FilterArg {
    #[value(name = "notch50")]
    Notch50Wide,
    #[value(name = "notch50-narrow")]
    Notch50Narrow,
    #[value(name = "notch60")]
    Notch60,
    #[value(name = "lowpass40")]
    LowPass40,
}

impl From<FilterArg> for FilterVariant {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::Notch50Wide => FilterVariant::Notch50Wide,
            FilterArg::Notch50Narrow => FilterVariant::Notch50Narrow,
            FilterArg::Notch60 => FilterVariant::Notch60,
            FilterArg::LowPass40 => FilterVariant::LowPass40,
        }
    }
}

struct WallClock(Instant);

impl Clock for WallClock {
    fn now_us(&mut self) -> u64 {
        self.0.elapsed().as_micros() as u64
    }

    fn sleep_until_us(&mut self, deadline_us: u64) {
        let now = self.now_us();
        if deadline_us > now {
            std::thread::sleep(Duration::from_micros(deadline_us - now));
        }
    }
}

/// Never sleeps, time advances only when asked to.
struct FreeRunning(u64);

impl Clock for FreeRunning {
    fn now_us(&mut self) -> u64 {
        self.0
    }

    fn sleep_until_us(&mut self, deadline_us: u64) {
        self.0 = deadline_us;
    }
}

#[derive(Default)]
struct ConsoleSink {
    beats: u32,
    last_interval: Option<u32>,
}

impl MetricSink for ConsoleSink {
    fn r_peak(&mut self, event: RPeakEvent) {
        self.beats += 1;
        self.last_interval = event.interval.or(self.last_interval);
        log::debug!("beat {} at sample {}", self.beats, event.index);
    }

    fn metrics(&mut self, _metrics: &SmoothedMetrics) {}

    fn stream(&mut self, line: StreamLine) {
        println!("{}", line);
    }
}

#[derive(Serialize)]
struct Summary {
    scenario: Scenario,
    ticks: u64,
    beats: u32,
    last_interval_samples: Option<u32>,
    metrics: SmoothedMetrics,
}

fn load_config(path: Option<&Path>) -> Result<MonitorConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
        }
        None => Ok(MonitorConfig::default()),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.bpm <= 0.0 || cli.seconds <= 0.0 {
        return Err(anyhow!("--bpm and --seconds must be positive"));
    }

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(filter) = cli.filter {
        config = config.with_filter(filter.into());
    }
    if cli.no_ppg {
        config = config.with_capabilities(Capabilities::ecg_only());
    }

    let scenario = Scenario {
        sample_rate: config.sample_rate,
        qt_ms: cli.qt_ms,
        pat_ms: cli.pat_ms,
        ppg_connected: !cli.no_ppg,
        ..Scenario::default()
    }
    .with_bpm(cli.bpm)
    .with_hum(cli.hum);

    let mut monitor = Monitor::new(config)?;
    if cli.stream {
        monitor.command(Monitor::STREAM_COMMAND);
    }

    let ticks = config.sample_rate.s_to_samples(cli.seconds) as u64;
    let mut source = scenario.source();
    let mut sink = ConsoleSink::default();
    log::info!("simulating {} samples at {} Hz", ticks, config.sample_rate.raw());

    if cli.realtime {
        monitor.run(&mut source, &mut sink, &mut WallClock(Instant::now()), ticks);
    } else {
        monitor.run(&mut source, &mut sink, &mut FreeRunning(0), ticks);
    }

    let summary = Summary {
        scenario,
        ticks: monitor.ticks(),
        beats: sink.beats,
        last_interval_samples: sink.last_interval,
        metrics: monitor.metrics(),
    };

    if cli.json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        let m = summary.metrics;
        println!(
            "{} beats in {} samples: {} BPM, QTc {} ms, PAT {:.1} ms",
            summary.beats, summary.ticks, m.bpm, m.qt_ms, m.pat_ms
        );
    }

    Ok(())
}
