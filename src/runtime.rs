//! The fixed-cadence control loop and its collaborators.

use core::fmt;

use crate::{
    algorithms::RPeakEvent,
    config::MonitorConfig,
    error::Result,
    metrics::SmoothedMetrics,
    pipeline::{Pipeline, TickOutput},
    sampling::SamplingFrequency,
};

/// Where samples come from. Each method is called at most once per tick.
pub trait SampleSource {
    /// ECG ADC code in `0..=1023`.
    fn next_ecg_sample(&mut self) -> u16;

    /// PPG reading. Negative values mean the probe is disconnected or returned no data.
    fn next_ppg_sample(&mut self) -> i16;

    /// Lead integrity as seen by the analog front end.
    fn leads_off(&mut self) -> bool {
        false
    }
}

/// Where results go, usually the display.
pub trait MetricSink {
    /// Sample values for waveform plotting.
    fn samples(&mut self, _ecg: u16, _ppg: Option<i16>) {}

    fn r_peak(&mut self, _event: RPeakEvent) {}

    /// Called once per tick with a snapshot of the published values.
    fn metrics(&mut self, metrics: &SmoothedMetrics);

    /// Debug stream output, only after the `S` command.
    fn stream(&mut self, _line: StreamLine) {}
}

/// One line of the debug stream.
///
/// ```rust
/// use qt_monitor::runtime::StreamLine;
///
/// let line = StreamLine { ecg: 517, ppg: -1 };
/// assert_eq!(line.to_string(), "517 -1");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamLine {
    pub ecg: u16,
    pub ppg: i16,
}

impl fmt::Display for StreamLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.ecg, self.ppg)
    }
}

/// Monotonic microsecond time base.
pub trait Clock {
    fn now_us(&mut self) -> u64;
    fn sleep_until_us(&mut self, deadline_us: u64);
}

/// Keeps the loop at the nominal sample period.
///
/// Each deadline is `max(now, previous + period)`: a late tick is not made up for by running
/// the following ones faster.
#[derive(Clone, Copy, Debug)]
pub struct Pacer {
    period_us: u64,
    deadline_us: Option<u64>,
}

impl Pacer {
    pub fn new(fs: SamplingFrequency) -> Self {
        Self {
            period_us: fs.period_us(),
            deadline_us: None,
        }
    }

    pub fn period_us(&self) -> u64 {
        self.period_us
    }

    /// Sleeps until the next tick is due and returns its deadline.
    pub fn wait(&mut self, clock: &mut impl Clock) -> u64 {
        let now = clock.now_us();
        let deadline = match self.deadline_us {
            Some(previous) => now.max(previous + self.period_us),
            None => now,
        };
        if deadline > now {
            clock.sleep_until_us(deadline);
        }
        self.deadline_us = Some(deadline);
        deadline
    }
}

/// Owns the pipeline and moves one sample period at a time from a source to a sink.
pub struct Monitor {
    pipeline: Pipeline,
    streaming: bool,
    ticks: u64,
}

impl Monitor {
    pub const STREAM_COMMAND: u8 = b'S';

    pub fn new(config: MonitorConfig) -> Result<Self> {
        Ok(Self {
            pipeline: Pipeline::new(config)?,
            streaming: false,
            ticks: 0,
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn metrics(&self) -> SmoothedMetrics {
        self.pipeline.metrics()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Handles a byte received on the command channel. Unknown bytes are ignored.
    pub fn command(&mut self, byte: u8) {
        match byte {
            Self::STREAM_COMMAND if !self.streaming => {
                log::info!("debug streaming enabled");
                self.streaming = true;
            }
            Self::STREAM_COMMAND => {}
            other => log::debug!("ignoring command byte {:#04x}", other),
        }
    }

    /// The display was cleared or switched mode: the next beats are not published.
    pub fn reset_display(&mut self) {
        self.pipeline.rearm();
    }

    pub fn tick(&mut self, source: &mut impl SampleSource, sink: &mut impl MetricSink) -> TickOutput {
        let ecg = source.next_ecg_sample();
        let ppg = self
            .pipeline
            .config()
            .capabilities
            .has_ppg
            .then(|| source.next_ppg_sample());
        let leads_off = source.leads_off();

        let output = self.pipeline.process(ecg, ppg, leads_off);
        self.ticks += 1;

        sink.samples(output.ecg, output.ppg);
        if let Some(event) = output.r_peak {
            sink.r_peak(event);
        }
        sink.metrics(&self.pipeline.metrics());
        if self.streaming {
            sink.stream(StreamLine {
                ecg: output.ecg,
                ppg: ppg.unwrap_or(-1),
            });
        }

        output
    }

    /// Runs `ticks` sample periods paced by `clock`.
    pub fn run(
        &mut self,
        source: &mut impl SampleSource,
        sink: &mut impl MetricSink,
        clock: &mut impl Clock,
        ticks: u64,
    ) {
        let mut pacer = Pacer::new(self.pipeline.config().sample_rate);
        for _ in 0..ticks {
            pacer.wait(clock);
            self.tick(source, sink);
        }
    }
}
