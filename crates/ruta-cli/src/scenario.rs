//! Scripted routing scenarios.
//!
//! A scenario is a TOML file that declares streams and a list of steps to
//! drive them through against the simulated backend:
//!
//! ```toml
//! [[streams]]
//! name = "music"
//! type = "deep_buffer"
//! devices = ["out_speaker"]
//!
//! [[steps]]
//! action = "open"
//! stream = "music"
//!
//! [[steps]]
//! action = "switch"
//! stream = "music"
//! devices = ["out_wired_headset"]
//!
//! [[steps]]
//! action = "expect"
//! stream = "music"
//! state = "initialized"
//! devices = ["out_wired_headset"]
//! ```
//!
//! Operation errors are recorded in the report and the run continues, so a
//! scenario can assert on how the engine reacts to a failure.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use ruta_config::RutaConfig;
use ruta_core::{
    AudioFormat, DeviceAttributes, DeviceId, MediaConfig, StreamAttributes, StreamDirection,
    StreamId, StreamState, StreamType, VolumeData,
};
use ruta_engine::{ResourceCoordinator, Stream, SubsystemEvent, create_stream};
use ruta_hal::{Journal, SimBackend};
use serde::{Deserialize, Serialize};

/// Parsed scenario file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Engine config; overrides the one loaded from the command line.
    #[serde(default)]
    pub config: Option<RutaConfig>,
    /// Streams created before the first step, in order.
    #[serde(default)]
    pub streams: Vec<StreamSpec>,
    /// Steps to run.
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A stream to create.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamSpec {
    /// Name steps refer to the stream by.
    pub name: String,
    /// Use case.
    #[serde(rename = "type")]
    pub stream_type: StreamType,
    #[serde(default = "default_direction")]
    pub direction: StreamDirection,
    #[serde(default)]
    pub format: AudioFormat,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
    #[serde(default = "default_bit_width")]
    pub bit_width: u16,
    /// Initial devices.
    pub devices: Vec<DeviceId>,
}

fn default_direction() -> StreamDirection {
    StreamDirection::Output
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_channels() -> u16 {
    2
}

fn default_bit_width() -> u16 {
    16
}

impl StreamSpec {
    fn attributes(&self) -> StreamAttributes {
        let media = MediaConfig::pcm(self.sample_rate, self.bit_width, self.channels)
            .with_format(self.format);
        StreamAttributes::new(self.stream_type, self.direction)
            .with_out_media(media)
            .with_in_media(media)
    }
}

/// One scripted action.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Open the stream.
    Open { stream: String },
    /// Start the stream.
    Start { stream: String },
    /// Pause the stream.
    Pause { stream: String },
    /// Resume the stream.
    Resume { stream: String },
    /// Stop the stream.
    Stop { stream: String },
    /// Close the stream.
    Close { stream: String },
    /// Switch the stream's devices.
    Switch {
        stream: String,
        devices: Vec<DeviceId>,
    },
    /// Attach one device to the stream.
    Connect { stream: String, device: DeviceId },
    /// Detach one device from the stream.
    Disconnect { stream: String, device: DeviceId },
    /// Mark a device ready or not ready.
    SetReady { device: DeviceId, ready: bool },
    /// Subsystem restart began.
    Offline,
    /// Subsystem restart finished.
    Online,
    /// Suspend or release the A2DP sink.
    A2dpSuspend { suspended: bool },
    /// Write `bytes` zero bytes.
    Write { stream: String, bytes: usize },
    /// Set a uniform volume.
    SetVolume { stream: String, volume: f32 },
    /// Assert on the stream's state and devices.
    Expect {
        stream: String,
        #[serde(default)]
        state: Option<StreamState>,
        #[serde(default)]
        devices: Option<Vec<DeviceId>>,
    },
}

impl Step {
    fn label(&self) -> String {
        match self {
            Step::Open { stream } => format!("open {stream}"),
            Step::Start { stream } => format!("start {stream}"),
            Step::Pause { stream } => format!("pause {stream}"),
            Step::Resume { stream } => format!("resume {stream}"),
            Step::Stop { stream } => format!("stop {stream}"),
            Step::Close { stream } => format!("close {stream}"),
            Step::Switch { stream, devices } => format!("switch {stream} -> {}", names(devices)),
            Step::Connect { stream, device } => format!("connect {stream} {device}"),
            Step::Disconnect { stream, device } => format!("disconnect {stream} {device}"),
            Step::SetReady { device, ready } => format!("set_ready {device} {ready}"),
            Step::Offline => "offline".to_string(),
            Step::Online => "online".to_string(),
            Step::A2dpSuspend { suspended } => format!("a2dp_suspend {suspended}"),
            Step::Write { stream, bytes } => format!("write {stream} {bytes}"),
            Step::SetVolume { stream, volume } => format!("set_volume {stream} {volume}"),
            Step::Expect { stream, .. } => format!("expect {stream}"),
        }
    }
}

fn names(ids: &[DeviceId]) -> String {
    let names: Vec<&str> = ids.iter().map(|id| id.name()).collect();
    format!("[{}]", names.join(", "))
}

/// How one step went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    /// The operation succeeded.
    Ok,
    /// The operation returned an error.
    Error(String),
    /// All expectations held.
    Passed,
    /// An expectation did not hold.
    Failed(String),
}

/// Outcome of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// 1-based step number.
    pub index: usize,
    /// Short description.
    pub step: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Final state of one stream.
#[derive(Debug, Clone, Serialize)]
pub struct StreamReport {
    pub name: String,
    pub id: StreamId,
    pub kind: &'static str,
    pub state: StreamState,
    pub devices: Vec<DeviceId>,
}

/// One started binding, by stream name.
#[derive(Debug, Clone, Serialize)]
pub struct BindingReport {
    pub stream: String,
    pub device: DeviceId,
}

/// Everything a scenario run produced.
#[derive(Debug, Serialize)]
pub struct Report {
    pub steps: Vec<StepReport>,
    pub streams: Vec<StreamReport>,
    pub bindings: Vec<BindingReport>,
    pub offline: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<Journal>,
}

impl Report {
    /// Steps whose expectations failed.
    pub fn failures(&self) -> impl Iterator<Item = &StepReport> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, Outcome::Failed(_)))
    }
}

impl Scenario {
    /// Parse a scenario from TOML.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let scenario: Scenario = toml::from_str(content).context("parsing scenario")?;
        let mut seen = BTreeMap::new();
        for (index, spec) in scenario.streams.iter().enumerate() {
            if seen.insert(spec.name.as_str(), index).is_some() {
                anyhow::bail!("stream '{}' is declared more than once", spec.name);
            }
        }
        Ok(scenario)
    }

    /// Create the streams and run every step against a fresh simulated
    /// backend.
    pub fn run(self, config: RutaConfig, with_journal: bool) -> anyhow::Result<Report> {
        let config = self.config.unwrap_or(config);
        let sim = SimBackend::new();
        let rm = ResourceCoordinator::new(config, Arc::new(sim.clone()), Arc::new(sim.clone()));

        let mut streams = Vec::with_capacity(self.streams.len());
        for spec in &self.streams {
            let devices: Vec<DeviceAttributes> =
                spec.devices.iter().copied().map(DeviceAttributes::new).collect();
            let stream = create_stream(&rm, &spec.attributes(), &devices, &[])
                .with_context(|| format!("creating stream '{}'", spec.name))?;
            tracing::debug!(name = %spec.name, stream = %stream.id(), "stream created");
            streams.push((spec.name.clone(), stream));
        }

        let runner = Runner {
            rm: &rm,
            streams: &streams,
        };
        let mut steps = Vec::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            let outcome = runner.run_step(step)?;
            match &outcome {
                Outcome::Error(e) => tracing::info!(step = index + 1, error = %e, "step failed"),
                Outcome::Failed(e) => tracing::warn!(step = index + 1, reason = %e, "expectation failed"),
                Outcome::Ok | Outcome::Passed => {}
            }
            steps.push(StepReport {
                index: index + 1,
                step: step.label(),
                outcome,
            });
        }

        Ok(Report {
            steps,
            streams: streams
                .iter()
                .map(|(name, stream)| StreamReport {
                    name: name.clone(),
                    id: stream.id(),
                    kind: stream.kind().name(),
                    state: stream.state(),
                    devices: stream.device_ids(),
                })
                .collect(),
            bindings: rm
                .active_bindings()
                .into_iter()
                .map(|b| BindingReport {
                    stream: runner.name_of(b.stream),
                    device: b.device,
                })
                .collect(),
            offline: rm.is_offline(),
            journal: with_journal.then(|| sim.journal()),
        })
    }
}

struct Runner<'a> {
    rm: &'a Arc<ResourceCoordinator>,
    streams: &'a [(String, Arc<Stream>)],
}

impl Runner<'_> {
    fn stream(&self, name: &str) -> anyhow::Result<&Arc<Stream>> {
        self.streams
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
            .with_context(|| format!("unknown stream '{name}'"))
    }

    fn name_of(&self, id: StreamId) -> String {
        self.streams
            .iter()
            .find(|(_, s)| s.id() == id)
            .map_or_else(|| id.to_string(), |(n, _)| n.clone())
    }

    /// Engine errors become the step's outcome; unknown stream names abort
    /// the run.
    fn run_step(&self, step: &Step) -> anyhow::Result<Outcome> {
        let result = match step {
            Step::Open { stream } => self.stream(stream)?.open(),
            Step::Start { stream } => self.stream(stream)?.start(),
            Step::Pause { stream } => self.stream(stream)?.pause(),
            Step::Resume { stream } => self.stream(stream)?.resume(),
            Step::Stop { stream } => self.stream(stream)?.stop(),
            Step::Close { stream } => self.stream(stream)?.close(),
            Step::Switch { stream, devices } => {
                let targets: Vec<DeviceAttributes> =
                    devices.iter().copied().map(DeviceAttributes::new).collect();
                self.stream(stream)?.switch_device(&targets)
            }
            Step::Connect { stream, device } => self
                .stream(stream)?
                .connect_stream_device(&DeviceAttributes::new(*device)),
            Step::Disconnect { stream, device } => {
                self.stream(stream)?.disconnect_stream_device(*device).map(|_| ())
            }
            Step::SetReady { device, ready } => {
                if !self.rm.set_device_ready(*device, *ready) {
                    return Ok(Outcome::Error(format!("{device} is not in the catalog")));
                }
                Ok(())
            }
            Step::Offline => self.rm.handle_subsystem_event(SubsystemEvent::Offline),
            Step::Online => self.rm.handle_subsystem_event(SubsystemEvent::Online),
            Step::A2dpSuspend { suspended } => {
                self.rm.set_a2dp_suspended(*suspended);
                Ok(())
            }
            Step::Write { stream, bytes } => {
                self.stream(stream)?.write(&vec![0; *bytes]).map(|_| ())
            }
            Step::SetVolume { stream, volume } => {
                self.stream(stream)?.set_volume(VolumeData::uniform(*volume))
            }
            Step::Expect {
                stream,
                state,
                devices,
            } => return Ok(check(self.stream(stream)?, *state, devices.as_deref())),
        };
        Ok(match result {
            Ok(()) => Outcome::Ok,
            Err(e) => Outcome::Error(e.to_string()),
        })
    }
}

fn check(stream: &Stream, state: Option<StreamState>, devices: Option<&[DeviceId]>) -> Outcome {
    let mut problems = Vec::new();
    if let Some(expected) = state {
        let actual = stream.state();
        if actual != expected {
            problems.push(format!("state is {actual}, expected {expected}"));
        }
    }
    if let Some(expected) = devices {
        let actual = stream.device_ids();
        if actual != expected {
            problems.push(format!(
                "devices are {}, expected {}",
                names(&actual),
                names(expected)
            ));
        }
    }
    if problems.is_empty() {
        Outcome::Passed
    } else {
        Outcome::Failed(problems.join("; "))
    }
}
