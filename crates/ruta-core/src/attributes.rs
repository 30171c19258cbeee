//! Stream and device attribute structures.
//!
//! These are value types: a stream clones the attributes it is created with
//! and owns its copy for its whole lifetime.

use serde::{Deserialize, Serialize};

use crate::{DeviceDirection, DeviceId};

/// Use case carried by a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    /// Low-latency PCM playback (UI sounds, games).
    LowLatency,
    /// Deep-buffer PCM playback (music).
    DeepBuffer,
    /// Generic PCM stream.
    Generic,
    /// VoIP uplink.
    VoipTx,
    /// VoIP downlink.
    VoipRx,
    /// PCM offloaded to the DSP.
    PcmOffload,
    /// Circuit-switched voice call.
    VoiceCall,
    /// Hardware loopback between two devices.
    Loopback,
    /// Compressed offload playback (MP3, AAC, FLAC, ...).
    Compressed,
    /// Voice-trigger (hotword) detection.
    VoiceUi,
}

impl StreamType {
    /// Value this stream type contributes to a graph key vector.
    pub const fn graph_value(self) -> u32 {
        match self {
            StreamType::LowLatency => 0xA100_0001,
            StreamType::DeepBuffer => 0xA100_0002,
            StreamType::Generic => 0xA100_0003,
            StreamType::VoipTx => 0xA100_0004,
            StreamType::VoipRx => 0xA100_0005,
            StreamType::PcmOffload => 0xA100_0006,
            StreamType::VoiceCall => 0xA100_0007,
            StreamType::Loopback => 0xA100_0008,
            StreamType::Compressed => 0xA100_0009,
            StreamType::VoiceUi => 0xA100_000A,
        }
    }
}

/// Direction of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamDirection {
    /// Playback.
    Output,
    /// Capture.
    Input,
    /// Both playback and capture (loopback, voice call).
    Duplex,
}

impl StreamDirection {
    /// Whether a device facing `device` may be bound to a stream of this direction.
    pub const fn accepts(self, device: DeviceDirection) -> bool {
        match self {
            StreamDirection::Output => matches!(device, DeviceDirection::Output),
            StreamDirection::Input => matches!(device, DeviceDirection::Input),
            StreamDirection::Duplex => true,
        }
    }
}

/// Encoding of the stream payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    /// Interleaved linear PCM.
    #[default]
    DefaultPcm,
    /// MPEG-1 Layer III.
    Mp3,
    /// Raw AAC.
    Aac,
    /// AAC in ADTS framing.
    AacAdts,
    /// AAC in ADIF framing.
    AacAdif,
    /// AAC in LATM framing.
    AacLatm,
    /// Windows Media Audio standard.
    WmaStd,
    /// Apple Lossless.
    Alac,
    /// Monkey's Audio.
    Ape,
    /// Windows Media Audio professional.
    WmaPro,
    /// FLAC.
    Flac,
    /// Ogg Vorbis.
    Vorbis,
    /// Adaptive multi-rate speech.
    AmrNb,
}

impl AudioFormat {
    /// Whether playback streams may carry this format.
    pub const fn is_output_supported(self) -> bool {
        !matches!(self, AudioFormat::AmrNb)
    }

    /// Whether this is linear PCM.
    pub const fn is_pcm(self) -> bool {
        matches!(self, AudioFormat::DefaultPcm)
    }
}

/// Media format for one direction of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bits per sample.
    pub bit_width: u16,
    /// Channel count.
    pub channels: u16,
    /// Payload encoding.
    #[serde(default)]
    pub format: AudioFormat,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            bit_width: 16,
            channels: 2,
            format: AudioFormat::DefaultPcm,
        }
    }
}

impl MediaConfig {
    /// PCM config with the given rate, width and channel count.
    pub const fn pcm(sample_rate: u32, bit_width: u16, channels: u16) -> Self {
        Self {
            sample_rate,
            bit_width,
            channels,
            format: AudioFormat::DefaultPcm,
        }
    }

    /// Replace the payload encoding.
    pub const fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    /// Size in bytes of one frame (all channels of one sample).
    pub const fn block_align(&self) -> usize {
        (self.bit_width as usize / 8) * self.channels as usize
    }
}

/// Attributes a stream is created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamAttributes {
    /// Use case.
    pub stream_type: StreamType,
    /// Opaque stream flags passed through to the session.
    #[serde(default)]
    pub flags: u32,
    /// Playback, capture or both.
    pub direction: StreamDirection,
    /// Capture-side format.
    #[serde(default)]
    pub in_media: MediaConfig,
    /// Playback-side format.
    #[serde(default)]
    pub out_media: MediaConfig,
}

impl StreamAttributes {
    /// Attributes with default media configs in both directions.
    pub fn new(stream_type: StreamType, direction: StreamDirection) -> Self {
        Self {
            stream_type,
            flags: 0,
            direction,
            in_media: MediaConfig::default(),
            out_media: MediaConfig::default(),
        }
    }

    /// Playback attributes with the given format.
    pub fn playback(stream_type: StreamType, media: MediaConfig) -> Self {
        Self::new(stream_type, StreamDirection::Output).with_out_media(media)
    }

    /// Capture attributes with the given format.
    pub fn capture(stream_type: StreamType, media: MediaConfig) -> Self {
        Self::new(stream_type, StreamDirection::Input).with_in_media(media)
    }

    /// Replace the playback-side format.
    pub fn with_out_media(mut self, media: MediaConfig) -> Self {
        self.out_media = media;
        self
    }

    /// Replace the capture-side format.
    pub fn with_in_media(mut self, media: MediaConfig) -> Self {
        self.in_media = media;
        self
    }

    /// Replace the flags.
    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }
}

/// Echo-reference information for capture paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcInfo {
    /// Channels of the echo-reference feed.
    pub channels: u16,
}

/// Hardware configuration of a device, resolved when it is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Bits per sample.
    pub bit_width: u16,
    /// Echo reference, for capture devices that need one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ec_ref: Option<EcInfo>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            bit_width: 16,
            ec_ref: None,
        }
    }
}

/// Requested binding of a stream to a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAttributes {
    /// Which endpoint.
    pub id: DeviceId,
    /// Card/device address for addressable (USB) endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Hardware configuration.
    #[serde(default)]
    pub config: DeviceConfig,
}

impl DeviceAttributes {
    /// Attributes for `id` with the default configuration.
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            address: None,
            config: DeviceConfig::default(),
        }
    }

    /// Set the card/device address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: DeviceConfig) -> Self {
        self.config = config;
        self
    }
}

/// Opaque key/value pair passed through at stream creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifier {
    /// Modifier key.
    pub key: u32,
    /// Modifier value.
    pub value: u32,
}
