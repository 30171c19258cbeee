//! Stream kinds.

use ruta_config::BufferDefaults;
use ruta_core::{BufferInfo, Error, MediaConfig, Result, StreamAttributes, StreamDirection, StreamType};

/// Closed set of stream behaviors, fixed at construction.
///
/// | kind | stream types | read | write | directions |
/// |---|---|---|---|---|
/// | `Pcm` | low-latency, deep-buffer, generic, VoIP, PCM offload, voice call, loopback | yes | yes | any |
/// | `Compressed` | compressed offload | no | yes | output |
/// | `SoundTrigger` | voice UI | yes | no | input |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Continuous linear PCM.
    Pcm,
    /// Compressed offload playback.
    Compressed,
    /// Voice-trigger detection.
    SoundTrigger,
}

const PCM_BIT_WIDTHS: [u16; 4] = [8, 16, 24, 32];
const COMPRESSED_BIT_WIDTHS: [u16; 3] = [16, 24, 32];
const MAX_CHANNELS: u16 = 8;

impl StreamKind {
    /// Kind serving `stream_type`.
    pub const fn for_type(stream_type: StreamType) -> Self {
        match stream_type {
            StreamType::Compressed => StreamKind::Compressed,
            StreamType::VoiceUi => StreamKind::SoundTrigger,
            StreamType::LowLatency
            | StreamType::DeepBuffer
            | StreamType::Generic
            | StreamType::VoipTx
            | StreamType::VoipRx
            | StreamType::PcmOffload
            | StreamType::VoiceCall
            | StreamType::Loopback => StreamKind::Pcm,
        }
    }

    /// Lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            StreamKind::Pcm => "pcm",
            StreamKind::Compressed => "compressed",
            StreamKind::SoundTrigger => "sound_trigger",
        }
    }

    /// Whether `read` is supported.
    pub const fn can_read(self) -> bool {
        !matches!(self, StreamKind::Compressed)
    }

    /// Whether `write` is supported.
    pub const fn can_write(self) -> bool {
        !matches!(self, StreamKind::SoundTrigger)
    }

    /// Buffer sizing a new stream of this kind starts with.
    pub fn default_buffers(self, defaults: &BufferDefaults) -> BufferInfo {
        match self {
            StreamKind::Compressed => BufferInfo::symmetric(
                defaults.compress_fragment_size,
                defaults.compress_fragment_count,
            ),
            StreamKind::Pcm | StreamKind::SoundTrigger => {
                BufferInfo::symmetric(defaults.pcm_period_size, defaults.pcm_period_count)
            }
        }
    }

    /// Reject attributes this kind cannot carry.
    pub fn check_attributes(self, attrs: &StreamAttributes) -> Result<()> {
        match self {
            StreamKind::Pcm => {
                if matches!(attrs.direction, StreamDirection::Output | StreamDirection::Duplex) {
                    check_pcm(&attrs.out_media)?;
                }
                if matches!(attrs.direction, StreamDirection::Input | StreamDirection::Duplex) {
                    check_pcm(&attrs.in_media)?;
                }
                Ok(())
            }
            StreamKind::Compressed => {
                if attrs.direction != StreamDirection::Output {
                    return Err(Error::Unsupported(
                        "compressed streams are playback only".into(),
                    ));
                }
                let media = &attrs.out_media;
                if !media.format.is_output_supported() {
                    return Err(Error::Unsupported(format!(
                        "format {:?} cannot be played",
                        media.format
                    )));
                }
                if media.channels == 0 || media.channels > MAX_CHANNELS {
                    return Err(Error::Unsupported(format!(
                        "{} channels",
                        media.channels
                    )));
                }
                if !COMPRESSED_BIT_WIDTHS.contains(&media.bit_width) {
                    return Err(Error::Unsupported(format!(
                        "{}-bit compressed output",
                        media.bit_width
                    )));
                }
                Ok(())
            }
            StreamKind::SoundTrigger => {
                if attrs.direction != StreamDirection::Input {
                    return Err(Error::Unsupported(
                        "sound trigger streams are capture only".into(),
                    ));
                }
                check_pcm(&attrs.in_media)
            }
        }
    }
}

fn check_pcm(media: &MediaConfig) -> Result<()> {
    if !media.format.is_pcm() {
        return Err(Error::Unsupported(format!(
            "{:?} on a PCM stream",
            media.format
        )));
    }
    if media.sample_rate == 0 {
        return Err(Error::Unsupported("zero sample rate".into()));
    }
    if media.channels == 0 || media.channels > MAX_CHANNELS {
        return Err(Error::Unsupported(format!("{} channels", media.channels)));
    }
    if !PCM_BIT_WIDTHS.contains(&media.bit_width) {
        return Err(Error::Unsupported(format!("{}-bit PCM", media.bit_width)));
    }
    Ok(())
}
