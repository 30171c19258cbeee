//! Device identifiers.
//!
//! [`DeviceId`] is a closed set of endpoints. The render/capture direction is
//! part of the identity, so direction matching between two ids never needs a
//! lookup table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Render or capture side of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceDirection {
    /// Render (playback) endpoint.
    Output,
    /// Capture (record) endpoint.
    Input,
}

/// Identifier of an audio endpoint.
///
/// `None` is the routing sentinel meaning "no device"; it never names a
/// physical endpoint and has no direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceId {
    /// Routing sentinel: no device.
    None,
    /// Earpiece receiver.
    OutHandset,
    /// Loudspeaker.
    OutSpeaker,
    /// Wired headset (with microphone).
    OutWiredHeadset,
    /// Wired headphones.
    OutWiredHeadphone,
    /// Analog line out.
    OutLineOut,
    /// Bluetooth A2DP sink.
    OutBluetoothA2dp,
    /// Bluetooth SCO sink.
    OutBluetoothSco,
    /// USB audio device.
    OutUsbDevice,
    /// USB headset.
    OutUsbHeadset,
    /// HDMI / DisplayPort audio.
    OutHdmi,
    /// Proxy output used for casting.
    OutProxy,
    /// Primary handset microphone.
    InHandsetMic,
    /// Speakerphone microphone.
    InSpeakerMic,
    /// Wired headset microphone.
    InWiredHeadset,
    /// Bluetooth SCO headset microphone.
    InBluetoothScoHeadset,
    /// USB audio device capture.
    InUsbDevice,
    /// USB headset microphone.
    InUsbHeadset,
    /// Always-on low-power microphone for voice triggers.
    InHandsetVaMic,
    /// Proxy input used for casting.
    InProxy,
}

impl DeviceId {
    /// Every identifier, sentinel included.
    pub const ALL: [DeviceId; 20] = [
        DeviceId::None,
        DeviceId::OutHandset,
        DeviceId::OutSpeaker,
        DeviceId::OutWiredHeadset,
        DeviceId::OutWiredHeadphone,
        DeviceId::OutLineOut,
        DeviceId::OutBluetoothA2dp,
        DeviceId::OutBluetoothSco,
        DeviceId::OutUsbDevice,
        DeviceId::OutUsbHeadset,
        DeviceId::OutHdmi,
        DeviceId::OutProxy,
        DeviceId::InHandsetMic,
        DeviceId::InSpeakerMic,
        DeviceId::InWiredHeadset,
        DeviceId::InBluetoothScoHeadset,
        DeviceId::InUsbDevice,
        DeviceId::InUsbHeadset,
        DeviceId::InHandsetVaMic,
        DeviceId::InProxy,
    ];

    /// Direction of the endpoint, or `None` for the sentinel.
    pub const fn direction(self) -> Option<DeviceDirection> {
        match self {
            DeviceId::None => None,
            DeviceId::OutHandset
            | DeviceId::OutSpeaker
            | DeviceId::OutWiredHeadset
            | DeviceId::OutWiredHeadphone
            | DeviceId::OutLineOut
            | DeviceId::OutBluetoothA2dp
            | DeviceId::OutBluetoothSco
            | DeviceId::OutUsbDevice
            | DeviceId::OutUsbHeadset
            | DeviceId::OutHdmi
            | DeviceId::OutProxy => Some(DeviceDirection::Output),
            DeviceId::InHandsetMic
            | DeviceId::InSpeakerMic
            | DeviceId::InWiredHeadset
            | DeviceId::InBluetoothScoHeadset
            | DeviceId::InUsbDevice
            | DeviceId::InUsbHeadset
            | DeviceId::InHandsetVaMic
            | DeviceId::InProxy => Some(DeviceDirection::Input),
        }
    }

    /// Whether both ids are real devices facing the same direction.
    pub fn same_direction(self, other: DeviceId) -> bool {
        match (self.direction(), other.direction()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Whether this is the "no device" sentinel.
    pub const fn is_none(self) -> bool {
        matches!(self, DeviceId::None)
    }

    /// USB endpoints carry a card/device address in their attributes.
    pub const fn is_addressable(self) -> bool {
        matches!(
            self,
            DeviceId::OutUsbDevice
                | DeviceId::OutUsbHeadset
                | DeviceId::InUsbDevice
                | DeviceId::InUsbHeadset
        )
    }

    /// Whether this is the Bluetooth A2DP sink.
    pub const fn is_a2dp(self) -> bool {
        matches!(self, DeviceId::OutBluetoothA2dp)
    }

    /// Fallback device of the given direction used when a route collapses.
    pub const fn default_for(direction: DeviceDirection) -> DeviceId {
        match direction {
            DeviceDirection::Output => DeviceId::OutSpeaker,
            DeviceDirection::Input => DeviceId::InHandsetMic,
        }
    }

    /// Value this device contributes to a graph key vector.
    pub const fn graph_value(self) -> u32 {
        match self {
            DeviceId::None => 0,
            DeviceId::OutHandset => 0xA200_0001,
            DeviceId::OutSpeaker => 0xA200_0002,
            DeviceId::OutWiredHeadset => 0xA200_0003,
            DeviceId::OutWiredHeadphone => 0xA200_0004,
            DeviceId::OutLineOut => 0xA200_0005,
            DeviceId::OutBluetoothA2dp => 0xA200_0006,
            DeviceId::OutBluetoothSco => 0xA200_0007,
            DeviceId::OutUsbDevice => 0xA200_0008,
            DeviceId::OutUsbHeadset => 0xA200_0009,
            DeviceId::OutHdmi => 0xA200_000A,
            DeviceId::OutProxy => 0xA200_000B,
            DeviceId::InHandsetMic => 0xA300_0001,
            DeviceId::InSpeakerMic => 0xA300_0002,
            DeviceId::InWiredHeadset => 0xA300_0003,
            DeviceId::InBluetoothScoHeadset => 0xA300_0004,
            DeviceId::InUsbDevice => 0xA300_0005,
            DeviceId::InUsbHeadset => 0xA300_0006,
            DeviceId::InHandsetVaMic => 0xA300_0007,
            DeviceId::InProxy => 0xA300_0008,
        }
    }

    /// Snake-case name, matching the serialized form.
    pub const fn name(self) -> &'static str {
        match self {
            DeviceId::None => "none",
            DeviceId::OutHandset => "out_handset",
            DeviceId::OutSpeaker => "out_speaker",
            DeviceId::OutWiredHeadset => "out_wired_headset",
            DeviceId::OutWiredHeadphone => "out_wired_headphone",
            DeviceId::OutLineOut => "out_line_out",
            DeviceId::OutBluetoothA2dp => "out_bluetooth_a2dp",
            DeviceId::OutBluetoothSco => "out_bluetooth_sco",
            DeviceId::OutUsbDevice => "out_usb_device",
            DeviceId::OutUsbHeadset => "out_usb_headset",
            DeviceId::OutHdmi => "out_hdmi",
            DeviceId::OutProxy => "out_proxy",
            DeviceId::InHandsetMic => "in_handset_mic",
            DeviceId::InSpeakerMic => "in_speaker_mic",
            DeviceId::InWiredHeadset => "in_wired_headset",
            DeviceId::InBluetoothScoHeadset => "in_bluetooth_sco_headset",
            DeviceId::InUsbDevice => "in_usb_device",
            DeviceId::InUsbHeadset => "in_usb_headset",
            DeviceId::InHandsetVaMic => "in_handset_va_mic",
            DeviceId::InProxy => "in_proxy",
        }
    }

    /// Look up an id by its snake-case name.
    pub fn from_name(name: &str) -> Option<DeviceId> {
        DeviceId::ALL.into_iter().find(|id| id.name() == name)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
