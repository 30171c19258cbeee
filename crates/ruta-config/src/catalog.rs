//! Device catalog: which endpoints exist and which backend each aliases.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ruta_core::{DeviceConfig, DeviceId, EcInfo};

/// One endpoint of the catalog.
///
/// # TOML Format
///
/// ```toml
/// [[devices]]
/// id = "in_handset_mic"
/// backend = "tx_codec_dma_tx3"
/// sample_rate = 48000
/// channels = 1
/// bit_width = 16
/// ec_channels = 2
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// Endpoint id.
    pub id: DeviceId,
    /// Name of the hardware transport the endpoint is routed over.
    pub backend: String,
    /// Whether the endpoint is currently usable.
    #[serde(default = "default_ready")]
    pub ready: bool,
    /// Native sample rate in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Native channel count.
    #[serde(default = "default_channels")]
    pub channels: u16,
    /// Native bits per sample.
    #[serde(default = "default_bit_width")]
    pub bit_width: u16,
    /// Echo-reference channels, for capture endpoints fed an EC reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ec_channels: Option<u16>,
}

fn default_ready() -> bool {
    true
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

impl DeviceEntry {
    /// Ready entry with the default native format.
    pub fn new(id: DeviceId, backend: impl Into<String>) -> Self {
        Self {
            id,
            backend: backend.into(),
            ready: true,
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            bit_width: default_bit_width(),
            ec_channels: None,
        }
    }

    /// Set the native channel count.
    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    /// Set the echo-reference channel count.
    pub fn with_ec_channels(mut self, channels: u16) -> Self {
        self.ec_channels = Some(channels);
        self
    }

    /// Mark the entry not ready.
    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    /// Echo-reference info, if this endpoint has one.
    pub fn ec_info(&self) -> Option<EcInfo> {
        self.ec_channels.map(|channels| EcInfo { channels })
    }

    /// Hardware configuration an endpoint of this entry is opened with.
    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bit_width: self.bit_width,
            ec_ref: None,
        }
    }
}

/// Ordered list of catalog entries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceCatalog {
    entries: Vec<DeviceEntry>,
}

impl DeviceCatalog {
    /// Catalog from explicit entries.
    pub fn new(entries: Vec<DeviceEntry>) -> Self {
        Self { entries }
    }

    /// Built-in catalog of a typical handset.
    ///
    /// Handset, wired and line outputs share the RX codec backend; A2DP
    /// and SCO are separate Bluetooth transports; the two primary
    /// microphones share a TX codec backend and carry a stereo echo
    /// reference.
    pub fn builtin() -> Self {
        use DeviceId as D;
        Self::new(vec![
            DeviceEntry::new(D::OutHandset, "rx_codec_dma_rx0").with_channels(1),
            DeviceEntry::new(D::OutSpeaker, "wsa_codec_dma_rx0"),
            DeviceEntry::new(D::OutWiredHeadset, "rx_codec_dma_rx0"),
            DeviceEntry::new(D::OutWiredHeadphone, "rx_codec_dma_rx0"),
            DeviceEntry::new(D::OutLineOut, "rx_codec_dma_rx0"),
            DeviceEntry::new(D::OutBluetoothA2dp, "btfm_a2dp_rx"),
            DeviceEntry::new(D::OutBluetoothSco, "btfm_sco_rx").with_channels(1),
            DeviceEntry::new(D::OutUsbDevice, "usb_rx"),
            DeviceEntry::new(D::OutUsbHeadset, "usb_rx"),
            DeviceEntry::new(D::OutHdmi, "display_port_rx"),
            DeviceEntry::new(D::OutProxy, "proxy_rx"),
            DeviceEntry::new(D::InHandsetMic, "tx_codec_dma_tx3")
                .with_channels(1)
                .with_ec_channels(2),
            DeviceEntry::new(D::InSpeakerMic, "tx_codec_dma_tx3")
                .with_channels(2)
                .with_ec_channels(2),
            DeviceEntry::new(D::InWiredHeadset, "tx_codec_dma_tx4").with_channels(1),
            DeviceEntry::new(D::InBluetoothScoHeadset, "btfm_sco_tx").with_channels(1),
            DeviceEntry::new(D::InUsbDevice, "usb_tx"),
            DeviceEntry::new(D::InUsbHeadset, "usb_tx"),
            DeviceEntry::new(D::InHandsetVaMic, "va_codec_dma_tx0").with_channels(1),
            DeviceEntry::new(D::InProxy, "proxy_tx"),
        ])
    }

    /// Entry for `id`.
    pub fn get(&self, id: DeviceId) -> Option<&DeviceEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Mutable entry for `id`.
    pub fn get_mut(&mut self, id: DeviceId) -> Option<&mut DeviceEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    /// Backend `id` is routed over.
    pub fn backend_of(&self, id: DeviceId) -> Option<&str> {
        self.get(id).map(|e| e.backend.as_str())
    }

    /// Ids aliasing `backend`, in catalog order.
    pub fn ids_on_backend(&self, backend: &str) -> Vec<DeviceId> {
        self.entries
            .iter()
            .filter(|e| e.backend == backend)
            .map(|e| e.id)
            .collect()
    }

    /// Entries grouped by backend name.
    pub fn by_backend(&self) -> BTreeMap<&str, Vec<&DeviceEntry>> {
        let mut groups: BTreeMap<&str, Vec<&DeviceEntry>> = BTreeMap::new();
        for entry in &self.entries {
            groups.entry(entry.backend.as_str()).or_default().push(entry);
        }
        groups
    }

    /// Iterate over entries.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<DeviceEntry> for DeviceCatalog {
    fn from_iter<I: IntoIterator<Item = DeviceEntry>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
