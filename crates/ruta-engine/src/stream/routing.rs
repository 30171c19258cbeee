//! Device switch planning.
//!
//! A switch moves the initiating stream, and every other stream that shares
//! a hardware backend with the targets, onto the new devices. Planning
//! reads the binding table and the catalog only; nothing is touched until
//! the plan is submitted to
//! [`ResourceCoordinator::stream_dev_switch`](crate::ResourceCoordinator::stream_dev_switch).
//!
//! ```text
//! targets ─▶ substitute / filter ready ─▶ disconnect set ─▶ connect set ─▶ submit
//!                                          (backend sharers,   (one per target ×
//!                                           else own devices)   same-direction entry)
//! ```

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use ruta_core::{DeviceAttributes, DeviceDirection, DeviceId, Error, Result, StreamId};

use super::{Stream, StreamKind};
use crate::{Connect, Disconnect};

/// Computed device switch, ready for submission.
#[derive(Debug, Clone, Default)]
pub struct SwitchPlan {
    /// Bindings to tear down, in order.
    pub disconnect: Vec<Disconnect>,
    /// Bindings to build, in order.
    pub connect: Vec<Connect>,
    unmute: bool,
}

impl SwitchPlan {
    /// `(stream, device)` pairs to disconnect.
    pub fn disconnect_pairs(&self) -> Vec<(StreamId, DeviceId)> {
        self.disconnect
            .iter()
            .map(|d| (d.stream.id(), d.device))
            .collect()
    }

    /// `(stream, device)` pairs to connect.
    pub fn connect_pairs(&self) -> Vec<(StreamId, DeviceId)> {
        self.connect
            .iter()
            .map(|c| (c.stream.id(), c.device.id))
            .collect()
    }

    /// Whether the plan changes nothing.
    pub fn is_empty(&self) -> bool {
        self.disconnect.is_empty() && self.connect.is_empty()
    }

    /// Whether the initiator's A2DP-suspend mute is lifted on submission.
    pub fn unmutes_initiator(&self) -> bool {
        self.unmute
    }
}

impl Stream {
    /// Plan a switch of this stream to `targets`.
    ///
    /// A `None` target is replaced by the speaker when the stream is on an
    /// A2DP sink that is no longer ready; other `None` targets are skipped,
    /// as are targets facing a direction the stream does not carry and
    /// targets that are not ready. Fails with [`Error::NoDevice`] when no
    /// target survives. The A2DP-suspend mute is lifted only when no
    /// requested target, ready or not, is A2DP.
    pub fn plan_switch(&self, targets: &[DeviceAttributes]) -> Result<SwitchPlan> {
        if targets.is_empty() {
            return Err(Error::invalid("device switch needs at least one target"));
        }
        let initiator = self
            .arc()
            .ok_or_else(|| Error::invalid("stream is being dropped"))?;
        let (current, a2dp_muted, direction) = {
            let inner = self.inner.lock();
            (inner.device_ids(), inner.a2dp_muted, inner.attrs.direction)
        };
        let rm = &self.coordinator;

        let on_a2dp = current.iter().any(|id| id.is_a2dp());
        let mut ready = Vec::with_capacity(targets.len());
        for target in targets {
            let mut target = target.clone();
            if target.id.is_none() && on_a2dp && !rm.is_device_ready(DeviceId::OutBluetoothA2dp) {
                target = DeviceAttributes::new(DeviceId::default_for(DeviceDirection::Output));
                rm.device_config(&mut target, None, 0)?;
                tracing::info!(stream = %self.id, device = %target.id, "a2dp gone, falling back");
            }
            let Some(target_dir) = target.id.direction() else {
                continue;
            };
            if !direction.accepts(target_dir) {
                tracing::warn!(stream = %self.id, device = %target.id, "target faces the wrong direction, skipping");
                continue;
            }
            if !rm.is_device_ready(target.id) {
                tracing::warn!(stream = %self.id, device = %target.id, "target not ready, skipping");
                continue;
            }
            ready.push(target);
        }
        if ready.is_empty() {
            return Err(Error::NoDevice(format!(
                "no ready target for {}",
                self.id
            )));
        }

        let mut disconnect: Vec<(Arc<Stream>, DeviceId)> = Vec::new();
        for target in &ready {
            let shared = rm.shared_backend_bindings(target.id);
            if shared.is_empty() {
                for &id in current.iter().filter(|&&id| rm.match_dev_dir(id, target.id)) {
                    disconnect.push((Arc::clone(&initiator), id));
                    disconnect.extend(rm.shared_backend_bindings(id));
                }
            } else {
                disconnect.extend(shared);
            }
        }
        dedupe(&mut disconnect, |(s, d)| (s.id(), *d));

        let mut connect: Vec<(Arc<Stream>, DeviceAttributes)> = Vec::new();
        for target in &ready {
            if disconnect.is_empty() {
                connect.push((Arc::clone(&initiator), target.clone()));
            }
            for (stream, id) in &disconnect {
                if rm.match_dev_dir(*id, target.id) {
                    connect.push((Arc::clone(stream), target.clone()));
                }
            }
        }
        dedupe(&mut connect, |(s, d)| (s.id(), d.id));

        let unmute = a2dp_muted
            && self.kind == StreamKind::Compressed
            && !targets.iter().any(|t| t.id.is_a2dp());

        Ok(SwitchPlan {
            disconnect: disconnect
                .into_iter()
                .map(|(stream, device)| Disconnect { stream, device })
                .collect(),
            connect: connect
                .into_iter()
                .map(|(stream, device)| Connect { stream, device })
                .collect(),
            unmute,
        })
    }

    /// Plan and submit a switch of this stream to `targets`.
    ///
    /// Nothing changes when planning fails. Submission runs under the
    /// coordinator's device-switch lock; see
    /// [`ResourceCoordinator::stream_dev_switch`](crate::ResourceCoordinator::stream_dev_switch).
    pub fn switch_device(&self, targets: &[DeviceAttributes]) -> Result<()> {
        let plan = self.plan_switch(targets)?;
        tracing::info!(
            stream = %self.id,
            disconnect = ?plan.disconnect_pairs(),
            connect = ?plan.connect_pairs(),
            "switching devices"
        );
        if plan.unmute
            && let Err(e) = self.clear_a2dp_mute()
        {
            tracing::warn!(stream = %self.id, error = %e, "unmute failed");
        }
        self.coordinator
            .stream_dev_switch(&plan.disconnect, &plan.connect)
    }
}

/// Keep the first entry per key, preserving order.
fn dedupe<T, K: Eq + Hash>(items: &mut Vec<T>, key: impl Fn(&T) -> K) {
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(key(item)));
}
