//! Short-range pairing channel: connection status plus a typed value store.
//!
//! The transport itself (advertising, characteristics, notifications) lives
//! outside the core.  What the core needs is captured by the
//! [`PairingChannel`] trait, and the shared field storage by
//! [`PairingStore`], which transports feed with raw remote writes through
//! [`PairingStore::remote_write`].

use rlcar_types::{Credentials, LinkStatus, RemoteControl};
use tracing::{debug, info};

use crate::slot::{Slot, SlotCodec};

/// Fields the operator may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteField {
    Ssid,
    Password,
    /// Commit the written credentials.
    Apply,
    X,
    Y,
    Speed,
    DecayMode,
}

/// Fields the operator may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadableField {
    Status,
    DeviceId,
    Battery,
}

/// Typed storage for every pairing-channel field.
///
/// Each field is its own [`Slot`]; numeric remote inputs are clamped to
/// their legal range on every write.
#[derive(Debug)]
pub struct PairingStore {
    pub ssid: Slot<String>,
    pub password: Slot<String>,
    pub apply: Slot<bool>,
    pub status: Slot<String>,
    pub device_id: Slot<String>,
    pub battery: Slot<f32>,
    pub x: Slot<i8>,
    pub y: Slot<i8>,
    pub speed: Slot<i8>,
    pub decay_mode: Slot<i8>,
}

impl PairingStore {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            ssid: Slot::new(String::new()),
            password: Slot::new(String::new()),
            apply: Slot::new(false),
            status: Slot::new(LinkStatus::Idle.as_str().to_string()),
            device_id: Slot::new(device_id.into()),
            battery: Slot::bounded(0.0, 0.0, 100.0),
            x: Slot::bounded(0, -100, 100),
            y: Slot::bounded(0, -100, 100),
            speed: Slot::bounded(0, 0, 100),
            decay_mode: Slot::bounded(0, 0, 1),
        }
    }

    /// Apply a raw remote write.  Empty payloads are ignored.
    pub fn remote_write(&self, field: RemoteField, payload: &[u8]) {
        match field {
            RemoteField::Ssid => {
                if let Some(v) = String::decode(payload) {
                    debug!(bytes = payload.len(), "pairing: ssid written");
                    self.ssid.set(v);
                }
            }
            RemoteField::Password => {
                if let Some(v) = String::decode(payload) {
                    debug!(bytes = payload.len(), "pairing: password written");
                    self.password.set(v);
                }
            }
            RemoteField::Apply => {
                if bool::decode(payload).is_some() {
                    self.apply_credentials();
                }
            }
            RemoteField::X => self.write_axis(&self.x, payload),
            RemoteField::Y => self.write_axis(&self.y, payload),
            RemoteField::Speed => self.write_axis(&self.speed, payload),
            RemoteField::DecayMode => self.write_axis(&self.decay_mode, payload),
        }
    }

    /// Encoded value of a readable field.
    pub fn remote_read(&self, field: ReadableField) -> Vec<u8> {
        match field {
            ReadableField::Status => self.status.get().encode(),
            ReadableField::DeviceId => self.device_id.get().encode(),
            ReadableField::Battery => vec![self.battery.get().round() as u8],
        }
    }

    /// Validate and commit the written credentials.
    ///
    /// Both ssid and password must be non-empty; on success the credentials
    /// become available and the status reads `configured`, otherwise the
    /// status falls back to `idle`.
    pub fn apply_credentials(&self) -> bool {
        let complete = !self.ssid.get().is_empty() && !self.password.get().is_empty();
        self.apply.set(complete);
        let status = if complete {
            LinkStatus::Configured
        } else {
            LinkStatus::Idle
        };
        self.set_status(status);
        info!(status = %status, "pairing: credentials applied");
        complete
    }

    pub fn credentials_available(&self) -> bool {
        self.apply.get()
    }

    /// Consume the committed credentials.
    ///
    /// Returns `None` when nothing was committed since the last take, so
    /// credentials are never replayed.
    pub fn take_credentials(&self) -> Option<Credentials> {
        if !self.apply.replace(false) {
            return None;
        }
        Some(Credentials::new(self.ssid.get(), self.password.get()))
    }

    pub fn remote_control(&self) -> RemoteControl {
        RemoteControl {
            x: self.x.get(),
            y: self.y.get(),
            speed: self.speed.get(),
            decay_mode: self.decay_mode.get(),
        }
    }

    pub fn set_status(&self, status: LinkStatus) {
        self.status.set(status.as_str().to_string());
    }

    pub fn set_battery(&self, percent: f32) {
        self.battery.set(percent);
    }

    fn write_axis(&self, slot: &Slot<i8>, payload: &[u8]) {
        if let Some(v) = i8::decode(payload) {
            slot.set(v);
        }
    }
}

/// The pairing transport as seen by the core.
///
/// Shared between the connector, monitor and drive workers, hence `&self`
/// methods and `Sync`.  Only [`is_connected`][Self::is_connected] and
/// [`store`][Self::store] are transport specific.
pub trait PairingChannel: Send + Sync {
    fn is_connected(&self) -> bool;

    fn store(&self) -> &PairingStore;

    fn credentials_available(&self) -> bool {
        self.store().credentials_available()
    }

    fn take_credentials(&self) -> Option<Credentials> {
        self.store().take_credentials()
    }

    fn remote_control(&self) -> RemoteControl {
        self.store().remote_control()
    }

    fn publish_battery(&self, percent: f32) {
        self.store().set_battery(percent);
    }

    fn publish_status(&self, status: LinkStatus) {
        self.store().set_status(status);
    }
}
