//! Network-join transport.

use std::net::IpAddr;
use std::time::Duration;

use rlcar_types::Credentials;

/// Station-mode network link.
///
/// Shared between the connector, monitor and video workers.
pub trait NetworkLink: Send + Sync {
    /// Start joining the network described by `credentials`.
    ///
    /// With a zero `timeout` the call only issues the request and returns
    /// immediately; callers then poll [`is_connected`][Self::is_connected].
    /// Otherwise it blocks up to `timeout` and reports whether the link came
    /// up.  Any previous association is dropped first.
    fn connect(&self, credentials: &Credentials, timeout: Duration) -> bool;

    /// Leave the network; `erase` also forgets the stored configuration.
    fn disconnect(&self, erase: bool);

    fn is_connected(&self) -> bool;

    /// Address obtained on the link, `None` while disconnected.
    fn local_address(&self) -> Option<IpAddr>;

    /// Received signal strength in dBm, `0` while disconnected.
    fn signal_strength(&self) -> i32;
}
