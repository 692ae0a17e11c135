//! Process-wide set of named condition flags.
//!
//! The [`FlagBus`] is the only coordination state shared between workers.
//! It wraps a [`tokio::sync::watch`] channel carrying a [`Flags`] bitset:
//!
//! * [`FlagBus::set`] / [`FlagBus::clear`] perform one atomic
//!   read-modify-write each and only wake waiters when a bit actually
//!   changed.
//! * [`FlagBus::wait_all`], [`FlagBus::wait_any`] and
//!   [`FlagBus::wait_cleared`] park the calling task until the predicate
//!   holds, returning immediately when it already does.  An optional timeout
//!   turns the wait into a bounded one that reports `false` on expiry.
//!
//! # Flags
//!
//! | Flag | Meaning |
//! |---|---|
//! | [`Flags::CONNECT`] | Connector is armed (gate of the connector worker) |
//! | [`Flags::PAIRED`] | Pairing channel was seen connected |
//! | [`Flags::LINKED`] | Network link is up |
//! | [`Flags::RUN`] | Links healthy; gate of monitor, drive and video |

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::trace;

/// A set of named boolean condition flags.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flags(u32);

impl Flags {
    pub const CONNECT: Flags = Flags(1 << 0);
    pub const PAIRED: Flags = Flags(1 << 1);
    pub const LINKED: Flags = Flags(1 << 2);
    pub const RUN: Flags = Flags(1 << 3);

    const NAMED: [(Flags, &'static str); 4] = [
        (Flags::CONNECT, "CONNECT"),
        (Flags::PAIRED, "PAIRED"),
        (Flags::LINKED, "LINKED"),
        (Flags::RUN, "RUN"),
    ];

    pub const fn empty() -> Self {
        Flags(0)
    }

    /// Every named flag.
    pub const fn all() -> Self {
        Flags(Self::CONNECT.0 | Self::PAIRED.0 | Self::LINKED.0 | Self::RUN.0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Flags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// All bits of `other` are set in `self`.
    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    /// At least one bit of `other` is set in `self`.
    pub const fn intersects(self, other: Flags) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn union(self, other: Flags) -> Self {
        Flags(self.0 | other.0)
    }

    pub const fn difference(self, other: Flags) -> Self {
        Flags(self.0 & !other.0)
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        self.union(rhs)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        *self = self.union(rhs);
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        f.write_str("Flags(")?;
        for (flag, name) in Self::NAMED {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        let unnamed = self.difference(Self::all());
        if !unnamed.is_empty() {
            if !first {
                f.write_str(" | ")?;
            }
            write!(f, "{:#x}", unnamed.0)?;
            first = false;
        }
        if first {
            f.write_str("empty")?;
        }
        f.write_str(")")
    }
}

/// Shared flag set.  Clone it cheaply – all clones observe the same bits.
#[derive(Clone)]
pub struct FlagBus {
    sender: Arc<watch::Sender<Flags>>,
}

impl FlagBus {
    /// Create a bus with every flag cleared.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(Flags::empty());
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Raise `flags`.  Returns `true` if any bit changed.
    pub fn set(&self, flags: Flags) -> bool {
        self.sender.send_if_modified(|current| {
            let next = current.union(flags);
            let changed = next != *current;
            if changed {
                trace!(set = ?flags, now = ?next, "flag bus");
                *current = next;
            }
            changed
        })
    }

    /// Lower `flags`.  Returns `true` if any bit changed.
    pub fn clear(&self, flags: Flags) -> bool {
        self.sender.send_if_modified(|current| {
            let next = current.difference(flags);
            let changed = next != *current;
            if changed {
                trace!(cleared = ?flags, now = ?next, "flag bus");
                *current = next;
            }
            changed
        })
    }

    /// Atomically trade `from` for `to`, but only while every bit of `from`
    /// is still set.  Returns `false` and leaves the bits alone otherwise, so
    /// a hand-off cannot resurrect a gate that was dropped concurrently.
    pub fn hand_off(&self, from: Flags, to: Flags) -> bool {
        self.sender.send_if_modified(|current| {
            if !current.contains(from) {
                return false;
            }
            let next = current.difference(from).union(to);
            trace!(from = ?from, to = ?to, now = ?next, "flag bus hand-off");
            *current = next;
            true
        })
    }

    /// Snapshot of the current bits.
    pub fn get(&self) -> Flags {
        *self.sender.borrow()
    }

    /// All of `flags` are currently set.
    pub fn contains(&self, flags: Flags) -> bool {
        self.get().contains(flags)
    }

    /// Wait until every bit of `flags` is set.
    ///
    /// Returns `false` only when `timeout` elapses first.
    pub async fn wait_all(&self, flags: Flags, timeout: Option<Duration>) -> bool {
        self.wait_until(move |f| f.contains(flags), timeout).await
    }

    /// Wait until at least one bit of `flags` is set.
    pub async fn wait_any(&self, flags: Flags, timeout: Option<Duration>) -> bool {
        self.wait_until(move |f| f.intersects(flags), timeout).await
    }

    /// Wait until `flags` is no longer fully set (a gate dropped).
    pub async fn wait_cleared(&self, flags: Flags, timeout: Option<Duration>) -> bool {
        self.wait_until(move |f| !f.contains(flags), timeout).await
    }

    async fn wait_until<F>(&self, mut predicate: F, timeout: Option<Duration>) -> bool
    where
        F: FnMut(&Flags) -> bool + Send,
    {
        let mut receiver = self.sender.subscribe();
        let satisfied = match timeout {
            None => receiver.wait_for(|f| predicate(f)).await.is_ok(),
            Some(limit) => matches!(
                tokio::time::timeout(limit, receiver.wait_for(|f| predicate(f))).await,
                Ok(Ok(_))
            ),
        };
        satisfied
    }
}

impl Default for FlagBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FlagBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FlagBus").field(&self.get()).finish()
    }
}
