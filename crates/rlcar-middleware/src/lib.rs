//! `rlcar-middleware` – the synchronisation fabric
//!
//! Workers never look at each other's state.  They signal and observe state
//! changes exclusively through the [`FlagBus`], a condition-variable style
//! set of named flags with blocking waits.
//!
//! # Modules
//!
//! - [`flag_bus`] – [`FlagBus`] and the [`Flags`] bitset.

pub mod flag_bus;

pub use flag_bus::{FlagBus, Flags};
