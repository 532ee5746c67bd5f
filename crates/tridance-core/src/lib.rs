//! tridance-core — shared types, wire format, and configuration.
//! All other TriDance crates depend on this one.

pub mod config;
pub mod control;
pub mod event;
pub mod replica;
pub mod signal;
pub mod wire;

pub use event::{HubEvent, PeerRecord, SampleUpdate};
pub use wire::{Axes, DecodeError, SampleMessage};
