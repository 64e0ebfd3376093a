//! Polling gateway for OWEN-family (СИ8) industrial pulse counters over
//! RS-485/RS-232: a byte-exact wire codec, a single-bus polling engine, a
//! sensor registry, a pieces-per-minute rate projector, and the HTTP/uplink
//! collaborators built on top of them.

pub mod bus;
pub mod codec;
pub mod config;
pub mod device;
pub mod driver;
pub mod dummy;
pub mod engine;
pub mod error;
pub mod http;
pub mod probe;
pub mod rate;
pub mod registry;
pub mod uplink;
