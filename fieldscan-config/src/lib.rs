//! Device-fleet configuration model for the fieldscan acquisition engine.
//!
//! The YAML dialect mirrors what plant technicians already maintain: a scan
//! rate, a target table, and per-device register maps keyed by Modbus
//! function group. Everything is validated up front; a process that
//! survives startup has a well-formed fleet description.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

mod error;
mod model;

pub use error::ConfigError;
pub use model::{
    ChannelConfig, Config, Connection, Device, FunctionCode, Parity, Register,
    RegisterGroups, Transport,
};
