//! Modbus acquisition engine.
//!
//! fieldscan polls a configured fleet of field devices over Modbus/TCP and
//! RTU at a fixed scan rate, decodes register windows into typed samples
//! and records one timestamped row per cycle into a Postgres table whose
//! schema is derived from the fleet description.
//!
//! The crate is organized around the cycle's data flow: [`planner`] turns
//! the fleet into contiguous read requests once at startup, [`pool`] owns
//! one client per endpoint, [`poller`] executes a device's requests and
//! splices the responses, [`scheduler`] runs the periodic loop, and
//! [`schema`]/[`writer`] take care of the table side.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod error;
pub mod link;
pub mod planner;
mod poller;
pub mod pool;
pub mod scheduler;
pub mod schema;
pub mod writer;

#[cfg(any(test, feature = "test-helpers"))]
pub mod util;

pub mod prelude {
    //! Everything the binary (or an embedding service) needs.
    #[doc(no_inline)]
    pub use fieldscan_codec::{Adjust, RegisterFormat, Value, ValueClass};
    #[doc(no_inline)]
    pub use fieldscan_config::{Config, ConfigError, Device, FunctionCode};

    pub use crate::error::{Error, LinkError};
    pub use crate::link::{Link, ModbusTransport, RawResponse, Transport};
    pub use crate::planner::{plan_device, DevicePlan, ReadRequest};
    pub use crate::pool::{ClientPool, LinkState};
    pub use crate::scheduler::Engine;
    pub use crate::schema::{reconcile, Catalog};
    pub use crate::writer::{PgRowWriter, RowSink};

    #[cfg(any(test, feature = "test-helpers"))]
    pub use crate::util::test_helpers::{FakeEndpoint, FakeTransport, MemorySink};
}
