//! Single-node pub/sub fan-out for pipeline progress and log events, with a
//! latest-value cache so late subscribers can be primed before live events
//! arrive.

pub mod bus;
pub mod event;
pub mod topic;

pub use bus::Bus;
pub use event::{BusEvent, EntityRef, LogData, LogLevel, ProgressData};
