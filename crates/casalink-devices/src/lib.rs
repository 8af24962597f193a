//! Device aggregation, shadow state and command dispatch.
//!
//! This crate reconciles the heterogeneous fleet reported by the
//! device-cloud into one canonical view: hubs and their IR-paired remote
//! appliances are merged into single entries, stateless devices are
//! overlaid with locally shadowed state, and commands go out with the
//! protocol-mandated single retry.

pub mod aggregator;
pub mod device;
pub mod dispatcher;
pub mod state;

#[cfg(test)]
pub(crate) mod testkit;

pub use aggregator::DeviceAggregator;
pub use device::{categories, Device, DeviceListResult, RoomDirectory};
pub use dispatcher::CommandDispatcher;
pub use state::ShadowStateCache;
