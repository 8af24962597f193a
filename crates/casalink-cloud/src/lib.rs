//! Signed-HTTP protocol client for the device-cloud.
//!
//! Every outbound call carries the `client_id`/`sign`/`t`/`sign_method`
//! headers with an HMAC-SHA256 signature over a canonical string. The
//! `DeviceCloud` trait is the seam consumed by the aggregator and the
//! dispatcher; `CloudClient` is the reqwest-backed implementation.

pub mod api;
pub mod client;
pub mod sign;
pub mod token;
pub mod types;

pub use api::{DeviceCloud, IrCommand};
pub use client::CloudClient;
pub use token::TokenCache;
pub use types::{ApiEnvelope, DeviceStatusEntry, RawDevice, StatusItem, TokenResult};
