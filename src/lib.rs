//! Operator and automation client for a relay-chain + parachain deployment
//! running a device-leasing marketplace.
//!
//! The crate splits into offline and online halves. Offline: SS58 and
//! sovereign-account derivation ([`address`]), marketplace data schemas
//! ([`registry`]), call composition against a deployment registry
//! ([`call`]), and v4 extrinsic assembly ([`transaction`]). Online:
//! [`client::ChainClient`] talks to one node over websocket, and
//! [`ops::Operator`] sequences the deployment and marketplace workflows on
//! top of it.

pub mod address;
pub mod call;
pub mod client;
pub mod error;
pub mod ops;
pub mod registry;
pub mod transaction;
pub mod types;

pub use call::{CallDescriptor, CallRegistry};
pub use client::ChainClient;
pub use error::{Error, Result};
pub use ops::{Operator, OperatorConfig};
pub use registry::{DeviceProfile, DeviceState, Order, OrderBase};
pub use types::{MarketRole, Receipt, SubmitOptions};
