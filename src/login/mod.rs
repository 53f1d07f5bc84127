//! SSO login processing.
//!
//! Per-login state lives in a `LoginCycle` owned by the request; the
//! processor applies the resolved customer group and dispatches the
//! "customer updated" notification at most once per cycle.

pub mod processor;
pub mod types;

pub use processor::{
    AccountUpdater, AssertionSource, ConfigProvider, CustomerUpdated, LoginOutcome, Notifier,
    ProcessorState, SsoGroupProcessor,
};
pub use types::{CustomerId, DispatchLatch, LoginCycle, LoginId};
