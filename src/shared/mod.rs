//! Per-sync shared context
//!
//! # Overview
//!
//! - `SharedState` - Configuration, row source, output sink, permit pool and
//!   the per-stream `StreamState` map of one sync
//! - `ResourcePool` / `AcquiredResources` - Counting permit pool gating queries
//! - `ResourceSlot` - The single permit a creator or reader may hold
//! - `ValidationFailureHandler` - Collects invalid-checkpoint reports

mod resources;
mod types;

pub use resources::{AcquiredResources, ResourcePool, ResourceSlot};
pub use types::{
    SharedState, TryAcquireResourcesStatus, ValidationFailure, ValidationFailureHandler,
};

#[cfg(test)]
mod tests;
