//! Cluster driver for the warden meta-plane.
//!
//! Owns the app catalog, the node map and the [`warden_guardian::PartitionGuardian`],
//! and advances partition decisions tick by tick:
//!
//! ```text
//! tick → for each partition: from_proposals / cure → Applier::send_proposal
//!      → accepted post-image → reconfig → next tick sees consistent state
//! ```
//!
//! The [`Applier`] trait is the only boundary to the outside world; tests
//! install a [`FilterApplier`] to drop, rewrite or observe proposals, and
//! the `converge` binary runs a seeded churn simulation against a
//! [`LoopbackApplier`].

mod applier;
mod driver;
pub mod sim;

pub use applier::{Applier, FilterApplier, LoopbackApplier};
pub use driver::{ClusterDriver, TickStats};
