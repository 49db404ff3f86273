//! The applier capability: how guardian proposals reach replica groups.
//!
//! In a networked deployment the applier marshals the request, sends it to
//! `target`, and persists the ballot-bumped post-image once the group acks.
//! Here it is a small trait so tests can drop, rewrite or observe proposals
//! at will: the seam the end-to-end scenarios are built on.

use warden_types::{Gpid, NodeId, PartitionConfig, UpdateRequest};

/// Executes configuration proposals on behalf of the driver.
pub trait Applier {
    /// Deliver a proposal to `target`.
    ///
    /// Returns the update as accepted by the replica group (ballot bumped,
    /// membership rewritten), or `None` if the message was lost. The driver
    /// makes no ordering assumption beyond "returned means accepted".
    fn send_proposal(&mut self, target: NodeId, request: UpdateRequest) -> Option<UpdateRequest>;

    /// Observe the post-image after the driver folds an accepted update
    /// back into its view.
    fn on_applied(&mut self, _pid: Gpid, _config: &PartitionConfig) {}
}

/// Applies every proposal verbatim, as a perfectly reliable cluster would.
#[derive(Debug, Default)]
pub struct LoopbackApplier {
    accepted: u64,
}

impl LoopbackApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of proposals accepted so far.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }
}

impl Applier for LoopbackApplier {
    fn send_proposal(&mut self, _target: NodeId, mut request: UpdateRequest) -> Option<UpdateRequest> {
        request.apply();
        self.accepted += 1;
        Some(request)
    }
}

/// Routes every proposal through a caller-supplied closure.
///
/// The closure may apply the request, rewrite it (modeling a concurrent
/// external update), or return `None` (modeling a lost message).
pub struct FilterApplier {
    filter: Box<dyn FnMut(NodeId, UpdateRequest) -> Option<UpdateRequest>>,
    sent: u64,
}

impl FilterApplier {
    pub fn new(
        filter: impl FnMut(NodeId, UpdateRequest) -> Option<UpdateRequest> + 'static,
    ) -> Self {
        Self {
            filter: Box::new(filter),
            sent: 0,
        }
    }

    /// Replace the active filter.
    pub fn set_filter(
        &mut self,
        filter: impl FnMut(NodeId, UpdateRequest) -> Option<UpdateRequest> + 'static,
    ) {
        self.filter = Box::new(filter);
    }

    /// Number of proposals that reached the filter.
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl std::fmt::Debug for FilterApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterApplier").field("sent", &self.sent).finish()
    }
}

impl Applier for FilterApplier {
    fn send_proposal(&mut self, target: NodeId, request: UpdateRequest) -> Option<UpdateRequest> {
        self.sent += 1;
        (self.filter)(target, request)
    }
}
