//! First Fit algorithm.

use crate::core::config::RebalancerConfig;
use crate::core::logger::PlanLog;
use crate::core::resource_pool::ResourcePool;
use crate::core::vm_placement_algorithm::VmPlacementAlgorithm;

/// Uses the first suitable host in the global scan order.
#[derive(Clone)]
pub struct FirstFit;

impl FirstFit {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for FirstFit {
    fn default() -> Self {
        Self::new()
    }
}

impl VmPlacementAlgorithm for FirstFit {
    fn select_host(
        &self,
        _pool: &ResourcePool,
        _config: &RebalancerConfig,
        _vm_id: u32,
        candidates: &[u32],
        _log: &PlanLog,
    ) -> Option<u32> {
        candidates.first().cloned()
    }
}
