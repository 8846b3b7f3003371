//! Power-aware best fit.

use crate::core::capacity;
use crate::core::config::RebalancerConfig;
use crate::core::events::PlannerEvent;
use crate::core::logger::PlanLog;
use crate::core::resource_pool::ResourcePool;
use crate::core::vm_placement_algorithm::VmPlacementAlgorithm;

/// Uses the suitable host whose power draw grows the least after adding the
/// VM. A host whose power model rejects the projected utilization is treated
/// as zero-cost and reported; ties are broken by lowest host ID.
#[derive(Clone)]
pub struct MinPowerIncrease;

impl MinPowerIncrease {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for MinPowerIncrease {
    fn default() -> Self {
        Self::new()
    }
}

impl VmPlacementAlgorithm for MinPowerIncrease {
    fn select_host(
        &self,
        pool: &ResourcePool,
        config: &RebalancerConfig,
        vm_id: u32,
        candidates: &[u32],
        log: &PlanLog,
    ) -> Option<u32> {
        let mut result = None;
        let mut min_delta = f64::MAX;
        for &host_id in candidates {
            let delta = match capacity::power_delta(pool, config, host_id, vm_id) {
                Ok(delta) => delta,
                Err(_) => {
                    log.record(PlannerEvent::PowerModelFailed { host: host_id });
                    0.
                }
            };
            if delta < min_delta {
                min_delta = delta;
                result = Some(host_id);
            }
        }
        result
    }
}
