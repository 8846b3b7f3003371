//! Minimum utilization policy.

use crate::core::resource_pool::ResourcePool;
use crate::core::vm_selection_policy::VmSelectionPolicy;

/// Evicts the migratable VM with the lowest requested compute rate,
/// ties are broken by lowest VM ID.
#[derive(Clone)]
pub struct MinimumUtilizationSelection;

impl MinimumUtilizationSelection {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for MinimumUtilizationSelection {
    fn default() -> Self {
        Self::new()
    }
}

impl VmSelectionPolicy for MinimumUtilizationSelection {
    fn select_vm(&self, pool: &ResourcePool, host_id: u32) -> Option<u32> {
        let mut result = None;
        let mut min_usage = u32::MAX;
        for vm_id in pool.migratable_vms(host_id) {
            let usage = pool.vm(vm_id).cpu_usage;
            if usage < min_usage {
                min_usage = usage;
                result = Some(vm_id);
            }
        }
        result
    }
}
