//! Overload and underload detection.

use std::collections::BTreeSet;

use crate::core::capacity;
use crate::core::config::RebalancerConfig;
use crate::core::resource_pool::{Host, ResourcePool};

/// Overload threshold effective for the host: the per-host override when set,
/// the configured default otherwise.
pub fn overload_threshold(config: &RebalancerConfig, host: &Host) -> f64 {
    host.overload_threshold.unwrap_or(config.overload_threshold)
}

pub fn is_overloaded(pool: &ResourcePool, config: &RebalancerConfig, host_id: u32) -> bool {
    capacity::cpu_utilization(pool, config, host_id) > overload_threshold(config, pool.host(host_id))
}

pub fn is_underloaded(pool: &ResourcePool, config: &RebalancerConfig, host_id: u32) -> bool {
    capacity::requested_ratio(pool, host_id) < config.underload_threshold
}

/// Returns overloaded hosts among `hosts`, in ascending ID order.
///
/// A host that is already emitting VMs elsewhere is excluded, it is being
/// relieved by the in-flight migrations.
pub fn overloaded_hosts(pool: &ResourcePool, config: &RebalancerConfig, hosts: &[u32]) -> Vec<u32> {
    hosts
        .iter()
        .filter(|&&host_id| {
            let host = pool.host(host_id);
            !host.is_shutdown_or_failed()
                && host.vms_migrating_out.is_empty()
                && is_overloaded(pool, config, host_id)
        })
        .cloned()
        .collect()
}

/// Picks the eligible underloaded host with the lowest current utilization.
///
/// Eligible means: not excluded, active, below the underload threshold by
/// requested demand, with no VMs migrating in and at least one resident VM
/// that is not itself mid-migration. Ties are broken by lowest host ID.
pub fn find_underloaded_host(
    pool: &ResourcePool,
    config: &RebalancerConfig,
    hosts: &[u32],
    excluded: &BTreeSet<u32>,
) -> Option<u32> {
    let mut result = None;
    let mut min_utilization = f64::MAX;
    for &host_id in hosts {
        if excluded.contains(&host_id) {
            continue;
        }
        let host = pool.host(host_id);
        if host.is_shutdown_or_failed() || !host.vms_migrating_in.is_empty() {
            continue;
        }
        if !host.vms.iter().any(|vm_id| !pool.vm(*vm_id).in_migration) {
            continue;
        }
        if !is_underloaded(pool, config, host_id) {
            continue;
        }
        let utilization = capacity::cpu_utilization(pool, config, host_id);
        if utilization < min_utilization {
            min_utilization = utilization;
            result = Some(host_id);
        }
    }
    result
}
