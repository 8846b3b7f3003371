//! Capacity model: current and projected host CPU demand and power draw.
//!
//! All ratios are recomputed from the live VM list on every call, so they
//! always reflect allocations made earlier in the same planning pass.

use crate::core::config::RebalancerConfig;
use crate::core::power_model::PowerModelError;
use crate::core::resource_pool::ResourcePool;

/// CPU tax a live migration imposes on the destination host while the VM
/// state is copied in. Zero for VMs that are not migrating into the host.
fn migration_surcharge(pool: &ResourcePool, config: &RebalancerConfig, host_id: u32, vm_id: u32) -> f64 {
    if !pool.host(host_id).vms_migrating_in.contains(&vm_id) {
        return 0.;
    }
    pool.vm(vm_id).cpu_usage as f64 * config.max_cpu_usage_during_out_migration / config.migration_cpu_overhead
}

/// Current CPU utilization ratio of the host: the summed compute rate of its
/// resident VMs (plus the migration surcharge of incoming ones) over the host
/// capacity.
pub fn cpu_utilization(pool: &ResourcePool, config: &RebalancerConfig, host_id: u32) -> f64 {
    let host = pool.host(host_id);
    let mut used = 0.;
    for vm_id in &host.vms {
        used += pool.vm(*vm_id).cpu_usage as f64 + migration_surcharge(pool, config, host_id, *vm_id);
    }
    used / host.cpu_total as f64
}

/// Utilization ratio the host would have after hypothetically adding the VM.
pub fn projected_utilization(pool: &ResourcePool, config: &RebalancerConfig, host_id: u32, vm_id: u32) -> f64 {
    let capacity = pool.host(host_id).cpu_total as f64;
    (cpu_utilization(pool, config, host_id) * capacity + pool.vm(vm_id).cpu_usage as f64) / capacity
}

/// Ratio of the total compute rate requested by resident VMs to the host
/// capacity, without migration surcharges. Drives underload detection.
pub fn requested_ratio(pool: &ResourcePool, host_id: u32) -> f64 {
    let host = pool.host(host_id);
    let requested: u32 = host.vms.iter().map(|vm_id| pool.vm(*vm_id).cpu_usage).sum();
    requested as f64 / host.cpu_total as f64
}

/// Power the host would draw after hypothetically adding the VM.
pub fn power_after_allocation(
    pool: &ResourcePool,
    config: &RebalancerConfig,
    host_id: u32,
    vm_id: u32,
) -> Result<f64, PowerModelError> {
    pool.host(host_id)
        .power_model
        .get_power(projected_utilization(pool, config, host_id, vm_id))
}

/// Power increase caused by hypothetically adding the VM to the host.
///
/// A model error makes the whole delta unavailable; callers absorb it as zero
/// cost, since a placement decision is still possible without precise wattage.
pub fn power_delta(
    pool: &ResourcePool,
    config: &RebalancerConfig,
    host_id: u32,
    vm_id: u32,
) -> Result<f64, PowerModelError> {
    let after = power_after_allocation(pool, config, host_id, vm_id)?;
    if after <= 0. {
        return Ok(0.);
    }
    let before = pool
        .host(host_id)
        .power_model
        .get_power(cpu_utilization(pool, config, host_id))?;
    Ok(after - before)
}
