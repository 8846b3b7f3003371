use vm_rebalancer::core::capacity;
use vm_rebalancer::core::common::AllocationVerdict;
use vm_rebalancer::core::config::{ConfigError, RebalancerConfig};
use vm_rebalancer::core::load_detector;
use vm_rebalancer::core::power_model::{ConstantPowerModel, HostPowerModel, LinearPowerModel};
use vm_rebalancer::core::resource_pool::{Host, ResourcePool, SavedAllocation};
use vm_rebalancer::core::vm::VirtualMachine;
use vm_rebalancer::core::vm_selection_policies::minimum_utilization::MinimumUtilizationSelection;
use vm_rebalancer::core::vm_selection_policies::random_selection::RandomSelection;
use vm_rebalancer::core::vm_selection_policy::VmSelectionPolicy;

use std::collections::BTreeSet;

fn name_wrapper(file_name: &str) -> String {
    format!("test-configs/{}", file_name)
}

fn add_host(pool: &mut ResourcePool, id: u32, cpu_total: u32) {
    pool.add_host(Host::new(
        id,
        &format!("h{}", id),
        0,
        cpu_total,
        cpu_total as u64,
        Box::new(ConstantPowerModel::new(1.)),
    ));
}

#[test]
// VM demand of 40 + 20 units on a host with capacity 100, the second VM is
// migrating in. With the default 10% migration tax the surcharge is 2 units,
// so the utilization is 0.62 while the requested ratio stays at 0.6.
fn test_utilization_includes_migration_surcharge() {
    let config = RebalancerConfig::new();
    let mut pool = ResourcePool::new();
    add_host(&mut pool, 1, 100);
    pool.place_vm(VirtualMachine::new(1, 40, 10), 1);
    pool.place_vm(VirtualMachine::new(2, 20, 10), 1);
    pool.host_mut(1).vms_migrating_in.insert(2);
    pool.vm_mut(2).in_migration = true;

    assert_eq!(capacity::cpu_utilization(&pool, &config, 1), 0.62);
    assert_eq!(capacity::requested_ratio(&pool, 1), 0.6);
    assert_eq!(capacity::projected_utilization(&pool, &config, 1, 1), 1.02);
}

#[test]
fn test_capacity_checks() {
    let mut pool = ResourcePool::new();
    add_host(&mut pool, 1, 100);
    pool.place_vm(VirtualMachine::new(1, 70, 10), 1);
    pool.add_vm(VirtualMachine::new(2, 40, 10));
    pool.add_vm(VirtualMachine::new(3, 30, 200));

    assert_eq!(
        pool.can_allocate(&pool.vm(2).allocation(), 1),
        AllocationVerdict::NotEnoughCPU
    );
    assert_eq!(
        pool.can_allocate(&pool.vm(3).allocation(), 1),
        AllocationVerdict::NotEnoughMemory
    );
    assert_eq!(pool.can_allocate(&pool.vm(2).allocation(), 9), AllocationVerdict::HostNotFound);

    pool.release(1);
    assert_eq!(pool.can_allocate(&pool.vm(2).allocation(), 1), AllocationVerdict::Success);
    assert_eq!(pool.vm(1).host_id, None);
    assert_eq!(pool.host(1).cpu_allocated, 0);
}

#[test]
fn test_config_from_file() {
    let config = RebalancerConfig::from_file(&name_wrapper("config.yaml")).unwrap();
    assert_eq!(config.overload_threshold, 0.8);
    assert_eq!(config.underload_threshold, 0.35);
    assert_eq!(config.host_search_retry_delay, 60.);
    assert_eq!(config.home_cluster, 0);
}

#[test]
fn test_config_rejects_boundary_underload_threshold() {
    let result = RebalancerConfig::from_file(&name_wrapper("config_invalid_threshold.yaml"));
    assert!(matches!(result, Err(ConfigError::InvalidUnderloadThreshold(_))));

    let mut config = RebalancerConfig::new();
    assert!(matches!(
        config.set_underload_threshold(0.),
        Err(ConfigError::InvalidUnderloadThreshold(_))
    ));
    assert!(matches!(
        config.set_underload_threshold(1.),
        Err(ConfigError::InvalidUnderloadThreshold(_))
    ));
    config.set_underload_threshold(0.5).unwrap();
    assert_eq!(config.underload_threshold, 0.5);
}

#[test]
fn test_minimum_utilization_selection() {
    let mut pool = ResourcePool::new();
    add_host(&mut pool, 1, 100);
    pool.place_vm(VirtualMachine::new(1, 30, 10), 1);
    pool.place_vm(VirtualMachine::new(2, 10, 10), 1);
    pool.place_vm(VirtualMachine::new(3, 20, 10), 1);

    let policy = MinimumUtilizationSelection::new();
    assert_eq!(policy.select_vm(&pool, 1), Some(2));

    // a VM already mid-migration is not migratable
    pool.vm_mut(2).in_migration = true;
    assert_eq!(policy.select_vm(&pool, 1), Some(3));

    pool.vm_mut(1).in_migration = true;
    pool.vm_mut(3).in_migration = true;
    assert_eq!(policy.select_vm(&pool, 1), None);
}

#[test]
fn test_random_selection_with_single_candidate() {
    let mut pool = ResourcePool::new();
    add_host(&mut pool, 1, 100);
    pool.place_vm(VirtualMachine::new(1, 30, 10), 1);

    let policy = RandomSelection::new(123);
    assert_eq!(policy.select_vm(&pool, 1), Some(1));
}

#[test]
fn test_overload_detection() {
    let config = RebalancerConfig::new();
    let mut pool = ResourcePool::new();
    add_host(&mut pool, 1, 100);
    add_host(&mut pool, 2, 100);
    add_host(&mut pool, 3, 100);
    pool.place_vm(VirtualMachine::new(1, 90, 10), 1);
    pool.place_vm(VirtualMachine::new(2, 90, 10), 2);
    pool.place_vm(VirtualMachine::new(3, 50, 10), 3);
    let hosts = pool.host_ids();

    assert_eq!(load_detector::overloaded_hosts(&pool, &config, &hosts), vec![1, 2]);

    // a host already emitting VMs elsewhere is being relieved, skip it
    pool.host_mut(2).vms_migrating_out.insert(2);
    assert_eq!(load_detector::overloaded_hosts(&pool, &config, &hosts), vec![1]);

    pool.host_mut(1).active = false;
    assert!(load_detector::overloaded_hosts(&pool, &config, &hosts).is_empty());
}

#[test]
fn test_per_host_overload_threshold_override() {
    let config = RebalancerConfig::new();
    let mut pool = ResourcePool::new();
    pool.add_host(
        Host::new(1, "h1", 0, 100, 100, Box::new(ConstantPowerModel::new(1.)))
            .with_overload_threshold(0.5)
            .unwrap(),
    );
    pool.place_vm(VirtualMachine::new(1, 60, 10), 1);

    assert!(load_detector::is_overloaded(&pool, &config, 1));
    assert!(!load_detector::is_underloaded(&pool, &config, 1));
}

#[test]
fn test_host_threshold_override_is_validated() {
    let host = Host::new(1, "h1", 0, 100, 100, Box::new(ConstantPowerModel::new(1.)));
    assert!(matches!(
        host.clone().with_overload_threshold(1.5),
        Err(ConfigError::InvalidOverloadThreshold(_))
    ));
    assert!(matches!(
        host.clone().with_overload_threshold(0.),
        Err(ConfigError::InvalidOverloadThreshold(_))
    ));
    assert_eq!(host.with_overload_threshold(1.).unwrap().overload_threshold, Some(1.));
}

#[test]
fn test_restore_allocation_skips_unplaceable_vms() {
    let mut pool = ResourcePool::new();
    add_host(&mut pool, 1, 100);
    add_host(&mut pool, 2, 100);
    pool.place_vm(VirtualMachine::new(1, 60, 10), 1);
    pool.place_vm(VirtualMachine::new(2, 50, 10), 2);

    // a snapshot squeezing both VMs onto host 2 cannot be replayed in full
    let mut saved = SavedAllocation::new();
    saved.insert(1, 2);
    saved.insert(2, 2);
    let failed = pool.restore_allocation(&saved);

    assert_eq!(failed, vec![(2, 2)]);
    assert_eq!(pool.vm(1).host_id, Some(2));
    assert_eq!(pool.vm(2).host_id, None);
    assert_eq!(pool.host(2).cpu_allocated, 60);
    assert_eq!(pool.host(1).cpu_allocated, 0);
}

#[test]
fn test_underloaded_host_eligibility() {
    let config = RebalancerConfig::new();
    let mut pool = ResourcePool::new();
    add_host(&mut pool, 1, 100);
    add_host(&mut pool, 2, 100);
    add_host(&mut pool, 3, 100);
    pool.place_vm(VirtualMachine::new(1, 20, 10), 1);
    pool.place_vm(VirtualMachine::new(2, 10, 10), 2);
    pool.place_vm(VirtualMachine::new(3, 30, 10), 3);
    let hosts = pool.host_ids();
    let excluded = BTreeSet::new();

    // host 2 has the lowest utilization among underloaded hosts
    assert_eq!(
        load_detector::find_underloaded_host(&pool, &config, &hosts, &excluded),
        Some(2)
    );

    // a host receiving a VM cannot be drained at the same time
    pool.host_mut(2).vms_migrating_in.insert(2);
    assert_eq!(
        load_detector::find_underloaded_host(&pool, &config, &hosts, &excluded),
        Some(1)
    );

    // a host whose VMs are all mid-migration has nothing left to drain
    pool.vm_mut(1).in_migration = true;
    assert_eq!(
        load_detector::find_underloaded_host(&pool, &config, &hosts, &excluded),
        Some(3)
    );

    let excluded: BTreeSet<u32> = [3].into_iter().collect();
    assert_eq!(load_detector::find_underloaded_host(&pool, &config, &hosts, &excluded), None);
}

#[test]
fn test_linear_power_model() {
    let model = LinearPowerModel::new_with_idle_power(100., 40.);
    assert_eq!(model.get_power(0.).unwrap(), 0.);
    assert_eq!(model.get_power(1.).unwrap(), 100.);
    assert_eq!(model.get_power(0.5).unwrap(), 70.);
    assert!(model.get_power(1.5).is_err());
    assert!(model.get_power(-0.1).is_err());
}

#[test]
fn test_power_delta() {
    let config = RebalancerConfig::new();
    let mut pool = ResourcePool::new();
    pool.add_host(Host::new(1, "h1", 0, 100, 100, Box::new(LinearPowerModel::new(100.))));
    pool.place_vm(VirtualMachine::new(1, 50, 10), 1);
    pool.add_vm(VirtualMachine::new(2, 30, 10));

    // 0.5 -> 0.8 load on a 100 W host adds 30 W
    assert_eq!(capacity::power_delta(&pool, &config, 1, 2).unwrap(), 30.);
}
