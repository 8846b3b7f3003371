//! Resource pool state: hosts, VMs and their committed allocations.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;

use crate::core::common::{Allocation, AllocationVerdict};
use crate::core::config::ConfigError;
use crate::core::power_model::HostPowerModel;
use crate::core::vm::VirtualMachine;

/// Physical host properties and allocation state.
///
/// The migration sets are owned by the harness: a VM migrating into a host is
/// resident in `vms` and listed in `vms_migrating_in` until the transfer
/// completes.
#[derive(Clone)]
pub struct Host {
    pub id: u32,
    pub name: String,
    pub cluster_id: u32,

    /// Total CPU capacity in abstract compute-rate units.
    pub cpu_total: u32,
    pub cpu_allocated: u32,
    pub cpu_overcommit: u32,

    pub memory_total: u64,
    pub memory_allocated: u64,
    pub memory_overcommit: u64,

    pub active: bool,
    pub failed: bool,

    pub vms: BTreeSet<u32>,
    pub vms_migrating_in: BTreeSet<u32>,
    pub vms_migrating_out: BTreeSet<u32>,

    pub power_model: Box<dyn HostPowerModel>,
    /// Per-host override of the global overload threshold.
    pub overload_threshold: Option<f64>,
}

impl Host {
    /// Creates an active host with no VMs.
    pub fn new(
        id: u32,
        name: &str,
        cluster_id: u32,
        cpu_total: u32,
        memory_total: u64,
        power_model: Box<dyn HostPowerModel>,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            cluster_id,
            cpu_total,
            cpu_allocated: 0,
            cpu_overcommit: 0,
            memory_total,
            memory_allocated: 0,
            memory_overcommit: 0,
            active: true,
            failed: false,
            vms: BTreeSet::new(),
            vms_migrating_in: BTreeSet::new(),
            vms_migrating_out: BTreeSet::new(),
            power_model,
            overload_threshold: None,
        }
    }

    /// Sets a per-host override of the overload threshold,
    /// rejecting values outside (0, 1].
    pub fn with_overload_threshold(mut self, threshold: f64) -> Result<Self, ConfigError> {
        if !(threshold > 0. && threshold <= 1.) {
            return Err(ConfigError::InvalidOverloadThreshold(threshold));
        }
        self.overload_threshold = Some(threshold);
        Ok(self)
    }

    pub fn cpu_available(&self) -> u32 {
        self.cpu_total - self.cpu_allocated
    }

    pub fn memory_available(&self) -> u64 {
        self.memory_total - self.memory_allocated
    }

    pub fn is_shutdown_or_failed(&self) -> bool {
        !self.active || self.failed
    }
}

/// Committed placement of every non-migrating VM, captured immediately before
/// the first hypothetical allocation of a planning pass. Iteration order is
/// the capture order, so restore is deterministic.
pub type SavedAllocation = IndexMap<u32, u32>;

/// Owns host and VM state and performs allocation accounting.
///
/// Hosts and VMs are long-lived and registered by the surrounding harness;
/// the planner only mutates allocation fields, and only transiently.
#[derive(Clone, Default)]
pub struct ResourcePool {
    hosts: BTreeMap<u32, Host>,
    vms: BTreeMap<u32, VirtualMachine>,
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a host. Host IDs must be unique.
    pub fn add_host(&mut self, host: Host) {
        self.hosts.insert(host.id, host);
    }

    /// Registers a VM without placing it anywhere.
    pub fn add_vm(&mut self, vm: VirtualMachine) {
        self.vms.insert(vm.id, vm);
    }

    /// Registers a VM and immediately allocates it on the specified host.
    pub fn place_vm(&mut self, vm: VirtualMachine, host_id: u32) {
        let vm_id = vm.id;
        self.add_vm(vm);
        self.allocate(vm_id, host_id);
    }

    pub fn host(&self, host_id: u32) -> &Host {
        &self.hosts[&host_id]
    }

    pub fn host_mut(&mut self, host_id: u32) -> &mut Host {
        self.hosts.get_mut(&host_id).unwrap_or_else(|| panic!("unknown host #{}", host_id))
    }

    pub fn vm(&self, vm_id: u32) -> &VirtualMachine {
        &self.vms[&vm_id]
    }

    pub fn vm_mut(&mut self, vm_id: u32) -> &mut VirtualMachine {
        self.vms.get_mut(&vm_id).unwrap_or_else(|| panic!("unknown vm #{}", vm_id))
    }

    /// Returns IDs of all hosts in ascending order.
    pub fn host_ids(&self) -> Vec<u32> {
        self.hosts.keys().cloned().collect()
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Returns IDs of hosts belonging to the specified cluster, in ascending order.
    pub fn cluster_hosts(&self, cluster_id: u32) -> Vec<u32> {
        self.hosts
            .values()
            .filter(|h| h.cluster_id == cluster_id)
            .map(|h| h.id)
            .collect()
    }

    /// Returns the sorted list of distinct cluster IDs present in the pool.
    pub fn clusters(&self) -> Vec<u32> {
        let set: BTreeSet<u32> = self.hosts.values().map(|h| h.cluster_id).collect();
        set.into_iter().collect()
    }

    /// Checks if the specified allocation is currently possible on the specified host.
    pub fn can_allocate(&self, alloc: &Allocation, host_id: u32) -> AllocationVerdict {
        let host = match self.hosts.get(&host_id) {
            Some(host) => host,
            None => return AllocationVerdict::HostNotFound,
        };
        if host.cpu_available() < alloc.cpu_usage {
            return AllocationVerdict::NotEnoughCPU;
        }
        if host.memory_available() < alloc.memory_usage {
            return AllocationVerdict::NotEnoughMemory;
        }
        AllocationVerdict::Success
    }

    /// Applies the VM's allocation on the specified host.
    ///
    /// Demand exceeding the host capacity is absorbed by the overcommit
    /// counters, so the committed invariant `allocated <= total` holds even
    /// while a hypothetical placement is being probed.
    pub fn allocate(&mut self, vm_id: u32, host_id: u32) {
        let (cpu_usage, memory_usage) = {
            let vm = &self.vms[&vm_id];
            (vm.cpu_usage, vm.memory_usage)
        };
        let host = self.hosts.get_mut(&host_id).unwrap_or_else(|| panic!("unknown host #{}", host_id));
        if host.cpu_total - host.cpu_allocated < cpu_usage {
            host.cpu_overcommit += cpu_usage - (host.cpu_total - host.cpu_allocated);
            host.cpu_allocated = host.cpu_total;
        } else {
            host.cpu_allocated += cpu_usage;
        }
        if host.memory_total - host.memory_allocated < memory_usage {
            host.memory_overcommit += memory_usage - (host.memory_total - host.memory_allocated);
            host.memory_allocated = host.memory_total;
        } else {
            host.memory_allocated += memory_usage;
        }
        host.vms.insert(vm_id);
        self.vms.get_mut(&vm_id).unwrap().host_id = Some(host_id);
    }

    /// Removes the VM's allocation from its current host, if any.
    pub fn release(&mut self, vm_id: u32) {
        let (cpu_usage, memory_usage, host_id) = {
            let vm = &self.vms[&vm_id];
            match vm.host_id {
                Some(host_id) => (vm.cpu_usage, vm.memory_usage, host_id),
                None => return,
            }
        };
        if let Some(host) = self.hosts.get_mut(&host_id) {
            if host.cpu_overcommit >= cpu_usage {
                host.cpu_overcommit -= cpu_usage;
            } else {
                host.cpu_allocated -= cpu_usage - host.cpu_overcommit;
                host.cpu_overcommit = 0;
            }
            if host.memory_overcommit >= memory_usage {
                host.memory_overcommit -= memory_usage;
            } else {
                host.memory_allocated -= memory_usage - host.memory_overcommit;
                host.memory_overcommit = 0;
            }
            host.vms.remove(&vm_id);
        }
        self.vms.get_mut(&vm_id).unwrap().host_id = None;
    }

    /// Returns VMs of the host eligible for migration (not already mid-migration),
    /// in ascending ID order.
    pub fn migratable_vms(&self, host_id: u32) -> Vec<u32> {
        self.hosts[&host_id]
            .vms
            .iter()
            .filter(|vm_id| !self.vms[vm_id].in_migration)
            .cloned()
            .collect()
    }

    /// Captures the committed placement of every VM that is not migrating into
    /// its host.
    pub fn save_allocation(&self) -> SavedAllocation {
        let mut saved = SavedAllocation::new();
        for host in self.hosts.values() {
            for vm_id in &host.vms {
                if !host.vms_migrating_in.contains(vm_id) {
                    saved.insert(*vm_id, host.id);
                }
            }
        }
        saved
    }

    /// Drops every allocation made since the snapshot was taken and re-creates
    /// the committed state: migrating-in VMs are reinstated first, then every
    /// saved VM returns to its snapshot host. A VM that cannot be re-created
    /// is skipped and reported; the remaining restores still proceed.
    ///
    /// Returns the `(vm, host)` pairs that failed to restore.
    pub fn restore_allocation(&mut self, saved: &SavedAllocation) -> Vec<(u32, u32)> {
        let host_ids = self.host_ids();
        for host_id in &host_ids {
            let host = self.hosts.get_mut(host_id).unwrap();
            host.cpu_allocated = 0;
            host.cpu_overcommit = 0;
            host.memory_allocated = 0;
            host.memory_overcommit = 0;
            let resident = std::mem::take(&mut host.vms);
            for vm_id in resident {
                if let Some(vm) = self.vms.get_mut(&vm_id) {
                    vm.host_id = None;
                }
            }
        }
        for host_id in &host_ids {
            let migrating_in: Vec<u32> = self.hosts[host_id].vms_migrating_in.iter().cloned().collect();
            for vm_id in migrating_in {
                if self.vms.contains_key(&vm_id) {
                    self.allocate(vm_id, *host_id);
                }
            }
        }
        let mut failed = Vec::new();
        for (&vm_id, &host_id) in saved {
            let suitable = self
                .vms
                .get(&vm_id)
                .map(|vm| self.can_allocate(&vm.allocation(), host_id) == AllocationVerdict::Success)
                .unwrap_or(false);
            if suitable {
                self.allocate(vm_id, host_id);
            } else {
                failed.push((vm_id, host_id));
            }
        }
        failed
    }
}
