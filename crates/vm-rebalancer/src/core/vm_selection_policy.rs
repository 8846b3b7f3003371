//! VM selection policies.

use dyn_clone::{clone_trait_object, DynClone};

use crate::core::resource_pool::ResourcePool;

/// Trait for implementation of VM selection policies.
///
/// The policy is defined as a function of an overloaded host, which returns
/// the ID of the next VM to evict from it or `None` if no VM can be migrated.
/// The planner calls it repeatedly, removing the returned VM from the host
/// each time, until the host is no longer overloaded.
pub trait VmSelectionPolicy: DynClone {
    fn select_vm(&self, pool: &ResourcePool, host_id: u32) -> Option<u32>;
}

clone_trait_object!(VmSelectionPolicy);
