//! Virtual machine placement algorithms.

use dyn_clone::{clone_trait_object, DynClone};

use crate::core::config::RebalancerConfig;
use crate::core::logger::PlanLog;
use crate::core::resource_pool::ResourcePool;

/// Trait for implementation of VM placement algorithms.
///
/// The algorithm is defined as a function of a VM and a candidate host list,
/// which returns the ID of the host selected as migration target or `None` if
/// there is no suitable host. Candidates are pre-filtered by the planner
/// (current host, shut-down hosts, hosts without capacity and hosts that
/// would become overloaded are already removed), so the algorithm only ranks
/// them. Candidates arrive in ascending ID order.
pub trait VmPlacementAlgorithm: DynClone {
    fn select_host(
        &self,
        pool: &ResourcePool,
        config: &RebalancerConfig,
        vm_id: u32,
        candidates: &[u32],
        log: &PlanLog,
    ) -> Option<u32>;
}

clone_trait_object!(VmPlacementAlgorithm);
