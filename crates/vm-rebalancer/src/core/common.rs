//! Common data types shared by the rebalancer components.

use indexmap::IndexMap;
use serde::Serialize;

/// Resource demand of a single VM, used in host capacity checks.
#[derive(Serialize, Clone)]
pub struct Allocation {
    pub id: u32,
    pub cpu_usage: u32,
    pub memory_usage: u64,
}

/// Outcome of a capacity check on a single host.
#[derive(Debug, PartialEq)]
pub enum AllocationVerdict {
    NotEnoughCPU,
    NotEnoughMemory,
    HostNotFound,
    Success,
}

/// Planning output: pending VM to target host reassignments.
///
/// The map is built fresh on every planning pass and is never persisted across
/// ticks. Insertion order is the order in which migrations were planned.
pub type MigrationMap = IndexMap<u32, u32>;
