//! Virtual machine representation.

use serde::Serialize;

use crate::core::common::Allocation;

/// Represents virtual machine (VM).
///
/// A VM is characterized by its ID and resource requirements (compute rate and
/// memory). It is resident on exactly one host at a time; `host_id` is `None`
/// only before the first placement or transiently inside a planning pass.
#[derive(Clone, Serialize)]
pub struct VirtualMachine {
    pub id: u32,
    /// Requested compute rate in abstract units.
    pub cpu_usage: u32,
    pub memory_usage: u64,
    /// Host currently owning this VM.
    pub host_id: Option<u32>,
    /// Set by the harness while a live migration of this VM is in progress.
    pub in_migration: bool,
}

impl VirtualMachine {
    /// Creates VM with specified resource requirements, not placed anywhere yet.
    pub fn new(id: u32, cpu_usage: u32, memory_usage: u64) -> Self {
        Self {
            id,
            cpu_usage,
            memory_usage,
            host_id: None,
            in_migration: false,
        }
    }

    /// Returns the resource demand of this VM as an allocation request.
    pub fn allocation(&self) -> Allocation {
        Allocation {
            id: self.id,
            cpu_usage: self.cpu_usage,
            memory_usage: self.memory_usage,
        }
    }
}
