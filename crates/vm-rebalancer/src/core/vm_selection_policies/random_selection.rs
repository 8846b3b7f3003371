//! Random selection policy.

use std::cell::RefCell;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::resource_pool::ResourcePool;
use crate::core::vm_selection_policy::VmSelectionPolicy;

/// Evicts a uniformly random migratable VM. Seeded explicitly so that
/// simulation runs remain reproducible.
#[derive(Clone)]
pub struct RandomSelection {
    rng: RefCell<StdRng>,
}

impl RandomSelection {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl VmSelectionPolicy for RandomSelection {
    fn select_vm(&self, pool: &ResourcePool, host_id: u32) -> Option<u32> {
        let vms = pool.migratable_vms(host_id);
        if vms.is_empty() {
            return None;
        }
        let index = self.rng.borrow_mut().gen_range(0..vms.len());
        Some(vms[index])
    }
}
