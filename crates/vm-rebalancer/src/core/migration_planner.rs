//! Migration planner: builds the migration map for one scheduling tick.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use sugars::{rc, refcell};

use crate::core::capacity;
use crate::core::common::{AllocationVerdict, MigrationMap};
use crate::core::config::{ConfigError, RebalancerConfig};
use crate::core::events::PlannerEvent;
use crate::core::load_detector;
use crate::core::logger::{EventLogger, PlanLog, StdoutLogger};
use crate::core::resource_pool::{ResourcePool, SavedAllocation};
use crate::core::vm_placement_algorithm::VmPlacementAlgorithm;
use crate::core::vm_selection_policy::VmSelectionPolicy;

/// Predicate restricting the hosts considered by the placement search.
pub type HostFilter = Box<dyn Fn(&ResourcePool, u32) -> bool>;

/// Builds a migration plan from the current committed allocation state.
///
/// A planning pass first relieves overloaded hosts of the planner's home
/// cluster by evicting VMs chosen by the selection policy and placing them via
/// the placement algorithm, then tries to fully drain underloaded hosts.
/// Accepted placements are committed as temporary allocations, so later
/// placement probes observe them; everything is rolled back to the saved
/// allocation before the plan is returned. Applying the migrations is up to
/// the caller.
///
/// When overload is detected but no migration could be planned, the planner
/// emits a retry event and rotates its target cluster, so the next pass
/// searches for targets in another cluster (when there is more than one).
pub struct MigrationPlanner {
    config: RebalancerConfig,
    vm_selection: Box<dyn VmSelectionPolicy>,
    vm_placement: Box<dyn VmPlacementAlgorithm>,
    host_filter: Option<HostFilter>,
    target_cluster: u32,
    logger: Rc<RefCell<Box<dyn EventLogger>>>,
}

impl MigrationPlanner {
    /// Creates planner with the specified strategies, validating the
    /// configuration. Events go to the log facade unless another sink is
    /// installed via [`MigrationPlanner::with_logger`].
    pub fn new(
        config: RebalancerConfig,
        vm_selection: Box<dyn VmSelectionPolicy>,
        vm_placement: Box<dyn VmPlacementAlgorithm>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            target_cluster: config.home_cluster,
            config,
            vm_selection,
            vm_placement,
            host_filter: None,
            logger: rc!(refcell!(Box::new(StdoutLogger::new()) as Box<dyn EventLogger>)),
        })
    }

    pub fn with_logger(mut self, logger: Rc<RefCell<Box<dyn EventLogger>>>) -> Self {
        self.logger = logger;
        self
    }

    /// Installs a predicate applied to every placement candidate.
    /// By default all hosts are eligible.
    pub fn with_host_filter(mut self, filter: HostFilter) -> Self {
        self.host_filter = Some(filter);
        self
    }

    /// Cluster the next failed-search retry will target.
    pub fn target_cluster(&self) -> u32 {
        self.target_cluster
    }

    pub fn config(&self) -> &RebalancerConfig {
        &self.config
    }

    /// Changes the underload threshold, rejecting values outside (0, 1).
    pub fn set_underload_threshold(&mut self, threshold: f64) -> Result<(), ConfigError> {
        self.config.set_underload_threshold(threshold)
    }

    /// Runs one planning pass over the pool and returns the migration map.
    ///
    /// The pool is mutated only transiently: the committed allocation state
    /// after this call equals the state before it, except for effects the
    /// caller applies itself.
    pub fn plan(&mut self, time: f64, pool: &mut ResourcePool) -> MigrationMap {
        let log = PlanLog::new(time, self.logger.clone());
        let home_hosts = pool.cluster_hosts(self.config.home_cluster);

        let overloaded = load_detector::overloaded_hosts(pool, &self.config, &home_hosts);
        if !overloaded.is_empty() {
            log.record(PlannerEvent::OverloadDetected {
                hosts: overloaded.clone(),
            });
        }

        let mut saved: Option<SavedAllocation> = None;
        let mut migration_map = MigrationMap::new();

        if !overloaded.is_empty() {
            saved = Some(pool.save_allocation());
            self.plan_from_overloaded_hosts(pool, &overloaded, &mut migration_map, &log);
        }
        self.plan_from_underloaded_hosts(pool, &home_hosts, &overloaded, &mut saved, &mut migration_map, &log);

        // single rollback of every hypothetical allocation made above
        if let Some(saved) = &saved {
            for (vm, host) in pool.restore_allocation(saved) {
                log.record(PlannerEvent::RestoreFailed { vm, host });
            }
        }

        if !overloaded.is_empty() && migration_map.is_empty() {
            self.retry_search(pool, &log);
        }
        migration_map
    }

    /// Evicts VMs from every overloaded host until it is no longer overloaded
    /// and places them, heaviest first, among the hosts of the current target
    /// cluster. VMs without a feasible target are simply left out of the map.
    fn plan_from_overloaded_hosts(
        &self,
        pool: &mut ResourcePool,
        overloaded: &[u32],
        migration_map: &mut MigrationMap,
        log: &PlanLog,
    ) {
        let mut victims: Vec<(u32, u32)> = Vec::new();
        for &host_id in overloaded {
            loop {
                let vm_id = match self.vm_selection.select_vm(pool, host_id) {
                    Some(vm_id) => vm_id,
                    None => break,
                };
                victims.push((vm_id, host_id));
                pool.release(vm_id);
                if !load_detector::is_overloaded(pool, &self.config, host_id) {
                    break;
                }
            }
        }
        // migrate the heaviest offenders first
        victims.sort_by(|a, b| {
            pool.vm(b.0)
                .cpu_usage
                .cmp(&pool.vm(a.0).cpu_usage)
                .then(a.0.cmp(&b.0))
        });

        let candidates = pool.cluster_hosts(self.target_cluster);
        for (vm_id, source) in victims {
            let target = self.find_host_for_vm(pool, vm_id, source, &candidates, &BTreeSet::new(), false, log);
            if let Some(target) = target {
                pool.allocate(vm_id, target);
                migration_map.insert(vm_id, target);
                log.record(PlannerEvent::MigrationPlanned {
                    vm: vm_id,
                    source,
                    target,
                });
            }
        }
    }

    /// Repeatedly picks the least loaded eligible underloaded host and tries
    /// to re-place all of its migratable VMs on non-underloaded hosts. The
    /// plan for a host is all-or-nothing: if any VM fails to find a target,
    /// the host's partial plan is rolled back and the search moves on.
    fn plan_from_underloaded_hosts(
        &self,
        pool: &mut ResourcePool,
        home_hosts: &[u32],
        overloaded: &[u32],
        saved: &mut Option<SavedAllocation>,
        migration_map: &mut MigrationMap,
        log: &PlanLog,
    ) {
        let switched_off: Vec<u32> = home_hosts
            .iter()
            .filter(|&&host_id| pool.host(host_id).is_shutdown_or_failed())
            .cloned()
            .collect();
        let mut ignored_sources: BTreeSet<u32> = overloaded.iter().cloned().collect();
        ignored_sources.extend(&switched_off);
        ignored_sources.extend(migration_map.values());
        let mut ignored_targets = ignored_sources.clone();

        loop {
            let source = match load_detector::find_underloaded_host(pool, &self.config, home_hosts, &ignored_sources) {
                Some(host_id) => host_id,
                None => break,
            };
            log.record(PlannerEvent::UnderloadDetected { host: source });
            ignored_sources.insert(source);
            ignored_targets.insert(source);

            let mut vms = pool.migratable_vms(source);
            if vms.is_empty() {
                continue;
            }
            vms.sort_by(|a, b| pool.vm(*b).cpu_usage.cmp(&pool.vm(*a).cpu_usage).then(a.cmp(b)));

            let mut placement: Vec<(u32, u32)> = Vec::new();
            let mut complete = true;
            for vm_id in vms {
                let target = self.find_host_for_vm(pool, vm_id, source, home_hosts, &ignored_targets, true, log);
                match target {
                    Some(target) => {
                        if saved.is_none() {
                            *saved = Some(pool.save_allocation());
                        }
                        pool.release(vm_id);
                        pool.allocate(vm_id, target);
                        placement.push((vm_id, target));
                    }
                    None => {
                        complete = false;
                        break;
                    }
                }
            }

            if complete {
                for (vm_id, target) in placement {
                    migration_map.insert(vm_id, target);
                    ignored_sources.insert(target);
                    log.record(PlannerEvent::MigrationPlanned {
                        vm: vm_id,
                        source,
                        target,
                    });
                }
            } else {
                // partially draining a host provides no benefit, undo its plan
                for (vm_id, _) in placement.into_iter().rev() {
                    pool.release(vm_id);
                    pool.allocate(vm_id, source);
                }
            }
        }
    }

    /// Filters `candidates` down to hosts that can actually take the VM and
    /// lets the placement algorithm rank the survivors.
    fn find_host_for_vm(
        &self,
        pool: &ResourcePool,
        vm_id: u32,
        source: u32,
        candidates: &[u32],
        excluded: &BTreeSet<u32>,
        exclude_underloaded: bool,
        log: &PlanLog,
    ) -> Option<u32> {
        let alloc = pool.vm(vm_id).allocation();
        let mut suitable = Vec::new();
        for &host_id in candidates {
            if host_id == source || excluded.contains(&host_id) {
                continue;
            }
            let host = pool.host(host_id);
            if host.is_shutdown_or_failed() {
                continue;
            }
            if exclude_underloaded && load_detector::is_underloaded(pool, &self.config, host_id) {
                continue;
            }
            if let Some(filter) = &self.host_filter {
                if !filter(pool, host_id) {
                    continue;
                }
            }
            if pool.can_allocate(&alloc, host_id) != AllocationVerdict::Success {
                continue;
            }
            if capacity::projected_utilization(pool, &self.config, host_id, vm_id)
                > load_detector::overload_threshold(&self.config, host)
            {
                continue;
            }
            suitable.push(host_id);
        }
        self.vm_placement.select_host(pool, &self.config, vm_id, &suitable, log)
    }

    /// Reports that the failed search will be retried and rotates the target
    /// cluster when there is more than one.
    fn retry_search(&mut self, pool: &ResourcePool, log: &PlanLog) {
        let clusters = pool.clusters();
        if clusters.len() > 1 {
            let position = clusters
                .iter()
                .position(|&cluster| cluster == self.target_cluster)
                .map_or(0, |position| (position + 1) % clusters.len());
            self.target_cluster = clusters[position];
        }
        log.record(PlannerEvent::RetrySearch {
            delay: self.config.host_search_retry_delay,
            target_cluster: self.target_cluster,
        });
    }
}
