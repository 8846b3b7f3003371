//! Structured events emitted during a planning pass.

use serde::Serialize;

/// Notifications produced by the planner and consumed by external reporting.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum PlannerEvent {
    /// Hosts classified as overloaded at the start of the pass.
    OverloadDetected { hosts: Vec<u32> },
    /// Host selected as an underloaded migration source.
    UnderloadDetected { host: u32 },
    /// A migration of `vm` from `source` to `target` was added to the plan.
    MigrationPlanned { vm: u32, source: u32, target: u32 },
    /// No feasible plan was found, the search will be retried after `delay`
    /// against `target_cluster`.
    RetrySearch { delay: f64, target_cluster: u32 },
    /// A VM could not be reinstated on its snapshot host after probing.
    RestoreFailed { vm: u32, host: u32 },
    /// The power model of `host` rejected a projected utilization,
    /// zero power delta was assumed.
    PowerModelFailed { host: u32 },
}
