pub mod capacity;
pub mod common;
pub mod config;
pub mod events;
pub mod load_detector;
pub mod logger;
pub mod migration_planner;
pub mod power_model;
pub mod resource_pool;
pub mod vm;
pub mod vm_placement_algorithm;
pub mod vm_placement_algorithms;
pub mod vm_selection_policy;
pub mod vm_selection_policies;
