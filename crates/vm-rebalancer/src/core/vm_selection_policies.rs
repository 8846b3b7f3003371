pub mod minimum_utilization;
pub mod random_selection;
