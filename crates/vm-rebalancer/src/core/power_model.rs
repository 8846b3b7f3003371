//! Physical host power consumption models.

use dyn_clone::{clone_trait_object, DynClone};
use thiserror::Error;

/// Returned when a power model is queried outside its validated domain,
/// e.g. with a projected CPU load above 1.
#[derive(Debug, Error)]
#[error("cpu load {load} is outside the validated domain of the power model")]
pub struct PowerModelError {
    pub load: f64,
}

/// Power model is a function, which computes the power consumption of a
/// physical host based on its current CPU load.
///
/// Implemented by the surrounding simulation; the rebalancer only queries it
/// when comparing candidate migration targets.
pub trait HostPowerModel: DynClone {
    /// Returns the power consumption of a host under the given CPU load.
    fn get_power(&self, cpu_load: f64) -> Result<f64, PowerModelError>;
}

clone_trait_object!(HostPowerModel);

/// Simple linear power model.
///
/// Power grows linearly from `idle_power` at zero load to `max_power` at full
/// load. If CPU load is zero, then it is assumed that the host is powered off
/// and its power consumption is zero. Loads outside `[0, 1]` are rejected.
#[derive(Clone)]
pub struct LinearPowerModel {
    max_power: f64,
    idle_power: f64,
}

impl LinearPowerModel {
    /// Creates linear power model with zero idle power.
    /// - `max_power` - host power when CPU is fully loaded.
    pub fn new(max_power: f64) -> Self {
        Self {
            idle_power: 0.,
            max_power,
        }
    }

    pub fn new_with_idle_power(max_power: f64, idle_power: f64) -> Self {
        Self { max_power, idle_power }
    }
}

impl HostPowerModel for LinearPowerModel {
    fn get_power(&self, cpu_load: f64) -> Result<f64, PowerModelError> {
        if !(0. ..=1.).contains(&cpu_load) {
            return Err(PowerModelError { load: cpu_load });
        }
        if cpu_load == 0. {
            return Ok(0.);
        }
        Ok(self.idle_power + cpu_load * (self.max_power - self.idle_power))
    }
}

/// Power model returning the same value for any load, useful in tests.
#[derive(Clone)]
pub struct ConstantPowerModel {
    power: f64,
}

impl ConstantPowerModel {
    pub fn new(power: f64) -> Self {
        Self { power }
    }
}

impl HostPowerModel for ConstantPowerModel {
    fn get_power(&self, _cpu_load: f64) -> Result<f64, PowerModelError> {
        Ok(self.power)
    }
}
