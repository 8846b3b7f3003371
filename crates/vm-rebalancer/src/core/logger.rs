//! Event sinks recording planner notifications for external reporting.

use std::cell::RefCell;
use std::fs::File;
use std::rc::Rc;

use log::{error, info, warn};
use serde::Serialize;

use crate::core::events::PlannerEvent;

pub trait EventLogger {
    fn log_event(&mut self, time: f64, event: PlannerEvent);

    fn save_log(&self, _path: &str) -> Result<(), std::io::Error> {
        Ok(())
    }
}

/// Forwards events to the `log` facade with levels matching their severity.
#[derive(Default)]
pub struct StdoutLogger {}

impl StdoutLogger {
    pub fn new() -> Self {
        Self {}
    }
}

impl EventLogger for StdoutLogger {
    fn log_event(&mut self, time: f64, event: PlannerEvent) {
        match event {
            PlannerEvent::OverloadDetected { hosts } => {
                warn!("{}: overloaded hosts: {:?}", time, hosts);
            }
            PlannerEvent::UnderloadDetected { host } => {
                info!("{}: host #{} is underloaded", time, host);
            }
            PlannerEvent::MigrationPlanned { vm, source, target } => {
                info!(
                    "{}: vm #{} will be migrated from host #{} to host #{}",
                    time, vm, source, target
                );
            }
            PlannerEvent::RetrySearch { delay, target_cluster } => {
                warn!(
                    "{}: no suitable hosts found, retrying in {} against cluster {}",
                    time, delay, target_cluster
                );
            }
            PlannerEvent::RestoreFailed { vm, host } => {
                error!("{}: couldn't restore vm #{} on host #{}", time, vm, host);
            }
            PlannerEvent::PowerModelFailed { host } => {
                error!("{}: power consumption for host #{} could not be determined", time, host);
            }
        }
    }
}

/// Single recorded event with the time of the planning pass that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    pub timestamp: f64,
    pub event: PlannerEvent,
}

#[derive(Serialize)]
struct CsvEntry {
    timestamp: f64,
    event: String,
}

/// Keeps events in memory, allowing to inspect them later or dump to a CSV
/// file. The entry storage is shared, so a clone of the handle obtained via
/// [`RecordingLogger::entries`] observes events recorded after the logger was
/// moved into a planner.
#[derive(Default)]
pub struct RecordingLogger {
    log: Rc<RefCell<Vec<LogEntry>>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a shared handle to the recorded entries.
    pub fn entries(&self) -> Rc<RefCell<Vec<LogEntry>>> {
        self.log.clone()
    }
}

impl EventLogger for RecordingLogger {
    fn log_event(&mut self, time: f64, event: PlannerEvent) {
        self.log.borrow_mut().push(LogEntry {
            timestamp: time,
            event,
        });
    }

    fn save_log(&self, path: &str) -> Result<(), std::io::Error> {
        let file = File::create(path)?;
        let mut wtr = csv::Writer::from_writer(file);
        for entry in self.log.borrow().iter() {
            wtr.serialize(CsvEntry {
                timestamp: entry.timestamp,
                event: format!("{:?}", entry.event),
            })?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Sink handle scoped to one planning pass, stamping events with the pass time.
#[derive(Clone)]
pub struct PlanLog {
    time: f64,
    logger: Rc<RefCell<Box<dyn EventLogger>>>,
}

impl PlanLog {
    pub fn new(time: f64, logger: Rc<RefCell<Box<dyn EventLogger>>>) -> Self {
        Self { time, logger }
    }

    pub fn record(&self, event: PlannerEvent) {
        self.logger.borrow_mut().log_event(self.time, event);
    }
}
