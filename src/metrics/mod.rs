//! System metric sampling for the resource triggers.
//!
//! One scalar per sample: the hottest temperature sensor in `Temp` mode, the
//! global CPU usage percentage in `Usage` mode. A failed read yields `None`
//! and the caller skips the cycle.

use serde::{Deserialize, Serialize};
use sysinfo::{Components, System};

const ENABLE_LOGS: bool = true;
use crate::log_warn;

/// Which scalar the resource monitor watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorMode {
    Temp,
    Usage,
}

impl Default for MonitorMode {
    fn default() -> Self {
        MonitorMode::Temp
    }
}

/// Boundary to whatever provides the metric scalar.
pub trait MetricSource: Send {
    fn sample(&mut self) -> Option<f32>;
}

/// sysinfo-backed metric source.
pub struct SystemMetricSource {
    mode: MonitorMode,
    system: System,
    components: Components,
}

impl SystemMetricSource {
    pub fn new(mode: MonitorMode) -> Self {
        let mut system = System::new();
        // Establish the baseline so the first real sample is a proper delta
        // instead of a bogus 0%.
        system.refresh_cpu_usage();
        Self {
            mode,
            system,
            components: Components::new_with_refreshed_list(),
        }
    }

    fn sample_usage(&mut self) -> Option<f32> {
        self.system.refresh_cpu_usage();
        Some(self.system.global_cpu_usage())
    }

    fn sample_temperature(&mut self) -> Option<f32> {
        let mut hottest: Option<f32> = None;
        for component in self.components.iter_mut() {
            component.refresh();
            let temp = component.temperature();
            // Sensors sometimes report junk; only trust plausible readings.
            if temp > -50.0 && temp < 150.0 {
                hottest = Some(hottest.map_or(temp, |max| max.max(temp)));
            }
        }
        if hottest.is_none() {
            log_warn!("no usable temperature sensor found");
        }
        hottest
    }
}

impl MetricSource for SystemMetricSource {
    fn sample(&mut self) -> Option<f32> {
        match self.mode {
            MonitorMode::Usage => self.sample_usage(),
            MonitorMode::Temp => self.sample_temperature(),
        }
    }
}
