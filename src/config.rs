use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::Operation;
use crate::store::DEFAULT_QUEUE_CAPACITY;
use crate::{Error, Result};

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, `host:port`.
    pub addr: String,
    pub queue_capacity: usize,
    /// How long a dispatched task may stay unreported before redelivery.
    pub task_lease_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            task_lease_ms: 30_000,
        }
    }
}

impl ServerConfig {
    pub fn task_lease(&self) -> Duration {
        Duration::from_millis(self.task_lease_ms)
    }
}

/// Agent settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub orchestrator_url: String,
    /// Number of concurrent agent loops.
    pub computing_power: usize,
    /// Idle wait after the orchestrator reports no task available.
    pub poll_interval_ms: u64,
    pub time_addition_ms: u64,
    pub time_subtraction_ms: u64,
    pub time_multiplication_ms: u64,
    pub time_division_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            orchestrator_url: "http://127.0.0.1:8080".to_string(),
            computing_power: 1,
            poll_interval_ms: 50,
            time_addition_ms: 100,
            time_subtraction_ms: 100,
            time_multiplication_ms: 100,
            time_division_ms: 100,
        }
    }
}

impl WorkerConfig {
    /// Simulated execution time for one operation.
    pub fn operation_delay(&self, operation: Operation) -> Duration {
        let ms = match operation {
            Operation::Add => self.time_addition_ms,
            Operation::Subtract => self.time_subtraction_ms,
            Operation::Multiply => self.time_multiplication_ms,
            Operation::Divide => self.time_division_ms,
        };
        Duration::from_millis(ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Same settings with every operation delay set to `ms`.
    pub fn with_uniform_delay(mut self, ms: u64) -> Self {
        self.time_addition_ms = ms;
        self.time_subtraction_ms = ms;
        self.time_multiplication_ms = ms;
        self.time_division_ms = ms;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub worker: WorkerConfig,
}

impl Config {
    pub fn calcflow_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".calcflow"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::calcflow_dir()?.join("calcflow.toml"))
    }

    /// Load from `path`, or from the default location when `None`, then
    /// apply environment overrides. A missing file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };
        let mut config = Self::load_file(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse the TOML file at `path` without environment overrides.
    pub fn load_file(path: &Path) -> Result<Self> {
        debug!("Config::load path={}", path.display());
        if !path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        debug!(
            "Config loaded: addr={}, computing_power={}",
            config.server.addr, config.worker.computing_power
        );
        Ok(config)
    }

    /// Apply overrides from `lookup`, normally the process environment.
    ///
    /// Values that do not parse are ignored with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("ORCHESTRATOR_ADDR") {
            self.server.addr = addr;
        }
        if let Some(url) = lookup("ORCHESTRATOR_URL") {
            self.worker.orchestrator_url = url;
        }

        if let Some(raw) = lookup("COMPUTING_POWER") {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.worker.computing_power = n,
                _ => warn!("Ignoring invalid COMPUTING_POWER={:?}", raw),
            }
        }

        let delays = [
            ("TIME_ADDITION_MS", &mut self.worker.time_addition_ms),
            ("TIME_SUBTRACTION_MS", &mut self.worker.time_subtraction_ms),
            (
                "TIME_MULTIPLICATIONS_MS",
                &mut self.worker.time_multiplication_ms,
            ),
            ("TIME_DIVISIONS_MS", &mut self.worker.time_division_ms),
        ];
        for (key, slot) in delays {
            let Some(raw) = lookup(key) else { continue };
            match raw.trim().parse::<u64>() {
                Ok(ms) => *slot = ms,
                Err(_) => warn!("Ignoring invalid {}={:?}", key, raw),
            }
        }
    }
}
