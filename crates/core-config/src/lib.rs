//! Configuration loading and parsing.
//!
//! `vicad.toml` configures the worker runtime and the analysis thresholds:
//!
//! ```toml
//! [worker]
//! runtime = "bun"
//! script = "worker/worker.ts"
//! shm_capacity_mib = 100
//!
//! [analysis]
//! sharp_angle_deg = 30.0
//! max_dihedral_deg = 40.0
//! ```
//!
//! Discovery prefers a local `vicad.toml` before the platform config dir.
//! Every field has a default; unknown fields are ignored and a file that
//! fails to parse falls back to defaults so a bad edit never blocks
//! startup.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::warn;

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    #[serde(default = "WorkerConfig::default_runtime")]
    pub runtime: String,
    #[serde(default = "WorkerConfig::default_script")]
    pub script: String,
    #[serde(default = "WorkerConfig::default_shm_capacity_mib")]
    pub shm_capacity_mib: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            runtime: Self::default_runtime(),
            script: Self::default_script(),
            shm_capacity_mib: Self::default_shm_capacity_mib(),
        }
    }
}

impl WorkerConfig {
    fn default_runtime() -> String {
        "bun".to_owned()
    }
    fn default_script() -> String {
        "worker/worker.ts".to_owned()
    }
    const fn default_shm_capacity_mib() -> u32 {
        100
    }

    pub fn shm_capacity_bytes(&self) -> usize {
        self.shm_capacity_mib as usize * 1024 * 1024
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "AnalysisConfig::default_sharp_angle_deg")]
    pub sharp_angle_deg: f64,
    #[serde(default = "AnalysisConfig::default_max_dihedral_deg")]
    pub max_dihedral_deg: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sharp_angle_deg: Self::default_sharp_angle_deg(),
            max_dihedral_deg: Self::default_max_dihedral_deg(),
        }
    }
}

impl AnalysisConfig {
    const fn default_sharp_angle_deg() -> f64 {
        30.0
    }
    const fn default_max_dihedral_deg() -> f64 {
        40.0
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Best-effort config path: local working directory first, then the
/// platform config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("vicad.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("vicad").join("vicad.toml");
    }
    PathBuf::from("vicad.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default());
    };
    match toml::from_str::<Config>(&content) {
        Ok(config) => Ok(config),
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config parse failed; using defaults");
            Ok(Config::default())
        }
    }
}
