use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{StreamError, StreamResult};

pub const DEFAULT_WINDOW_SIZE: usize = 3;
pub const DEFAULT_THRESHOLD: f64 = 1.2;

/// Immutable parameters for one detector instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
  /// Number of trailing samples the moving statistics are computed over.
  pub window_size: usize,

  /// Multiple of the moving standard deviation a sample must exceed (strictly) to be flagged.
  pub threshold: f64,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      window_size: DEFAULT_WINDOW_SIZE,
      threshold: DEFAULT_THRESHOLD,
    }
  }
}

impl DetectorConfig {
  pub fn new(window_size: usize, threshold: f64) -> StreamResult<Self> {
    let config = Self { window_size, threshold };
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> StreamResult<()> {
    if self.window_size < 2 {
      return Err(StreamError::InvalidConfig(
        format!("window_size must be at least 2, got {}", self.window_size)));
    }
    if !self.threshold.is_finite() || self.threshold <= 0.0 {
      return Err(StreamError::InvalidConfig(
        format!("threshold must be a positive real, got {}", self.threshold)));
    }
    Ok(())
  }

  /// Loads a config from a JSON file.  Fields missing from the file fall back to the defaults.
  pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: DetectorConfig = serde_json::from_str(&contents)
        .with_context(|| format!("parsing config {}", path.display()))?;
    config.validate()?;
    Ok(config)
  }

  /// Applies CLI-style overrides on top of this config and re-validates.
  pub fn with_overrides(self, window_size: Option<usize>, threshold: Option<f64>) -> StreamResult<Self> {
    Self::new(
      window_size.unwrap_or(self.window_size),
      threshold.unwrap_or(self.threshold))
  }

  /// Config file (or defaults) with any explicitly given values layered on top.
  pub fn resolve(path: Option<&Path>, window_size: Option<usize>, threshold: Option<f64>) -> anyhow::Result<Self> {
    let base = match path {
      Some(path) => Self::from_json_file(path)?,
      None => Self::default(),
    };
    Ok(base.with_overrides(window_size, threshold)?)
  }
}
