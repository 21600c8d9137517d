use derive_new::new;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{StreamError, StreamResult};
use crate::window_stats::WindowStatistic;

/// One accepted observation, tagged with its 0-based position in the stream.
#[derive(new, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
  pub tick: u64,
  pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
  pub tick: u64,
  pub value: f64,
}

impl From<Sample> for AnomalyRecord {
  fn from(sample: Sample) -> Self {
    Self { tick: sample.tick, value: sample.value }
  }
}

/// Flags samples that stray from the moving average by more than `threshold` moving standard
/// deviations, keeping every flagged sample in discovery order.
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
  threshold: f64,
  anomalies: Vec<AnomalyRecord>,
}

impl AnomalyDetector {
  pub fn new(threshold: f64) -> StreamResult<Self> {
    if !threshold.is_finite() || threshold <= 0.0 {
      return Err(StreamError::InvalidConfig(
        format!("threshold must be a positive real, got {threshold}")));
    }
    Ok(Self { threshold, anomalies: Vec::new() })
  }

  /// Must be called exactly once per tick.  Returns false while there is no statistic yet.
  pub fn evaluate(&mut self, sample: Sample, statistic: Option<WindowStatistic>) -> bool {
    let statistic = match statistic {
      Some(statistic) => statistic,
      None => return false,
    };
    if !self.is_outlier(sample.value, &statistic) {
      return false;
    }
    info!("anomaly at tick {}: {} (ma={}, mstd={})",
        sample.tick, sample.value, statistic.moving_average, statistic.moving_std_dev);
    self.anomalies.push(sample.into());
    true
  }

  fn is_outlier(&self, value: f64, statistic: &WindowStatistic) -> bool {
    // Both sides halved so the deviation stays finite for samples near f64::MAX.
    let half_delta = (value / 2.0 - statistic.moving_average / 2.0).abs();
    half_delta > self.threshold * (statistic.moving_std_dev / 2.0)
  }

  pub fn anomalies(&self) -> &[AnomalyRecord] {
    &self.anomalies
  }

  pub fn threshold(&self) -> f64 {
    self.threshold
  }
}
