use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::anomaly_detector::{AnomalyDetector, AnomalyRecord, Sample};
use crate::config::DetectorConfig;
use crate::error::StreamResult;
use crate::window_stats::{WindowStatistic, WindowStats};

/// What happened on one tick: the accepted sample, the statistic of the window it closed (if the
/// window had filled), and the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
  pub sample: Sample,
  pub statistic: Option<WindowStatistic>,
  pub is_anomaly: bool,
}

/// Per-stream pipeline: window statistics feeding the threshold check.  One instance per stream;
/// callers serialize access.
#[derive(Debug, Clone)]
pub struct StreamDetector {
  config: DetectorConfig,
  stats: WindowStats,
  detector: AnomalyDetector,
  next_tick: u64,
}

impl StreamDetector {
  pub fn new(config: DetectorConfig) -> StreamResult<Self> {
    config.validate()?;
    Ok(Self {
      config,
      stats: WindowStats::new(config.window_size)?,
      detector: AnomalyDetector::new(config.threshold)?,
      next_tick: 0,
    })
  }

  /// Runs one sample through the pipeline.  A rejected sample does not consume a tick and leaves
  /// all state as it was.
  pub fn process(&mut self, value: f64) -> StreamResult<TickReport> {
    if let Err(err) = self.stats.ingest(value) {
      warn!("rejecting sample after tick {}: {err}", self.next_tick);
      return Err(err);
    }
    let sample = Sample::new(self.next_tick, value);
    self.next_tick += 1;

    let statistic = self.stats.current_statistic();
    let is_anomaly = self.detector.evaluate(sample, statistic);
    debug!("tick {}: value={} statistic={:?} anomaly={}", sample.tick, value, statistic, is_anomaly);
    Ok(TickReport { sample, statistic, is_anomaly })
  }

  pub fn current_statistic(&self) -> Option<WindowStatistic> {
    self.stats.current_statistic()
  }

  pub fn anomalies(&self) -> &[AnomalyRecord] {
    self.detector.anomalies()
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  /// Number of samples accepted so far.
  pub fn ticks(&self) -> u64 {
    self.next_tick
  }

  /// Discards all accumulated state, keeping the configuration.
  pub fn reset(&mut self) -> StreamResult<()> {
    *self = Self::new(self.config)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use crate::error::StreamError;

  use super::*;

  fn detector() -> StreamDetector {
    StreamDetector::new(DetectorConfig::default()).unwrap()
  }

  #[test]
  fn test_reports_spike() {
    let mut detector = detector();
    let reports: Vec<TickReport> = [10.0, 10.0, 10.0, 50.0].iter()
        .map(|v| detector.process(*v).unwrap())
        .collect();

    assert_eq!(None, reports[0].statistic);
    assert_eq!(None, reports[1].statistic);
    assert_eq!(Some(WindowStatistic { moving_average: 10.0, moving_std_dev: 0.0 }), reports[2].statistic);

    let last = reports[3];
    assert!(last.is_anomaly);
    assert_eq!(Sample::new(3, 50.0), last.sample);
    let statistic = last.statistic.unwrap();
    assert!((statistic.moving_average - 23.333333).abs() < 1e-5);
    assert!((statistic.moving_std_dev - 18.856180).abs() < 1e-5);
    assert_eq!(&[AnomalyRecord { tick: 3, value: 50.0 }], detector.anomalies());
  }

  #[test]
  fn test_rejected_sample_does_not_consume_tick() {
    let mut detector = detector();
    detector.process(1.0).unwrap();
    detector.process(2.0).unwrap();
    assert_eq!(Err(StreamError::InvalidInput(f64::INFINITY)), detector.process(f64::INFINITY));
    assert!(matches!(detector.process(f64::NAN), Err(StreamError::InvalidInput(_))));
    assert_eq!(None, detector.current_statistic());
    assert_eq!(2, detector.ticks());

    let report = detector.process(3.0).unwrap();
    assert_eq!(2, report.sample.tick);
    assert_eq!(Some(2.0), report.statistic.map(|s| s.moving_average));
  }

  #[test]
  fn test_invalid_config() {
    let config = DetectorConfig { window_size: 1, threshold: 1.2 };
    assert!(matches!(StreamDetector::new(config), Err(StreamError::InvalidConfig(_))));
    let config = DetectorConfig { window_size: 3, threshold: 0.0 };
    assert!(matches!(StreamDetector::new(config), Err(StreamError::InvalidConfig(_))));
  }

  #[test]
  fn test_reset() {
    let mut detector = detector();
    for v in [10.0, 10.0, 10.0, 50.0] {
      detector.process(v).unwrap();
    }
    detector.reset().unwrap();
    assert_eq!(0, detector.ticks());
    assert!(detector.anomalies().is_empty());
    assert_eq!(None, detector.current_statistic());
    assert_eq!(3, detector.config().window_size);
  }

  #[test]
  fn test_report_serializes() {
    let mut detector = detector();
    let report = detector.process(4.0).unwrap();
    let json = serde_json::to_string(&report).unwrap();
    assert_eq!(r#"{"sample":{"tick":0,"value":4.0},"statistic":null,"is_anomaly":false}"#, json);
  }
}
