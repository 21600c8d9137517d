use std::collections::VecDeque;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::error::{StreamError, StreamResult};

/// Mean and population standard deviation of one full window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStatistic {
  pub moving_average: f64,
  pub moving_std_dev: f64,
}

impl WindowStatistic {
  /// Computes the statistic over `values` from scratch: arithmetic mean, then the mean of squared
  /// deviations from it (divided by N, not N - 1).
  ///
  /// Any window of finite samples gives a finite result, including samples near `f64::MAX`.
  pub fn compute<'a, I>(values: I) -> Option<Self>
  where
      I: IntoIterator<Item=&'a f64>,
      I::IntoIter: Clone {
    let iter = values.into_iter();
    let len = iter.clone().count();
    if len == 0 {
      return None;
    }
    let n = len as f64;
    let moving_average = mean(iter.clone(), n);
    let moving_std_dev = population_std_dev(iter, moving_average, n);
    Some(Self { moving_average, moving_std_dev })
  }
}

fn mean<'a>(values: impl Iterator<Item=&'a f64> + Clone, n: f64) -> f64 {
  let sum = values.clone().sum::<f64>();
  if sum.is_finite() {
    sum / n
  } else {
    // The plain sum overflowed; scaling each term first keeps every partial sum within range.
    values.map(|x| x / n).sum()
  }
}

fn population_std_dev<'a>(values: impl Iterator<Item=&'a f64> + Clone, mean: f64, n: f64) -> f64 {
  let variance = values.clone().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
  if variance.is_finite() {
    return variance.sqrt();
  }

  // Squares (or the deviations themselves) overflowed.  Work on half-deviations, which always
  // fit, normalised by the largest of them.
  let half_deviations = values.map(|x| x / 2.0 - mean / 2.0);
  let scale = half_deviations.clone().fold(0.0f64, |acc, d| acc.max(d.abs()));
  if scale == 0.0 {
    return 0.0;
  }
  let root = (half_deviations.map(|d| (d / scale).powi(2)).sum::<f64>() / n).sqrt();
  scale * (2.0 * root)
}

/// Sliding window over the most recent samples of a stream.
///
/// Only the trailing `capacity` samples are retained.  Once the window has filled, every accepted
/// sample recomputes the statistic over exactly those samples; before that no statistic exists.
#[derive(Debug, Clone)]
pub struct WindowStats {
  capacity: usize,
  window: VecDeque<f64>,
  samples_seen: u64,
  latest: Option<WindowStatistic>,
}

impl WindowStats {
  pub fn new(capacity: usize) -> StreamResult<Self> {
    if capacity == 0 {
      return Err(StreamError::InvalidConfig("window capacity must be non-zero".to_owned()));
    }
    Ok(Self {
      capacity,
      window: VecDeque::with_capacity(capacity),
      samples_seen: 0,
      latest: None,
    })
  }

  /// Appends `sample` to the window, evicting the oldest sample once full.  Non-finite samples are
  /// rejected and leave the window untouched.
  pub fn ingest(&mut self, sample: f64) -> StreamResult<()> {
    if !sample.is_finite() {
      return Err(StreamError::InvalidInput(sample));
    }

    if self.window.len() == self.capacity {
      self.window.pop_front();
    }
    self.window.push_back(sample);
    self.samples_seen += 1;

    if self.window.len() == self.capacity {
      self.latest = WindowStatistic::compute(&self.window);
      trace!("window #{}: {:?}", self.samples_seen, self.latest);
    }
    Ok(())
  }

  /// Statistic over the last `capacity` samples, or `None` while warming up.
  pub fn current_statistic(&self) -> Option<WindowStatistic> {
    self.latest
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn samples_seen(&self) -> u64 {
    self.samples_seen
  }

  pub fn is_warming_up(&self) -> bool {
    self.latest.is_none()
  }

  /// Samples currently in the window, oldest first.
  pub fn window(&self) -> impl Iterator<Item=&f64> + '_ {
    self.window.iter()
  }
}
