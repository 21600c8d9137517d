use std::f64::consts::PI;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use thiserror::Error;

#[derive(Error, PartialEq, Clone, Debug)]
pub enum SourceError {
  #[error("source exhausted")]
  Exhausted,
  #[error("{0}")]
  Internal(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Producer of one floating-point sample per tick.
pub trait SampleSource {
  fn next_sample(&mut self) -> SourceResult<f64>;
}

pub const SEASONAL_PERIOD: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticOptions {
  /// Value the baseline is distributed around.
  pub normal_mu: f64,
  pub normal_sigma: f64,
  pub seasonal_amplitude: f64,
  pub noise_sigma: f64,
  /// Stream time that passes between two samples; drives the seasonal phase.
  pub tick_interval: Duration,
}

impl Default for SyntheticOptions {
  fn default() -> Self {
    Self {
      normal_mu: 10.0,
      normal_sigma: 2.0,
      seasonal_amplitude: 4.0,
      noise_sigma: 0.5,
      tick_interval: Duration::from_secs(1),
    }
  }
}

/// Gaussian baseline plus a sine wave with a one minute period plus Gaussian noise.
pub struct SyntheticSource {
  options: SyntheticOptions,
  baseline: Normal<f64>,
  noise: Normal<f64>,
  rng: StdRng,
  tick: u64,
}

impl SyntheticSource {
  pub fn new(options: SyntheticOptions) -> SourceResult<Self> {
    Self::with_rng(options, StdRng::from_entropy())
  }

  pub fn with_seed(options: SyntheticOptions, seed: u64) -> SourceResult<Self> {
    Self::with_rng(options, StdRng::seed_from_u64(seed))
  }

  fn with_rng(options: SyntheticOptions, rng: StdRng) -> SourceResult<Self> {
    if !options.normal_mu.is_finite() {
      return Err(SourceError::Internal(format!("bad baseline mean: {}", options.normal_mu)));
    }
    check_sigma("baseline", options.normal_sigma)?;
    check_sigma("noise", options.noise_sigma)?;
    if !options.seasonal_amplitude.is_finite() {
      return Err(SourceError::Internal(
        format!("bad seasonal amplitude: {}", options.seasonal_amplitude)));
    }
    let baseline = Normal::new(options.normal_mu, options.normal_sigma)
        .map_err(|e| SourceError::Internal(format!("bad baseline distribution: {e}")))?;
    let noise = Normal::new(0.0, options.noise_sigma)
        .map_err(|e| SourceError::Internal(format!("bad noise distribution: {e}")))?;
    Ok(Self { options, baseline, noise, rng, tick: 0 })
  }

  fn seasonal_component(&self) -> f64 {
    let elapsed = self.options.tick_interval.as_secs_f64() * self.tick as f64;
    let period = SEASONAL_PERIOD.as_secs_f64();
    let phase = (elapsed % period) / period;
    self.options.seasonal_amplitude * (2.0 * PI * phase).sin()
  }
}

impl SampleSource for SyntheticSource {
  fn next_sample(&mut self) -> SourceResult<f64> {
    let value = self.baseline.sample(&mut self.rng)
        + self.seasonal_component()
        + self.noise.sample(&mut self.rng);
    self.tick += 1;
    Ok(value)
  }
}

fn check_sigma(which: &str, sigma: f64) -> SourceResult<()> {
  if !sigma.is_finite() || sigma < 0.0 {
    return Err(SourceError::Internal(format!("bad {which} sigma: {sigma}")));
  }
  Ok(())
}

/// Replays a fixed sequence of samples, then reports exhaustion.
pub struct ReplaySource {
  values: Box<dyn Iterator<Item=f64> + Send>,
}

impl ReplaySource {
  pub fn new<I>(values: I) -> Self
  where
      I: IntoIterator<Item=f64>,
      I::IntoIter: Send + 'static {
    Self { values: Box::new(values.into_iter()) }
  }
}

impl SampleSource for ReplaySource {
  fn next_sample(&mut self) -> SourceResult<f64> {
    self.values.next().ok_or(SourceError::Exhausted)
  }
}

/// One line of a recorded series.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
  Blank,
  Sample(f64),
  Malformed(String),
}

/// Parses one raw line (without its `\n`).  Non-finite numbers such as `NaN` parse as samples;
/// the detector is what rejects them.
pub fn parse_line(raw: &[u8]) -> ParsedLine {
  let text = match std::str::from_utf8(raw) {
    Ok(text) => text,
    Err(err) => return ParsedLine::Malformed(format!("not valid UTF-8: {err}")),
  };
  let trimmed = text.trim();
  if trimmed.is_empty() {
    return ParsedLine::Blank;
  }
  match trimmed.parse::<f64>() {
    Ok(value) => ParsedLine::Sample(value),
    Err(_) => ParsedLine::Malformed(format!("not a number: {trimmed:?}")),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_replay_then_exhausted() {
    let mut source = ReplaySource::new(vec![1.0, 2.0]);
    assert_eq!(Ok(1.0), source.next_sample());
    assert_eq!(Ok(2.0), source.next_sample());
    assert_eq!(Err(SourceError::Exhausted), source.next_sample());
  }

  #[test]
  fn test_seeded_is_reproducible() {
    let mut a = SyntheticSource::with_seed(SyntheticOptions::default(), 99).unwrap();
    let mut b = SyntheticSource::with_seed(SyntheticOptions::default(), 99).unwrap();
    for _ in 0..100 {
      let value = a.next_sample().unwrap();
      assert!(value.is_finite());
      assert_eq!(value, b.next_sample().unwrap());
    }
  }

  #[test]
  fn test_pure_seasonal_signal() {
    let options = SyntheticOptions {
      normal_mu: 0.0,
      normal_sigma: 0.0,
      seasonal_amplitude: 4.0,
      noise_sigma: 0.0,
      tick_interval: Duration::from_secs(15),
    };
    let mut source = SyntheticSource::with_seed(options, 1).unwrap();
    let expected = [0.0, 4.0, 0.0, -4.0, 0.0];
    for want in expected {
      let got = source.next_sample().unwrap();
      assert!((want - got).abs() < 1e-9, "expected {want}, got {got}");
    }
  }

  #[test]
  fn test_bad_options() {
    let options = SyntheticOptions { normal_sigma: -1.0, ..Default::default() };
    assert!(matches!(SyntheticSource::new(options), Err(SourceError::Internal(_))));
    let options = SyntheticOptions { noise_sigma: -0.5, ..Default::default() };
    assert!(matches!(SyntheticSource::new(options), Err(SourceError::Internal(_))));
    let options = SyntheticOptions { noise_sigma: f64::NAN, ..Default::default() };
    assert!(matches!(SyntheticSource::new(options), Err(SourceError::Internal(_))));
    let options = SyntheticOptions { normal_sigma: f64::INFINITY, ..Default::default() };
    assert!(matches!(SyntheticSource::new(options), Err(SourceError::Internal(_))));
    let options = SyntheticOptions { normal_mu: f64::NAN, ..Default::default() };
    assert!(matches!(SyntheticSource::new(options), Err(SourceError::Internal(_))));
    let options = SyntheticOptions { seasonal_amplitude: f64::NEG_INFINITY, ..Default::default() };
    assert!(matches!(SyntheticSource::with_seed(options, 1), Err(SourceError::Internal(_))));
  }

  #[test]
  fn test_parse_line() {
    assert_eq!(ParsedLine::Sample(12.5), parse_line(b"12.5"));
    assert_eq!(ParsedLine::Sample(-3.0), parse_line(b"  -3\r"));
    assert_eq!(ParsedLine::Blank, parse_line(b"   "));
    assert!(matches!(parse_line(b"NaN"), ParsedLine::Sample(v) if v.is_nan()));
    assert!(matches!(parse_line(b"twelve"), ParsedLine::Malformed(_)));
  }

  #[test]
  fn test_parse_line_invalid_utf8() {
    assert!(matches!(parse_line(&[b'1', 0xff, b'2']), ParsedLine::Malformed(msg) if msg.contains("UTF-8")));
  }
}
