use anyhow::anyhow;
use futures_signals::signal::{Mutable, MutableSignalCloned};
use log::{error, info};
use tokio::sync;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio::time::interval;

use crate::error::{StreamError, StreamResult};
use crate::sample_source::{SampleSource, SourceError};
use crate::stream_detector::{StreamDetector, TickReport};

#[derive(Debug, Clone, PartialEq)]
pub enum SamplerUpdate {
  Started,
  Tick(TickReport),
  Rejected(StreamError),
  SourceFailed(SourceError),
  Finished,
}

#[derive(Debug, Clone, Copy)]
pub struct SamplerOptions {
  /// Must be non-zero.
  pub interval: Duration,
  /// Stop once this many samples have been received from the source.
  pub max_samples: Option<u64>,
}

impl Default for SamplerOptions {
  fn default() -> Self {
    Self { interval: Duration::from_secs(1), max_samples: None }
  }
}

/// Pulls samples from a source on a fixed interval and runs them through a detector on a
/// background task.
///
/// Every update is queued in order and read with [`StreamSampler::next_update`]; the most recent one
/// is also mirrored into a signal for consumers that only care about the current status.
pub struct StreamSampler {
  handle: Option<JoinHandle<StreamDetector>>,
  latest: Mutable<SamplerUpdate>,
  updates: UnboundedReceiver<SamplerUpdate>,
  shutdown: UnboundedSender<()>,
}

impl StreamSampler {
  pub fn start(
      source: Box<dyn SampleSource + Send>,
      detector: StreamDetector,
      options: SamplerOptions) -> StreamResult<Self> {
    if options.interval.is_zero() {
      return Err(StreamError::InvalidConfig("sampling interval must be non-zero".to_owned()));
    }
    let (updates_tx, updates_rx) = sync::mpsc::unbounded_channel::<SamplerUpdate>();
    let publisher = Publisher { latest: Mutable::new(SamplerUpdate::Started), updates: updates_tx };
    publisher.publish(SamplerUpdate::Started);
    let latest = publisher.latest.clone();

    let (shutdown_tx, shutdown_rx) = sync::mpsc::unbounded_channel::<()>();
    let handle = tokio::spawn(async move {
      let detector = run_sampler_loop(source, detector, options, publisher, shutdown_rx).await;
      info!("Sampler stopped after {} ticks", detector.ticks());
      detector
    });
    Ok(Self { handle: Some(handle), latest, updates: updates_rx, shutdown: shutdown_tx })
  }

  /// Next update in publication order, or `None` once the loop has stopped and everything it
  /// published has been read.
  pub async fn next_update(&mut self) -> Option<SamplerUpdate> {
    self.updates.recv().await
  }

  pub fn latest_signal(&self) -> MutableSignalCloned<SamplerUpdate> {
    self.latest.signal_cloned()
  }

  pub fn latest(&self) -> SamplerUpdate {
    self.latest.get_cloned()
  }

  /// Stops the loop if it's still running and hands back the detector with everything it
  /// accumulated.
  pub async fn shutdown(mut self) -> anyhow::Result<StreamDetector> {
    let _ = self.shutdown.send(());
    let handle = self.handle.take().ok_or_else(|| anyhow!("sampler already shut down"))?;
    Ok(handle.await?)
  }
}

struct Publisher {
  latest: Mutable<SamplerUpdate>,
  updates: UnboundedSender<SamplerUpdate>,
}

impl Publisher {
  fn publish(&self, update: SamplerUpdate) {
    // Nobody listening is fine, the status signal still gets it.
    let _ = self.updates.send(update.clone());
    self.latest.set(update);
  }
}

async fn run_sampler_loop(
    mut source: Box<dyn SampleSource + Send>,
    mut detector: StreamDetector,
    options: SamplerOptions,
    publisher: Publisher,
    mut shutdown: UnboundedReceiver<()>) -> StreamDetector {
  let mut interval = interval(options.interval);
  interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
  let mut received = 0u64;
  loop {
    if options.max_samples.map_or(false, |max| received >= max) {
      publisher.publish(SamplerUpdate::Finished);
      break;
    }
    tokio::select! {
      _ = interval.tick() => {
        match source.next_sample() {
          Ok(value) => {
            received += 1;
            match detector.process(value) {
              Ok(report) => publisher.publish(SamplerUpdate::Tick(report)),
              Err(err) => publisher.publish(SamplerUpdate::Rejected(err)),
            }
          },
          Err(SourceError::Exhausted) => {
            publisher.publish(SamplerUpdate::Finished);
            break;
          },
          Err(err) => {
            error!("Sample source failed: {err}");
            publisher.publish(SamplerUpdate::SourceFailed(err));
            break;
          },
        }
      },
      _ = shutdown.recv() => {
        break;
      },
    }
  }
  detector
}

impl Drop for StreamSampler {
  fn drop(&mut self) {
    let _ = self.shutdown.send(());
  }
}
