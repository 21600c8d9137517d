//! Watch a live synthetic data stream and flag anomalies as they arrive.
//!
//! The stream mixes a Gaussian baseline, a sine wave with a one minute period and Gaussian noise,
//! producing one sample per interval.  Each sample is printed together with the moving average and
//! moving standard deviation of its window, and whether it was flagged.

use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;
use tokio::time::Duration;

use stream_anomaly::config::DetectorConfig;
use stream_anomaly::sample_source::{SyntheticOptions, SyntheticSource};
use stream_anomaly::stream_detector::{StreamDetector, TickReport};
use stream_anomaly::stream_sampler::{SamplerOptions, SamplerUpdate, StreamSampler};

#[derive(Parser, Debug)]
#[clap(name = "stream_monitor")]
struct Opts {
  #[clap(short, long)]
  window_size: Option<usize>,

  #[clap(short, long)]
  threshold: Option<f64>,

  /// JSON file with `window_size` and/or `threshold`; flags take precedence.
  #[clap(short, long, parse(from_os_str))]
  config: Option<PathBuf>,

  /// Milliseconds between samples; must be at least 1.
  #[clap(long, default_value = "1000")]
  interval_ms: u64,

  /// Stop after this many samples instead of running forever.
  #[clap(short = 'n', long)]
  count: Option<u64>,

  #[clap(long)]
  seed: Option<u64>,

  /// Emit one JSON object per tick.
  #[clap(long)]
  json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
  env_logger::init();
  let opts: Opts = Opts::parse();

  let config = DetectorConfig::resolve(opts.config.as_deref(), opts.window_size, opts.threshold)?;
  let detector = StreamDetector::new(config)?;

  let interval = Duration::from_millis(opts.interval_ms);
  let source_options = SyntheticOptions { tick_interval: interval, ..Default::default() };
  let source = match opts.seed {
    Some(seed) => SyntheticSource::with_seed(source_options, seed)?,
    None => SyntheticSource::new(source_options)?,
  };

  if !opts.json {
    println!("Monitoring with window_size={} threshold={}...", config.window_size, config.threshold);
  }
  let mut sampler = StreamSampler::start(
    Box::new(source),
    detector,
    SamplerOptions { interval, max_samples: opts.count })?;

  let mut anomaly_count = 0usize;
  let result = loop {
    let update = match sampler.next_update().await {
      Some(update) => update,
      None => break Err(anyhow!("sampler stopped without finishing")),
    };
    match update {
      SamplerUpdate::Started => (),
      SamplerUpdate::Tick(report) => {
        if report.is_anomaly {
          anomaly_count += 1;
        }
        print_report(&report, anomaly_count, opts.json)?;
      },
      SamplerUpdate::Rejected(err) => eprintln!("Rejected sample: {err}"),
      SamplerUpdate::SourceFailed(err) => break Err(anyhow!("sample source failed: {err}")),
      SamplerUpdate::Finished => break Ok(()),
    }
  };

  let detector = sampler.shutdown().await?;
  result?;
  if !opts.json {
    println!("anomaly ({}): {:?}", detector.anomalies().len(),
        detector.anomalies().iter().map(|a| a.value).collect::<Vec<_>>());
  }
  Ok(())
}

fn print_report(report: &TickReport, anomaly_count: usize, json: bool) -> anyhow::Result<()> {
  if json {
    println!("{}", serde_json::to_string(report)?);
    return Ok(());
  }
  let stats = match report.statistic {
    Some(s) => format!("ma={:>8.3} mstd={:>7.3}", s.moving_average, s.moving_std_dev),
    None => "warming up".to_owned(),
  };
  let marker = if report.is_anomaly { "ANOMALY" } else { "" };
  println!("#{:<6} {:>9.3}  {}  {} [{} so far]",
      report.sample.tick, report.sample.value, stats, marker, anomaly_count);
  Ok(())
}
