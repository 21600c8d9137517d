//! Classify a recorded series of samples, one per line, read from a file or stdin.
//!
//! Lines that don't hold a finite number are reported and skipped; they don't count as a tick.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::warn;
use serde_json::json;

use stream_anomaly::config::DetectorConfig;
use stream_anomaly::sample_source::{parse_line, ParsedLine};
use stream_anomaly::stream_detector::StreamDetector;

#[derive(Parser, Debug)]
#[clap(name = "classify")]
struct Opts {
  /// Input file; reads stdin when omitted.
  #[clap(parse(from_os_str))]
  input: Option<PathBuf>,

  #[clap(short, long)]
  window_size: Option<usize>,

  #[clap(short, long)]
  threshold: Option<f64>,

  #[clap(short, long, parse(from_os_str))]
  config: Option<PathBuf>,

  #[clap(long)]
  json: bool,
}

fn main() -> anyhow::Result<()> {
  env_logger::init();
  let opts: Opts = Opts::parse();

  let config = DetectorConfig::resolve(opts.config.as_deref(), opts.window_size, opts.threshold)?;
  let mut detector = StreamDetector::new(config)?;

  let reader: Box<dyn BufRead> = match &opts.input {
    Some(path) => Box::new(BufReader::new(
      File::open(path).with_context(|| format!("opening {}", path.display()))?)),
    None => Box::new(BufReader::new(io::stdin())),
  };

  let mut rejected = 0usize;
  for (index, line) in reader.split(b'\n').enumerate() {
    let line = line?;
    let line_number = index + 1;
    let value = match parse_line(&line) {
      ParsedLine::Blank => continue,
      ParsedLine::Sample(value) => value,
      ParsedLine::Malformed(reason) => {
        warn!("line {line_number}: {reason}");
        eprintln!("line {line_number}: {reason}");
        rejected += 1;
        continue;
      },
    };
    match detector.process(value) {
      Ok(report) if opts.json => println!("{}", serde_json::to_string(&report)?),
      Ok(report) => {
        let verdict = if report.is_anomaly { "anomaly" } else { "normal" };
        match report.statistic {
          Some(s) => println!("{}\t{}\t{:.6}\t{:.6}\t{}",
              report.sample.tick, value, s.moving_average, s.moving_std_dev, verdict),
          None => println!("{}\t{}\t-\t-\t{}", report.sample.tick, value, verdict),
        }
      },
      Err(err) => {
        eprintln!("line {line_number}: {err}");
        rejected += 1;
      },
    }
  }

  if opts.json {
    println!("{}", json!({
      "ticks": detector.ticks(),
      "rejected": rejected,
      "anomalies": detector.anomalies(),
    }));
  } else {
    println!("{} samples, {} rejected, {} anomalies: {:?}",
        detector.ticks(), rejected, detector.anomalies().len(),
        detector.anomalies().iter().map(|a| a.value).collect::<Vec<_>>());
  }
  Ok(())
}
