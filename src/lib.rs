pub mod anomaly_detector;
pub mod config;
pub mod error;
pub mod sample_source;
pub mod stream_detector;
pub mod stream_sampler;
pub mod window_stats;
