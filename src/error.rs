use thiserror::Error;

#[derive(Error, PartialEq, Clone, Debug)]
pub enum StreamError {
  #[error("invalid config: {0}")]
  InvalidConfig(String),
  #[error("invalid input: {0} is not a finite sample")]
  InvalidInput(f64),
}

pub type StreamResult<T> = Result<T, StreamError>;
