use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OtpError {
  /// Rejected while building a configuration, nothing was constructed.
  #[error("invalid configuration: {0}")]
  Config(String),
  /// Rejected by a generation call, e.g. a negative counter.
  #[error("invalid input: {0}")]
  InvalidInput(String),
  #[error("invalid provisioning uri: {0}")]
  Uri(String),
}

pub type OtpResult<T> = Result<T, OtpError>;

impl From<url::ParseError> for OtpError {
  fn from(error: url::ParseError) -> Self {
    OtpError::Uri(error.to_string())
  }
}
