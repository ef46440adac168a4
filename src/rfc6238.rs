//! TOTP (RFC 6238): a [`Hotp`] driven by wall-clock time.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{OtpError, OtpResult};
use crate::rfc4226::{strings_equal, Hotp, OtpParams};
use crate::uri::ProvisioningUri;

pub const DEFAULT_INTERVAL: u64 = 30;

pub fn base32_encode(secret: &[u8]) -> String {
  base32::encode(base32::Alphabet::RFC4648 { padding: true }, secret)
}

/// Whole seconds since the epoch, rounded towards negative infinity.
pub fn unix_time(time: SystemTime) -> i64 {
  match time.duration_since(UNIX_EPOCH) {
    Ok(n) => i64::try_from(n.as_secs()).unwrap_or(i64::MAX),
    Err(e) => {
      let before = e.duration();
      let secs = i64::try_from(before.as_secs()).map_or(i64::MIN, |secs| -secs);
      secs.saturating_sub(i64::from(before.subsec_nanos() > 0))
    }
  }
}

#[derive(Debug, Clone)]
pub struct Totp {
  hotp: Hotp,
  interval: i64,
}

impl Totp {
  pub fn new(secret: impl Into<String>, params: OtpParams, interval: u64) -> OtpResult<Self> {
    let interval = match i64::try_from(interval) {
      Ok(interval) if interval > 0 => interval,
      _ => return Err(OtpError::Config(format!("interval must be a positive number of seconds, got {}", interval))),
    };
    Ok(Self {
      hotp: Hotp::new(secret, params)?,
      interval,
    })
  }

  pub fn from_secret(secret: impl Into<String>) -> Self {
    Self {
      hotp: Hotp::from_secret(secret),
      interval: DEFAULT_INTERVAL as i64,
    }
  }

  pub fn hotp(&self) -> &Hotp {
    &self.hotp
  }

  pub fn interval(&self) -> u64 {
    self.interval as u64
  }

  pub fn timecode(&self, time: SystemTime) -> i64 {
    self.timecode_at(unix_time(time))
  }

  /// Negative before the epoch, which generation then rejects.
  pub fn timecode_at(&self, unix_secs: i64) -> i64 {
    unix_secs.div_euclid(self.interval)
  }

  pub fn at(&self, time: SystemTime, counter_offset: i64) -> OtpResult<String> {
    self.at_unix(unix_time(time), counter_offset)
  }

  pub fn at_unix(&self, unix_secs: i64, counter_offset: i64) -> OtpResult<String> {
    let counter = self
      .timecode_at(unix_secs)
      .checked_add(counter_offset)
      .ok_or_else(|| OtpError::InvalidInput(format!("counter offset {} overflows", counter_offset)))?;
    self.hotp.generate(counter)
  }

  pub fn now(&self) -> OtpResult<String> {
    self.at(SystemTime::now(), 0)
  }

  /// Unix time at which the code for `time` stops being current.
  pub fn valid_until(&self, time: SystemTime) -> i64 {
    self.timecode(time).saturating_add(1).saturating_mul(self.interval)
  }

  /// Accepts `code` if it matches any counter within `valid_window` steps of
  /// `time`, in either direction. Never fails: a counter that cannot be
  /// generated simply does not match.
  pub fn verify(&self, code: &str, time: SystemTime, valid_window: u64) -> bool {
    self.verify_at_unix(code, unix_time(time), valid_window)
  }

  pub fn verify_at_unix(&self, code: &str, unix_secs: i64, valid_window: u64) -> bool {
    let window = i64::try_from(valid_window).unwrap_or(i64::MAX);
    for offset in -window..=window {
      let matched = match self.at_unix(unix_secs, offset) {
        Ok(expected) => strings_equal(code, &expected),
        Err(_) => false,
      };
      if matched {
        debug!("otp accepted at offset {}", offset);
        return true;
      }
    }
    debug!("otp rejected, window {}", valid_window);
    false
  }

  pub fn uri_params(&self) -> ProvisioningUri {
    ProvisioningUri {
      period: self.interval as u64,
      ..self.hotp.uri_params()
    }
  }

  pub fn provisioning_uri(&self) -> OtpResult<String> {
    self.uri_params().build()
  }
}
