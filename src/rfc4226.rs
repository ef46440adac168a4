//! HOTP code generation (RFC 4226).

use std::{fmt, str::FromStr};

use hmac::{digest::KeyInit, Hmac, Mac};
use subtle::ConstantTimeEq;

use crate::error::{OtpError, OtpResult};
use crate::uri::ProvisioningUri;

pub const DEFAULT_DIGITS: u32 = 6;
/// A 31-bit truncated value has at most 10 decimal digits.
pub const MAX_DIGITS: u32 = 10;
pub const DEFAULT_LABEL: &str = "Secret";

/// Digest used as the HMAC primitive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Algorithm {
  #[default]
  Sha1,
  Sha256,
  Sha512,
}

impl Algorithm {
  pub fn as_str(&self) -> &'static str {
    match self {
      Algorithm::Sha1 => "SHA1",
      Algorithm::Sha256 => "SHA256",
      Algorithm::Sha512 => "SHA512",
    }
  }

  pub fn hmac(&self, key: &[u8], message: &[u8]) -> OtpResult<Vec<u8>> {
    match self {
      Algorithm::Sha1 => mac::<Hmac<sha1::Sha1>>(key, message),
      Algorithm::Sha256 => mac::<Hmac<sha2::Sha256>>(key, message),
      Algorithm::Sha512 => mac::<Hmac<sha2::Sha512>>(key, message),
    }
  }
}

fn mac<M: Mac + KeyInit>(key: &[u8], message: &[u8]) -> OtpResult<Vec<u8>> {
  let mut mac = <M as KeyInit>::new_from_slice(key)
    .map_err(|e| OtpError::InvalidInput(format!("hmac key: {}", e)))?;
  mac.update(message);
  Ok(mac.finalize().into_bytes().to_vec())
}

impl fmt::Display for Algorithm {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Algorithm {
  type Err = OtpError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_uppercase().replace('-', "").as_str() {
      "SHA1" => Ok(Algorithm::Sha1),
      "SHA256" => Ok(Algorithm::Sha256),
      "SHA512" => Ok(Algorithm::Sha512),
      _ => Err(OtpError::Config(format!("unsupported algorithm: {}", s))),
    }
  }
}

/// Everything but the secret that shapes a generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpParams {
  pub digits: u32,
  pub algorithm: Algorithm,
  pub label: Option<String>,
  pub issuer: Option<String>,
}

impl Default for OtpParams {
  fn default() -> Self {
    Self {
      digits: DEFAULT_DIGITS,
      algorithm: Algorithm::default(),
      label: None,
      issuer: None,
    }
  }
}

/// Counter based generator. Immutable once built, so it can be shared freely
/// between threads.
#[derive(Clone)]
pub struct Hotp {
  secret: String,
  key: Vec<u8>,
  digits: u32,
  algorithm: Algorithm,
  label: String,
  issuer: String,
}

impl Hotp {
  pub fn new(secret: impl Into<String>, params: OtpParams) -> OtpResult<Self> {
    if params.digits == 0 || params.digits > MAX_DIGITS {
      return Err(OtpError::Config(format!(
        "digits must be between 1 and {}, got {}",
        MAX_DIGITS, params.digits
      )));
    }
    let secret = secret.into();
    let key = secret_key(&secret);
    let label = params
      .label
      .filter(|label| !label.is_empty())
      .unwrap_or_else(|| DEFAULT_LABEL.to_string());
    debug!("new generator label={} digits={} algorithm={}", label, params.digits, params.algorithm);
    Ok(Self {
      secret,
      key,
      digits: params.digits,
      algorithm: params.algorithm,
      label,
      issuer: params.issuer.unwrap_or_default(),
    })
  }

  pub fn from_secret(secret: impl Into<String>) -> Self {
    let secret = secret.into();
    let key = secret_key(&secret);
    Self {
      secret,
      key,
      digits: DEFAULT_DIGITS,
      algorithm: Algorithm::default(),
      label: DEFAULT_LABEL.to_string(),
      issuer: String::new(),
    }
  }

  pub fn secret(&self) -> &str {
    &self.secret
  }

  pub fn digits(&self) -> u32 {
    self.digits
  }

  pub fn algorithm(&self) -> Algorithm {
    self.algorithm
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn issuer(&self) -> &str {
    &self.issuer
  }

  /// Code for `counter`, exactly `digits` decimal characters.
  pub fn generate(&self, counter: i64) -> OtpResult<String> {
    let counter = u64::try_from(counter)
      .map_err(|_| OtpError::InvalidInput(format!("counter must be non-negative, got {}", counter)))?;
    let digest = self.algorithm.hmac(&self.key, &counter.to_be_bytes())?;
    Ok(truncate(&digest, self.digits))
  }

  pub fn verify(&self, code: &str, counter: i64) -> bool {
    match self.generate(counter) {
      Ok(expected) => strings_equal(code, &expected),
      Err(_) => false,
    }
  }

  pub fn provisioning_uri(&self, initial_count: i64) -> OtpResult<String> {
    ProvisioningUri {
      initial_count: Some(initial_count),
      ..self.uri_params()
    }
    .build()
  }

  /// Uri builder prefilled from this configuration.
  pub fn uri_params(&self) -> ProvisioningUri {
    ProvisioningUri {
      secret: self.secret.clone(),
      name: self.label.clone(),
      issuer: self.issuer.clone(),
      algorithm: self.algorithm.to_string(),
      digits: self.digits,
      ..Default::default()
    }
  }
}

impl fmt::Debug for Hotp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Hotp")
      .field("secret", &"<redacted>")
      .field("digits", &self.digits)
      .field("algorithm", &self.algorithm)
      .field("label", &self.label)
      .field("issuer", &self.issuer)
      .finish()
  }
}

/// Dynamic truncation of an HMAC digest into a zero padded decimal code.
fn truncate(digest: &[u8], digits: u32) -> String {
  let offset = (digest[digest.len() - 1] & 0x0f) as usize;
  let code = (u32::from(digest[offset] & 0x7f) << 24)
    | (u32::from(digest[offset + 1]) << 16)
    | (u32::from(digest[offset + 2]) << 8)
    | u32::from(digest[offset + 3]);

  format!("{:01$}", u64::from(code) % 10_u64.pow(digits), digits as usize)
}

/// Decodes a base32 (RFC 4648, upper case) secret, synthesizing missing `=`
/// padding. Line breaks are ignored. Returns `None` for anything malformed.
pub fn decode_secret(secret: &str) -> Option<Vec<u8>> {
  let mut padded = secret.replace(['\r', '\n'], "");
  let missing_padding = padded.len() % 8;
  if missing_padding != 0 {
    padded.push_str(&"=".repeat(8 - missing_padding));
  }
  let data = padded.trim_end_matches('=');
  let well_formed = padded.len() - data.len() < 8
    && matches!(data.len() % 8, 0 | 2 | 4 | 5 | 7)
    && data.bytes().all(|b| matches!(b, b'A'..=b'Z' | b'2'..=b'7'));
  if !well_formed {
    return None;
  }
  base32::decode(base32::Alphabet::RFC4648 { padding: false }, data)
}

// Malformed secrets are not an error: they turn into an empty key.
fn secret_key(secret: &str) -> Vec<u8> {
  decode_secret(secret).unwrap_or_else(|| {
    warn!("otp secret is not valid base32, falling back to an empty key");
    Vec::new()
  })
}

/// Constant time string comparison.
pub fn strings_equal(a: &str, b: &str) -> bool {
  a.as_bytes().ct_eq(b.as_bytes()).into()
}
