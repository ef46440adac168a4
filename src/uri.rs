//! `otpauth://` provisioning URIs, as scanned by authenticator apps.

use std::collections::HashMap;

use url::Url;

use crate::error::{OtpError, OtpResult};
use crate::rfc4226::DEFAULT_DIGITS;
use crate::rfc6238::DEFAULT_INTERVAL;

const OTP_URL_SCHEME: &str = "otpauth";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningUri {
  pub secret: String,
  pub name: String,
  /// `Some` makes this an `hotp` uri.
  pub initial_count: Option<i64>,
  pub issuer: String,
  pub algorithm: String,
  pub digits: u32,
  pub period: u64,
  pub params: HashMap<String, String>,
}

impl Default for ProvisioningUri {
  fn default() -> Self {
    Self {
      secret: String::new(),
      name: String::new(),
      initial_count: None,
      issuer: String::new(),
      algorithm: String::new(),
      digits: DEFAULT_DIGITS,
      period: DEFAULT_INTERVAL,
      params: HashMap::new(),
    }
  }
}

impl ProvisioningUri {
  pub fn new(secret: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      secret: secret.into(),
      name: name.into(),
      ..Default::default()
    }
  }

  /// Escaping follows the `url` crate: the name segment keeps `;`, `,` and
  /// `|`, query values keep `*` and escape `~`. Authenticator apps accept
  /// either form.
  pub fn build(&self) -> OtpResult<String> {
    let otp_type = match self.initial_count {
      Some(_) => "hotp",
      None => "totp",
    };

    let mut query = vec![("secret", self.secret.clone())];
    let mut name = self.name.clone();
    if !self.issuer.is_empty() {
      query.push(("issuer", self.issuer.clone()));
      name = format!("{}:{}", self.issuer, name);
    }
    if let Some(count) = self.initial_count {
      query.push(("counter", count.to_string()));
    }
    if !self.algorithm.is_empty() && !self.algorithm.eq_ignore_ascii_case("sha1") {
      query.push(("algorithm", self.algorithm.to_uppercase()));
    }
    if self.digits != DEFAULT_DIGITS {
      query.push(("digits", self.digits.to_string()));
    }
    if self.period != DEFAULT_INTERVAL {
      query.push(("period", self.period.to_string()));
    }
    query.extend(self.params.iter().map(|(k, v)| (k.as_str(), v.clone())));
    // stable, so repeated keys keep their order
    query.sort_by(|a, b| a.0.cmp(b.0));

    let mut url = Url::parse(&format!("{}://{}", OTP_URL_SCHEME, otp_type))?;
    url
      .path_segments_mut()
      .map_err(|_| OtpError::Uri(format!("{} uri cannot carry a name", otp_type)))?
      .push(&name);
    url.query_pairs_mut().extend_pairs(query);

    Ok(url.into())
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::rfc4226::{Algorithm, Hotp, OtpParams};
  use crate::rfc6238::Totp;

  #[test]
  fn test_totp_defaults() {
    let uri = ProvisioningUri::new("ABC", "alice").build().unwrap();
    assert_eq!(uri, "otpauth://totp/alice?secret=ABC");
  }

  #[test]
  fn test_issuer() {
    let uri = ProvisioningUri {
      issuer: "Example".to_string(),
      ..ProvisioningUri::new("ABC", "alice")
    };
    assert_eq!(uri.build().unwrap(), "otpauth://totp/Example:alice?issuer=Example&secret=ABC");
  }

  #[test]
  fn test_hotp_counter() {
    let uri = ProvisioningUri {
      initial_count: Some(5),
      ..ProvisioningUri::new("ABC", "alice")
    };
    assert_eq!(uri.build().unwrap(), "otpauth://hotp/alice?counter=5&secret=ABC");
  }

  #[test]
  fn test_non_default_params() {
    let mut uri = ProvisioningUri {
      algorithm: "sha256".to_string(),
      digits: 8,
      period: 60,
      ..ProvisioningUri::new("ABC", "alice smith")
    };
    uri.params.insert("image".to_string(), "https://example.com/a b.png".to_string());
    assert_eq!(
      uri.build().unwrap(),
      "otpauth://totp/alice%20smith?algorithm=SHA256&digits=8&image=https%3A%2F%2Fexample.com%2Fa+b.png&period=60&secret=ABC"
    );

    uri.algorithm = "SHA1".to_string();
    assert!(!uri.build().unwrap().contains("algorithm="));
  }

  #[test]
  fn test_name_is_one_segment() {
    let uri = ProvisioningUri::new("ABC", "a/b?c").build().unwrap();
    assert_eq!(uri, "otpauth://totp/a%2Fb%3Fc?secret=ABC");
  }

  #[test]
  fn test_from_generators() {
    let params = OtpParams {
      digits: 8,
      algorithm: Algorithm::Sha512,
      label: Some("bob@example.com".to_string()),
      issuer: Some("ACME Co".to_string()),
    };
    let totp = Totp::new("JBSWY3DPEHPK3PXP", params.clone(), 60).unwrap();
    assert_eq!(
      totp.provisioning_uri().unwrap(),
      "otpauth://totp/ACME%20Co:bob@example.com?algorithm=SHA512&digits=8&issuer=ACME+Co&period=60&secret=JBSWY3DPEHPK3PXP"
    );

    let hotp = Hotp::new("JBSWY3DPEHPK3PXP", OtpParams::default()).unwrap();
    assert_eq!(
      hotp.provisioning_uri(0).unwrap(),
      "otpauth://hotp/Secret?counter=0&secret=JBSWY3DPEHPK3PXP"
    );
  }
}
