#[macro_use]
extern crate log;

pub mod error;
pub mod rfc4226;
pub mod rfc6238;
pub mod uri;

pub use error::{OtpError, OtpResult};
pub use rfc4226::{decode_secret, strings_equal, Algorithm, Hotp, OtpParams};
pub use rfc6238::{base32_encode, unix_time, Totp};
pub use uri::ProvisioningUri;
