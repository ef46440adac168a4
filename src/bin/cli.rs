#[macro_use]
extern crate log;

use std::time::SystemTime;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use otpgen::{base32_encode, unix_time, Algorithm, Hotp, OtpParams, Totp};

/// Extra uri parameter, possible values: image=https://example.com/logo.png
#[derive(Debug, Clone, PartialEq)]
struct UriParam(String, String);

impl std::str::FromStr for UriParam {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (key, value) = s
      .split_once('=')
      .ok_or_else(|| anyhow::format_err!("expected key=value, got {}", s))?;
    Ok(Self(key.to_string(), value.to_string()))
  }
}

#[derive(Debug, Subcommand)]
enum Commands {
  /// Counter based code
  #[command(arg_required_else_help = true)]
  Hotp {
    counter: i64,
  },
  /// Current time based code
  Now,
  /// Time based code for a unix timestamp
  #[command(arg_required_else_help = true)]
  At {
    #[arg(allow_hyphen_values = true)]
    time: i64,
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    offset: i64,
  },
  /// Check a code against the current (or given) time
  #[command(arg_required_else_help = true)]
  Verify {
    code: String,
    #[arg(long, allow_hyphen_values = true)]
    time: Option<i64>,
    #[arg(long, default_value_t = 1)]
    window: u64,
  },
  /// Codes around the current (or given) time
  Window {
    #[arg(long, allow_hyphen_values = true)]
    time: Option<i64>,
    #[arg(long, default_value_t = 2)]
    size: u64,
  },
  /// Provisioning uri for authenticator apps
  Uri {
    #[arg(long, help = "initial counter, switches to an hotp uri")]
    counter: Option<i64>,
    #[arg(long = "param", value_name = "KEY=VALUE")]
    params: Vec<UriParam>,
  },
}

#[derive(Debug, Parser)]
#[command(name = "otpgen", about = "HOTP/TOTP code generator")]
struct Cli {
  #[arg(long, help = "base32 secret, defaults to $OTP_SECRET")]
  secret: Option<String>,
  #[arg(long, help = "treat the secret as plain text and base32 encode it")]
  raw: bool,
  #[arg(long)]
  digits: Option<u32>,
  #[arg(long)]
  algorithm: Option<Algorithm>,
  #[arg(long, help = "time step in seconds")]
  period: Option<u64>,
  #[arg(long)]
  issuer: Option<String>,
  #[arg(long)]
  label: Option<String>,
  #[arg(long)]
  json: bool,
  #[command(subcommand)]
  command: Commands,
}

fn env_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
  T::Err: std::fmt::Display,
{
  match std::env::var(name) {
    Ok(value) => value
      .parse()
      .map(Some)
      .map_err(|e| anyhow::format_err!("invalid {}: {}", name, e)),
    Err(_) => Ok(None),
  }
}

impl Cli {
  fn secret(&self) -> Result<String> {
    let secret = match &self.secret {
      Some(secret) => secret.clone(),
      None => std::env::var("OTP_SECRET").context("no secret given, use --secret or OTP_SECRET")?,
    };
    Ok(if self.raw { base32_encode(secret.as_bytes()) } else { secret })
  }

  fn params(&self) -> Result<OtpParams> {
    let defaults = OtpParams::default();
    Ok(OtpParams {
      digits: self.digits.or(env_var("OTP_DIGITS")?).unwrap_or(defaults.digits),
      algorithm: self.algorithm.or(env_var("OTP_ALGORITHM")?).unwrap_or(defaults.algorithm),
      label: self.label.clone().or(env_var("OTP_LABEL")?),
      issuer: self.issuer.clone().or(env_var("OTP_ISSUER")?),
    })
  }

  fn period(&self) -> Result<u64> {
    Ok(self.period.or(env_var("OTP_PERIOD")?).unwrap_or(otpgen::rfc6238::DEFAULT_INTERVAL))
  }

  fn hotp(&self) -> Result<Hotp> {
    Ok(Hotp::new(self.secret()?, self.params()?)?)
  }

  fn totp(&self) -> Result<Totp> {
    Ok(Totp::new(self.secret()?, self.params()?, self.period()?)?)
  }
}

#[derive(Debug, serde::Serialize, tabled::Tabled)]
struct CodeView {
  offset: i64,
  counter: i64,
  code: String,
}

#[derive(Debug, serde::Serialize)]
struct NowView {
  code: String,
  algorithm: Algorithm,
  digits: u32,
  valid_until: i64,
  remaining: i64,
}

fn print<T: serde::Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
  if json {
    println!("{}", serde_json::to_string_pretty(value)?);
  } else {
    println!("{}", text());
  }
  Ok(())
}

fn window(totp: &Totp, time: i64, size: u64) -> Vec<CodeView> {
  let size = i64::try_from(size).unwrap_or(i64::MAX);
  let timecode = totp.timecode_at(time);
  (-size..=size)
    .filter_map(|offset| {
      let counter = timecode.checked_add(offset)?;
      // counters before the epoch have no code
      let code = totp.at_unix(time, offset).ok()?;
      Some(CodeView { offset, counter, code })
    })
    .collect()
}

fn main() -> Result<()> {
  dotenvy::dotenv().ok();
  let _logger = flexi_logger::Logger::try_with_env_or_str("info")?.start()?;
  let args = Cli::parse();
  debug!("{:?}", args.command);
  match &args.command {
    Commands::Hotp { counter } => {
      let code = args.hotp()?.generate(*counter)?;
      let view = CodeView { offset: 0, counter: *counter, code };
      print(args.json, &view, || view.code.clone())?;
    }
    Commands::Now => {
      let totp = args.totp()?;
      let now = SystemTime::now();
      let valid_until = totp.valid_until(now);
      let view = NowView {
        code: totp.at(now, 0)?,
        algorithm: totp.hotp().algorithm(),
        digits: totp.hotp().digits(),
        valid_until,
        remaining: valid_until.saturating_sub(unix_time(now)),
      };
      print(args.json, &view, || format!("{} ({}s left)", view.code, view.remaining))?;
    }
    Commands::At { time, offset } => {
      let totp = args.totp()?;
      let code = totp.at_unix(*time, *offset)?;
      let view = CodeView { offset: *offset, counter: totp.timecode_at(*time) + offset, code };
      print(args.json, &view, || view.code.clone())?;
    }
    Commands::Verify { code, time, window } => {
      let totp = args.totp()?;
      let time = time.unwrap_or_else(|| unix_time(SystemTime::now()));
      let valid = totp.verify_at_unix(code, time, *window);
      info!("verify window={} valid={}", window, valid);
      print(args.json, &serde_json::json!({ "valid": valid }), || {
        if valid { "valid" } else { "invalid" }.to_string()
      })?;
      if !valid {
        std::process::exit(1);
      }
    }
    Commands::Window { time, size } => {
      let totp = args.totp()?;
      let time = time.unwrap_or_else(|| unix_time(SystemTime::now()));
      let views = window(&totp, time, *size);
      print(args.json, &views, || tabled::Table::new(&views).to_string())?;
    }
    Commands::Uri { counter, params } => {
      let mut uri = match counter {
        Some(_) => args.hotp()?.uri_params(),
        None => args.totp()?.uri_params(),
      };
      uri.initial_count = *counter;
      uri.params.extend(params.iter().map(|UriParam(k, v)| (k.clone(), v.clone())));
      let uri = uri.build()?;
      print(args.json, &serde_json::json!({ "uri": uri }), || uri.clone())?;
    }
  }
  Ok(())
}
