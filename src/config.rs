use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use clap::{value_parser, Parser};

use crate::error::{Error, Result};
use crate::extract::DEFAULT_PRODUCT;
use crate::query::DateRange;
use crate::DEFAULT_OUTPUT;

pub const USERNAME_VAR: &str = "USERNAME";
pub const PASSWORD_VAR: &str = "PASSWORD";

/// Tally one product's delivery invoices over a range of days
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Year of the invoices, e.g. 2024
    #[arg(long, value_parser = value_parser!(i32).range(1..))]
    pub year: i32,
    /// Month of the invoices; 13 and up roll into the following year
    #[arg(long, value_parser = value_parser!(u32).range(1..))]
    pub month: u32,
    /// First day to fetch
    #[arg(long, value_parser = value_parser!(u32).range(1..))]
    pub from: u32,
    /// Last day to fetch, inclusive
    #[arg(long, value_parser = value_parser!(u32).range(1..))]
    pub to: u32,
    /// CSV file to write, overwritten if present
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,
    /// Product name to look for on the billing sheet
    #[arg(long, default_value = DEFAULT_PRODUCT)]
    pub product: String,
    /// File holding USERNAME and PASSWORD
    #[arg(long, default_value = ".env")]
    pub env_file: PathBuf,
}

impl Args {
    /// Parses arguments, also accepting single-dash long flags (`-year 2024`).
    pub fn try_parse_lenient<I, T>(args: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Args::try_parse_from(lengthen_flags(args))
    }

    pub fn range(&self) -> DateRange {
        DateRange::new(self.year, self.month, self.from, self.to)
    }
}

/// Rewrites `-name` / `-name=value` to `--name` / `--name=value`. The program
/// name and anything that is not a multi-letter single-dash flag pass through.
pub fn lengthen_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .enumerate()
        .map(|(i, arg)| match arg.to_str() {
            Some(s) if i > 0 && is_single_dash_long(s) => OsString::from(format!("-{}", s)),
            _ => arg,
        })
        .collect()
}

fn is_single_dash_long(arg: &str) -> bool {
    let mut chars = arg.chars();
    chars.next() == Some('-')
        && chars.next().map_or(false, |c| c.is_ascii_alphabetic())
        && chars.next().map_or(false, |c| c != '=')
}

pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Loads the env file into the process environment, then reads the
    /// credentials from it. Variables already set win over the file.
    pub fn load<P: AsRef<Path>>(env_file: P) -> Result<Self> {
        dotenvy::from_path(env_file.as_ref())?;
        Credentials::from_env()
    }

    pub fn from_env() -> Result<Self> {
        Ok(Credentials {
            username: required_var(USERNAME_VAR)?,
            password: required_var(PASSWORD_VAR)?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

fn required_var(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(Error::Config(format!("{} is not set", name))),
    }
}

#[cfg(test)]
fn parse(args: &[&str]) -> std::result::Result<Args, clap::Error> {
    Args::try_parse_lenient(std::iter::once("coop_tally").chain(args.iter().copied()))
}

#[test]
fn go_style_flags() {
    let args = parse(&["-year", "2024", "-month=7", "--from", "1", "-to", "31"]).unwrap();
    assert_eq!(args.range(), DateRange::new(2024, 7, 1, 31));
    assert_eq!(args.output, PathBuf::from("coop_data.csv"));
    assert_eq!(args.product, "舞菜");
    assert_eq!(args.env_file, PathBuf::from(".env"));
}

#[test]
fn optional_flags() {
    let args = parse(&[
        "-year", "2024", "-month", "8", "-from", "3", "-to", "9", "-output", "aug.csv", "--product",
        "牛乳",
    ])
    .unwrap();
    assert_eq!(args.output, PathBuf::from("aug.csv"));
    assert_eq!(args.product, "牛乳");
}

#[test]
fn every_range_flag_is_required() {
    let full = ["-year", "2024", "-month", "7", "-from", "1", "-to", "31"];
    for skip in (0..full.len()).step_by(2) {
        let partial: Vec<&str> = full
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != skip && *i != skip + 1)
            .map(|(_, a)| *a)
            .collect();
        let err = parse(&partial).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}

#[test]
fn zero_is_missing() {
    assert!(parse(&["-year", "0", "-month", "7", "-from", "1", "-to", "31"]).is_err());
    assert!(parse(&["-year", "2024", "-month", "7", "-from", "0", "-to", "31"]).is_err());
}

#[test]
fn short_flags_untouched() {
    let args = lengthen_flags(["coop_tally", "-h", "-year", "-5", "--to", "-x=1"]);
    assert_eq!(
        args,
        vec!["coop_tally", "-h", "--year", "-5", "--to", "-x=1"]
            .into_iter()
            .map(OsString::from)
            .collect::<Vec<_>>()
    );
}

#[test]
fn missing_env_file() {
    let err = Credentials::load("no/such/dir/.env").unwrap_err();
    assert!(matches!(err, Error::EnvFile(_)));
}

#[test]
fn password_not_shown() {
    let credentials = Credentials {
        username: "me".to_string(),
        password: "secret".to_string(),
    };
    assert!(!format!("{:?}", credentials).contains("secret"));
}
