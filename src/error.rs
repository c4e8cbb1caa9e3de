use std::num::ParseIntError;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can abort a run. Each stage returns these and the binary
/// decides to stop.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("could not load env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
    #[error("{year}-{month:02}-{day:02} is not a usable date")]
    InvalidDate { year: i32, month: u32, day: u32 },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("anti-forgery token not found on login page")]
    MissingToken,
    #[error("failed to login, status code: {0}")]
    LoginRejected(reqwest::StatusCode),
    #[error("price token '{token}' is not an integer: {source}")]
    Price {
        token: String,
        #[source]
        source: ParseIntError,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
