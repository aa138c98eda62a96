//! Errors raised while loading shared Packa configuration

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Config file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML or has wrongly typed fields
    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// A value parsed but is unusable (zero page size, zero lifetime, ...)
    #[error("Configuration error: {0}")]
    Config(String),
}
