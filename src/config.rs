//! Command-Line Configuration
//!
//! Parses `emberkv [OPTIONS] [HOST] [PORT]` into a [`Config`].
//!
//! ```text
//! -h, --host <HOST>    Host to bind to (default: 127.0.0.1)
//! -p, --port <PORT>    Port to listen on (default: 6379)
//! -v, --version        Print version information
//!     --help           Print this help message
//! ```
//!
//! A bare `HOST` and then `PORT` are accepted as positionals, so
//! `emberkv 0.0.0.0 7000` works the same as `emberkv -h 0.0.0.0 -p 7000`.

use crate::{DEFAULT_HOST, DEFAULT_PORT};
use thiserror::Error;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// What the binary was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Start the server
    Serve(Config),
    /// Print usage and exit
    Help,
    /// Print the version and exit
    Version,
}

/// Invalid command-line arguments.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("invalid port number: {0}")]
    InvalidPort(String),

    #[error("unknown argument: {0}")]
    UnknownArgument(String),
}

/// Parses command-line arguments, excluding the program name.
///
/// `--help` and `--version` win as soon as they are seen; arguments after
/// them are not inspected.
pub fn parse_args<I, S>(args: I) -> Result<Invocation, ConfigError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut config = Config::default();
    let mut positionals = 0;
    let mut args = args.into_iter().map(Into::into);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--host" | "-h" => {
                config.host = args.next().ok_or(ConfigError::MissingValue(arg))?;
            }
            "--port" | "-p" => {
                let value = args.next().ok_or(ConfigError::MissingValue(arg))?;
                config.port = parse_port(&value)?;
            }
            "--help" => return Ok(Invocation::Help),
            "--version" | "-v" => return Ok(Invocation::Version),
            flag if flag.starts_with('-') => return Err(ConfigError::UnknownArgument(arg)),
            _ => {
                match positionals {
                    0 => config.host = arg,
                    1 => config.port = parse_port(&arg)?,
                    _ => return Err(ConfigError::UnknownArgument(arg)),
                }
                positionals += 1;
            }
        }
    }

    Ok(Invocation::Serve(config))
}

fn parse_port(value: &str) -> Result<u16, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidPort(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serve(host: &str, port: u16) -> Invocation {
        Invocation::Serve(Config {
            host: host.to_string(),
            port,
        })
    }

    #[test]
    fn test_defaults() {
        let empty: [&str; 0] = [];
        assert_eq!(parse_args(empty), Ok(serve("127.0.0.1", 6379)));
        assert_eq!(Config::default().bind_address(), "127.0.0.1:6379");
    }

    #[test]
    fn test_flags() {
        assert_eq!(
            parse_args(["--host", "0.0.0.0", "--port", "7000"]),
            Ok(serve("0.0.0.0", 7000))
        );
        assert_eq!(parse_args(["-p", "6380"]), Ok(serve("127.0.0.1", 6380)));
        assert_eq!(parse_args(["-h", "::1"]), Ok(serve("::1", 6379)));
    }

    #[test]
    fn test_positionals() {
        assert_eq!(parse_args(["localhost"]), Ok(serve("localhost", 6379)));
        assert_eq!(
            parse_args(["0.0.0.0", "7001"]),
            Ok(serve("0.0.0.0", 7001))
        );
        assert_eq!(
            parse_args(["a", "1", "extra"]),
            Err(ConfigError::UnknownArgument("extra".to_string()))
        );
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse_args(["--help"]), Ok(Invocation::Help));
        assert_eq!(parse_args(["-v"]), Ok(Invocation::Version));
        assert_eq!(parse_args(["-p", "1", "--version"]), Ok(Invocation::Version));
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            parse_args(["--port"]),
            Err(ConfigError::MissingValue("--port".to_string()))
        );
        assert_eq!(
            parse_args(["-p", "99999"]),
            Err(ConfigError::InvalidPort("99999".to_string()))
        );
        assert_eq!(
            parse_args(["localhost", "http"]),
            Err(ConfigError::InvalidPort("http".to_string()))
        );
        assert_eq!(
            parse_args(["--verbose"]),
            Err(ConfigError::UnknownArgument("--verbose".to_string()))
        );
        assert_eq!(
            ConfigError::MissingValue("-h".to_string()).to_string(),
            "-h requires a value"
        );
    }
}
