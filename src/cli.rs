//! Command-line interface for remo.

use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Command-line arguments.
///
/// Unset options leave the config file and environment values in place.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Host address to bind to.
    pub host: Option<IpAddr>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Take the client IP from `X-Forwarded-For`.
    pub trust_proxy: bool,
    /// Print an argon2 hash of this secret and exit.
    pub hash_password: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('H') | Long("host") => {
                let value: String = parser.value()?.parse()?;
                result.host = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("host", value))?,
                );
            }
            Short('p') | Long("port") => {
                let value: String = parser.value()?.parse()?;
                result.port = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("port", value))?,
                );
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Long("trust-proxy") => {
                result.trust_proxy = true;
            }
            Long("hash-password") => {
                let value: String = parser.value()?.parse()?;
                if value.is_empty() {
                    return Err(ArgsError::InvalidValue("hash-password", value));
                }
                result.hash_password = Some(value);
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"remo {version}
Remote control for a single machine via chat bot and web dashboard

USAGE:
    remo [OPTIONS]

OPTIONS:
    -H, --host <ADDR>           Host address to bind [default: 127.0.0.1]
    -p, --port <PORT>           Port to listen on [default: 8443]
    -c, --config <FILE>         Path to configuration file (JSON)
    -l, --log-level <LVL>       Log level (error, warn, info, debug, trace)
        --trust-proxy           Take client IPs from the proxy header
        --hash-password <PW>    Print an argon2 hash for the config file and exit
    -h, --help                  Print help
    -V, --version               Print version

ENVIRONMENT VARIABLES:
    REMO_HOST, REMO_PORT                  Listener (overrides config)
    REMO_USER_ID                          Privileged chat user id
    REMO_WEBHOOK_SECRET                   Webhook path secret
    REMO_DASHBOARD_USERNAME               Dashboard username
    REMO_DASHBOARD_PASSWORD               Dashboard password or argon2 hash
    REMO_DASHBOARD_SECRET_KEY             Hex session signing key
    REMO_DASHBOARD_SESSION_TIMEOUT        Session lifetime in seconds
    REMO_TRUST_PROXY                      Same as --trust-proxy
    REMO_PROXY_HEADER                     Client IP header [default: x-forwarded-for]
    REMO_DEVICE_ID, REMO_DEVICE_NAME      Device identity
    REMO_DATA_DIR                         Directory for generated secrets
    REMO_LOG_LEVEL                        Log level (overrides config)
    RUST_LOG                              Alternative log level setting

EXAMPLES:
    # Start with a config file
    remo -c /etc/remo/config.json

    # Behind a reverse proxy
    remo -c config.json --trust-proxy

    # Store a hashed dashboard password
    remo --hash-password 'correct horse battery staple'
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("remo {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Error, Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    #[error("{0}")]
    Lexopt(#[from] lexopt::Error),
    /// Invalid argument value.
    #[error("invalid value for --{0}: '{1}'")]
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    #[error("unexpected argument: '{0}'")]
    UnexpectedArgument(String),
}
