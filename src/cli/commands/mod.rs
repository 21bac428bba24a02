use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ColorChoice, Command,
};

use crate::auth::identity::DEFAULT_GOOGLE_TOKENINFO_URL;

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("pawhome")
        .about("Pet adoption API")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("4000")
                .env("PAWHOME_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("dsn")
                .short('d')
                .long("dsn")
                .help("Database connection string")
                .env("PAWHOME_DSN")
                .global(true)
                .required(true),
        )
        .arg(
            Arg::new("token-secret")
                .long("token-secret")
                .help("Secret used to sign bearer tokens")
                .env("PAWHOME_TOKEN_SECRET")
                .hide_env_values(true)
                .global(true)
                .required(true),
        )
        .arg(
            Arg::new("token-ttl-seconds")
                .long("token-ttl-seconds")
                .help("Lifetime of issued bearer tokens in seconds")
                .default_value("604800")
                .env("PAWHOME_TOKEN_TTL_SECONDS")
                .global(true)
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new("google-client-id")
                .long("google-client-id")
                .help("OAuth client id Google ID tokens must be issued for")
                .env("PAWHOME_GOOGLE_CLIENT_ID"),
        )
        .arg(
            Arg::new("google-tokeninfo-url")
                .long("google-tokeninfo-url")
                .help("Google tokeninfo endpoint")
                .default_value(DEFAULT_GOOGLE_TOKENINFO_URL)
                .env("PAWHOME_GOOGLE_TOKENINFO_URL"),
        )
        .arg(
            Arg::new("google-timeout-seconds")
                .long("google-timeout-seconds")
                .help("Timeout for calls to Google in seconds")
                .default_value("10")
                .env("PAWHOME_GOOGLE_TIMEOUT_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("PAWHOME_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
        .subcommand(
            Command::new("admin-token")
                .about("Mint an admin bearer token and print it to stdout"),
        )
}
