use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use muxstream_transport::SecurityMode;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod connect;
pub mod consume;
pub mod produce;
pub mod roles;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bootstrap and run a producer and a consumer session side by side.
    Run(RunArgs),
    /// Bootstrap and run a producer (TLC) session.
    Produce(ProduceArgs),
    /// Bootstrap and run a consumer (Broker) session, printing payloads.
    Consume(ConsumeArgs),
    /// Connect straight to a streaming node with an existing session token.
    Connect(ConnectArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Produce(args) => produce::run(args),
        Command::Consume(args) => consume::run(args, format),
        Command::Connect(args) => connect::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// REST API settings shared by the bootstrapping commands.
#[derive(Args, Debug, Clone)]
pub struct ApiArgs {
    /// Streaming API base URL.
    #[arg(long, env = "STREAMING_API_BASEURL", default_value = "https://localhost/api")]
    pub base_url: String,
    /// Domain the session belongs to.
    #[arg(long, env = "STREAMING_API_DOMAIN", default_value = "dev_001")]
    pub domain: String,
    /// Timeout for the session request (e.g. 30s, 500ms).
    #[arg(long, default_value = "30s")]
    pub api_timeout: String,
    #[command(flatten)]
    pub stream: StreamArgs,
}

/// Settings for the streaming connection itself.
#[derive(Args, Debug, Clone)]
pub struct StreamArgs {
    /// Stream identifier (8 ASCII characters).
    #[arg(long, env = "STREAMING_API_IDENTIFIER", default_value = "sub00001")]
    pub identifier: String,
    /// Security mode: NONE or TLSv1.2.
    #[arg(long, env = "STREAMING_API_SECURITY_MODE", default_value = "TLSv1.2")]
    pub security_mode: SecurityMode,
    /// PEM bundle of trusted CA certificates (default: Mozilla roots).
    #[arg(long, value_name = "PATH")]
    pub ca_file: Option<PathBuf>,
    /// Sleep between idle polls (e.g. 10ms).
    #[arg(long, default_value = "10ms")]
    pub poll_interval: String,
    /// Bound on the version byte exchange (e.g. 5s).
    #[arg(long, default_value = "5s")]
    pub handshake_timeout: String,
}

#[derive(Args, Debug, Clone)]
pub struct ProducerArgs {
    /// Time between produced payloads (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub interval: String,
    /// Size of each random payload in bytes.
    #[arg(long, default_value_t = 100)]
    pub payload_size: usize,
}

#[derive(Args, Debug, Clone)]
pub struct ConsumerArgs {
    /// Time between consumer keepalives (e.g. 5s).
    #[arg(long, default_value = "5s")]
    pub keepalive_interval: String,
    /// Stop after printing N payloads.
    #[arg(long)]
    pub count: Option<u64>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub api: ApiArgs,
    /// API token for the producer (TLC) session.
    #[arg(long, env = "STREAMING_API_TLC_TOKEN", hide_env_values = true)]
    pub tlc_token: Option<String>,
    /// API token for the consumer (Broker) session.
    #[arg(long, env = "STREAMING_API_BROKER_TOKEN", hide_env_values = true)]
    pub broker_token: Option<String>,
    #[command(flatten)]
    pub producer: ProducerArgs,
    #[command(flatten)]
    pub consumer: ConsumerArgs,
}

#[derive(Args, Debug)]
pub struct ProduceArgs {
    #[command(flatten)]
    pub api: ApiArgs,
    /// API token for the producer (TLC) session.
    #[arg(long, env = "STREAMING_API_TLC_TOKEN", hide_env_values = true)]
    pub tlc_token: Option<String>,
    #[command(flatten)]
    pub producer: ProducerArgs,
}

#[derive(Args, Debug)]
pub struct ConsumeArgs {
    #[command(flatten)]
    pub api: ApiArgs,
    /// API token for the consumer (Broker) session.
    #[arg(long, env = "STREAMING_API_BROKER_TOKEN", hide_env_values = true)]
    pub broker_token: Option<String>,
    #[command(flatten)]
    pub consumer: ConsumerArgs,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Producer,
    Consumer,
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Streaming node host.
    #[arg(long)]
    pub host: String,
    /// Streaming node port.
    #[arg(long)]
    pub port: u16,
    /// Session token previously issued by the API.
    #[arg(long, env = "STREAMING_SESSION_TOKEN", hide_env_values = true)]
    pub token: String,
    /// Role to play on the connection.
    #[arg(long, value_enum, default_value = "consumer")]
    pub role: RoleArg,
    #[command(flatten)]
    pub stream: StreamArgs,
    #[command(flatten)]
    pub producer: ProducerArgs,
    #[command(flatten)]
    pub consumer: ConsumerArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `5s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
