//! Shared plumbing for the session commands.

use muxstream_bootstrap::{create_session, BootstrapConfig, Role};
use muxstream_session::{
    connect, ConnectOptions, Consumer, HandshakeConfig, Identifier, PayloadReport, Producer,
    SessionConfig, SessionEnd, SessionHandler, ShutdownSignal,
};
use muxstream_transport::TlsOptions;
use tracing::info;

use crate::cmd::{parse_duration, ApiArgs, ConsumerArgs, ProducerArgs, StreamArgs};
use crate::exit::{bootstrap_error, session_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::{print_payload, OutputFormat};

pub fn session_config(stream: &StreamArgs) -> CliResult<SessionConfig> {
    Ok(SessionConfig {
        poll_interval: parse_duration(&stream.poll_interval)?,
        handshake: HandshakeConfig {
            timeout: parse_duration(&stream.handshake_timeout)?,
            ..HandshakeConfig::default()
        },
        ..SessionConfig::default()
    })
}

pub fn tls_options(stream: &StreamArgs) -> TlsOptions {
    TlsOptions {
        ca_file: stream.ca_file.clone(),
    }
}

pub fn identifier(stream: &StreamArgs) -> CliResult<Identifier> {
    Identifier::new(&stream.identifier).map_err(|err| CliError::new(USAGE, err.to_string()))
}

pub fn require_token(token: Option<String>, env: &str, role: Role) -> CliResult<String> {
    match token {
        Some(token) if !token.trim().is_empty() => Ok(token),
        _ => Err(CliError::new(
            USAGE,
            format!("missing API token for {role}; pass the flag or set {env}"),
        )),
    }
}

pub fn bootstrap_config(api: &ApiArgs) -> CliResult<BootstrapConfig> {
    Ok(BootstrapConfig {
        base_url: api.base_url.clone(),
        domain: api.domain.clone(),
        security: api.stream.security_mode,
        identifier: api.stream.identifier.clone(),
        timeout: parse_duration(&api.api_timeout)?,
    })
}

/// Ask the API for a session and turn the grant into connect options.
pub fn bootstrap(role: Role, api_token: &str, api: &ApiArgs) -> CliResult<ConnectOptions> {
    let config = bootstrap_config(api)?;
    let grant = create_session(role, api_token, &config)
        .map_err(|err| bootstrap_error("session bootstrap failed", err))?;

    Ok(ConnectOptions {
        host: grant.host,
        port: grant.port,
        token: grant.token,
        security: api.stream.security_mode,
        tls: tls_options(&api.stream),
    })
}

pub fn producer(args: &ProducerArgs, identifier: Identifier) -> CliResult<Producer> {
    Ok(Producer::new(identifier)
        .with_interval(parse_duration(&args.interval)?)
        .with_payload_size(args.payload_size))
}

/// A consumer that prints every payload and stops the process after
/// `--count` payloads.
pub fn consumer(
    args: &ConsumerArgs,
    format: OutputFormat,
    shutdown: ShutdownSignal,
) -> CliResult<Consumer> {
    let limit = args.count;
    let mut printed = 0u64;
    Ok(Consumer::new()
        .with_keepalive_interval(parse_duration(&args.keepalive_interval)?)
        .with_observer(move |report: &PayloadReport| {
            print_payload(report, format);
            printed = printed.saturating_add(1);
            if limit.is_some_and(|limit| printed >= limit) {
                shutdown.trigger();
            }
        }))
}

/// Connect, run the session to completion, and map the outcome.
pub fn drive<H: SessionHandler>(
    options: &ConnectOptions,
    config: SessionConfig,
    handler: &mut H,
    shutdown: &ShutdownSignal,
) -> CliResult<SessionEnd> {
    let mut session =
        connect(options, config).map_err(|err| session_error("connect failed", err))?;
    let end = session
        .run(handler, shutdown)
        .map_err(|err| session_error("session failed", err))?;

    match &end {
        SessionEnd::Bye { .. } => info!(
            reason = %end.reason().unwrap_or_default(),
            "node ended the session"
        ),
        SessionEnd::Cancelled => info!("session stopped"),
    }
    Ok(end)
}

pub fn install_ctrlc_handler(shutdown: ShutdownSignal) -> CliResult<()> {
    ctrlc::set_handler(move || {
        shutdown.trigger();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

/// Log the effective configuration; tokens are reduced to their length.
pub fn log_config(api: &ApiArgs, tokens: &[(&str, Option<&str>)]) {
    let redacted: Vec<String> = tokens
        .iter()
        .map(|(name, token)| match token {
            Some(token) => format!("{name}=<redacted:{} bytes>", token.len()),
            None => format!("{name}=<unset>"),
        })
        .collect();
    info!(
        base_url = %api.base_url,
        domain = %api.domain,
        identifier = %api.stream.identifier,
        security = %api.stream.security_mode,
        tokens = %redacted.join(" "),
        "effective configuration"
    );
}
