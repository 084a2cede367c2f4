use muxstream_session::{ConnectOptions, ShutdownSignal};
use tracing::info;

use crate::cmd::roles::{self, install_ctrlc_handler};
use crate::cmd::{ConnectArgs, RoleArg};
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::OutputFormat;

pub fn run(args: ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    if args.token.trim().is_empty() {
        return Err(CliError::new(USAGE, "session token must not be empty"));
    }

    let config = roles::session_config(&args.stream)?;
    let options = ConnectOptions {
        host: args.host,
        port: args.port,
        token: args.token,
        security: args.stream.security_mode,
        tls: roles::tls_options(&args.stream),
    };
    info!(?options, role = ?args.role, "connecting without bootstrap");

    let shutdown = ShutdownSignal::new();
    install_ctrlc_handler(shutdown.clone())?;

    match args.role {
        RoleArg::Producer => {
            let identifier = roles::identifier(&args.stream)?;
            let mut producer = roles::producer(&args.producer, identifier)?;
            roles::drive(&options, config, &mut producer, &shutdown)?;
            info!(sent = producer.sent(), "producer finished");
        }
        RoleArg::Consumer => {
            let mut consumer = roles::consumer(&args.consumer, format, shutdown.clone())?;
            roles::drive(&options, config, &mut consumer, &shutdown)?;
            info!(received = consumer.received(), "consumer finished");
        }
    }

    Ok(SUCCESS)
}
