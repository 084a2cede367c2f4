use muxstream_bootstrap::Role;
use muxstream_session::ShutdownSignal;
use tracing::info;

use crate::cmd::roles::{self, install_ctrlc_handler, log_config, require_token};
use crate::cmd::ConsumeArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: ConsumeArgs, format: OutputFormat) -> CliResult<i32> {
    let token = require_token(args.broker_token, "STREAMING_API_BROKER_TOKEN", Role::Broker)?;
    log_config(&args.api, &[("broker_token", Some(token.as_str()))]);

    let config = roles::session_config(&args.api.stream)?;
    let shutdown = ShutdownSignal::new();
    install_ctrlc_handler(shutdown.clone())?;
    let mut consumer = roles::consumer(&args.consumer, format, shutdown.clone())?;

    let options = roles::bootstrap(Role::Broker, &token, &args.api)?;
    roles::drive(&options, config, &mut consumer, &shutdown)?;
    info!(received = consumer.received(), "consumer finished");

    Ok(SUCCESS)
}
