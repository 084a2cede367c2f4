use muxstream_bootstrap::Role;
use muxstream_session::ShutdownSignal;
use tracing::info;

use crate::cmd::roles::{self, install_ctrlc_handler, log_config, require_token};
use crate::cmd::ProduceArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: ProduceArgs) -> CliResult<i32> {
    let token = require_token(args.tlc_token, "STREAMING_API_TLC_TOKEN", Role::Tlc)?;
    log_config(&args.api, &[("tlc_token", Some(token.as_str()))]);

    let identifier = roles::identifier(&args.api.stream)?;
    let config = roles::session_config(&args.api.stream)?;
    let mut producer = roles::producer(&args.producer, identifier)?;

    let shutdown = ShutdownSignal::new();
    install_ctrlc_handler(shutdown.clone())?;

    let options = roles::bootstrap(Role::Tlc, &token, &args.api)?;
    roles::drive(&options, config, &mut producer, &shutdown)?;
    info!(sent = producer.sent(), "producer finished");

    Ok(SUCCESS)
}
