use std::thread::{self, JoinHandle};

use muxstream_bootstrap::Role;
use muxstream_session::{SessionEnd, ShutdownSignal};
use tracing::error;

use crate::cmd::roles::{self, install_ctrlc_handler, log_config, require_token};
use crate::cmd::RunArgs;
use crate::exit::{CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::OutputFormat;

type RoleResult = CliResult<SessionEnd>;

/// Producer and consumer sessions on their own named threads, joined at
/// exit. A failing session stops the other one.
pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let tlc_token = require_token(args.tlc_token, "STREAMING_API_TLC_TOKEN", Role::Tlc)?;
    let broker_token =
        require_token(args.broker_token, "STREAMING_API_BROKER_TOKEN", Role::Broker)?;
    log_config(
        &args.api,
        &[
            ("tlc_token", Some(tlc_token.as_str())),
            ("broker_token", Some(broker_token.as_str())),
        ],
    );

    let identifier = roles::identifier(&args.api.stream)?;
    let config = roles::session_config(&args.api.stream)?;
    let mut producer = roles::producer(&args.producer, identifier)?;

    let shutdown = ShutdownSignal::new();
    install_ctrlc_handler(shutdown.clone())?;
    let mut consumer = roles::consumer(&args.consumer, format, shutdown.clone())?;

    let producer_thread = spawn_role("producer", &shutdown, {
        let api = args.api.clone();
        let config = config.clone();
        let shutdown = shutdown.clone();
        move || {
            let options = roles::bootstrap(Role::Tlc, &tlc_token, &api)?;
            roles::drive(&options, config, &mut producer, &shutdown)
        }
    })?;

    let consumer_thread = match spawn_role("consumer", &shutdown, {
        let api = args.api.clone();
        let shutdown = shutdown.clone();
        move || {
            let options = roles::bootstrap(Role::Broker, &broker_token, &api)?;
            roles::drive(&options, config, &mut consumer, &shutdown)
        }
    }) {
        Ok(handle) => handle,
        Err(err) => return Err(stop_role("producer", &shutdown, producer_thread, err)),
    };

    let producer_result = join_role("producer", producer_thread);
    let consumer_result = join_role("consumer", consumer_thread);

    match (producer_result, consumer_result) {
        (Err(first), Err(second)) => {
            error!(error = %second, "consumer session failed");
            Err(first)
        }
        (Err(err), Ok(_)) | (Ok(_), Err(err)) => Err(err),
        (Ok(_), Ok(_)) => Ok(SUCCESS),
    }
}

fn spawn_role<F>(
    name: &str,
    shutdown: &ShutdownSignal,
    work: F,
) -> CliResult<JoinHandle<RoleResult>>
where
    F: FnOnce() -> RoleResult + Send + 'static,
{
    let shutdown = shutdown.clone();
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let result = work();
            if result.is_err() {
                shutdown.trigger();
            }
            result
        })
        .map_err(|err| CliError::new(INTERNAL, format!("failed to start {name} thread: {err}")))
}

/// Signal and join a role that is already running, then hand back `err`.
fn stop_role(
    name: &str,
    shutdown: &ShutdownSignal,
    handle: JoinHandle<RoleResult>,
    err: CliError,
) -> CliError {
    shutdown.trigger();
    if let Err(stopped) = join_role(name, handle) {
        error!(error = %stopped, "{name} session failed");
    }
    err
}

fn join_role(name: &str, handle: JoinHandle<RoleResult>) -> RoleResult {
    handle
        .join()
        .map_err(|_| CliError::new(INTERNAL, format!("{name} thread panicked")))?
}
