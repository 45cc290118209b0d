use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jt808_session::{SessionConfig, SessionError, TerminalListener};
use tracing::info;

use crate::cmd::{parse_duration, ListenArgs};
use crate::exit::{session_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let session_config = SessionConfig {
        reassembly_timeout: parse_duration(&args.reassembly_timeout)?,
        ..SessionConfig::default()
    };
    let listener = TerminalListener::bind(args.addr.as_str())
        .map_err(|err| session_error("bind failed", err))?
        .with_session_config(session_config);
    info!(addr = %listener.local_addr(), "listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let mut conn = listener
            .accept()
            .map_err(|err| session_error("accept failed", err))?;

        while running.load(Ordering::SeqCst) {
            let message = match conn.recv() {
                Ok(message) => message,
                Err(SessionError::Disconnected(id)) => {
                    let stats = conn.read_stats();
                    info!(
                        connection = %id,
                        frames = stats.frames,
                        faults = stats.faults,
                        discarded = stats.discarded,
                        stray_escapes = stats.stray_escapes,
                        "terminal disconnected"
                    );
                    break;
                }
                Err(err) => return Err(session_error("receive failed", err)),
            };

            if let Some(ids) = &args.message_ids {
                if !ids.contains(&message.message_id) {
                    continue;
                }
            }

            print_message(&message, conn.id(), format);
            printed = printed.saturating_add(1);

            if args.count.is_some_and(|count| printed >= count) {
                return Ok(SUCCESS);
            }
        }
    }

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
