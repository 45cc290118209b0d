use jt808_frame::FrameConfig;
use jt808_session::{connect_with_config, SessionConfig};
use tracing::info;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let payload = args.payload.resolve()?;
    let envelope = args.message.envelope();

    let frame_config = FrameConfig {
        read_timeout: Some(timeout),
        write_timeout: Some(timeout),
        ..FrameConfig::default()
    };
    let session_config = SessionConfig {
        max_body_length: args.message.max_body,
        ..SessionConfig::default()
    };
    let mut conn = connect_with_config(args.addr.as_str(), frame_config, session_config)
        .map_err(|err| session_error("connect failed", err))?;

    let frames = conn
        .send(&envelope, &payload)
        .map_err(|err| session_error("send failed", err))?;
    info!(bytes = payload.len(), frames, peer = conn.id(), "message sent");

    if args.wait {
        // Corrupt reply frames are skipped inside recv; a close before any
        // complete reply is a failure.
        let reply = conn
            .recv()
            .map_err(|err| session_error("receive failed", err))?;
        print_message(&reply, conn.id(), format);
    }

    let _ = conn.shutdown();
    Ok(SUCCESS)
}
