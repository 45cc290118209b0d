use std::io::{self, Write};

use jt808_frame::{parse_frame, FrameWriter, FLAG};
use jt808_session::{Envelope, Session, SessionConfig};

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, session_error, CliResult, SUCCESS};
use crate::output::{print_frames, FrameOutput, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = args.payload.resolve()?;
    let config = SessionConfig {
        max_body_length: args.message.max_body,
        initial_serial_number: args.serial,
        ..SessionConfig::default()
    };
    let frames = encode_message(config, &args.message.envelope(), &payload)?;
    print_frames(&frames, format);
    Ok(SUCCESS)
}

fn encode_message(
    config: SessionConfig,
    envelope: &Envelope,
    payload: &[u8],
) -> CliResult<Vec<FrameOutput>> {
    let mut session = Session::with_config(config);
    let mut writer = FrameWriter::new(FrameCapture::default());
    session
        .send_bytes(&mut writer, envelope, payload)
        .map_err(|err| session_error("encode failed", err))?;

    writer
        .into_inner()
        .frames
        .into_iter()
        .map(describe)
        .collect()
}

fn describe(wire: Vec<u8>) -> CliResult<FrameOutput> {
    let inner = wire
        .strip_prefix(&[FLAG])
        .and_then(|rest| rest.strip_suffix(&[FLAG]))
        .unwrap_or(&wire[..]);
    let frame = parse_frame(inner).map_err(|err| frame_error("re-parse failed", err))?;
    Ok(FrameOutput {
        serial_number: frame.header.serial_number,
        index: frame.header.index(),
        total: frame.header.total(),
        body_length: frame.body.len(),
        wire_length: wire.len(),
        hex: hex::encode(&wire),
        wire,
    })
}

/// Collects each flushed write as one frame. The frame writer flushes
/// exactly once per frame.
#[derive(Default)]
struct FrameCapture {
    pending: Vec<u8>,
    frames: Vec<Vec<u8>>,
}

impl Write for FrameCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            self.frames.push(std::mem::take(&mut self.pending));
        }
        Ok(())
    }
}
