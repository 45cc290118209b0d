use std::fs;
use std::io::Read;

use bytes::BytesMut;
use jt808_frame::{decode_frame, FLAG, MAX_BODY_LENGTH};
use jt808_session::{Message, Received, Session};
use tracing::warn;

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{io_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_message, OutputFormat};

/// What a decode pass produced.
#[derive(Debug, Default)]
struct Decoded {
    messages: Vec<Message>,
    faults: usize,
    incomplete: usize,
    trailing: usize,
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let wire = read_input(&args)?;
    let decoded = decode_stream(&wire);

    for message in &decoded.messages {
        print_message(message, "decode", format);
    }

    if decoded.incomplete > 0 {
        warn!(count = decoded.incomplete, "incomplete multi-part messages");
    }
    if decoded.trailing > 0 {
        warn!(bytes = decoded.trailing, "unterminated frame at end of input");
    }
    if decoded.faults > 0 || decoded.incomplete > 0 || decoded.trailing > 0 {
        return Ok(DATA_INVALID);
    }
    Ok(SUCCESS)
}

fn read_input(args: &DecodeArgs) -> CliResult<Vec<u8>> {
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }

    if args.frames.is_empty() {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|err| io_error("failed reading stdin", err))?;
        return parse_hex(&text);
    }

    // Each argument is one frame; add markers where the caller left them off.
    let mut wire = Vec::new();
    for frame in &args.frames {
        let bytes = parse_hex(frame)?;
        if bytes.first() != Some(&FLAG) {
            wire.push(FLAG);
        }
        wire.extend_from_slice(&bytes);
        if bytes.len() < 2 || bytes.last() != Some(&FLAG) {
            wire.push(FLAG);
        }
    }
    Ok(wire)
}

fn decode_stream(wire: &[u8]) -> Decoded {
    let mut session = Session::new();
    let mut buf = BytesMut::from(wire);
    let mut decoded = Decoded::default();

    loop {
        let frame = match decode_frame(&mut buf, MAX_BODY_LENGTH) {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "skipping bad frame");
                decoded.faults += 1;
                continue;
            }
        };

        match session.receive_frame(frame) {
            Ok(Received::Complete(message)) => decoded.messages.push(message),
            Ok(Received::Pending { .. }) => {}
            Err(err) => {
                warn!(error = %err, "skipping frame");
                decoded.faults += 1;
            }
        }
    }

    decoded.incomplete = session.pending_count();
    decoded.trailing = buf.iter().filter(|&&b| b != FLAG).count();
    decoded
}

#[cfg(test)]
mod tests {
    use jt808_frame::{encode_frame, Header, TerminalId};

    use super::*;

    fn wire_for(header: &Header, body: &[u8]) -> Vec<u8> {
        let mut out = BytesMut::new();
        encode_frame(header, body, &mut out).expect("encode");
        out.to_vec()
    }

    fn terminal() -> TerminalId {
        "13800000000".parse().expect("id")
    }

    #[test]
    fn decodes_reference_frame() {
        let wire = parse_hex("7e020000030138000000000000010203387e").expect("hex");
        let decoded = decode_stream(&wire);

        assert_eq!(decoded.faults, 0);
        assert_eq!(decoded.messages.len(), 1);
        let message = &decoded.messages[0];
        assert_eq!(message.message_id, 0x0200);
        assert_eq!(message.terminal_id, terminal());
        assert_eq!(message.payload.as_ref(), &[0x01, 0x02, 0x03]);
    }

    #[test]
    fn reassembles_out_of_order_parts() {
        let mut wire = wire_for(&Header::new(7, terminal()).with_sub_packet(2, 2), b"world");
        wire.extend(wire_for(
            &Header::new(7, terminal()).with_sub_packet(2, 1),
            b"hello ",
        ));

        let decoded = decode_stream(&wire);
        assert_eq!(decoded.messages.len(), 1);
        assert_eq!(decoded.messages[0].payload.as_ref(), b"hello world");
        assert_eq!(decoded.incomplete, 0);
    }

    #[test]
    fn counts_faults_and_leftovers() {
        let mut wire = parse_hex("7e020000030138000000000000010203397e").expect("hex");
        wire.extend(wire_for(
            &Header::new(7, terminal()).with_sub_packet(2, 1),
            b"half",
        ));
        wire.extend_from_slice(&[FLAG, 0x01, 0x02]);

        let decoded = decode_stream(&wire);
        assert!(decoded.messages.is_empty());
        assert_eq!(decoded.faults, 1);
        assert_eq!(decoded.incomplete, 1);
        assert_eq!(decoded.trailing, 2);
    }

    #[test]
    fn bare_frames_get_markers() {
        let args = DecodeArgs {
            frames: vec!["020000030138000000000000010203 38".into()],
            file: None,
        };
        let wire = read_input(&args).expect("input");
        assert_eq!(wire.first(), Some(&FLAG));
        assert_eq!(wire.last(), Some(&FLAG));
        assert_eq!(decode_stream(&wire).messages.len(), 1);
    }
}
