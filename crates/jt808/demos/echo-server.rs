//! Minimal echo server: accepts one terminal and echoes every message back.
//!
//! Run with:
//!   cargo run --example echo-server
//!
//! In another terminal:
//!   cargo run --features cli -- send 127.0.0.1:7808 \
//!     --message-id 0x0200 --terminal 13800000000 --data hello --wait

use jt808::session::{SessionError, TerminalListener};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TerminalListener::bind("127.0.0.1:7808")?;
    eprintln!("Listening on {}", listener.local_addr());

    let mut conn = listener.accept()?;
    eprintln!("Terminal connected: {}", conn.id());

    loop {
        match conn.recv() {
            Ok(message) => {
                eprintln!(
                    "Received {} bytes, message 0x{:04X} from {}",
                    message.payload.len(),
                    message.message_id,
                    message.terminal_id
                );
                conn.send(&message.envelope(), &message.payload)?;
            }
            Err(SessionError::Disconnected(id)) => {
                eprintln!("Terminal {id} disconnected");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
