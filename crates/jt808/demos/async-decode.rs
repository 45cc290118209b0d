//! Framed tokio server using `Jt808Codec`.
//!
//! Run with:
//!   cargo run --example async-decode --features async
//!
//! A client task writes a few frames over loopback; the server prints each
//! decoded header.

use futures_util::{SinkExt, StreamExt};
use jt808::frame::{Frame, Header, Jt808Codec, TerminalId};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{FramedRead, FramedWrite};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let client = tokio::spawn(async move {
        let stream = TcpStream::connect(addr).await?;
        let mut sink = FramedWrite::new(stream, Jt808Codec::new());
        let terminal: TerminalId = "13800000000".parse()?;
        for serial in 0..3u16 {
            let header = Header::new(0x0200, terminal).with_serial_number(serial);
            sink.send(Frame::new(header, vec![0x7e, 0x7d, serial as u8])?)
                .await?;
        }
        Ok::<_, Box<dyn std::error::Error + Send + Sync>>(())
    });

    let (socket, peer) = listener.accept().await?;
    eprintln!("Terminal connected from {peer}");
    let mut frames = FramedRead::new(socket, Jt808Codec::new());
    while let Some(frame) = frames.next().await {
        let frame = frame?;
        eprintln!(
            "serial={} message=0x{:04X} terminal={} body={:02x?}",
            frame.header.serial_number,
            frame.header.message_id,
            frame.header.terminal_id,
            frame.body.as_ref()
        );
    }

    client.await?.map_err(|e| e.to_string())?;
    Ok(())
}
