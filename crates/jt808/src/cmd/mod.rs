use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use jt808_frame::{TerminalId, MAX_BODY_LENGTH};
use jt808_session::Envelope;

use crate::exit::{io_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to an endpoint and send one message.
    Send(SendArgs),
    /// Accept terminal connections and print received messages.
    Listen(ListenArgs),
    /// Encode a message into wire frames without connecting.
    Encode(EncodeArgs),
    /// Decode wire frames and print the reassembled messages.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Message addressing shared by `send` and `encode`.
#[derive(Args, Debug)]
pub struct MessageArgs {
    /// Message id, decimal or 0x-prefixed hex.
    #[arg(long, short = 'm', value_parser = parse_u16)]
    pub message_id: u16,
    /// Terminal phone number, up to 12 digits.
    #[arg(long, short = 't')]
    pub terminal: TerminalId,
    /// Set the encrypted flag on every frame.
    #[arg(long)]
    pub encrypted: bool,
    /// Largest body per frame before splitting.
    #[arg(long, default_value_t = MAX_BODY_LENGTH)]
    pub max_body: usize,
}

impl MessageArgs {
    pub fn envelope(&self) -> Envelope {
        Envelope::new(self.message_id, self.terminal).with_encrypted(self.encrypted)
    }
}

/// Message payload source; at most one may be given.
#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// Payload as a UTF-8 string.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Payload as hex digits.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Read the payload from a file.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<PathBuf>,
}

impl PayloadArgs {
    /// Resolve to bytes; no source means an empty payload.
    pub fn resolve(&self) -> CliResult<Vec<u8>> {
        if let Some(data) = &self.data {
            return Ok(data.as_bytes().to_vec());
        }
        if let Some(text) = &self.hex {
            return parse_hex(text);
        }
        if let Some(path) = &self.file {
            return fs::read(path)
                .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
        }
        Ok(Vec::new())
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Address to connect to (host:port).
    pub addr: String,
    #[command(flatten)]
    pub message: MessageArgs,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Wait for one reply message and print it.
    #[arg(long)]
    pub wait: bool,
    /// Socket read/write timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to bind (host:port).
    pub addr: String,
    /// Only print these message ids (comma-separated).
    #[arg(long, value_delimiter = ',', value_parser = parse_u16)]
    pub message_ids: Option<Vec<u16>>,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Drop partial messages idle this long (e.g. 60s).
    #[arg(long, default_value = "60s")]
    pub reassembly_timeout: String,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub message: MessageArgs,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Serial number of the first frame.
    #[arg(long, default_value_t = 0)]
    pub serial: u16,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frames as hex; markers around each frame are optional.
    pub frames: Vec<String>,
    /// Read a raw wire capture from a file instead.
    #[arg(long, conflicts_with = "frames")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_u16(input: &str) -> Result<u16, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(digits) => u16::from_str_radix(digits, 16),
        None => input.parse(),
    };
    parsed.map_err(|err| format!("invalid 16-bit value {input:?}: {err}"))
}

/// Decode hex, ignoring whitespace and `:` separators.
pub fn parse_hex(text: &str) -> CliResult<Vec<u8>> {
    let digits: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    hex::decode(&digits).map_err(|err| CliError::usage(format!("invalid hex input: {err}")))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
