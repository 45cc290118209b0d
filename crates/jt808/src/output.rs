use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use jt808_session::Message;
use serde::Serialize;

/// Longest payload prefix shown in table and pretty output.
const PREVIEW_BYTES: usize = 32;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    message_id: String,
    terminal_id: String,
    encrypted: bool,
    payload_size: usize,
    payload: String,
    source: &'a str,
    timestamp: u64,
}

/// One encoded wire frame, as printed by `encode`.
#[derive(Debug, Clone, Serialize)]
pub struct FrameOutput {
    pub serial_number: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u16>,
    pub body_length: usize,
    pub wire_length: usize,
    pub hex: String,
    #[serde(skip)]
    pub wire: Vec<u8>,
}

pub fn print_message(message: &Message, source: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                message_id: message_id_label(message.message_id),
                terminal_id: message.terminal_id.to_string(),
                encrypted: message.encrypted,
                payload_size: message.payload.len(),
                payload: hex::encode(&message.payload),
                source,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["MESSAGE", "TERMINAL", "ENC", "SIZE", "SOURCE", "PAYLOAD"])
                .add_row(vec![
                    message_id_label(message.message_id),
                    message.terminal_id.to_string(),
                    yes_no(message.encrypted).to_string(),
                    message.payload.len().to_string(),
                    source.to_string(),
                    payload_preview(&message.payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "message={} terminal={} encrypted={} size={} source={} payload={}",
                message_id_label(message.message_id),
                message.terminal_id,
                message.encrypted,
                message.payload.len(),
                source,
                payload_preview(&message.payload)
            );
        }
        OutputFormat::Raw => print_raw(&message.payload),
    }
}

pub fn print_frames(frames: &[FrameOutput], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for frame in frames {
                println!(
                    "{}",
                    serde_json::to_string(frame).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SERIAL", "PART", "BODY", "WIRE", "HEX"]);
            for frame in frames {
                table.add_row(vec![
                    frame.serial_number.to_string(),
                    part_label(frame),
                    frame.body_length.to_string(),
                    frame.wire_length.to_string(),
                    frame.hex.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for frame in frames {
                println!("{}", frame.hex);
            }
        }
        OutputFormat::Raw => {
            for frame in frames {
                print_raw(&frame.wire);
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn message_id_label(message_id: u16) -> String {
    format!("0x{message_id:04X}")
}

fn part_label(frame: &FrameOutput) -> String {
    match (frame.index, frame.total) {
        (Some(index), Some(total)) => format!("{index}/{total}"),
        _ => "-".to_string(),
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn payload_preview(payload: &[u8]) -> String {
    if payload.len() <= PREVIEW_BYTES {
        return hex::encode(payload);
    }
    format!(
        "{}... ({} bytes)",
        hex::encode(&payload[..PREVIEW_BYTES]),
        payload.len()
    )
}

fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
