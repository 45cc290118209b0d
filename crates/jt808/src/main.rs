mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "jt808", version, about = "JT808 terminal protocol tool")]
struct Cli {
    /// Output format (default: table on a terminal, json otherwise).
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(
        long,
        value_name = "FORMAT",
        env = "JT808_LOG_FORMAT",
        default_value = "text",
        global = true
    )]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        env = "JT808_LOG_LEVEL",
        default_value = "info",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "jt808",
            "send",
            "127.0.0.1:7808",
            "--message-id",
            "0x0200",
            "--terminal",
            "13800000000",
            "--hex",
            "010203",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.message.message_id, 0x0200);
                assert_eq!(args.message.terminal.to_string(), "13800000000");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "jt808",
            "encode",
            "--message-id",
            "1",
            "--terminal",
            "1",
            "--data",
            "hello",
            "--hex",
            "00",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_non_digit_terminal() {
        let err = Cli::try_parse_from([
            "jt808",
            "encode",
            "--message-id",
            "1",
            "--terminal",
            "12ab",
        ])
        .expect_err("terminal must be digits");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_decode_with_global_flags() {
        let cli = Cli::try_parse_from([
            "jt808",
            "decode",
            "7e00",
            "--format",
            "pretty",
            "--log-level",
            "debug",
        ])
        .expect("decode args should parse");
        assert_eq!(cli.format, Some(OutputFormat::Pretty));
        assert_eq!(cli.log_level, LogLevel::Debug);
        assert!(matches!(cli.command, Command::Decode(_)));
    }
}
