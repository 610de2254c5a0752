use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use wspayload_frame::OpCode;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a captured frame stream and print completed messages.
    Decode(DecodeArgs),
    /// Encode a message into frames.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Decode(args) => decode::run(args, format),
        Command::Encode(args) => encode::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// File with raw frame bytes, or `-` for stdin.
    #[arg(default_value = "-")]
    pub input: PathBuf,
    /// Feed the decoder in chunks of this many bytes.
    #[arg(long, default_value = "4096")]
    pub chunk_size: usize,
    /// Inflate messages with permessage-deflate.
    #[arg(long, env = "WSPAYLOAD_DEFLATE")]
    pub deflate: bool,
    /// Largest payload accepted in a single frame, in bytes.
    #[arg(long, value_name = "BYTES", env = "WSPAYLOAD_MAX_PAYLOAD")]
    pub max_payload: Option<u64>,
    /// Largest reassembled message, in bytes.
    #[arg(long, value_name = "BYTES", env = "WSPAYLOAD_MAX_MESSAGE")]
    pub max_message: Option<usize>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Text payload.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub text: Option<String>,
    /// Hex-encoded binary payload.
    #[arg(long, conflicts_with_all = ["text", "file"])]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["text", "data"])]
    pub file: Option<PathBuf>,
    /// Message opcode. Defaults to text for --text, binary otherwise.
    #[arg(long, value_enum)]
    pub opcode: Option<OpcodeArg>,
    /// Split data messages into frames of at most this many bytes.
    #[arg(long, value_name = "BYTES")]
    pub fragment_size: Option<usize>,
    /// Mask key as 8 hex digits.
    #[arg(long, value_name = "HEX", value_parser = parse_mask)]
    pub mask: Option<[u8; 4]>,
    /// Compress the message with permessage-deflate.
    #[arg(long)]
    pub deflate: bool,
    /// Write frames to a file instead of stdout.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OpcodeArg {
    Text,
    Binary,
    Ping,
    Pong,
    Close,
}

impl From<OpcodeArg> for OpCode {
    fn from(value: OpcodeArg) -> Self {
        match value {
            OpcodeArg::Text => OpCode::Text,
            OpcodeArg::Binary => OpCode::Binary,
            OpcodeArg::Ping => OpCode::Ping,
            OpcodeArg::Pong => OpCode::Pong,
            OpcodeArg::Close => OpCode::Close,
        }
    }
}

pub fn parse_mask(value: &str) -> Result<[u8; 4], String> {
    let bytes = parse_hex(value)?;
    bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| format!("mask key must be 4 bytes, got {}", bytes.len()))
}

pub fn parse_hex(value: &str) -> Result<Vec<u8>, String> {
    let digits: Vec<u8> = value
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return Err("hex input must have an even number of digits".to_string());
    }
    digits
        .chunks(2)
        .map(|pair| -> Result<u8, String> {
            let text = std::str::from_utf8(pair).map_err(|e| e.to_string())?;
            u8::from_str_radix(text, 16).map_err(|_| format!("invalid hex byte '{text}'"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_with_whitespace() {
        assert_eq!(parse_hex("de ad\nbe ef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn mask_needs_four_bytes() {
        assert_eq!(parse_mask("01020304").unwrap(), [1, 2, 3, 4]);
        assert_eq!(
            parse_mask("0102").unwrap_err(),
            "mask key must be 4 bytes, got 2"
        );
    }
}
