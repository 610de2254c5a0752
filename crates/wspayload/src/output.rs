use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use wspayload_frame::{OpCode, WebSocketPackage};

#[derive(Clone, Debug, Copy, ValueEnum)]
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
pub struct MessageOutput {
    pub index: usize,
    pub opcode: &'static str,
    pub fragments: usize,
    pub compressed: bool,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_code: Option<u16>,
    pub payload: String,
}

impl MessageOutput {
    pub fn from_package(index: usize, package: &WebSocketPackage) -> Self {
        let (size, payload) = match package.message() {
            Some(text) => (text.len(), text.to_string()),
            None => {
                let bytes = package.payload();
                (bytes.len(), payload_preview(package.opcode, &bytes))
            }
        };
        let close_code = match package.opcode {
            OpCode::Close => package
                .payload()
                .get(..2)
                .map(|code| u16::from_be_bytes([code[0], code[1]])),
            _ => None,
        };

        Self {
            index,
            opcode: package.opcode.name(),
            fragments: package.fragments,
            compressed: package.rsv[0],
            size,
            close_code,
            payload,
        }
    }
}

/// Print messages in the chosen format. Table output is collected into one
/// table; the other formats stream one message per line.
pub struct MessagePrinter {
    format: OutputFormat,
    table: Option<Table>,
}

impl MessagePrinter {
    pub fn new(format: OutputFormat) -> Self {
        let table = matches!(format, OutputFormat::Table).then(|| {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "OPCODE", "FRAGMENTS", "SIZE", "PAYLOAD"]);
            table
        });
        Self { format, table }
    }

    pub fn print(&mut self, index: usize, package: &WebSocketPackage) {
        match self.format {
            OutputFormat::Json => {
                let out = MessageOutput::from_package(index, package);
                println!(
                    "{}",
                    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
                );
            }
            OutputFormat::Table => {
                let out = MessageOutput::from_package(index, package);
                if let Some(table) = self.table.as_mut() {
                    table.add_row(vec![
                        out.index.to_string(),
                        out.opcode.to_string(),
                        out.fragments.to_string(),
                        out.size.to_string(),
                        out.payload,
                    ]);
                }
            }
            OutputFormat::Pretty => {
                let out = MessageOutput::from_package(index, package);
                println!(
                    "#{} opcode={} fragments={} compressed={} size={} payload={}",
                    out.index, out.opcode, out.fragments, out.compressed, out.size, out.payload
                );
            }
            OutputFormat::Raw => match package.message() {
                Some(text) => print_raw(text.as_bytes()),
                None => print_raw(&package.payload()),
            },
        }
    }

    pub fn finish(self) {
        if let Some(table) = self.table {
            println!("{table}");
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(opcode: OpCode, payload: &[u8]) -> String {
    let body = match opcode {
        OpCode::Close if payload.len() >= 2 => &payload[2..],
        _ => payload,
    };
    match std::str::from_utf8(body) {
        Ok(text) if opcode != OpCode::Binary => text.to_string(),
        _ => format!("<binary {} bytes>", payload.len()),
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use wspayload_frame::{encode_frame, FrameHeader, PackageDecoder};

    use super::*;

    fn decode_one(opcode: OpCode, payload: &[u8]) -> WebSocketPackage {
        let mut wire = BytesMut::new();
        encode_frame(&FrameHeader::new(opcode, true), payload, &mut wire);
        let mut decoder = PackageDecoder::new();
        decoder.feed(wire);
        decoder.next_package().unwrap().unwrap()
    }

    #[test]
    fn describes_text_message() {
        let out = MessageOutput::from_package(0, &decode_one(OpCode::Text, b"hello"));
        assert_eq!(out.opcode, "TEXT");
        assert_eq!(out.size, 5);
        assert_eq!(out.payload, "hello");
        assert_eq!(out.close_code, None);
    }

    #[test]
    fn describes_close_message() {
        let out = MessageOutput::from_package(3, &decode_one(OpCode::Close, b"\x03\xe8bye"));
        assert_eq!(out.index, 3);
        assert_eq!(out.close_code, Some(1000));
        assert_eq!(out.payload, "bye");
    }

    #[test]
    fn binary_payload_is_summarized() {
        let out = MessageOutput::from_package(1, &decode_one(OpCode::Binary, &[0xFF, 0x00]));
        assert_eq!(out.payload, "<binary 2 bytes>");

        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["opcode"], "BINARY");
        assert!(json.get("close_code").is_none());
    }
}
