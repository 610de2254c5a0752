use tracing::debug;
use wspayload_frame::{MessageWriter, OpCode, WriterConfig};

use crate::cmd::{parse_hex, EncodeArgs};
use crate::exit::{io_error, payload_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::print_raw;

pub fn run(args: EncodeArgs) -> CliResult<i32> {
    let (payload, default_opcode) = resolve_payload(&args)?;
    let opcode = args.opcode.map(OpCode::from).unwrap_or(default_opcode);

    if args.deflate && opcode.is_control() {
        return Err(CliError::new(
            USAGE,
            "--deflate applies to text and binary messages only",
        ));
    }
    if opcode.is_control() && payload.len() > 125 {
        return Err(CliError::new(
            DATA_INVALID,
            format!("control frame payload too large ({} bytes, max 125)", payload.len()),
        ));
    }

    let config = WriterConfig {
        fragment_size: args.fragment_size,
        mask: args.mask,
    };
    let mut writer = MessageWriter::with_config(Vec::new(), config);
    let sent = if args.deflate {
        writer.send_deflated(opcode, &payload, 6)
    } else {
        writer.send(opcode, &payload)
    };
    sent.map_err(|err| payload_error("encode", err))?;

    let wire = writer.into_inner();
    debug!(%opcode, payload = payload.len(), wire = wire.len(), "encoded message");

    match &args.out {
        Some(path) => std::fs::write(path, &wire)
            .map_err(|err| io_error(&format!("write {}", path.display()), err))?,
        None => print_raw(&wire),
    }

    Ok(SUCCESS)
}

fn resolve_payload(args: &EncodeArgs) -> CliResult<(Vec<u8>, OpCode)> {
    if let Some(text) = &args.text {
        return Ok((text.as_bytes().to_vec(), OpCode::Text));
    }

    if let Some(hex) = &args.data {
        let payload = parse_hex(hex).map_err(|msg| CliError::new(USAGE, msg))?;
        return Ok((payload, OpCode::Binary));
    }

    if let Some(path) = &args.file {
        let payload = std::fs::read(path)
            .map_err(|err| io_error(&format!("read {}", path.display()), err))?;
        return Ok((payload, OpCode::Binary));
    }

    Err(CliError::new(
        USAGE,
        "missing payload: provide one of --text, --data, or --file",
    ))
}
