use std::io::Read;

use bytes::BytesMut;
use tracing::{debug, info};
use wspayload_frame::{DecoderConfig, ExtensionChain, PackageDecoder, PerMessageDeflate};

use crate::cmd::DecodeArgs;
use crate::exit::{io_error, payload_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{MessagePrinter, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    if args.chunk_size == 0 {
        return Err(CliError::new(USAGE, "--chunk-size must be at least 1"));
    }

    let input = read_input(&args)?;
    let mut decoder = build_decoder(&args);
    let mut printer = MessagePrinter::new(format);

    info!(
        bytes = input.len(),
        chunk_size = args.chunk_size,
        extensions = ?decoder.extensions().names().collect::<Vec<_>>(),
        "decoding frame stream"
    );

    let mut count = 0usize;
    for chunk in input.chunks(args.chunk_size) {
        decoder.feed(BytesMut::from(chunk));
        loop {
            match decoder.next_package() {
                Ok(Some(package)) => {
                    printer.print(count, &package);
                    count += 1;
                }
                Ok(None) => break,
                Err(err) => {
                    printer.finish();
                    return Err(payload_error(
                        &format!("message {count} at byte {}", decoder.position()),
                        err,
                    ));
                }
            }
        }
    }
    printer.finish();

    if decoder.is_mid_message() || decoder.buffered() > 0 {
        return Err(CliError::new(
            FAILURE,
            format!(
                "input ended inside a message ({} bytes unconsumed)",
                decoder.buffered()
            ),
        ));
    }

    debug!(messages = count, "decode complete");
    Ok(SUCCESS)
}

fn build_decoder(args: &DecodeArgs) -> PackageDecoder {
    let defaults = DecoderConfig::default();
    let config = DecoderConfig {
        max_payload_size: args.max_payload.unwrap_or(defaults.max_payload_size),
        max_message_size: args.max_message.or(defaults.max_message_size),
    };

    let mut extensions = ExtensionChain::new();
    if args.deflate {
        extensions.register(PerMessageDeflate::new());
    }
    PackageDecoder::with_config(config).with_extensions(extensions)
}

fn read_input(args: &DecodeArgs) -> CliResult<Vec<u8>> {
    if args.input.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .map_err(|err| io_error("read stdin", err))?;
        return Ok(buf);
    }

    std::fs::read(&args.input)
        .map_err(|err| io_error(&format!("read {}", args.input.display()), err))
}
