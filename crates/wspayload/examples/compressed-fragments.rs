//! Inflate a permessage-deflate message that arrives in several fragments.
//!
//! Run with:
//!   cargo run --example compressed-fragments --features deflate

use bytes::BytesMut;
use wspayload::deflate::{deflate_message, DeflateConfig, PerMessageDeflate};
use wspayload::frame::{encode_frame, ExtensionChain, FrameHeader, OpCode, PackageDecoder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let text = "the quick brown fox jumps over the lazy dog. ".repeat(8);
    let compressed = deflate_message(text.as_bytes(), 9)?;
    eprintln!("{} bytes compressed to {}", text.len(), compressed.len());

    // RSV1 goes on the first frame only.
    let mut wire = BytesMut::new();
    let pieces: Vec<&[u8]> = compressed.chunks(16).collect();
    for (i, piece) in pieces.iter().enumerate() {
        let opcode = if i == 0 { OpCode::Text } else { OpCode::Continuation };
        let header = FrameHeader::new(opcode, i + 1 == pieces.len()).with_rsv1(i == 0);
        encode_frame(&header, piece, &mut wire);
    }

    let deflate = PerMessageDeflate::with_config(DeflateConfig {
        no_context_takeover: true,
        ..DeflateConfig::default()
    });
    let mut decoder =
        PackageDecoder::new().with_extensions(ExtensionChain::new().with(deflate));
    decoder.feed(wire);

    while let Some(package) = decoder.next_package()? {
        println!(
            "{} fragments, compressed={}, text matches: {}",
            package.fragments,
            package.rsv[0],
            package.message() == Some(text.as_str())
        );
    }

    Ok(())
}
