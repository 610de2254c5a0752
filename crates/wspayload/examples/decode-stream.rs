//! Decode a frame stream delivered in uneven chunks, as a socket would.
//!
//! Run with:
//!   cargo run --example decode-stream

use bytes::BytesMut;
use wspayload::frame::{
    encode_frame, FrameHeader, Message, MessageReader, MessageWriter, OpCode, PackageDecoder,
    WriterConfig,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A fragmented, masked text message with a ping between its fragments.
    let mut wire = BytesMut::new();
    let key = Some([0x37, 0xfa, 0x21, 0x3d]);
    encode_frame(&FrameHeader::new(OpCode::Text, false).with_mask(key), b"Hel", &mut wire);
    encode_frame(&FrameHeader::new(OpCode::Ping, true).with_mask(key), b"?", &mut wire);
    encode_frame(
        &FrameHeader::new(OpCode::Continuation, true).with_mask(key),
        b"lo",
        &mut wire,
    );

    let mut decoder = PackageDecoder::new();
    for chunk in wire.chunks(3) {
        decoder.feed(BytesMut::from(chunk));
        while let Some(package) = decoder.next_package()? {
            println!(
                "{} after {} fragment(s), decoder at byte {}",
                package.opcode,
                package.fragments,
                decoder.position()
            );
            match package.into_message() {
                Message::Text(text) => println!("  text: {text}"),
                other => println!("  {} bytes", other.as_bytes().len()),
            }
        }
    }

    // The same message through the blocking reader/writer pair.
    let config = WriterConfig {
        fragment_size: Some(2),
        mask: key,
    };
    let mut writer = MessageWriter::with_config(Vec::new(), config);
    writer.send_text("Hello again")?;
    writer.close(1000, "done")?;

    let mut reader = MessageReader::new(std::io::Cursor::new(writer.into_inner()));
    for message in &mut reader {
        match message? {
            Message::Close(_) => println!("close received"),
            message => println!("{message:?}"),
        }
    }

    Ok(())
}
