use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::config::DecoderConfig;
use crate::decoder::PackageDecoder;
use crate::error::{PayloadError, Result};
use crate::extension::ExtensionChain;
use crate::package::{Message, WebSocketPackage};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete messages from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete messages.
pub struct MessageReader<T> {
    inner: T,
    decoder: PackageDecoder,
}

impl<T: Read> MessageReader<T> {
    /// Create a new message reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_decoder(inner, PackageDecoder::new())
    }

    /// Create a new message reader with explicit configuration.
    pub fn with_config(inner: T, config: DecoderConfig) -> Self {
        Self::with_decoder(inner, PackageDecoder::with_config(config))
    }

    /// Create a message reader around a prepared decoder.
    pub fn with_decoder(inner: T, decoder: PackageDecoder) -> Self {
        Self { inner, decoder }
    }

    /// Replace the extension chain used for completed messages.
    pub fn with_extensions(mut self, extensions: ExtensionChain) -> Self {
        self.decoder = self.decoder.with_extensions(extensions);
        self
    }

    /// Read the next complete package (blocking).
    ///
    /// Returns `Err(PayloadError::ConnectionClosed)` when EOF is reached.
    pub fn read_package(&mut self) -> Result<WebSocketPackage> {
        loop {
            if let Some(package) = self.decoder.next_package()? {
                return Ok(package);
            }

            let mut chunk = BytesMut::zeroed(READ_CHUNK_SIZE);
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(PayloadError::Io(err)),
            };

            if read == 0 {
                return Err(PayloadError::ConnectionClosed);
            }

            chunk.truncate(read);
            self.decoder.feed(chunk);
        }
    }

    /// Read the next complete message (blocking).
    pub fn read_message(&mut self) -> Result<Message> {
        self.read_package().map(WebSocketPackage::into_message)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Borrow the decoder.
    pub fn decoder(&self) -> &PackageDecoder {
        &self.decoder
    }

    /// Registered extensions.
    pub fn extensions_mut(&mut self) -> &mut ExtensionChain {
        self.decoder.extensions_mut()
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum frame payload size for subsequent headers.
    pub fn set_max_payload_size(&mut self, max_payload_size: u64) {
        self.decoder.set_max_payload_size(max_payload_size);
    }

    /// Current decoder configuration.
    pub fn config(&self) -> &DecoderConfig {
        self.decoder.config()
    }
}

impl<T: Read> Iterator for MessageReader<T> {
    type Item = Result<Message>;

    /// Yields messages until the stream closes cleanly between messages.
    ///
    /// A decoding error is yielded once and ends the iteration.
    fn next(&mut self) -> Option<Self::Item> {
        if self.decoder.is_terminated() {
            return None;
        }
        match self.read_message() {
            Err(PayloadError::ConnectionClosed)
                if !self.decoder.is_mid_message() && self.decoder.buffered() == 0 =>
            {
                None
            }
            other => Some(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::{BufMut, Bytes};

    use super::*;
    use crate::codec::{encode_frame, FrameHeader};
    use crate::opcode::OpCode;

    fn frame(opcode: OpCode, fin: bool, payload: &[u8], wire: &mut BytesMut) {
        encode_frame(&FrameHeader::new(opcode, fin), payload, wire);
    }

    #[test]
    fn read_single_message() {
        let mut wire = BytesMut::new();
        frame(OpCode::Text, true, b"hello", &mut wire);

        let mut reader = MessageReader::new(Cursor::new(wire.to_vec()));
        let message = reader.read_message().unwrap();

        assert_eq!(message, Message::Text("hello".to_string()));
    }

    #[test]
    fn read_multiple_messages() {
        let mut wire = BytesMut::new();
        frame(OpCode::Text, true, b"one", &mut wire);
        frame(OpCode::Binary, true, b"two", &mut wire);
        frame(OpCode::Pong, true, b"three", &mut wire);

        let reader = MessageReader::new(Cursor::new(wire.to_vec()));
        let messages: Vec<Message> = reader.map(|m| m.unwrap()).collect();

        assert_eq!(
            messages,
            vec![
                Message::Text("one".to_string()),
                Message::Binary(Bytes::from_static(b"two")),
                Message::Pong(Bytes::from_static(b"three")),
            ]
        );
    }

    #[test]
    fn read_message_with_large_payload() {
        let payload = vec![0xAB; 64 * 1024];
        let mut wire = BytesMut::new();
        frame(OpCode::Binary, true, &payload, &mut wire);

        let mut reader = MessageReader::new(Cursor::new(wire.to_vec()));
        let message = reader.read_message().unwrap();

        assert_eq!(message.as_bytes(), payload.as_slice());
    }

    #[test]
    fn partial_read_handling() {
        let mut wire = BytesMut::new();
        frame(OpCode::Text, false, b"sl", &mut wire);
        frame(OpCode::Continuation, true, b"ow", &mut wire);

        let byte_reader = ByteByByteReader {
            bytes: wire.to_vec(),
            pos: 0,
        };
        let mut reader = MessageReader::new(byte_reader);

        let package = reader.read_package().unwrap();
        assert_eq!(package.fragments, 2);
        assert_eq!(package.message(), Some("slow"));
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = MessageReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, PayloadError::ConnectionClosed));
        assert!(reader.next().is_none());
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut partial = BytesMut::new();
        partial.put_u8(0x82);
        partial.put_u8(16);
        partial.put_slice(b"only-part");

        let mut reader = MessageReader::new(Cursor::new(partial.to_vec()));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, PayloadError::ConnectionClosed));
    }

    #[test]
    fn iterator_reports_truncated_stream() {
        let mut wire = BytesMut::new();
        frame(OpCode::Text, false, b"half", &mut wire);

        let mut reader = MessageReader::new(Cursor::new(wire.to_vec()));
        let item = reader.next().unwrap();
        assert!(matches!(item, Err(PayloadError::ConnectionClosed)));
    }

    #[test]
    fn oversized_frame_in_stream() {
        let mut wire = BytesMut::new();
        wire.put_u8(0x82);
        wire.put_u8(126);
        wire.put_u16(1024);

        let cfg = DecoderConfig {
            max_payload_size: 16,
            ..DecoderConfig::default()
        };
        let mut reader = MessageReader::with_config(Cursor::new(wire.to_vec()), cfg);
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, PayloadError::PayloadTooLarge { size: 1024, max: 16 }));
    }

    #[test]
    fn iterator_ends_after_decoding_error() {
        let mut wire = BytesMut::new();
        frame(OpCode::Binary, false, b"abc", &mut wire);
        frame(OpCode::Continuation, false, b"def", &mut wire);
        frame(OpCode::Continuation, true, b"gh", &mut wire);
        frame(OpCode::Text, true, b"after", &mut wire);

        let cfg = DecoderConfig {
            max_message_size: Some(4),
            ..DecoderConfig::default()
        };
        let mut reader = MessageReader::with_config(Cursor::new(wire.to_vec()), cfg);
        let first = reader.next().unwrap();
        assert!(matches!(first, Err(PayloadError::MessageTooLarge { size: 6, max: 4 })));
        assert!(reader.next().is_none());
        assert!(matches!(reader.read_message(), Err(PayloadError::Terminated)));
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            if buf.is_empty() {
                return Ok(0);
            }

            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_pipe() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::MessageWriter::new(left);
        let mut reader = MessageReader::new(right);

        writer.ping(b"beat").unwrap();
        let message = reader.read_message().unwrap();

        assert_eq!(message, Message::Ping(Bytes::from_static(b"beat")));
    }

    #[test]
    #[cfg(unix)]
    fn concurrent_reader_writer_threads() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let config = crate::config::WriterConfig {
            fragment_size: Some(3),
            mask: Some([0x11, 0x22, 0x33, 0x44]),
        };
        let mut writer = crate::writer::MessageWriter::with_config(left, config);
        let mut reader = MessageReader::new(right);

        let reader_thread = std::thread::spawn(move || {
            for expected in 0..64u16 {
                let message = reader.read_message().unwrap();
                assert_eq!(message, Message::Text(format!("msg-{expected}")));
            }
        });

        for i in 0..64u16 {
            writer.send_text(&format!("msg-{i}")).unwrap();
        }

        reader_thread.join().unwrap();
    }

    #[test]
    fn accessors_and_into_inner() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut reader = MessageReader::new(cursor);

        reader.set_max_payload_size(32);
        assert_eq!(reader.config().max_payload_size, 32);
        assert_eq!(reader.decoder().position(), 0);
        assert!(reader.extensions_mut().is_empty());
        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _inner = reader.into_inner();
    }

    #[test]
    fn read_would_block_propagates_io_error() {
        let mut wire = BytesMut::new();
        frame(OpCode::Text, true, b"ok", &mut wire);

        let reader = WouldBlockThenData {
            state: 0,
            bytes: wire.to_vec(),
            pos: 0,
        };
        let mut framed = MessageReader::new(reader);
        let err = framed.read_message().unwrap_err();
        assert!(matches!(err, PayloadError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    struct WouldBlockThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for WouldBlockThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn interrupted_read_retries() {
        let mut wire = BytesMut::new();
        frame(OpCode::Binary, true, b"ok", &mut wire);

        let reader = InterruptedThenData {
            state: 0,
            bytes: wire.to_vec(),
            pos: 0,
        };
        let mut framed = MessageReader::new(reader);
        let message = framed.read_message().unwrap();

        assert_eq!(message, Message::Binary(Bytes::from_static(b"ok")));
    }

    struct InterruptedThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }
}
