use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{encode_frame, FrameHeader};
use crate::config::WriterConfig;
use crate::error::{PayloadError, Result};
use crate::opcode::OpCode;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete messages to any `Write` stream.
///
/// Data messages are split into fragments when
/// [`WriterConfig::fragment_size`] is set. Control messages always go out as
/// a single frame.
pub struct MessageWriter<T> {
    inner: T,
    buf: BytesMut,
    config: WriterConfig,
}

impl<T: Write> MessageWriter<T> {
    /// Create a new message writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, WriterConfig::default())
    }

    /// Create a new message writer with explicit configuration.
    pub fn with_config(inner: T, config: WriterConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send one message.
    pub fn send(&mut self, opcode: OpCode, payload: &[u8]) -> Result<()> {
        self.send_with_rsv1(opcode, payload, false)
    }

    /// Send a text message.
    pub fn send_text(&mut self, text: &str) -> Result<()> {
        self.send(OpCode::Text, text.as_bytes())
    }

    /// Send a binary message.
    pub fn send_binary(&mut self, payload: &[u8]) -> Result<()> {
        self.send(OpCode::Binary, payload)
    }

    /// Send a ping.
    pub fn ping(&mut self, payload: &[u8]) -> Result<()> {
        self.send(OpCode::Ping, payload)
    }

    /// Send a pong.
    pub fn pong(&mut self, payload: &[u8]) -> Result<()> {
        self.send(OpCode::Pong, payload)
    }

    /// Send a close frame with a status code and reason.
    pub fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        let mut body = Vec::with_capacity(2 + reason.len());
        body.extend_from_slice(&code.to_be_bytes());
        body.extend_from_slice(reason.as_bytes());
        self.send(OpCode::Close, &body)
    }

    /// Compress a data message with permessage-deflate and send it with RSV1
    /// set on the first frame.
    #[cfg(feature = "deflate")]
    pub fn send_deflated(&mut self, opcode: OpCode, payload: &[u8], level: u32) -> Result<()> {
        let compressed = crate::deflate::deflate_message(payload, level).map_err(|source| {
            PayloadError::Extension {
                name: crate::deflate::EXTENSION_NAME.to_string(),
                source,
            }
        })?;
        self.send_with_rsv1(opcode, &compressed, true)
    }

    fn send_with_rsv1(&mut self, opcode: OpCode, payload: &[u8], rsv1: bool) -> Result<()> {
        self.buf.clear();

        let fragment_size = match self.config.fragment_size {
            Some(size) if size > 0 && !opcode.is_control() => size,
            _ => payload.len().max(1),
        };

        let mut pieces = payload.chunks(fragment_size).peekable();
        if pieces.peek().is_none() {
            let header = FrameHeader::new(opcode, true)
                .with_mask(self.config.mask)
                .with_rsv1(rsv1);
            encode_frame(&header, &[], &mut self.buf);
        }

        let mut first = true;
        while let Some(piece) = pieces.next() {
            let frame_opcode = if first { opcode } else { OpCode::Continuation };
            let header = FrameHeader::new(frame_opcode, pieces.peek().is_none())
                .with_mask(self.config.mask)
                .with_rsv1(rsv1 && first);
            encode_frame(&header, piece, &mut self.buf);
            first = false;
        }

        trace!(%opcode, payload = payload.len(), wire = self.buf.len(), "sending message");
        self.write_buffered()?;
        self.flush()
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(PayloadError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(PayloadError::Io(err)),
            }
        }
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(PayloadError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update the fragment size for subsequent messages.
    pub fn set_fragment_size(&mut self, fragment_size: Option<usize>) {
        self.config.fragment_size = fragment_size;
    }

    /// Current message writer configuration.
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use bytes::Bytes;

    use super::*;
    use crate::decoder::PackageDecoder;
    use crate::package::Message;

    fn written(writer: MessageWriter<Cursor<Vec<u8>>>) -> Vec<u8> {
        writer.into_inner().into_inner()
    }

    fn decode(wire: Vec<u8>) -> Vec<(Message, usize)> {
        let mut decoder = PackageDecoder::new();
        decoder.feed(BytesMut::from(wire.as_slice()));
        let mut out = Vec::new();
        while let Some(package) = decoder.next_package().unwrap() {
            let fragments = package.fragments;
            out.push((package.into_message(), fragments));
        }
        out
    }

    #[test]
    fn write_single_message() {
        let mut writer = MessageWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send_text("hello").unwrap();

        let wire = written(writer);
        assert_eq!(&wire[..2], &[0x81u8, 0x05]);
        assert_eq!(decode(wire), vec![(Message::Text("hello".to_string()), 1)]);
    }

    #[test]
    fn write_multiple_messages() {
        let mut writer = MessageWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send_binary(b"one").unwrap();
        writer.pong(b"two").unwrap();
        writer.close(1001, "away").unwrap();

        let messages = decode(written(writer));
        assert_eq!(messages[0].0, Message::Binary(Bytes::from_static(b"one")));
        assert_eq!(messages[1].0, Message::Pong(Bytes::from_static(b"two")));
        assert_eq!(
            messages[2].0.close_code_and_reason(),
            Some((1001, "away".to_string()))
        );
    }

    #[test]
    fn fragments_data_messages() {
        let config = WriterConfig {
            fragment_size: Some(4),
            mask: None,
        };
        let mut writer = MessageWriter::with_config(Cursor::new(Vec::<u8>::new()), config);
        writer.send_text("fragmented").unwrap();

        let wire = written(writer);
        assert_eq!(wire[0], 0x01);
        assert_eq!(wire[6], 0x00);
        assert_eq!(wire[12], 0x80);
        assert_eq!(
            decode(wire),
            vec![(Message::Text("fragmented".to_string()), 3)]
        );
    }

    #[test]
    fn control_frames_are_never_fragmented() {
        let config = WriterConfig {
            fragment_size: Some(2),
            mask: None,
        };
        let mut writer = MessageWriter::with_config(Cursor::new(Vec::<u8>::new()), config);
        writer.ping(b"heartbeat").unwrap();

        assert_eq!(
            decode(written(writer)),
            vec![(Message::Ping(Bytes::from_static(b"heartbeat")), 1)]
        );
    }

    #[test]
    fn masks_every_frame() {
        let config = WriterConfig {
            fragment_size: Some(2),
            mask: Some([0x01, 0x02, 0x03, 0x04]),
        };
        let mut writer = MessageWriter::with_config(Cursor::new(Vec::<u8>::new()), config);
        writer.send_binary(&[0, 0, 0]).unwrap();

        let wire = written(writer);
        assert_eq!(&wire[..8], &[0x02u8, 0x82, 1, 2, 3, 4, 1, 2]);
        assert_eq!(&wire[8..], &[0x80u8, 0x81, 1, 2, 3, 4, 1]);
    }

    #[test]
    fn empty_message_is_one_frame() {
        let config = WriterConfig {
            fragment_size: Some(8),
            mask: None,
        };
        let mut writer = MessageWriter::with_config(Cursor::new(Vec::<u8>::new()), config);
        writer.send_text("").unwrap();

        let wire = written(writer);
        assert_eq!(wire, vec![0x81u8, 0x00]);
    }

    #[cfg(feature = "deflate")]
    #[test]
    fn deflated_message_sets_rsv1_on_first_frame() {
        use crate::deflate::PerMessageDeflate;
        use crate::extension::ExtensionChain;

        let config = WriterConfig {
            fragment_size: Some(5),
            mask: None,
        };
        let mut writer = MessageWriter::with_config(Cursor::new(Vec::<u8>::new()), config);
        let text = "squeeze me ".repeat(20);
        writer.send_deflated(OpCode::Text, text.as_bytes(), 6).unwrap();

        let wire = written(writer);
        assert_eq!(wire[0], 0x41);
        assert_eq!(wire[7] & 0x40, 0);

        let mut decoder = PackageDecoder::new()
            .with_extensions(ExtensionChain::new().with(PerMessageDeflate::new()));
        decoder.feed(BytesMut::from(wire.as_slice()));
        let package = decoder.next_package().unwrap().unwrap();
        assert_eq!(package.message(), Some(text.as_str()));
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = MessageWriter::new(sink);

        writer.send_binary(b"x").unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn accessors_and_into_inner() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut writer = MessageWriter::new(cursor);

        writer.set_fragment_size(Some(16));
        assert_eq!(writer.config().fragment_size, Some(16));
        let _ = writer.get_ref();
        let _ = writer.get_mut();
        let _inner = writer.into_inner();
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        let writer_impl = InterruptedWriteThenFlush {
            wrote_once: false,
            flush_interrupted: false,
            data: Vec::new(),
        };

        let mut writer = MessageWriter::new(writer_impl);
        writer.send_text("retry").unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.data.len(), 7);
    }

    #[test]
    fn handles_would_block_write_and_flush() {
        let writer_impl = WouldBlockWriteThenFlush {
            wrote_once: false,
            flush_would_block: false,
            data: Vec::new(),
        };

        let mut writer = MessageWriter::new(writer_impl);
        writer.send_text("retry").unwrap();

        let inner = writer.into_inner();
        assert!(!inner.data.is_empty());
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = MessageWriter::new(ZeroWriter);
        let err = writer.send_binary(b"x").unwrap_err();
        assert!(matches!(err, PayloadError::ConnectionClosed));
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct InterruptedWriteThenFlush {
        wrote_once: bool,
        flush_interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedWriteThenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_interrupted {
                self.flush_interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    struct WouldBlockWriteThenFlush {
        wrote_once: bool,
        flush_would_block: bool,
        data: Vec<u8>,
    }

    impl Write for WouldBlockWriteThenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_would_block {
                self.flush_would_block = true;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
