//! RFC 6455 frame opcodes.
//!
//! Opcodes 0x0-0x2 carry data, 0x8-0xA are control frames. Everything else
//! is reserved and passed through untouched as [`OpCode::Reserved`].

/// WebSocket frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Continuation of a fragmented message (0x0).
    Continuation,
    /// UTF-8 text message (0x1).
    Text,
    /// Binary message (0x2).
    Binary,
    /// Connection close (0x8).
    Close,
    /// Ping (0x9).
    Ping,
    /// Pong (0xA).
    Pong,
    /// Reserved or unknown opcode.
    Reserved(u8),
}

impl OpCode {
    /// Parse an opcode from the low nibble of the first header byte.
    pub fn from_u8(value: u8) -> Self {
        match value & 0x0F {
            0x0 => Self::Continuation,
            0x1 => Self::Text,
            0x2 => Self::Binary,
            0x8 => Self::Close,
            0x9 => Self::Ping,
            0xA => Self::Pong,
            other => Self::Reserved(other),
        }
    }

    /// Wire value of this opcode.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Continuation => 0x0,
            Self::Text => 0x1,
            Self::Binary => 0x2,
            Self::Close => 0x8,
            Self::Ping => 0x9,
            Self::Pong => 0xA,
            Self::Reserved(v) => v & 0x0F,
        }
    }

    /// Returns a human-readable name for the opcode.
    pub fn name(self) -> &'static str {
        match self {
            Self::Continuation => "CONTINUATION",
            Self::Text => "TEXT",
            Self::Binary => "BINARY",
            Self::Close => "CLOSE",
            Self::Ping => "PING",
            Self::Pong => "PONG",
            Self::Reserved(_) => "RESERVED",
        }
    }

    /// Returns true for close, ping and pong.
    pub fn is_control(self) -> bool {
        self.as_u8() >= 0x8
    }

    /// Returns true for continuation, text and binary.
    pub fn is_data(self) -> bool {
        self.as_u8() <= 0x2
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_opcodes() {
        assert_eq!(OpCode::from_u8(0x81), OpCode::Text);
        assert_eq!(OpCode::from_u8(0x02), OpCode::Binary);
        assert_eq!(OpCode::from_u8(0x8A), OpCode::Pong);
    }

    #[test]
    fn reserved_opcodes_keep_their_value() {
        let op = OpCode::from_u8(0x0B);
        assert_eq!(op, OpCode::Reserved(0x0B));
        assert_eq!(op.as_u8(), 0x0B);
        assert!(op.is_control());
        assert!(!OpCode::from_u8(0x03).is_control());
    }

    #[test]
    fn classifies_control_and_data() {
        assert!(OpCode::Close.is_control());
        assert!(!OpCode::Close.is_data());
        assert!(OpCode::Continuation.is_data());
        assert_eq!(OpCode::Ping.to_string(), "PING");
    }
}
