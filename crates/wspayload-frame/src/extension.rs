//! Negotiated payload extensions.
//!
//! Extensions transform the fully reassembled payload of a message, once, in
//! the order they were registered. A failure is always reported with the name
//! of the extension that raised it.

use bytes::BytesMut;
use tracing::{trace, warn};

use crate::error::{PayloadError, Result};
use crate::opcode::OpCode;

/// Failure reported by an [`Extension`].
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    /// The extension rejected the payload.
    #[error("{0}")]
    Failed(String),

    /// The decoded payload exceeded the extension's size limit.
    #[error("decoded payload exceeds {max} bytes")]
    TooLarge { max: usize },

    /// The compressed stream could not be inflated.
    #[cfg(feature = "deflate")]
    #[error("inflate error: {0}")]
    Inflate(#[from] flate2::DecompressError),
}

/// Header fields of a completed message, as seen by extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageInfo {
    /// Opcode of the first frame.
    pub opcode: OpCode,
    /// RSV1-3 of the first frame.
    pub rsv: [bool; 3],
}

impl MessageInfo {
    /// Context for a message with no reserved bits set.
    pub fn new(opcode: OpCode) -> Self {
        Self {
            opcode,
            rsv: [false; 3],
        }
    }

    /// Set RSV1.
    pub fn with_rsv1(mut self, rsv1: bool) -> Self {
        self.rsv[0] = rsv1;
        self
    }
}

/// A payload transformation applied to completed messages.
///
/// Every registered extension sees every completed message; each one decides
/// from `info` whether the payload is meant for it.
pub trait Extension: Send {
    /// Registered extension name, e.g. `permessage-deflate`.
    fn name(&self) -> &str;

    /// Transform the reassembled payload in place.
    fn decode(
        &mut self,
        info: &MessageInfo,
        data: &mut BytesMut,
    ) -> std::result::Result<(), ExtensionError>;
}

/// Extensions in registration order.
#[derive(Default)]
pub struct ExtensionChain {
    extensions: Vec<Box<dyn Extension>>,
}

impl ExtensionChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension after all previously registered ones.
    pub fn register(&mut self, extension: impl Extension + 'static) {
        self.extensions.push(Box::new(extension));
    }

    /// Builder form of [`ExtensionChain::register`].
    pub fn with(mut self, extension: impl Extension + 'static) -> Self {
        self.register(extension);
        self
    }

    /// Number of registered extensions.
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Returns true if no extensions are registered.
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Names of the registered extensions, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(|ext| ext.name())
    }

    /// Run every extension over `data`, stopping at the first failure.
    pub fn decode(&mut self, info: &MessageInfo, data: &mut BytesMut) -> Result<()> {
        for extension in &mut self.extensions {
            let before = data.len();
            if let Err(source) = extension.decode(info, data) {
                let name = extension.name().to_string();
                warn!(extension = %name, error = %source, "extension decode failed");
                return Err(PayloadError::Extension { name, source });
            }
            trace!(extension = extension.name(), before, after = data.len(), "extension applied");
        }
        Ok(())
    }
}

impl std::fmt::Debug for ExtensionChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
