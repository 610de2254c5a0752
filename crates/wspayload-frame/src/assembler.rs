//! Frame payload assembly.
//!
//! [`PayloadAssembler::process`] is the payload step of the part-reader state
//! machine. It runs once the header readers have filled in the current frame's
//! fields, and consumes exactly that frame's payload:
//!
//! ```text
//!  AwaitingBytes ──(available < length)──▶ NeedMoreData (nothing consumed)
//!        │
//!        ▼ take payload view, unmask, append
//!  FIN == false ──▶ FragmentComplete (next frame header)
//!  FIN == true  ──▶ flatten ─▶ extensions ─▶ UTF-8 / owned copy ─▶ MessageComplete
//! ```

use tracing::{debug, trace};

use crate::cursor::ByteCursor;
use crate::error::{PayloadError, Result};
use crate::extension::{ExtensionChain, MessageInfo};
use crate::mask::unmask_chain;
use crate::opcode::OpCode;
use crate::package::WebSocketPackage;
use crate::segment::SegmentChain;

/// Outcome of one payload step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Not enough bytes are buffered; nothing was consumed.
    NeedMoreData,
    /// A non-final fragment was consumed; read the next frame header.
    FragmentComplete,
    /// The final fragment was consumed and the message is finalized.
    MessageComplete,
}

/// Consumes frame payloads into a [`WebSocketPackage`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadAssembler {
    max_message_size: Option<usize>,
}

impl PayloadAssembler {
    /// Create an assembler without a message size limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an assembler that rejects messages larger than `max` bytes.
    pub fn with_max_message_size(max: Option<usize>) -> Self {
        Self {
            max_message_size: max,
        }
    }

    /// Consume the current frame's payload from `cursor`.
    ///
    /// Returns [`Progress::NeedMoreData`] without touching `cursor` or
    /// `package` if fewer than `package.payload_length` bytes are buffered;
    /// calling again once more bytes arrive resumes from the same point.
    ///
    /// Once enough bytes are buffered the payload is removed from the cursor
    /// before anything else happens, so the stream position stays in step with
    /// the frame even if an extension or UTF-8 decoding fails afterwards. On
    /// failure the accumulated data is discarded.
    pub fn process(
        &self,
        package: &mut WebSocketPackage,
        extensions: &mut ExtensionChain,
        cursor: &mut ByteCursor,
    ) -> Result<Progress> {
        let required = package.payload_length;
        if (cursor.available() as u64) < required {
            trace!(
                required,
                available = cursor.available(),
                "payload incomplete, waiting for more data"
            );
            return Ok(Progress::NeedMoreData);
        }

        // Bounded by `available`, so it fits in usize.
        let mut view = cursor.take(required as usize);
        package.fragments += 1;

        if let Some(key) = package.mask_key {
            unmask_chain(&mut view, key);
        }

        if let Some(max) = self.max_message_size {
            let size = package.data.len() + view.len();
            if size > max {
                package.data.clear();
                return Err(PayloadError::MessageTooLarge { size, max });
            }
        }

        package.data.append_chain(view);

        if !package.fin {
            trace!(
                opcode = %package.opcode,
                fragment = package.fragments,
                accumulated = package.data.len(),
                "fragment consumed"
            );
            return Ok(Progress::FragmentComplete);
        }

        self.complete(package, extensions)?;
        Ok(Progress::MessageComplete)
    }

    fn complete(
        &self,
        package: &mut WebSocketPackage,
        extensions: &mut ExtensionChain,
    ) -> Result<()> {
        let mut data = package.data.to_owned_bytes();
        package.data.clear();

        if !extensions.is_empty() {
            let info = MessageInfo {
                opcode: package.opcode,
                rsv: package.rsv,
            };
            extensions.decode(&info, &mut data)?;
        }

        if package.opcode == OpCode::Text {
            let text = std::str::from_utf8(&data)?;
            package.message = Some(text.to_owned());
        } else {
            package.data = SegmentChain::from(data.freeze());
        }

        debug!(
            opcode = %package.opcode,
            fragments = package.fragments,
            size = package
                .message
                .as_ref()
                .map_or(package.data.len(), String::len),
            "message complete"
        );
        Ok(())
    }
}
