use bytes::{Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Sub-packet bodies of one multi-part message, addressed by index.
///
/// Slots are fixed once `total` is known. Sub-packets may arrive in any
/// order; a repeated index overwrites the earlier body. A slot holding an
/// empty body counts as unfilled.
///
/// Not synchronised: concurrent `put` calls into one buffer must be
/// serialised by the owner.
#[derive(Debug, Clone)]
pub struct ReassemblyBuffer {
    slots: Box<[Bytes]>,
}

impl ReassemblyBuffer {
    /// Create a buffer for `total` sub-packets.
    pub fn new(total: u16) -> Result<Self> {
        if total == 0 {
            return Err(FrameError::InvalidTotal(total));
        }
        Ok(Self {
            slots: vec![Bytes::new(); usize::from(total)].into_boxed_slice(),
        })
    }

    /// Store the body of sub-packet `index` (1-based).
    pub fn put(&mut self, index: u16, body: Bytes) -> Result<()> {
        let total = self.total();
        if index < 1 || index > total {
            return Err(FrameError::IndexOutOfRange { index, total });
        }
        self.slots[usize::from(index - 1)] = body;
        Ok(())
    }

    /// True once every slot holds a non-empty body.
    pub fn is_ready(&self) -> bool {
        self.slots.iter().all(|slot| !slot.is_empty())
    }

    /// Concatenate all slots in index order.
    pub fn assemble(&self) -> Result<Bytes> {
        if !self.is_ready() {
            return Err(FrameError::NotReady {
                filled: self.filled(),
                total: self.slots.len(),
            });
        }
        if let [only] = &self.slots[..] {
            return Ok(only.clone());
        }

        let mut out = BytesMut::with_capacity(self.size());
        for slot in self.slots.iter() {
            out.extend_from_slice(slot);
        }
        Ok(out.freeze())
    }

    /// Sum of the bodies received so far.
    pub fn size(&self) -> usize {
        self.slots.iter().map(Bytes::len).sum()
    }

    /// Number of filled slots.
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_empty()).count()
    }

    /// Number of slots.
    pub fn total(&self) -> u16 {
        // Constructed from a u16, so this cannot truncate.
        self.slots.len() as u16
    }
}
