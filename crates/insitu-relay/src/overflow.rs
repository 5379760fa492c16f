//! Overflow buffer for filter output the file cannot take yet.
//!
//! The filter may write faster than it reads. Output that would overwrite
//! unread file bytes is parked here, in a queue of fixed-size blocks, until
//! enough of the file has been read to make room.
//!
//! ```text
//!  head (rpoint)                              tail (wpoint)
//!  ┌────────────┐   ┌────────────┐   ┌────────────┐
//!  │ ░░░░██████ │ → │ ██████████ │ → │ ████░░░░░░ │
//!  └────────────┘   └────────────┘   └────────────┘
//!   drained  pending   full           pending  free
//! ```
//!
//! Only the tail block is ever partially written. The head block is released
//! as soon as it has been fully drained and another block follows it.

use std::collections::VecDeque;

struct Block {
    data: Box<[u8]>,
    /// Bytes written into `data`
    wpoint: usize,
}

impl Block {
    fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            wpoint: 0,
        }
    }

    fn room(&self) -> usize {
        self.data.len() - self.wpoint
    }
}

/// FIFO byte queue built from fixed-capacity blocks.
pub struct OverflowBuffer {
    blocks: VecDeque<Block>,
    /// Read cursor within the head block
    rpoint: usize,
    block_size: usize,
    /// Bytes appended and not yet drained
    len: usize,
    peak_blocks: usize,
}

impl OverflowBuffer {
    /// Create an empty buffer holding a single empty block.
    pub fn new(block_size: usize) -> Self {
        let block_size = block_size.max(1);
        let mut blocks = VecDeque::new();
        blocks.push_back(Block::new(block_size));
        Self {
            blocks,
            rpoint: 0,
            block_size,
            len: 0,
            peak_blocks: 1,
        }
    }

    /// Append `bytes` at the tail, growing by one block at a time as needed.
    pub fn append(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            let needs_block = self.blocks.back().map_or(true, |b| b.room() == 0);
            if needs_block {
                self.blocks.push_back(Block::new(self.block_size));
                self.peak_blocks = self.peak_blocks.max(self.blocks.len());
            }

            let Some(tail) = self.blocks.back_mut() else {
                unreachable!("tail block was just ensured");
            };
            let n = tail.room().min(bytes.len());
            tail.data[tail.wpoint..tail.wpoint + n].copy_from_slice(&bytes[..n]);
            tail.wpoint += n;
            self.len += n;
            bytes = &bytes[n..];
        }
    }

    /// Copy up to `out.len()` bytes from the head into `out`, releasing
    /// blocks as they are exhausted. Returns the number of bytes copied.
    pub fn drain(&mut self, out: &mut [u8]) -> usize {
        let mut copied = 0;
        while copied < out.len() {
            self.release_exhausted_head();

            let Some(head) = self.blocks.front() else {
                break;
            };
            let ready = head.wpoint - self.rpoint;
            if ready == 0 {
                break;
            }

            let n = ready.min(out.len() - copied);
            out[copied..copied + n].copy_from_slice(&head.data[self.rpoint..self.rpoint + n]);
            self.rpoint += n;
            self.len -= n;
            copied += n;
        }
        self.release_exhausted_head();
        copied
    }

    fn release_exhausted_head(&mut self) {
        if self.blocks.len() > 1 && self.rpoint == self.block_size {
            self.blocks.pop_front();
            self.rpoint = 0;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes waiting to be drained.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Blocks currently held.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Most blocks held at any point.
    pub fn peak_blocks(&self) -> usize {
        self.peak_blocks
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}
