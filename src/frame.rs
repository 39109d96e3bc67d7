//! Frame Allocator: a reference-counted bag of physical user-memory frames.
//! Knows nothing about virtual addresses or who is sharing what — that's
//! decided above it, in [`crate::aso`].

use alloc::vec;
use alloc::vec::Vec;

use crate::addr::FrameNo;
use crate::config::Layout;
use crate::error::VmError;

pub struct FrameAllocator {
    refs: Vec<u16>,
    base: u32,
}

impl FrameAllocator {
    pub fn new(layout: &Layout) -> FrameAllocator {
        FrameAllocator {
            refs: vec![0; layout.nr_frames],
            base: layout.ubase_phys >> crate::config::PAGE_SHIFT,
        }
    }

    /// First-fit allocation. Sets refcount to 1 and returns the frame number
    /// biased by `UBASE_PHYS >> PAGE_SHIFT`.
    pub fn alloc(&mut self) -> Option<FrameNo> {
        let idx = self.refs.iter().position(|&r| r == 0)?;
        self.refs[idx] = 1;
        Some(FrameNo::from_raw(self.base + idx as u32))
    }

    pub fn alloc_or_err(&mut self) -> Result<FrameNo, VmError> {
        self.alloc().ok_or_else(|| {
            log::warn!("frame: page frame pool overflow");
            VmError::OutOfFrames
        })
    }

    fn index_of(&self, frame: FrameNo) -> usize {
        (frame.as_raw() - self.base) as usize
    }

    /// Decrements the refcount. Panics on a double free.
    pub fn free(&mut self, frame: FrameNo) {
        let idx = self.index_of(frame);
        if self.refs[idx] == 0 {
            panic!("mm: double free on page frame");
        }
        self.refs[idx] -= 1;
    }

    /// Increments the refcount; used when a PTE is duplicated under COW.
    pub fn share(&mut self, frame: FrameNo) {
        let idx = self.index_of(frame);
        self.refs[idx] += 1;
    }

    pub fn is_shared(&self, frame: FrameNo) -> bool {
        self.refs[self.index_of(frame)] > 1
    }

    pub fn refcount(&self, frame: FrameNo) -> u16 {
        self.refs[self.index_of(frame)]
    }
}
