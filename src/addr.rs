//! Address and identifier newtypes.
//!
//! `FrameNo` and `KernelPageId` are opaque handles: the only way to produce a
//! live one is through [`crate::frame::FrameAllocator::alloc`] or
//! [`crate::kpp::KernelPagePool::get_kpg`]. Nothing in this crate fabricates
//! one out of a bare integer outside of `testkit`.

use core::ops::{Add, Sub};

use crate::config::PAGE_SHIFT;

/// A virtual address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VirtAddr(pub u32);

impl VirtAddr {
    pub fn new(addr: u32) -> VirtAddr {
        VirtAddr(addr)
    }

    /// Offset of this address within its page.
    pub fn page_offset(&self) -> u32 {
        self.0 & ((1 << PAGE_SHIFT) - 1)
    }

    /// This address rounded down to the start of its page.
    pub fn page_base(&self) -> VirtAddr {
        VirtAddr(self.0 & !((1 << PAGE_SHIFT) - 1))
    }

    /// Index of the containing page within its page table (the middle 10 bits).
    pub fn pt_index(&self) -> usize {
        ((self.0 >> PAGE_SHIFT) & 0x3ff) as usize
    }

    /// Index of the containing page table within the page directory (the top 10 bits).
    pub fn pd_index(&self) -> usize {
        ((self.0 >> 22) & 0x3ff) as usize
    }
}

impl Add<u32> for VirtAddr {
    type Output = VirtAddr;
    fn add(self, rhs: u32) -> VirtAddr {
        VirtAddr(self.0 + rhs)
    }
}

impl Sub<u32> for VirtAddr {
    type Output = VirtAddr;
    fn sub(self, rhs: u32) -> VirtAddr {
        VirtAddr(self.0 - rhs)
    }
}

/// A frame number in the user-memory physical region, i.e. a physical address
/// shifted right by `PAGE_SHIFT` and biased by `UBASE_PHYS >> PAGE_SHIFT`.
///
/// Only [`crate::frame::FrameAllocator`] is allowed to construct a live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameNo(u32);

impl FrameNo {
    pub(crate) fn from_raw(raw: u32) -> FrameNo {
        FrameNo(raw)
    }

    pub fn as_raw(&self) -> u32 {
        self.0
    }
}

/// An index into the kernel page pool. Only [`crate::kpp::KernelPagePool`]
/// hands one out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelPageId(u32);

impl KernelPageId {
    pub(crate) fn from_raw(raw: u32) -> KernelPageId {
        KernelPageId(raw)
    }

    pub fn as_raw(&self) -> u32 {
        self.0
    }
}
