//! Page-Table Machinery: typed accessors over page-directory and page-table
//! entries, plus a `PteState` sum type that names the five legal PTE states
//! spec.md describes as a flag-bit table.
//!
//! Spec.md's PTM hands back `&mut PDE`/`&mut PTE`. A safe Rust API over a
//! byte-addressed backing store (see [`crate::collab::PhysMemory`]) can't
//! alias a `u32` inside a `[u8; PAGE_SIZE]` as a live reference without
//! `unsafe`, so this module instead reads/writes entries by value: every
//! "get the PDE/PTE" call is paired with a "write it back" call at the one
//! call site that mutates it. The semantics spec.md describes are unchanged.

use crate::addr::{FrameNo, KernelPageId, VirtAddr};
use crate::config::PAGE_SHIFT;

bitflags::bitflags! {
    struct PdeFlags: u32 {
        const PRESENT  = 1 << 0;
        const WRITABLE = 1 << 1;
        const USER     = 1 << 2;
    }
}

bitflags::bitflags! {
    struct PteFlags: u32 {
        const PRESENT  = 1 << 0;
        const WRITABLE = 1 << 1;
        const USER     = 1 << 2;
        const COW      = 1 << 3;
        const ZERO     = 1 << 4;
        const FILL     = 1 << 5;
    }
}

/// A page-directory entry: {present, writable, user} plus the kernel-page id
/// of the page table it names when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pde {
    flags: u32,
    frame: u32,
}

impl Pde {
    pub fn clear_entry() -> Pde {
        Pde { flags: 0, frame: 0 }
    }

    pub(crate) fn from_word(word: u32) -> Pde {
        Pde {
            flags: word & 0xfff,
            frame: word >> PAGE_SHIFT,
        }
    }

    pub(crate) fn to_word(self) -> u32 {
        (self.frame << PAGE_SHIFT) | self.flags
    }

    /// `pde_init`: sets {present, writable, user} = 1.
    pub fn init(frame: KernelPageId) -> Pde {
        Pde {
            flags: (PdeFlags::PRESENT | PdeFlags::WRITABLE | PdeFlags::USER).bits(),
            frame: frame.as_raw(),
        }
    }

    /// `pde_clear`: zeros present/writable/user.
    pub fn clear(&mut self) {
        *self = Pde::clear_entry();
    }

    /// `pde_is_clear`: true iff not present.
    pub fn is_clear(&self) -> bool {
        !self.is_present()
    }

    pub fn is_present(&self) -> bool {
        self.flags & PdeFlags::PRESENT.bits() != 0
    }

    pub fn table(&self) -> KernelPageId {
        KernelPageId::from_raw(self.frame)
    }
}

/// A page-table entry: {present, writable, user, cow, zero, fill} plus the
/// frame number of the user page it names when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pte {
    flags: u32,
    frame: u32,
}

/// The five mutually structured PTE states from spec.md §3's table, as a sum
/// type, per spec.md's own Design Notes §9 recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PteState {
    Clear,
    Fill,
    Zero,
    Present { writable: bool, cow: bool },
}

impl Pte {
    pub fn clear_entry() -> Pte {
        Pte { flags: 0, frame: 0 }
    }

    pub(crate) fn from_word(word: u32) -> Pte {
        Pte {
            flags: word & 0xfff,
            frame: word >> PAGE_SHIFT,
        }
    }

    pub(crate) fn to_word(self) -> u32 {
        (self.frame << PAGE_SHIFT) | self.flags
    }

    /// `pte_init(writable)`: present=1, user=1, writable=writable, cow/zero/fill cleared.
    pub fn init(frame: FrameNo, writable: bool) -> Pte {
        let mut flags = PteFlags::PRESENT | PteFlags::USER;
        if writable {
            flags |= PteFlags::WRITABLE;
        }
        Pte {
            flags: flags.bits(),
            frame: frame.as_raw(),
        }
    }

    /// `pte_clear`: zeros present/cow/zero/fill (writable/user bits are not
    /// meaningful once present is cleared, so they are dropped too).
    pub fn clear(&mut self) {
        *self = Pte::clear_entry();
    }

    pub fn is_present(&self) -> bool {
        self.flags & PteFlags::PRESENT.bits() != 0
    }

    pub fn is_fill(&self) -> bool {
        self.flags & PteFlags::FILL.bits() != 0
    }

    pub fn is_zero(&self) -> bool {
        self.flags & PteFlags::ZERO.bits() != 0
    }

    pub fn is_writable(&self) -> bool {
        self.flags & PteFlags::WRITABLE.bits() != 0
    }

    pub fn is_cow(&self) -> bool {
        self.flags & PteFlags::COW.bits() != 0
    }

    /// `pte_is_clear`: true iff none of {present, fill, zero} is set.
    pub fn is_clear(&self) -> bool {
        !(self.is_present() || self.is_fill() || self.is_zero())
    }

    pub fn frame(&self) -> FrameNo {
        FrameNo::from_raw(self.frame)
    }

    pub fn set_frame(&mut self, frame: FrameNo) {
        self.frame = frame.as_raw();
    }

    fn set_flag(&mut self, flag: PteFlags, on: bool) {
        let mut f = PteFlags::from_bits_truncate(self.flags);
        f.set(flag, on);
        self.flags = f.bits();
    }

    pub fn set_writable(&mut self, on: bool) {
        self.set_flag(PteFlags::WRITABLE, on);
    }

    pub fn set_cow(&mut self, on: bool) {
        self.set_flag(PteFlags::COW, on);
    }

    pub fn set_fill(&mut self, on: bool) {
        self.set_flag(PteFlags::FILL, on);
    }

    pub fn set_zero(&mut self, on: bool) {
        self.set_flag(PteFlags::ZERO, on);
    }

    /// `pte_copy`: verbatim duplication of the semantic flag bits. The frame
    /// number is deliberately NOT copied.
    pub fn copy_flags_from(&mut self, src: &Pte) {
        self.flags = src.flags;
    }

    /// The sum-type view of this entry's state.
    pub fn state(&self) -> PteState {
        if self.is_present() {
            PteState::Present {
                writable: self.is_writable(),
                cow: self.is_cow(),
            }
        } else if self.is_fill() {
            PteState::Fill
        } else if self.is_zero() {
            PteState::Zero
        } else {
            PteState::Clear
        }
    }
}

/// `PGTAB(addr)`: index of `addr`'s page table within the page directory.
pub fn pgtab_index(addr: VirtAddr) -> usize {
    addr.pd_index()
}

/// `PG(addr)`: index of `addr`'s page within its page table.
pub fn pg_index(addr: VirtAddr) -> usize {
    addr.pt_index()
}
