//! Host-runnable fakes for the collaborator traits in [`crate::collab`].
//! Exists only under `#[cfg(test)]`: a real kernel supplies its own hardware
//! layer, file system, and region tracker.

use core::cell::RefCell;

use alloc::vec;
use alloc::vec::Vec;

use crate::addr::{FrameNo, KernelPageId, VirtAddr};
use crate::collab::{FileSource, Hal, InodeId, PhysMemory, ProcessRegion, RegionSpace};
use crate::config::{Layout, PAGE_SIZE};
use crate::error::VmError;

/// `Vec`-backed physical memory: one buffer per frame, one per kernel page.
pub struct FakePhysMemory {
    frames: Vec<[u8; PAGE_SIZE]>,
    kpages: Vec<[u8; PAGE_SIZE]>,
    frame_base: u32,
}

impl FakePhysMemory {
    pub fn new(layout: &Layout) -> FakePhysMemory {
        FakePhysMemory {
            frames: vec![[0u8; PAGE_SIZE]; layout.nr_frames],
            kpages: vec![[0u8; PAGE_SIZE]; layout.nr_kpages],
            frame_base: layout.ubase_phys >> crate::config::PAGE_SHIFT,
        }
    }
}

impl PhysMemory for FakePhysMemory {
    fn frame_mut(&mut self, frame: FrameNo) -> &mut [u8; PAGE_SIZE] {
        let idx = (frame.as_raw() - self.frame_base) as usize;
        &mut self.frames[idx]
    }

    fn kpage_mut(&mut self, kpg: KernelPageId) -> &mut [u8; PAGE_SIZE] {
        &mut self.kpages[kpg.as_raw() as usize]
    }
}

/// A [`FakePhysMemory`] plus a flush counter, satisfying [`Hal`].
pub struct FakeHal {
    phys: FakePhysMemory,
    pub flushes: u32,
}

impl FakeHal {
    pub fn new(layout: &Layout) -> FakeHal {
        FakeHal {
            phys: FakePhysMemory::new(layout),
            flushes: 0,
        }
    }
}

impl PhysMemory for FakeHal {
    fn frame_mut(&mut self, frame: FrameNo) -> &mut [u8; PAGE_SIZE] {
        self.phys.frame_mut(frame)
    }

    fn kpage_mut(&mut self, kpg: KernelPageId) -> &mut [u8; PAGE_SIZE] {
        self.phys.kpage_mut(kpg)
    }
}

impl Hal for FakeHal {
    fn tlb_flush(&mut self) {
        self.flushes += 1;
    }
}

/// A file backed by a fixed byte buffer. Reads past the end return 0, giving
/// the short-read behaviour spec.md treats as legal.
pub struct FakeFileSource {
    pub contents: Vec<u8>,
}

impl FileSource for FakeFileSource {
    fn read(&self, _inode: InodeId, buf: &mut [u8], off: u64) -> isize {
        let off = off as usize;
        if off >= self.contents.len() {
            return 0;
        }
        let avail = &self.contents[off..];
        let n = avail.len().min(buf.len());
        buf[..n].copy_from_slice(&avail[..n]);
        n as isize
    }
}

/// A file source that always reports a read error.
pub struct FailingFileSource;

impl FileSource for FailingFileSource {
    fn read(&self, _inode: InodeId, _buf: &mut [u8], _off: u64) -> isize {
        -1
    }
}

/// A fixed list of process regions with always-succeeding growth and a
/// lock ledger tests can inspect to confirm fault handlers unlock on every
/// exit path.
pub struct FakeRegionSpace {
    pub regions: Vec<ProcessRegion>,
    pub stack_idx: usize,
    pub lock_calls: RefCell<Vec<usize>>,
}

impl FakeRegionSpace {
    pub fn new(regions: Vec<ProcessRegion>, stack_idx: usize) -> FakeRegionSpace {
        FakeRegionSpace {
            regions,
            stack_idx,
            lock_calls: RefCell::new(Vec::new()),
        }
    }
}

impl RegionSpace for FakeRegionSpace {
    fn find_region(&self, addr: VirtAddr) -> Option<usize> {
        self.regions.iter().position(|r| r.contains(addr))
    }

    fn region(&self, idx: usize) -> &ProcessRegion {
        &self.regions[idx]
    }

    fn lock_region(&self, idx: usize) {
        self.lock_calls.borrow_mut().push(idx);
    }

    fn unlock_region(&self, idx: usize) {
        let mut calls = self.lock_calls.borrow_mut();
        let pos = calls
            .iter()
            .position(|&i| i == idx)
            .expect("unlock_region without a matching lock_region");
        calls.remove(pos);
    }

    fn grow_region(&mut self, idx: usize, bytes: u32) -> Result<(), VmError> {
        let r = &mut self.regions[idx];
        r.base = r.base - bytes;
        r.len += bytes;
        Ok(())
    }

    fn stack_region(&self) -> usize {
        self.stack_idx
    }
}
