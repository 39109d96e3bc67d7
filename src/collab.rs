//! Seams for the collaborators this crate consumes but does not own: the
//! hardware layer, the file-system read path, and the memory-region
//! abstraction. Spec-wise these are out of scope; Rust-wise they become
//! traits so the core compiles, tests, and links against a real kernel
//! without this crate needing to know what "real" means.

use crate::addr::{FrameNo, KernelPageId, VirtAddr};
use crate::config::PAGE_SIZE;
use crate::error::VmError;

/// Byte-level access to the memory backing a frame or a kernel page.
///
/// In a real kernel this is pointer arithmetic off an identity/direct map
/// (`(frame << PAGE_SHIFT) + KBASE_VIRT`, as in the teacher's `PhysAddr::to_va`).
/// `testkit` backs it with plain `Vec`s so the core runs on the host.
pub trait PhysMemory {
    fn frame_mut(&mut self, frame: FrameNo) -> &mut [u8; PAGE_SIZE];
    fn kpage_mut(&mut self, kpg: KernelPageId) -> &mut [u8; PAGE_SIZE];
}

/// The hardware abstraction layer. Bundles TLB control together with the
/// physical-memory access every fault/ASO path already needs, since in
/// practice a kernel's "machine" object provides both. Everything here is
/// local-CPU, consistent with the single-CPU assumption in the spec.
pub trait Hal: PhysMemory {
    /// Invalidate cached virtual-to-physical translations on the current CPU.
    fn tlb_flush(&mut self);
}

/// Opaque inode handle for the file-backed demand-fill path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InodeId(pub u32);

/// `file_read(inode, buf, len, off) -> bytes_read_or_negative`.
pub trait FileSource {
    /// Reads at most `buf.len()` bytes from `inode` at byte offset `off`.
    /// Returns the number of bytes actually read, or a negative value on
    /// error. Short reads are expected and legal.
    fn read(&self, inode: InodeId, buf: &mut [u8], off: u64) -> isize;
}

bitflags::bitflags! {
    /// Permission bits on a region, as consumed by the VM core.
    pub struct RegionMode: u8 {
        const MAY_READ  = 0b0000_0001;
        const MAY_WRITE = 0b0000_0010;
        const MAY_EXEC  = 0b0000_0100;
    }
}

/// A region's file backing, when it has one.
#[derive(Debug, Clone, Copy)]
pub struct FileBacking {
    pub inode: InodeId,
    pub off: u64,
}

/// A contiguous virtual-address range with uniform permissions and optional
/// file backing. Owned by the region subsystem; this crate only reads it.
#[derive(Debug, Clone, Copy)]
pub struct Region {
    pub mode: RegionMode,
    pub file: Option<FileBacking>,
}

/// A region as attached to a particular process: its virtual-address range
/// plus the `Region` it shares with other process regions.
#[derive(Debug, Clone, Copy)]
pub struct ProcessRegion {
    pub base: VirtAddr,
    pub len: u32,
    pub region: Region,
}

impl ProcessRegion {
    pub fn contains(&self, addr: VirtAddr) -> bool {
        addr.0 >= self.base.0 && addr.0 < self.base.0 + self.len
    }
}

/// The region-lookup/locking/growth surface a process exposes to the fault
/// handlers. Out of scope per the spec: owned and implemented by the region
/// layer, not by this crate.
pub trait RegionSpace {
    /// Finds the process region containing `addr`, if any.
    fn find_region(&self, addr: VirtAddr) -> Option<usize>;

    fn region(&self, idx: usize) -> &ProcessRegion;

    /// Acquires the lock for region `idx`. No-op in single-threaded test
    /// doubles; a real region layer would block here.
    fn lock_region(&self, idx: usize);

    /// Releases the lock acquired by `lock_region`.
    fn unlock_region(&self, idx: usize);

    /// Extends region `idx` by `bytes` (growing downward for a stack).
    fn grow_region(&mut self, idx: usize, bytes: u32) -> Result<(), VmError>;

    /// The index of the process's stack region.
    fn stack_region(&self) -> usize;
}
