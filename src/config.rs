//! Hardware/layout configuration.
//!
//! The teacher (`pmap.rs`) hardcodes a single address map as bare `const`s.
//! Here the numeric layout is pulled into a `Layout` value so a consumer can
//! size pools to its own memory map, while tests use a deliberately tiny one.

/// Page size in bytes. Fixed: the PTE/PDE bit layout this crate implements is
/// two-level 32-bit x86 paging, which only ever uses 4 KiB pages.
pub const PAGE_SIZE: usize = 4096;
pub const PAGE_SHIFT: u32 = 12;
pub const PAGE_MASK: u32 = !((1u32 << PAGE_SHIFT) - 1);

/// Entries per page directory / page table.
pub const NPDENTRIES: usize = 1024;
pub const NPTENTRIES: usize = 1024;

#[derive(Debug, Clone, Copy)]
pub struct Layout {
    /// Number of pages in the kernel page pool.
    pub nr_kpages: usize,
    /// Number of frames in the user-memory physical region.
    pub nr_frames: usize,
    /// Base of the user-memory physical region.
    pub ubase_phys: u32,
    /// Kernel-virtual base of the kernel page pool.
    pub kpool_virt: u32,
    /// Kernel-virtual base used to reconstruct a page table's address from a
    /// PDE frame number (`(frame << PAGE_SHIFT) + kbase_virt`).
    pub kbase_virt: u32,
    /// Size in bytes of a kernel stack (one or more kernel pages).
    pub kstack_size: usize,
    /// Virtual address whose PDE slot maps the kernel base.
    pub kbase_pde_vaddr: u32,
    /// Virtual address whose PDE slot maps the kernel page pool.
    pub kpool_pde_vaddr: u32,
    /// Virtual address whose PDE slot maps the initial ramdisk.
    pub initrd_pde_vaddr: u32,
}

/// A reasonably sized default layout, in the spirit of the teacher's own
/// `constants.rs` address map, but parameterized instead of hardcoded.
pub const DEFAULT: Layout = Layout {
    nr_kpages: 256,
    nr_frames: 8192,
    ubase_phys: 0x0040_0000,
    kpool_virt: 0xf000_0000,
    kbase_virt: 0xc000_0000,
    kstack_size: PAGE_SIZE,
    kbase_pde_vaddr: 0xc000_0000,
    kpool_pde_vaddr: 0xf000_0000,
    initrd_pde_vaddr: 0xe000_0000,
};

/// A tiny layout used by this crate's own tests so pool-exhaustion scenarios
/// run in a handful of iterations instead of thousands.
#[cfg(test)]
pub const TEST_LAYOUT: Layout = Layout {
    nr_kpages: 8,
    nr_frames: 8,
    ubase_phys: 0x0040_0000,
    kpool_virt: 0xf000_0000,
    kbase_virt: 0xc000_0000,
    kstack_size: PAGE_SIZE,
    kbase_pde_vaddr: 0xc000_0000,
    kpool_pde_vaddr: 0xf000_0000,
    initrd_pde_vaddr: 0xe000_0000,
};

/// Kernel page ids live in the pool `[kpool_virt, kpool_virt+pool size)`, a
/// region that (like all kernel memory) is offset-mapped from physical
/// memory starting at `kbase_virt`. `(kernel_virt(id) - kbase_virt)` is
/// therefore a valid physical address, matching the teacher's `PhysAddr`
/// conversions and the spec's `cr3 = kernel_virt(pgdir) - KBASE_VIRT`.
pub fn kpage_phys_addr(id: crate::addr::KernelPageId, layout: &Layout) -> u32 {
    (layout.kpool_virt - layout.kbase_virt) + (id.as_raw() << PAGE_SHIFT)
}

/// The kernel-virtual address a kernel page is mapped at, used to compute the
/// `kesp`/frame-pointer rebase deltas in `create_pgdir`.
pub fn kpage_kernel_vaddr(id: crate::addr::KernelPageId, layout: &Layout) -> u32 {
    layout.kpool_virt + (id.as_raw() << PAGE_SHIFT)
}
