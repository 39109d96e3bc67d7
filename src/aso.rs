//! Address-Space Operations: everything that mutates a process's page
//! directory or user page tables. Built on top of the Kernel Page Pool, the
//! Frame Allocator, and the by-value PDE/PTE accessors in
//! [`crate::pagetable`]/[`crate::process`].

use crate::addr::{KernelPageId, VirtAddr};
use crate::collab::{FileSource, Hal, PhysMemory, ProcessRegion, RegionMode, RegionSpace};
use crate::config::{self, Layout, PAGE_SHIFT, PAGE_SIZE};
use crate::error::VmError;
use crate::frame::FrameAllocator;
use crate::kpp::KernelPagePool;
use crate::pagetable::{pg_index, pgtab_index, Pde, Pte, PteState};
use crate::process::{self, Process};

/// The mark a not-yet-present PTE carries: whether a fault should demand-fill
/// it from a file or demand-zero it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMark {
    Fill,
    Zero,
}

/// 4.4.1: installs a page table into a process's directory.
///
/// Precondition: the target PDE is clear. Violating it is fatal, per
/// spec.md's "violating it is fatal" wording for this step.
pub fn map_pgtab<R: RegionSpace>(
    hal: &mut impl Hal,
    proc: &Process<R>,
    is_current: bool,
    addr: VirtAddr,
    pgtab: KernelPageId,
) {
    let pde = process::pde_of(hal, proc, addr);
    if !pde.is_clear() {
        panic!("mm: map_pgtab on a non-clear PDE");
    }
    process::set_pde_of(hal, proc, addr, Pde::init(pgtab));
    if is_current {
        hal.tlb_flush();
    }
}

/// 4.4.1: removes a page table from a process's directory.
///
/// Precondition: the target PDE is present (not clear). See DESIGN.md for
/// why this crate takes the non-inverted reading of the source's check.
pub fn unmap_pgtab<R: RegionSpace>(
    hal: &mut impl Hal,
    proc: &Process<R>,
    is_current: bool,
    addr: VirtAddr,
) {
    let pde = process::pde_of(hal, proc, addr);
    if pde.is_clear() {
        panic!("mm: unmap_pgtab on an already-clear PDE");
    }
    process::set_pde_of(hal, proc, addr, Pde::clear_entry());
    if is_current {
        hal.tlb_flush();
    }
}

/// The handles a freshly created address space publishes. Its region list is
/// not populated here; that is the region layer's job, driven by the
/// process-fork path (spec.md §4.4.2 step 3's note).
#[derive(Debug, Clone, Copy)]
pub struct NewAddressSpace {
    pub pgdir: KernelPageId,
    pub kstack: KernelPageId,
    pub kesp: u32,
    pub cr3: u32,
}

fn copy_pde_slot(phys: &mut impl PhysMemory, src_dir: KernelPageId, dst_dir: KernelPageId, addr: VirtAddr) {
    let idx = pgtab_index(addr) * 4;
    let word = {
        let src = phys.kpage_mut(src_dir);
        u32::from_le_bytes([src[idx], src[idx + 1], src[idx + 2], src[idx + 3]])
    };
    let dst = phys.kpage_mut(dst_dir);
    dst[idx..idx + 4].copy_from_slice(&word.to_le_bytes());
}

/// 4.4.2: builds a new address space sharing the four kernel PDE slots with
/// `cur`, with its own directory and kernel stack.
///
/// `in_kernel_mode` mirrors spec.md step 6: true when `cur` is executing in
/// kernel mode with a live interrupt-stack frame, in which case the saved
/// frame pointer at the top of the new kernel stack is rebased too.
pub fn create_pgdir<R: RegionSpace>(
    kpp: &mut KernelPagePool,
    phys: &mut impl PhysMemory,
    layout: &Layout,
    cur: &Process<R>,
    cur_kesp: u32,
    in_kernel_mode: bool,
) -> Result<NewAddressSpace, VmError> {
    let directory = kpp.get_kpg_or_err(true, phys)?;

    let kstack = match kpp.get_kpg_or_err(false, phys) {
        Ok(kstack) => kstack,
        Err(e) => {
            kpp.put_kpg(directory);
            return Err(e);
        }
    };

    copy_pde_slot(phys, cur.pgdir, directory, VirtAddr::new(0));
    copy_pde_slot(phys, cur.pgdir, directory, VirtAddr::new(layout.kbase_pde_vaddr));
    copy_pde_slot(phys, cur.pgdir, directory, VirtAddr::new(layout.kpool_pde_vaddr));
    copy_pde_slot(phys, cur.pgdir, directory, VirtAddr::new(layout.initrd_pde_vaddr));

    let mut stack_copy = [0u8; PAGE_SIZE];
    {
        let src = phys.kpage_mut(cur.kstack);
        stack_copy[..layout.kstack_size].copy_from_slice(&src[..layout.kstack_size]);
    }
    {
        let dst = phys.kpage_mut(kstack);
        dst[..layout.kstack_size].copy_from_slice(&stack_copy[..layout.kstack_size]);
    }

    let base_cur = config::kpage_kernel_vaddr(cur.kstack, layout);
    let base_new = config::kpage_kernel_vaddr(kstack, layout);
    let delta = base_new.wrapping_sub(base_cur);
    let kesp_new = cur_kesp.wrapping_add(delta);

    if in_kernel_mode {
        let off = layout.kstack_size - 4;
        let word = {
            let buf = phys.kpage_mut(kstack);
            u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
        };
        let rebased = word.wrapping_add(delta);
        let buf = phys.kpage_mut(kstack);
        buf[off..off + 4].copy_from_slice(&rebased.to_le_bytes());
    }

    Ok(NewAddressSpace {
        pgdir: directory,
        kstack,
        kesp: kesp_new,
        cr3: config::kpage_phys_addr(directory, layout),
    })
}

/// 4.4.3: returns a directory and kernel stack to the KPP. User mappings and
/// frames must already be gone; the caller (region layer) is responsible.
pub fn destroy_pgdir(kpp: &mut KernelPagePool, pgdir: KernelPageId, kstack: KernelPageId) {
    kpp.put_kpg(pgdir);
    kpp.put_kpg(kstack);
}

/// 4.4.4: allocates a frame, maps it at `vaddr`'s page, and zeroes it.
pub fn alloc_upg<R: RegionSpace>(
    fa: &mut FrameAllocator,
    hal: &mut impl Hal,
    proc: &Process<R>,
    vaddr: VirtAddr,
    writable: bool,
) -> Result<(), VmError> {
    let frame = fa.alloc_or_err()?;
    let page_addr = vaddr.page_base();
    process::set_pte_of(hal, proc, page_addr, Pte::init(frame, writable));
    hal.tlb_flush();
    hal.frame_mut(frame).fill(0);
    Ok(())
}

/// 4.4.5: demand-fills a page from its backing file.
pub fn read_pg<R: RegionSpace>(
    fa: &mut FrameAllocator,
    hal: &mut impl Hal,
    file: &impl FileSource,
    proc: &Process<R>,
    region: &ProcessRegion,
    vaddr: VirtAddr,
) -> Result<(), VmError> {
    let page_addr = vaddr.page_base();
    let writable = region.region.mode.contains(RegionMode::MAY_WRITE);
    alloc_upg(fa, hal, proc, page_addr, writable)?;

    let backing = region
        .region
        .file
        .expect("read_pg on a region with no file backing");
    // `off = file.off + (PG(addr) << PAGE_SHIFT)`: the file offset tracks the
    // page-table index of the faulting address, not its offset into the
    // region. A region is only ever demand-filled from the start of its
    // backing file, so the two coincide for a page-table-aligned region base
    // and diverge otherwise.
    let off = backing.off + ((pg_index(page_addr) as u64) << PAGE_SHIFT);
    let pte = process::pte_of(hal, proc, page_addr);
    let buf = hal.frame_mut(pte.frame());
    let n = file.read(backing.inode, buf, off);

    if n < 0 {
        free_upg(fa, hal, proc, page_addr);
        return Err(VmError::FileReadFailed);
    }
    Ok(())
}

/// 4.4.6: duplicates a present page into a freshly allocated frame.
///
/// Precondition: `src` is present; this performs no I/O.
pub fn copy_pg(fa: &mut FrameAllocator, hal: &mut impl Hal, src: Pte) -> Result<Pte, VmError> {
    let new_frame = fa.alloc_or_err()?;
    let mut dst = Pte::clear_entry();
    dst.copy_flags_from(&src);
    dst.set_frame(new_frame);

    let src_bytes = *hal.frame_mut(src.frame());
    hal.frame_mut(new_frame).copy_from_slice(&src_bytes);

    Ok(dst)
}

/// 4.4.7: releases a user page's frame (if any) and clears its PTE.
pub fn free_upg<R: RegionSpace>(fa: &mut FrameAllocator, hal: &mut impl Hal, proc: &Process<R>, vaddr: VirtAddr) {
    let page_addr = vaddr.page_base();
    let pte = process::pte_of(hal, proc, page_addr);
    match pte.state() {
        PteState::Clear => {}
        PteState::Fill | PteState::Zero => {
            process::set_pte_of(hal, proc, page_addr, Pte::clear_entry());
            hal.tlb_flush();
        }
        PteState::Present { .. } => {
            fa.free(pte.frame());
            process::set_pte_of(hal, proc, page_addr, Pte::clear_entry());
            hal.tlb_flush();
        }
    }
}

/// 4.4.8: marks a not-yet-present PTE as demand-fill or demand-zero.
///
/// Precondition: `pte` is not present; marking a present page is fatal.
pub fn mark_pg(pte: &mut Pte, mark: PageMark) {
    if pte.is_present() {
        panic!("mm: demand fill on a present page");
    }
    match mark {
        PageMark::Fill => {
            pte.set_fill(true);
            pte.set_zero(false);
        }
        PageMark::Zero => {
            pte.set_fill(false);
            pte.set_zero(true);
        }
    }
}

/// 4.4.9: shares a user mapping from parent (`src`) into child (`dst`),
/// downgrading a writable parent mapping to copy-on-write.
pub fn link_upg(fa: &mut FrameAllocator, src: &mut Pte, dst: &mut Pte) {
    if src.is_clear() {
        return;
    }

    if !src.is_present() {
        if src.is_fill() || src.is_zero() {
            dst.copy_flags_from(src);
            return;
        }
        panic!("mm: linking invalid user page");
    }

    if src.is_writable() {
        cow_enable(src);
    }

    fa.share(src.frame());
    dst.copy_flags_from(src);
    dst.set_frame(src.frame());
}

/// 4.4.10: downgrades a writable PTE to copy-on-write.
pub fn cow_enable(pte: &mut Pte) {
    pte.set_cow(true);
    pte.set_writable(false);
}

/// 4.4.10: true iff `pte` is copy-on-write (cow set, writable clear).
pub fn cow_enabled(pte: &Pte) -> bool {
    pte.is_cow() && !pte.is_writable()
}

/// 4.4.10: resolves copy-on-write on a write fault, copying the frame only
/// if it is still shared with another mapping.
pub fn cow_disable(fa: &mut FrameAllocator, hal: &mut impl Hal, pte: &mut Pte) -> Result<(), VmError> {
    if fa.is_shared(pte.frame()) {
        let new_pte = copy_pg(fa, hal, *pte)?;
        fa.free(pte.frame());
        *pte = new_pte;
    }
    pte.set_cow(false);
    pte.set_writable(true);
    Ok(())
}
