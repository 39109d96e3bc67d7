//! Fault Handlers: the two trap-time entry points that turn a validity or
//! protection fault into demand paging or copy-on-write resolution.
//!
//! Both handlers assume they are entered with interrupts disabled (spec.md
//! §5) and take the region lock before touching any PTE, releasing it on
//! every exit path — including the early returns below.

use crate::addr::VirtAddr;
use crate::aso::{alloc_upg, cow_disable, cow_enabled, read_pg};
use crate::collab::{FileSource, Hal, PhysMemory, RegionMode, RegionSpace};
use crate::config::PAGE_SIZE;
use crate::error::VmError;
use crate::frame::FrameAllocator;
use crate::pagetable::PteState;
use crate::process::{pte_of, set_pte_of, Process};

/// 4.5.1: resolves a validity fault at `addr` — a reference to a PTE that is
/// not present, either because it is demand-paged or because it falls one
/// page below a stack region that should grow to cover it.
pub fn vfault<R: RegionSpace>(
    fa: &mut FrameAllocator,
    hal: &mut impl Hal,
    file: &impl FileSource,
    proc: &mut Process<R>,
    addr: VirtAddr,
) -> Result<(), VmError> {
    let idx = match proc.regions.find_region(addr) {
        Some(idx) => idx,
        None => {
            let below = addr + PAGE_SIZE as u32;
            let idx = proc.regions.find_region(below).ok_or(VmError::NoRegion)?;
            if idx != proc.regions.stack_region() {
                return Err(VmError::NotStackRegion);
            }
            proc.regions
                .grow_region(idx, PAGE_SIZE as u32)
                .map_err(|_| VmError::RegionGrowthFailed)?;
            idx
        }
    };

    proc.regions.lock_region(idx);
    let result = resolve_validity_fault(fa, hal, file, proc, idx, addr);
    proc.regions.unlock_region(idx);
    result
}

fn resolve_validity_fault<R: RegionSpace>(
    fa: &mut FrameAllocator,
    hal: &mut impl Hal,
    file: &impl FileSource,
    proc: &Process<R>,
    idx: usize,
    addr: VirtAddr,
) -> Result<(), VmError> {
    let page_addr = addr.page_base();
    let pte = pte_of(hal, proc, page_addr);
    match pte.state() {
        PteState::Fill => {
            let region = *proc.regions.region(idx);
            read_pg(fa, hal, file, proc, &region, page_addr)
        }
        PteState::Zero => {
            let writable = proc.regions.region(idx).region.mode.contains(RegionMode::MAY_WRITE);
            alloc_upg(fa, hal, proc, page_addr, writable)
        }
        PteState::Clear | PteState::Present { .. } => Err(VmError::IllegalPteState),
    }
}

/// 4.5.2: resolves a protection fault at `addr` by disabling copy-on-write,
/// copying the frame only if it is still shared.
pub fn pfault<R: RegionSpace>(
    fa: &mut FrameAllocator,
    hal: &mut impl Hal,
    proc: &Process<R>,
    addr: VirtAddr,
) -> Result<(), VmError> {
    let idx = proc.regions.find_region(addr).ok_or(VmError::NoRegion)?;

    proc.regions.lock_region(idx);
    let page_addr = addr.page_base();
    let mut pte = pte_of(hal, proc, page_addr);

    let result = if !cow_enabled(&pte) {
        Err(VmError::NotCopyOnWrite)
    } else {
        cow_disable(fa, hal, &mut pte).map(|()| {
            set_pte_of(hal, proc, page_addr, pte);
        })
    };

    proc.regions.unlock_region(idx);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use crate::addr::KernelPageId;
    use crate::aso::{link_upg, map_pgtab, mark_pg, PageMark};
    use crate::collab::{FileBacking, InodeId, Region, RegionMode};
    use crate::config::TEST_LAYOUT;
    use crate::pagetable::Pte;
    use crate::process::{self, Process};
    use crate::testkit::{FakeFileSource, FakeHal, FakeRegionSpace};

    fn proc_with_regions(regions: Vec<crate::collab::ProcessRegion>, stack_idx: usize) -> Process<FakeRegionSpace> {
        let regions = FakeRegionSpace::new(regions, stack_idx);
        Process::new(KernelPageId::from_raw(0), KernelPageId::from_raw(1), 0, regions)
    }

    fn heap_region(base: u32, len: u32, mode: RegionMode, file: Option<FileBacking>) -> crate::collab::ProcessRegion {
        crate::collab::ProcessRegion {
            base: VirtAddr::new(base),
            len,
            region: Region { mode, file },
        }
    }

    #[test]
    fn vfault_demand_zero_allocates_and_clears_zero_state() {
        let mut hal = FakeHal::new(&TEST_LAYOUT);
        let mut fa = FrameAllocator::new(&TEST_LAYOUT);
        let region = heap_region(0x1000, 0x2000, RegionMode::MAY_READ | RegionMode::MAY_WRITE, None);
        let mut proc = proc_with_regions(alloc::vec![region], 0);
        let addr = VirtAddr::new(0x1000);
        map_pgtab(&mut hal, &proc, true, addr, KernelPageId::from_raw(2));

        let mut pte = Pte::clear_entry();
        mark_pg(&mut pte, PageMark::Zero);
        process::set_pte_of(&mut hal, &proc, addr, pte);

        let file = FakeFileSource { contents: Vec::new() };
        vfault(&mut fa, &mut hal, &file, &mut proc, addr).unwrap();

        let resolved = process::pte_of(&mut hal, &proc, addr);
        assert!(resolved.is_present());
        assert!(resolved.is_writable());
    }

    #[test]
    fn vfault_demand_fill_reads_from_file() {
        let mut hal = FakeHal::new(&TEST_LAYOUT);
        let mut fa = FrameAllocator::new(&TEST_LAYOUT);
        let backing = FileBacking { inode: InodeId(1), off: 0 };
        // Region base page-table-aligned with vaddr 0 so the page-table
        // index `read_pg` keys its file offset on is 0, matching `off: 0`.
        let region = heap_region(0x0, 0x2000, RegionMode::MAY_READ, Some(backing));
        let mut proc = proc_with_regions(alloc::vec![region], 0);
        let addr = VirtAddr::new(0x0);
        map_pgtab(&mut hal, &proc, true, addr, KernelPageId::from_raw(2));

        let mut pte = Pte::clear_entry();
        mark_pg(&mut pte, PageMark::Fill);
        process::set_pte_of(&mut hal, &proc, addr, pte);

        let file = FakeFileSource { contents: alloc::vec![9, 9, 9] };
        vfault(&mut fa, &mut hal, &file, &mut proc, addr).unwrap();

        let resolved = process::pte_of(&mut hal, &proc, addr);
        let buf = hal.frame_mut(resolved.frame());
        assert_eq!(&buf[..3], &[9, 9, 9]);
    }

    #[test]
    fn vfault_grows_stack_one_page_below() {
        let mut hal = FakeHal::new(&TEST_LAYOUT);
        let mut fa = FrameAllocator::new(&TEST_LAYOUT);
        let stack = heap_region(0x2000, 0x1000, RegionMode::MAY_READ | RegionMode::MAY_WRITE, None);
        let mut proc = proc_with_regions(alloc::vec![stack], 0);
        let fault_addr = VirtAddr::new(0x1000);
        map_pgtab(&mut hal, &proc, true, fault_addr, KernelPageId::from_raw(2));

        let mut pte = Pte::clear_entry();
        mark_pg(&mut pte, PageMark::Zero);
        process::set_pte_of(&mut hal, &proc, fault_addr, pte);

        let file = FakeFileSource { contents: Vec::new() };
        vfault(&mut fa, &mut hal, &file, &mut proc, fault_addr).unwrap();

        assert_eq!(proc.regions.region(0).base, VirtAddr::new(0x1000));
        assert_eq!(proc.regions.region(0).len, 0x2000);
    }

    #[test]
    fn vfault_below_non_stack_region_fails() {
        let mut hal = FakeHal::new(&TEST_LAYOUT);
        let mut fa = FrameAllocator::new(&TEST_LAYOUT);
        let heap = heap_region(0x2000, 0x1000, RegionMode::MAY_READ, None);
        let mut proc = proc_with_regions(alloc::vec![heap], 0);
        let file = FakeFileSource { contents: Vec::new() };

        let err = vfault(&mut fa, &mut hal, &file, &mut proc, VirtAddr::new(0x1000)).unwrap_err();
        assert_eq!(err, VmError::NotStackRegion);
    }

    #[test]
    fn pfault_resolves_cow_and_unlocks() {
        let mut hal = FakeHal::new(&TEST_LAYOUT);
        let mut fa = FrameAllocator::new(&TEST_LAYOUT);
        let region = heap_region(0x1000, 0x2000, RegionMode::MAY_READ | RegionMode::MAY_WRITE, None);
        let proc = proc_with_regions(alloc::vec![region], 0);
        let addr = VirtAddr::new(0x1000);
        map_pgtab(&mut hal, &proc, true, addr, KernelPageId::from_raw(2));

        let frame = fa.alloc().unwrap();
        let mut parent_pte = Pte::init(frame, true);
        let mut child_pte = Pte::clear_entry();
        link_upg(&mut fa, &mut parent_pte, &mut child_pte);
        process::set_pte_of(&mut hal, &proc, addr, child_pte);

        pfault(&mut fa, &mut hal, &proc, addr).unwrap();

        let resolved = process::pte_of(&mut hal, &proc, addr);
        assert!(!cow_enabled(&resolved));
        assert!(resolved.is_writable());
        assert!(proc.regions.lock_calls.borrow().is_empty());
    }

    #[test]
    fn pfault_on_non_cow_pte_fails() {
        let mut hal = FakeHal::new(&TEST_LAYOUT);
        let mut fa = FrameAllocator::new(&TEST_LAYOUT);
        let region = heap_region(0x1000, 0x2000, RegionMode::MAY_READ | RegionMode::MAY_WRITE, None);
        let proc = proc_with_regions(alloc::vec![region], 0);
        let addr = VirtAddr::new(0x1000);
        map_pgtab(&mut hal, &proc, true, addr, KernelPageId::from_raw(2));

        let frame = fa.alloc().unwrap();
        process::set_pte_of(&mut hal, &proc, addr, Pte::init(frame, true));

        let err = pfault(&mut fa, &mut hal, &proc, addr).unwrap_err();
        assert_eq!(err, VmError::NotCopyOnWrite);
    }
}
