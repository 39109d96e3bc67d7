//! Kernel Page Pool: a fixed set of kernel-virtual pages used for
//! kernel-internal allocations (page directories, page tables, kernel
//! stacks).

use alloc::vec;
use alloc::vec::Vec;

use crate::addr::KernelPageId;
use crate::collab::PhysMemory;
use crate::config::Layout;
use crate::error::VmError;

/// Reference counts for the kernel page pool. First-fit ascending, same as
/// the teacher's `getkpg`/`putkpg`: deterministic, and contention-free since
/// VM paths run with interrupts disabled on a single CPU.
pub struct KernelPagePool {
    refs: Vec<u8>,
}

impl KernelPagePool {
    pub fn new(layout: &Layout) -> KernelPagePool {
        KernelPagePool {
            refs: vec![0; layout.nr_kpages],
        }
    }

    /// Scans ascending for the first free page, marks it live, and optionally
    /// zeroes it. Returns `None` (after logging a pool-overflow diagnostic)
    /// on exhaustion.
    pub fn get_kpg(&mut self, clean: bool, phys: &mut impl PhysMemory) -> Option<KernelPageId> {
        let idx = self.refs.iter().position(|&r| r == 0)?;
        self.refs[idx] = 1;
        let id = KernelPageId::from_raw(idx as u32);
        if clean {
            phys.kpage_mut(id).fill(0);
        }
        Some(id)
    }

    /// Like [`get_kpg`](Self::get_kpg), but returns a typed error instead of
    /// `None` and logs the overflow, matching spec.md's "logs a
    /// pool-overflow diagnostic" requirement.
    pub fn get_kpg_or_err(
        &mut self,
        clean: bool,
        phys: &mut impl PhysMemory,
    ) -> Result<KernelPageId, VmError> {
        self.get_kpg(clean, phys).ok_or_else(|| {
            log::warn!("kpp: kernel page pool overflow");
            VmError::OutOfKernelPages
        })
    }

    /// Decrements the refcount. Panics on a double free — an invariant
    /// violation, not a runtime condition.
    pub fn put_kpg(&mut self, page: KernelPageId) {
        let idx = page.as_raw() as usize;
        if self.refs[idx] == 0 {
            panic!("mm: double free on kernel page");
        }
        self.refs[idx] -= 1;
    }

    /// Current refcount of a page. Used by invariant checks in tests.
    pub fn refcount(&self, page: KernelPageId) -> u8 {
        self.refs[page.as_raw() as usize]
    }
}
