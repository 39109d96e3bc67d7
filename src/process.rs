//! The slice of the process abstraction this crate actually touches: a page
//! directory, a kernel stack, a saved kernel stack pointer, and the region
//! list. The process table and scheduler that own the rest of `Process` are
//! external collaborators (spec.md §1).

use crate::addr::{KernelPageId, VirtAddr};
use crate::collab::{PhysMemory, RegionSpace};
use crate::pagetable::{pg_index, pgtab_index, Pde, Pte};

/// A process's address space, as far as the VM core is concerned.
pub struct Process<R: RegionSpace> {
    pub pgdir: KernelPageId,
    pub kstack: KernelPageId,
    /// Saved kernel stack pointer, rebased on fork per spec.md §4.4.2 step 5.
    pub kesp: u32,
    /// Physical address of `pgdir`, as loaded into CR3.
    pub cr3: u32,
    pub regions: R,
}

impl<R: RegionSpace> Process<R> {
    pub fn new(pgdir: KernelPageId, kstack: KernelPageId, cr3: u32, regions: R) -> Process<R> {
        Process {
            pgdir,
            kstack,
            kesp: 0,
            cr3,
            regions,
        }
    }
}

/// `pde_of`: the PDE naming `addr`'s page table in `proc`'s directory.
pub fn pde_of<R: RegionSpace>(phys: &mut impl PhysMemory, proc: &Process<R>, addr: VirtAddr) -> Pde {
    let dir = phys.kpage_mut(proc.pgdir);
    let idx = pgtab_index(addr) * 4;
    let word = u32::from_le_bytes([dir[idx], dir[idx + 1], dir[idx + 2], dir[idx + 3]]);
    Pde::from_word(word)
}

/// Writes `pde` back into `proc`'s directory at `addr`'s slot.
pub fn set_pde_of<R: RegionSpace>(
    phys: &mut impl PhysMemory,
    proc: &Process<R>,
    addr: VirtAddr,
    pde: Pde,
) {
    let dir = phys.kpage_mut(proc.pgdir);
    let idx = pgtab_index(addr) * 4;
    dir[idx..idx + 4].copy_from_slice(&pde.to_word().to_le_bytes());
}

/// `pte_of`: the PTE for `addr`, reached by reconstructing the kernel-page id
/// of `addr`'s page table from the PDE and indexing by the middle bits.
///
/// Precondition: the PDE is present. Callers (ASO/FH) always install the
/// page table before mapping anything into it; this function does not check.
pub fn pte_of<R: RegionSpace>(phys: &mut impl PhysMemory, proc: &Process<R>, addr: VirtAddr) -> Pte {
    let pde = pde_of(phys, proc, addr);
    let table = pde.table();
    let pt = phys.kpage_mut(table);
    let idx = pg_index(addr) * 4;
    let word = u32::from_le_bytes([pt[idx], pt[idx + 1], pt[idx + 2], pt[idx + 3]]);
    Pte::from_word(word)
}

/// Writes `pte` back into `addr`'s page table slot.
pub fn set_pte_of<R: RegionSpace>(
    phys: &mut impl PhysMemory,
    proc: &Process<R>,
    addr: VirtAddr,
    pte: Pte,
) {
    let pde = pde_of(phys, proc, addr);
    let table = pde.table();
    let pt = phys.kpage_mut(table);
    let idx = pg_index(addr) * 4;
    pt[idx..idx + 4].copy_from_slice(&pte.to_word().to_le_bytes());
}
