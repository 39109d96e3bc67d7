//! Virtual-memory core of a small Unix-like kernel: a reference-counted
//! kernel page pool, a reference-counted physical frame allocator, two-level
//! x86 page-table machinery, the address-space operations built on top of
//! it, and the validity/protection fault handlers that drive demand paging
//! and copy-on-write.
//!
//! Everything this crate does not own — the process table and scheduler,
//! the region abstraction's own locking and growth bookkeeping, the file
//! system, and the hardware layer — is expressed as a trait in
//! [`collab`]. A real kernel supplies the implementations; this crate's own
//! tests run against the fakes in [`testkit`].

#![cfg_attr(not(test), no_std)]

extern crate alloc;
#[cfg(test)]
extern crate std;

pub mod addr;
pub mod aso;
pub mod collab;
pub mod config;
pub mod error;
pub mod fault;
pub mod frame;
pub mod kpp;
pub mod pagetable;
pub mod process;

#[cfg(test)]
pub mod testkit;

pub use addr::{FrameNo, KernelPageId, VirtAddr};
pub use aso::{
    alloc_upg, copy_pg, cow_disable, cow_enable, cow_enabled, create_pgdir, destroy_pgdir, free_upg, link_upg,
    map_pgtab, mark_pg, read_pg, unmap_pgtab, NewAddressSpace, PageMark,
};
pub use collab::{FileBacking, FileSource, Hal, InodeId, PhysMemory, Region, RegionMode, RegionSpace};
pub use config::Layout;
pub use error::VmError;
pub use fault::{pfault, vfault};
pub use frame::FrameAllocator;
pub use kpp::KernelPagePool;
pub use pagetable::{Pde, Pte, PteState};
pub use process::Process;
