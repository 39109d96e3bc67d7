//! Error types for recoverable VM-core failures.
//!
//! Invariant violations (double free, mapping over a busy PDE, marking a
//! present page, ...) are not represented here: they are programming bugs
//! and, per the teacher's `kpanic` convention, they panic instead.

/// Recoverable failures reported from the VM core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    /// The kernel page pool is exhausted.
    OutOfKernelPages,
    /// The frame allocator is exhausted.
    OutOfFrames,
    /// No region backs the faulting address, and it isn't a legal stack
    /// growth either.
    NoRegion,
    /// A one-page-below lookup found a region, but it wasn't the stack
    /// region.
    NotStackRegion,
    /// `grow_region` refused to extend the stack region.
    RegionGrowthFailed,
    /// The faulting PTE is neither demand-fill nor demand-zero.
    IllegalPteState,
    /// `pfault` was raised on a PTE that isn't copy-on-write.
    NotCopyOnWrite,
    /// `file_read` returned a negative count.
    FileReadFailed,
}
