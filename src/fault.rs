//! Page fault handling: lazy directory creation, demand paging and
//! copy-on-write resolution.

use std::fmt;

use log::debug;

use crate::error::FaultError;
use crate::memory::{FrameAllocator, PhysicalMemory};
use crate::page_table::{PageTable, Pte, VirtualPage};
use crate::translation::AccessKind;

/// Why an access to a page faulted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCause {
    /// No inner directory covers the page
    MissingDirectory,
    /// The directory exists but the PTE was never populated
    InvalidEntry,
    /// Write to a valid, read-only PTE whose frame may be shared
    CopyOnWrite,
    /// The PTE already permits the access
    Spurious,
}

impl FaultCause {
    /// Work out which rule a fault on `page` falls under
    pub fn classify(pagetable: &PageTable, kind: AccessKind, page: VirtualPage) -> Self {
        match pagetable.pte(page) {
            None => FaultCause::MissingDirectory,
            Some(pte) if !pte.valid => FaultCause::InvalidEntry,
            Some(pte) if kind.is_write() && !pte.writable => FaultCause::CopyOnWrite,
            Some(_) => FaultCause::Spurious,
        }
    }
}

impl fmt::Display for FaultCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultCause::MissingDirectory => "no directory",
            FaultCause::InvalidEntry => "invalid pte",
            FaultCause::CopyOnWrite => "copy-on-write",
            FaultCause::Spurious => "spurious",
        };
        f.write_str(name)
    }
}

/// Resolve a fault on `page` so that a retried translation succeeds.
///
/// On `OutOfFrames` the page table is left as it was.
pub fn handle_page_fault(
    pagetable: &mut PageTable,
    memory: &mut PhysicalMemory,
    kind: AccessKind,
    page: VirtualPage,
) -> Result<FaultCause, FaultError> {
    let cause = FaultCause::classify(pagetable, kind, page);

    match cause {
        FaultCause::MissingDirectory => {
            let pfn = memory.allocate_frame()?;
            let pd = pagetable.install_directory(page.outer);
            pd.ptes[page.inner] = Pte::mapped(pfn);
            debug!("{} {}: new directory, pfn {}", kind, page, pfn);
        }
        FaultCause::InvalidEntry => {
            let Some(pte) = pagetable.pte_mut(page) else {
                unreachable!("invalid-entry fault without a directory");
            };
            let pfn = memory.allocate_frame()?;
            *pte = Pte::mapped(pfn);
            debug!("{} {}: demand paged, pfn {}", kind, page, pfn);
        }
        FaultCause::CopyOnWrite => {
            let Some(pte) = pagetable.pte_mut(page) else {
                unreachable!("copy-on-write fault without a directory");
            };
            let shared = pte.pfn;

            if memory.mapcount(shared) <= 1 {
                // Every other sharer already moved away
                pte.writable = true;
                debug!("{} {}: sole owner of pfn {}, made writable", kind, page, shared);
            } else {
                let pfn = memory.allocate_frame()?;
                memory.copy_frame(shared, pfn);
                memory.put_frame(shared);
                *pte = Pte::mapped(pfn);
                debug!("{} {}: copied pfn {} to pfn {}", kind, page, shared, pfn);
            }
        }
        FaultCause::Spurious => {
            debug!("{} {}: spurious fault", kind, page);
        }
    }

    Ok(cause)
}
