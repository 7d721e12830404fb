use std::fmt;

use crate::page_table::PageTable;

/// Process identifier
pub type Pid = u32;

/// A simulated process: an id and the page table it owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    pub pid: Pid,
    pub pagetable: PageTable,
}

impl Process {
    /// A process with an empty page table
    pub fn new(pid: Pid) -> Self {
        Process {
            pid,
            pagetable: PageTable::new(),
        }
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pid {}", self.pid)?;
        for (vpn, pte) in self.pagetable.mappings() {
            writeln!(
                f,
                "  vpn {:3} -> pfn {:3} {}",
                vpn,
                pte.pfn,
                if pte.writable { "rw" } else { "ro" }
            )?;
        }
        Ok(())
    }
}
