//! The simulated machine: physical memory, the current process and the
//! ready queue, plus the context-switch/fork engine.
//!
//! Every operation goes through an explicit `Machine`, so independent
//! simulations never share state.

use std::collections::VecDeque;

use log::{debug, info};

use crate::error::{FaultError, VmError};
use crate::fault::{self, FaultCause};
use crate::memory::{FrameNumber, PhysicalMemory};
use crate::page_table::VirtualPage;
use crate::process::{Pid, Process};
use crate::translation::{self, AccessKind};

/// What a context switch request ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// An existing process was taken off the ready queue
    Switched,
    /// No such process existed; a child with this pid was forked and queued
    Forked(Pid),
}

pub struct Machine {
    memory: PhysicalMemory,
    current: Option<Process>,
    ready: VecDeque<Process>,
}

impl Machine {
    /// A machine with `nr_frames` physical frames and no processes
    pub fn new(nr_frames: usize) -> Self {
        Machine {
            memory: PhysicalMemory::new(nr_frames),
            current: None,
            ready: VecDeque::new(),
        }
    }

    /// Create a process with an empty page table. The first one booted
    /// becomes current, later ones are queued behind the others.
    ///
    /// Fails with `DuplicatePid` when `pid` is already taken.
    pub fn boot(&mut self, pid: Pid) -> Result<(), VmError> {
        if self.process(pid).is_some() {
            return Err(VmError::DuplicatePid { pid });
        }

        let process = Process::new(pid);
        match self.current {
            None => {
                info!("booted pid {}", pid);
                self.current = Some(process);
            }
            Some(_) => self.ready.push_back(process),
        }
        Ok(())
    }

    pub fn memory(&self) -> &PhysicalMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut PhysicalMemory {
        &mut self.memory
    }

    pub fn current(&self) -> Option<&Process> {
        self.current.as_ref()
    }

    /// Processes waiting to run, head first
    pub fn ready_queue(&self) -> impl Iterator<Item = &Process> + '_ {
        self.ready.iter()
    }

    /// The current process followed by the ready queue
    pub fn processes(&self) -> impl Iterator<Item = &Process> + '_ {
        self.current.iter().chain(self.ready.iter())
    }

    /// Look a process up by pid, current or queued
    pub fn process(&self, pid: Pid) -> Option<&Process> {
        self.processes().find(|p| p.pid == pid)
    }

    /// Translate `vpn` of the current process. `Ok(None)` means the access
    /// faults and `handle_page_fault` should run.
    pub fn translate(&self, kind: AccessKind, vpn: u32) -> Result<Option<FrameNumber>, VmError> {
        let current = self.current.as_ref().ok_or(VmError::NoCurrentProcess)?;
        let page = VirtualPage::from_raw(vpn)?;
        Ok(translation::translate(&current.pagetable, kind, page))
    }

    /// Resolve a fault of the current process on `vpn`
    pub fn handle_page_fault(&mut self, kind: AccessKind, vpn: u32) -> Result<FaultCause, FaultError> {
        let current = self.current.as_mut().ok_or(VmError::NoCurrentProcess)?;
        let page = VirtualPage::from_raw(vpn)?;
        fault::handle_page_fault(&mut current.pagetable, &mut self.memory, kind, page)
    }

    /// Switch to process `pid`, forking it off the current process when no
    /// queued process has that id.
    ///
    /// The current process goes to the tail of the ready queue first. On a
    /// fork the caller is taken back off the tail and stays current, and
    /// the child is queued in its place, so the queue ends up as the old
    /// queue plus the child. See DESIGN.md, "Who is current after a
    /// fork-on-switch".
    pub fn switch_process(&mut self, pid: Pid) -> Result<SwitchOutcome, VmError> {
        let prev = self.current.take().ok_or(VmError::NoCurrentProcess)?;
        let prev_pid = prev.pid;
        self.ready.push_back(prev);

        // Scan the whole queue, the requested process may sit anywhere
        if let Some(idx) = self.ready.iter().position(|p| p.pid == pid) {
            self.current = self.ready.remove(idx);
            debug!("switched from pid {} to pid {}", prev_pid, pid);
            return Ok(SwitchOutcome::Switched);
        }

        let Some(mut parent) = self.ready.pop_back() else {
            unreachable!("ready queue lost the process just queued");
        };
        let child = self.fork(&mut parent, pid);
        self.current = Some(parent);
        self.ready.push_back(child);

        debug!("pid {} forked pid {}", prev_pid, pid);
        Ok(SwitchOutcome::Forked(pid))
    }

    /// Duplicate `parent` into a new process sharing every mapped frame
    /// read-only.
    fn fork(&mut self, parent: &mut Process, pid: Pid) -> Process {
        parent.pagetable.write_protect();

        let child = Process {
            pid,
            pagetable: parent.pagetable.clone(),
        };
        for (_, pte) in child.pagetable.mappings() {
            self.memory.get_frame(pte.pfn);
        }
        child
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new(crate::constants::NR_FRAMES)
    }
}
