//! Script driver: feeds instructions to a `Machine` the way the MMU and
//! the kernel would, translating first and faulting only on a miss.

use std::fmt;

use log::{debug, info};

use crate::error::VmError;
use crate::fault::FaultCause;
use crate::io::Instruction;
use crate::memory::FrameNumber;
use crate::process::Pid;
use crate::scheduler::{Machine, SwitchOutcome};
use crate::translation::AccessKind;

/// Word of a frame that reads and writes go to
const DATA_OFFSET: usize = 0;

/// Result of one memory access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRecord {
    pub pid: Pid,
    pub kind: AccessKind,
    pub vpn: u32,
    pub pfn: FrameNumber,
    /// Set when the first translation missed
    pub fault: Option<FaultCause>,
    /// Word read, or written
    pub value: u32,
}

impl fmt::Display for AccessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> pfn {}", self.kind, self.vpn, self.pfn)?;
        if let Some(cause) = self.fault {
            write!(f, " [fault: {}]", cause)?;
        }
        write!(f, " = {}", self.value)
    }
}

/// One line of the simulation trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    Access(AccessRecord),
    Switch { pid: Pid, outcome: SwitchOutcome },
    /// Page table dump of the current process
    Show(String),
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::Access(record) => write!(f, "{}", record),
            TraceEvent::Switch { pid, outcome: SwitchOutcome::Switched } => {
                write!(f, "s {} -> switched", pid)
            }
            TraceEvent::Switch { pid, outcome: SwitchOutcome::Forked(child) } => {
                write!(f, "s {} -> forked {}", pid, child)
            }
            TraceEvent::Show(dump) => write!(f, "{}", dump.trim_end()),
        }
    }
}

/// Drives a `Machine` through a script
pub struct Simulator {
    machine: Machine,
}

impl Simulator {
    /// Boot `init_pid` on a machine with `nr_frames` frames
    pub fn new(nr_frames: usize, init_pid: Pid) -> Result<Self, VmError> {
        let mut machine = Machine::new(nr_frames);
        machine.boot(init_pid)?;
        Ok(Simulator { machine })
    }

    /// Wrap an already prepared machine
    pub fn with_machine(machine: Machine) -> Self {
        Simulator { machine }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// Access `vpn` of the current process, faulting the page in if needed.
    /// Writes store `value`; reads return what the frame holds.
    pub fn access(&mut self, kind: AccessKind, vpn: u32, value: u32) -> Result<AccessRecord, VmError> {
        let (pfn, fault) = match self.machine.translate(kind, vpn)? {
            Some(pfn) => (pfn, None),
            None => {
                let cause = self.machine.handle_page_fault(kind, vpn)?;
                let Some(pfn) = self.machine.translate(kind, vpn)? else {
                    unreachable!("{} {} still faults after {}", kind, vpn, cause);
                };
                (pfn, Some(cause))
            }
        };

        let memory = self.machine.memory_mut();
        let value = match kind {
            AccessKind::Read => memory.read_word(pfn, DATA_OFFSET),
            AccessKind::Write => {
                memory.write_word(pfn, DATA_OFFSET, value);
                value
            }
        };

        let pid = self.machine.current().map_or(0, |p| p.pid);
        Ok(AccessRecord { pid, kind, vpn, pfn, fault, value })
    }

    pub fn switch_process(&mut self, pid: Pid) -> Result<SwitchOutcome, VmError> {
        self.machine.switch_process(pid)
    }

    /// Execute one instruction
    pub fn step(&mut self, instruction: &Instruction) -> Result<TraceEvent, VmError> {
        let event = match *instruction {
            Instruction::Access { kind, vpn, value } => TraceEvent::Access(self.access(kind, vpn, value)?),
            Instruction::Switch(pid) => TraceEvent::Switch {
                pid,
                outcome: self.switch_process(pid)?,
            },
            Instruction::Show => {
                let current = self.machine.current().ok_or(VmError::NoCurrentProcess)?;
                TraceEvent::Show(current.to_string())
            }
        };
        debug!("{}", event);
        Ok(event)
    }

    /// Run a whole script, stopping at the first error
    pub fn run(&mut self, instructions: &[Instruction]) -> Result<Vec<TraceEvent>, VmError> {
        let trace = instructions
            .iter()
            .map(|instruction| self.step(instruction))
            .collect::<Result<Vec<_>, _>>()?;

        let faults = trace
            .iter()
            .filter(|event| matches!(event, TraceEvent::Access(AccessRecord { fault: Some(_), .. })))
            .count();
        info!(
            "ran {} instructions, {} faults, {} frames in use, {} free",
            trace.len(),
            faults,
            self.machine.memory().allocated(),
            self.machine.memory().free_count()
        );
        Ok(trace)
    }
}
