//! Process table and CPU scheduler core for a small teaching kernel.
//!
//! This crate owns the lifecycle of every process (creation, state
//! transitions, parent/child relations, termination and reaping) and decides,
//! at every scheduling opportunity, which process runs next, using a
//! four-level feedback queue with aging-based promotion to prevent
//! starvation.
//!
//! Memory management, the register-level context switch, and the file system
//! are external collaborators reached through the narrow traits in [`vm`],
//! [`swtch`] and [`file`]. Everything else - the process control blocks, the
//! level queues, and the dispatch loop - lives behind one table-wide lock in
//! [`proc::ProcTable`].

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod error;
pub mod file;
pub mod param;
pub mod proc;
pub mod queue;
pub mod sched;
pub mod swtch;
pub mod vm;

#[cfg(test)]
mod test_util;

pub use error::KernelError;
pub use proc::{Channel, Pid, Proc, ProcState, ProcTable, Running, WaitOutcome};
pub use sched::Scheduler;
pub use swtch::{Context, ContextSwitch};
