//! Shared collaborator fakes for unit tests.

use crate::error::KernelError;
use crate::file::{CwdRef, Fd, Files};
use crate::proc::Running;
use crate::swtch::{Context, ContextSwitch};
use crate::vm::{AddrSpace, KStack, Vm};

/// Memory collaborator that hands out numbered handles and counts what is
/// still live. `fail_after = Some(n)` makes the nth allocation from now fail
/// (`Some(0)` fails the very next one).
#[derive(Default)]
pub struct FakeVm {
    pub next: usize,
    pub live_stacks: usize,
    pub live_spaces: usize,
    pub fail_after: Option<usize>,
}

impl FakeVm {
    fn check_fail(&mut self) -> Result<(), KernelError> {
        match self.fail_after {
            Some(0) => {
                self.fail_after = None;
                Err(KernelError::OutOfMemory)
            }
            Some(n) => {
                self.fail_after = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Vm for FakeVm {
    fn alloc_stack(&mut self) -> Result<KStack, KernelError> {
        self.check_fail()?;
        self.next += 1;
        self.live_stacks += 1;
        Ok(KStack(self.next))
    }

    fn free_stack(&mut self, _stack: KStack) {
        self.live_stacks -= 1;
    }

    fn new_addr_space(&mut self) -> Result<AddrSpace, KernelError> {
        self.check_fail()?;
        self.next += 1;
        self.live_spaces += 1;
        Ok(AddrSpace(self.next))
    }

    fn dup_addr_space(&mut self, _space: AddrSpace, _size: usize) -> Result<AddrSpace, KernelError> {
        self.new_addr_space()
    }

    fn grow_addr_space(
        &mut self,
        _space: AddrSpace,
        size: usize,
        delta: isize,
    ) -> Result<usize, KernelError> {
        size.checked_add_signed(delta)
            .ok_or(KernelError::InvalidArgument)
    }

    fn free_addr_space(&mut self, _space: AddrSpace) {
        self.live_spaces -= 1;
    }

    fn activate(&mut self, _space: AddrSpace) {}
}

/// File collaborator that only counts outstanding references.
#[derive(Default)]
pub struct FakeFiles {
    pub open: usize,
    pub cwd_refs: usize,
}

impl Files for FakeFiles {
    fn dup(&mut self, fd: Fd) -> Fd {
        self.open += 1;
        fd
    }

    fn close(&mut self, _fd: Fd) {
        self.open -= 1;
    }

    fn dup_cwd(&mut self, cwd: CwdRef) -> CwdRef {
        self.cwd_refs += 1;
        cwd
    }

    fn put_cwd(&mut self, _cwd: CwdRef) {
        self.cwd_refs -= 1;
    }
}

/// Context-switch collaborator that runs a closure as the process body.
pub struct FnSwitch<F>(pub F);

impl<F: for<'a> FnMut(Running<'a>)> ContextSwitch for FnSwitch<F> {
    fn fork_context(&mut self, parent: Context) -> Context {
        parent
    }

    fn transfer(&mut self, proc: Running<'_>) {
        (self.0)(proc)
    }
}

fn do_yield(mut proc: Running<'_>) {
    proc.yield_now();
}

/// A switch whose processes always yield straight back, as if preempted by a
/// timer interrupt.
pub fn yield_switch() -> FnSwitch<fn(Running<'_>)> {
    FnSwitch(do_yield)
}
