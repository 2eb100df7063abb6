use crate::proc::Running;

/// Opaque saved execution context. The core copies it between control blocks
/// but never inspects register contents; only the context-switch collaborator
/// knows what is inside.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Context(pub usize);

/// Context-switch collaborator.
///
/// [`transfer`](ContextSwitch::transfer) is the hand-off point of the
/// dispatch loop: it resumes the chosen process and returns once that process
/// has given up the CPU again. Control comes back only after the process has
/// moved itself out of [`Running`](crate::proc::ProcState::Running) state by
/// yielding, sleeping, or exiting through the [`Running`] handle.
pub trait ContextSwitch {
    /// Duplicates a forked parent's saved state so the child resumes as if
    /// returning from the same call point with a zero result.
    fn fork_context(&mut self, parent: Context) -> Context;

    /// Runs the dispatched process until it yields, sleeps, or exits.
    ///
    /// The table lock stays held for the duration; `proc` is the only way the
    /// running process may touch the table.
    fn transfer(&mut self, proc: Running<'_>);
}

impl<S: ContextSwitch> ContextSwitch for &mut S {
    fn fork_context(&mut self, parent: Context) -> Context {
        (**self).fork_context(parent)
    }

    fn transfer(&mut self, proc: Running<'_>) {
        (**self).transfer(proc)
    }
}
