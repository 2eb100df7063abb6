/// Kernel error codes.
///
/// Lock-discipline and state-machine contract violations are not errors;
/// they panic, since the shared table cannot be trusted afterwards.
#[repr(isize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// No free slot in the process table.
    OutOfProc = -1,
    /// The memory collaborator could not satisfy an allocation.
    OutOfMemory = -2,
    /// No process matches the given pid, or `wait` has nothing to reap.
    NoSuchProcess = -3,
    InvalidArgument = -4,
}

impl KernelError {
    pub fn as_str(&self) -> &'static str {
        match self {
            KernelError::OutOfProc => "out of proc slots",
            KernelError::OutOfMemory => "out of memory",
            KernelError::NoSuchProcess => "no such process",
            KernelError::InvalidArgument => "invalid argument",
        }
    }
}

impl core::fmt::Display for KernelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
