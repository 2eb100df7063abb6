use crate::error::KernelError;

/// Opaque handle to a process's kernel stack, owned by the memory
/// collaborator. The core only stores it and hands it back for disposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KStack(pub usize);

/// Opaque handle to a user address space, owned by the memory collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrSpace(pub usize);

/// Memory and address-space collaborator.
///
/// The table lock is never held across these calls except for `free_stack`
/// and `free_addr_space` during reaping, which must not block.
pub trait Vm {
    fn alloc_stack(&mut self) -> Result<KStack, KernelError>;
    fn free_stack(&mut self, stack: KStack);

    fn new_addr_space(&mut self) -> Result<AddrSpace, KernelError>;

    /// Copy-on-fork duplication of the first `size` bytes of `space`.
    fn dup_addr_space(&mut self, space: AddrSpace, size: usize) -> Result<AddrSpace, KernelError>;

    /// Grows (or shrinks, for negative `delta`) an address space.
    /// Returns the new size.
    fn grow_addr_space(
        &mut self,
        space: AddrSpace,
        size: usize,
        delta: isize,
    ) -> Result<usize, KernelError>;

    fn free_addr_space(&mut self, space: AddrSpace);

    /// Installs `space` as the current address space.
    fn activate(&mut self, space: AddrSpace);
}
