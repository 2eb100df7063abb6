/// Opaque handle to an open file, owned by the file collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fd(pub usize);

/// Opaque reference to a working directory, owned by the file collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CwdRef(pub usize);

/// File and working-directory collaborator.
///
/// `fork` duplicates the parent's handles through here and `exit` releases
/// them; the core never interprets them.
pub trait Files {
    fn dup(&mut self, fd: Fd) -> Fd;
    fn close(&mut self, fd: Fd);
    fn dup_cwd(&mut self, cwd: CwdRef) -> CwdRef;
    fn put_cwd(&mut self, cwd: CwdRef);
}
