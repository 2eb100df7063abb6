use alloc::string::String;
use alloc::vec::Vec;

use log::{debug, info};
use spin::{Mutex, MutexGuard};

use crate::error::KernelError;
use crate::file::{CwdRef, Fd, Files};
use crate::param::{NLAYER, NOFILE, NPROC};
use crate::queue::LevelQueueSet;
use crate::swtch::{Context, ContextSwitch};
use crate::vm::{AddrSpace, KStack, Vm};

/// Wrapper around usize to represent process IDs.
///
/// Pids are assigned monotonically by the table; `Pid(0)` means "no process"
/// and doubles as the parent-of-root sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Pid(pub(crate) usize);

impl core::ops::Deref for Pid {
    type Target = usize;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl core::fmt::Display for Pid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Channel token for `sleep`/`wakeup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// A process-table slot; `wait` sleeps on its own slot and `exit` wakes
    /// the parent's.
    Proc(usize),
    /// Anything outside the core (a lock, a buffer, a tick counter).
    Token(usize),
}

/// The state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcState {
    #[default]
    Unused,
    Embryo,
    Runnable,
    Running,
    Sleeping,
    Zombie,
}

impl ProcState {
    /// True for every state that lives in a level queue.
    /// `Zombie` slots are dequeued by `exit` and `Unused` ones hold nothing.
    pub fn queued(&self) -> bool {
        matches!(
            self,
            ProcState::Embryo | ProcState::Runnable | ProcState::Running | ProcState::Sleeping
        )
    }
}

/// Per-process state (the process control block).
///
/// The table lock must be held when reading or writing any of these fields.
#[derive(Debug)]
pub struct Proc {
    /// Process ID
    pub pid: Pid,
    /// Process state
    pub state: ProcState,
    /// Current queue level, 0 (lowest) to NLAYER-1 (highest)
    pub priority: usize,
    /// Cumulative CPU ticks consumed at each level
    pub ticks: [usize; NLAYER],
    /// Cumulative ticks spent waiting at each level
    pub wait_ticks: [usize; NLAYER],
    /// If true, have been killed
    pub killed: bool,
    /// Parent's table slot; `None` only for the root process
    pub parent: Option<usize>,
    /// If Some, sleeping on this channel
    pub channel: Option<Channel>,
    /// Kernel stack, owned by the memory collaborator
    pub kstack: Option<KStack>,
    /// User address space, owned by the memory collaborator
    pub addr_space: Option<AddrSpace>,
    /// Size of process memory (bytes)
    pub size: usize,
    /// Saved context, opaque to the core
    pub context: Context,
    /// Open files
    pub open_files: [Option<Fd>; NOFILE],
    /// Current directory
    pub cwd: Option<CwdRef>,
    /// Process name
    pub name: String,
}

impl Proc {
    const fn new() -> Self {
        Self {
            pid: Pid(0),
            state: ProcState::Unused,
            priority: 0,
            ticks: [0; NLAYER],
            wait_ticks: [0; NLAYER],
            killed: false,
            parent: None,
            channel: None,
            kstack: None,
            addr_space: None,
            size: 0,
            context: Context(0),
            open_files: [None; NOFILE],
            cwd: None,
            name: String::new(),
        }
    }
}

/// Result of one `wait` pass.
///
/// `Blocked` means the caller found live children but nothing to reap; it has
/// been put to sleep on its own channel and must retry once it runs again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Reaped(Pid),
    Blocked,
}

/// Everything the table lock guards: the PCB slots, the level queues, and the
/// pid counter.
pub struct TableInner {
    pub procs: Vec<Proc>,
    pub queues: LevelQueueSet,
    next_pid: usize,
    init: Option<usize>,
}

impl TableInner {
    fn new() -> Self {
        Self {
            procs: (0..NPROC).map(|_| Proc::new()).collect(),
            queues: LevelQueueSet::new(),
            next_pid: 1,
            init: None,
        }
    }

    /// Slot of the root process, once `user_init` has run.
    pub fn init_slot(&self) -> Option<usize> {
        self.init
    }

    /// Finds an `Unused` slot and readies it for the lifecycle manager:
    /// `Embryo` state, fresh pid, top priority, zeroed counters, queued at
    /// the top level. The caller completes stack/address-space setup outside
    /// the lock before marking it `Runnable`.
    pub(crate) fn alloc(&mut self) -> Result<usize, KernelError> {
        let slot = self
            .procs
            .iter()
            .position(|p| p.state == ProcState::Unused)
            .ok_or(KernelError::OutOfProc)?;

        let pid = Pid(self.next_pid);
        self.next_pid += 1;

        let proc = &mut self.procs[slot];
        proc.pid = pid;
        proc.state = ProcState::Embryo;
        proc.priority = NLAYER - 1;
        proc.ticks = [0; NLAYER];
        proc.wait_ticks = [0; NLAYER];
        proc.killed = false;
        proc.parent = None;
        proc.channel = None;

        // new arrivals enter at the top level
        self.queues.insert(NLAYER - 1, slot);

        Ok(slot)
    }

    /// Returns a slot to `Unused`, releasing whatever collaborator resources
    /// it still holds. Used by `wait` to reap zombies and by the creation
    /// paths to roll back a partially-built process.
    pub(crate) fn free(&mut self, slot: usize, vm: &mut impl Vm) {
        if self.procs[slot].state.queued() {
            let level = self.procs[slot].priority;
            self.queues.remove(level, slot);
        }

        let proc = &mut self.procs[slot];
        if let Some(kstack) = proc.kstack.take() {
            vm.free_stack(kstack);
        }
        if let Some(space) = proc.addr_space.take() {
            vm.free_addr_space(space);
        }

        proc.pid = Pid(0);
        proc.state = ProcState::Unused;
        proc.priority = 0;
        proc.ticks = [0; NLAYER];
        proc.wait_ticks = [0; NLAYER];
        proc.killed = false;
        proc.parent = None;
        proc.channel = None;
        proc.size = 0;
        proc.context = Context(0);
        proc.open_files = [None; NOFILE];
        proc.cwd = None;
        proc.name.clear();
    }

    /// Wakes up all processes sleeping on `channel`.
    pub(crate) fn wakeup1(&mut self, channel: Channel) {
        for proc in self.procs.iter_mut() {
            if proc.state == ProcState::Sleeping && proc.channel == Some(channel) {
                proc.state = ProcState::Runnable;
                proc.channel = None;
            }
        }
    }

    pub(crate) fn sleep(&mut self, caller: usize, channel: Channel) {
        let proc = &mut self.procs[caller];
        proc.channel = Some(channel);
        proc.state = ProcState::Sleeping;
    }

    pub(crate) fn kill(&mut self, pid: Pid) -> Result<(), KernelError> {
        for proc in self.procs.iter_mut() {
            if proc.state == ProcState::Unused || proc.pid != pid {
                continue;
            }

            proc.killed = true;
            if proc.state == ProcState::Sleeping {
                // wake it so it notices the flag promptly
                proc.state = ProcState::Runnable;
                proc.channel = None;
            }
            return Ok(());
        }

        Err(KernelError::NoSuchProcess)
    }

    /// Terminates `caller`: releases its file handles, hands its children to
    /// the root process, wakes its parent, and leaves it a dequeued `Zombie`
    /// for the parent to reap.
    pub(crate) fn exit(&mut self, caller: usize, files: &mut impl Files) {
        assert!(Some(caller) != self.init, "init exiting");
        let init = self.init.expect("exit before user_init");

        let proc = &mut self.procs[caller];
        for fd in proc.open_files.iter_mut() {
            if let Some(fd) = fd.take() {
                files.close(fd);
            }
        }
        if let Some(cwd) = proc.cwd.take() {
            files.put_cwd(cwd);
        }

        // parent might be sleeping in wait()
        if let Some(parent) = self.procs[caller].parent {
            self.wakeup1(Channel::Proc(parent));
        }

        // pass abandoned children to init
        for slot in 0..self.procs.len() {
            if self.procs[slot].parent == Some(caller) {
                self.procs[slot].parent = Some(init);
                if self.procs[slot].state == ProcState::Zombie {
                    self.wakeup1(Channel::Proc(init));
                }
            }
        }

        let proc = &mut self.procs[caller];
        let pid = proc.pid;
        let level = proc.priority;
        proc.state = ProcState::Zombie;
        self.queues.remove(level, caller);

        info!("exit: pid {pid}");
    }

    /// One pass of `wait`: reap a zombie child if there is one, otherwise
    /// either report that there is nothing to wait for or go to sleep on the
    /// caller's own channel.
    pub(crate) fn wait(
        &mut self,
        caller: usize,
        vm: &mut impl Vm,
    ) -> Result<WaitOutcome, KernelError> {
        let mut have_kids = false;

        for slot in 0..self.procs.len() {
            if self.procs[slot].parent != Some(caller) {
                continue;
            }
            have_kids = true;

            if self.procs[slot].state == ProcState::Zombie {
                let pid = self.procs[slot].pid;
                self.free(slot, vm);
                return Ok(WaitOutcome::Reaped(pid));
            }
        }

        // no point waiting without children
        if !have_kids || self.procs[caller].killed {
            return Err(KernelError::NoSuchProcess);
        }

        // wait for a child's exit to wake us
        self.sleep(caller, Channel::Proc(caller));
        Ok(WaitOutcome::Blocked)
    }

    fn stat(&self) -> ProcStat {
        ProcStat {
            slots: self
                .procs
                .iter()
                .map(|proc| SlotStat {
                    pid: proc.pid,
                    in_use: proc.state != ProcState::Unused,
                    state: proc.state,
                    priority: proc.priority,
                    ticks: proc.ticks,
                    wait_ticks: proc.wait_ticks,
                })
                .collect(),
        }
    }

    /// Panics unless queue membership matches the recorded states: every
    /// queued-state PCB in exactly one queue at its own priority, zombies and
    /// unused slots in none, no slot twice anywhere.
    pub fn assert_queue_invariants(&self) {
        let mut memberships = alloc::vec![0usize; self.procs.len()];

        for level in 0..NLAYER {
            for index in 0..self.queues.len(level) {
                let slot = self.queues.get(level, index);
                memberships[slot] += 1;
                assert_eq!(
                    self.procs[slot].priority, level,
                    "slot {slot} queued at level {level} with wrong priority"
                );
            }
        }

        for (slot, proc) in self.procs.iter().enumerate() {
            let expected = proc.state.queued() as usize;
            assert_eq!(
                memberships[slot], expected,
                "slot {slot} in {} queues while {:?}",
                memberships[slot], proc.state
            );
        }
    }
}

/// Fixed-capacity storage for every PCB plus the single lock serializing all
/// state and queue mutation.
///
/// These methods lock the table themselves and must not be called while a
/// dispatch is in progress; code running inside a dispatch goes through the
/// [`Running`] handle instead, which borrows the already-locked table.
pub struct ProcTable {
    inner: Mutex<TableInner>,
}

impl Default for ProcTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TableInner::new()),
        }
    }

    /// Acquires the table lock.
    pub fn lock(&self) -> MutexGuard<'_, TableInner> {
        self.inner.lock()
    }

    /// Sets up the first user process and records it as the reparent target
    /// for orphans. Returns its table slot.
    pub fn user_init(&self, vm: &mut impl Vm, name: &str) -> Result<usize, KernelError> {
        let slot = {
            let mut inner = self.inner.lock();
            assert!(inner.init.is_none(), "user_init twice");
            inner.alloc()?
        };

        // stack and address-space setup happen outside the lock
        let kstack = match vm.alloc_stack() {
            Ok(kstack) => kstack,
            Err(err) => {
                self.inner.lock().free(slot, vm);
                return Err(err);
            }
        };
        let space = match vm.new_addr_space() {
            Ok(space) => space,
            Err(err) => {
                vm.free_stack(kstack);
                self.inner.lock().free(slot, vm);
                return Err(err);
            }
        };

        let mut inner = self.inner.lock();
        let proc = &mut inner.procs[slot];
        proc.kstack = Some(kstack);
        proc.addr_space = Some(space);
        proc.name.push_str(name);
        proc.state = ProcState::Runnable;
        let pid = proc.pid;
        inner.init = Some(slot);

        info!("init process: pid {pid} ({name})");
        Ok(slot)
    }

    /// Creates a new process copying the one at `parent`.
    ///
    /// The child gets a duplicated address space, duplicated file handles,
    /// and a saved context arranged so it resumes with a zero result. A
    /// partially-built child is rolled back to `Unused` on any failure.
    pub fn fork(
        &self,
        parent: usize,
        vm: &mut impl Vm,
        files: &mut impl Files,
        swtch: &mut impl ContextSwitch,
    ) -> Result<Pid, KernelError> {
        // snapshot what the child copies while the table is locked
        let (slot, parent_space, parent_size, parent_ctx, parent_files, parent_cwd, parent_name) = {
            let mut inner = self.inner.lock();
            assert!(
                inner.procs[parent].state != ProcState::Unused,
                "fork from unused slot"
            );
            let slot = inner.alloc()?;

            let p = &inner.procs[parent];
            (
                slot,
                p.addr_space.expect("fork parent without address space"),
                p.size,
                p.context,
                p.open_files,
                p.cwd,
                p.name.clone(),
            )
        };

        // stack and address-space work happen outside the lock
        let kstack = match vm.alloc_stack() {
            Ok(kstack) => kstack,
            Err(err) => {
                self.inner.lock().free(slot, vm);
                return Err(err);
            }
        };
        let space = match vm.dup_addr_space(parent_space, parent_size) {
            Ok(space) => space,
            Err(err) => {
                vm.free_stack(kstack);
                self.inner.lock().free(slot, vm);
                return Err(err);
            }
        };

        // child resumes as if returning from the same call, with zero result
        let context = swtch.fork_context(parent_ctx);

        let mut open_files = [None; NOFILE];
        for (i, fd) in parent_files.iter().enumerate() {
            if let Some(fd) = fd {
                open_files[i] = Some(files.dup(*fd));
            }
        }
        let cwd = parent_cwd.map(|cwd| files.dup_cwd(cwd));

        let mut inner = self.inner.lock();
        let proc = &mut inner.procs[slot];
        proc.kstack = Some(kstack);
        proc.addr_space = Some(space);
        proc.size = parent_size;
        proc.context = context;
        proc.open_files = open_files;
        proc.cwd = cwd;
        proc.name = parent_name;
        proc.parent = Some(parent);
        proc.state = ProcState::Runnable;
        let pid = proc.pid;

        debug!("fork: pid {pid} from slot {parent}");
        Ok(pid)
    }

    /// Exits the process at `caller`. See [`TableInner::exit`]; in a running
    /// kernel the caller then reenters the scheduler and never resumes.
    pub fn exit(&self, caller: usize, files: &mut impl Files) {
        self.inner.lock().exit(caller, files);
    }

    /// Waits for a child of `caller` to exit. See [`WaitOutcome`] for the
    /// blocking behavior.
    pub fn wait(&self, caller: usize, vm: &mut impl Vm) -> Result<WaitOutcome, KernelError> {
        self.inner.lock().wait(caller, vm)
    }

    /// Marks the process with `pid` as killed. A sleeping target is forced
    /// `Runnable` so it observes the flag promptly.
    pub fn kill(&self, pid: Pid) -> Result<(), KernelError> {
        self.inner.lock().kill(pid)
    }

    /// Puts `caller` to sleep on `channel`.
    pub fn sleep(&self, caller: usize, channel: Channel) {
        self.inner.lock().sleep(caller, channel);
    }

    /// Puts `caller` to sleep on `channel`, releasing the lock protecting the
    /// awaited condition only after the table lock is held, so a concurrent
    /// `wakeup` cannot slip between the two.
    pub fn sleep_with<T>(&self, caller: usize, channel: Channel, condition: MutexGuard<'_, T>) {
        let mut inner = self.inner.lock();
        drop(condition);
        inner.sleep(caller, channel);
    }

    /// Wakes up all processes sleeping on `channel`.
    pub fn wakeup(&self, channel: Channel) {
        self.inner.lock().wakeup1(channel);
    }

    /// Grows (or shrinks) the memory of the process at `caller` by `delta`
    /// bytes through the memory collaborator. Returns the new size.
    pub fn grow(&self, caller: usize, delta: isize, vm: &mut impl Vm) -> Result<usize, KernelError> {
        let (space, size) = {
            let inner = self.inner.lock();
            let proc = &inner.procs[caller];
            (
                proc.addr_space.ok_or(KernelError::InvalidArgument)?,
                proc.size,
            )
        };

        let new_size = vm.grow_addr_space(space, size, delta)?;
        self.inner.lock().procs[caller].size = new_size;
        vm.activate(space);

        Ok(new_size)
    }

    /// Snapshot of every table slot, for monitoring tools. Read under the
    /// table lock; mutates nothing.
    pub fn stat(&self) -> ProcStat {
        self.inner.lock().stat()
    }

    /// Logs a process listing, one line per in-use slot.
    pub fn dump(&self) {
        let inner = self.inner.lock();
        for proc in inner.procs.iter() {
            if proc.state == ProcState::Unused {
                continue;
            }
            info!(
                "{} {:?} lv{} {}",
                proc.pid, proc.state, proc.priority, proc.name
            );
        }
    }
}

/// Handle held by the context-switch collaborator for the duration of one
/// dispatch. It borrows the locked table, so the operations here - the ones a
/// running process performs on its own behalf - need no further locking.
///
/// The process must leave `Running` state through one of `yield_now`,
/// `sleep`, `exit` (or a `Blocked` `wait`) before control returns to the
/// scheduler.
pub struct Running<'a> {
    pub(crate) slot: usize,
    pub(crate) inner: &'a mut TableInner,
}

impl Running<'_> {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn pid(&self) -> Pid {
        self.inner.procs[self.slot].pid
    }

    /// True once `kill` has marked this process. Long-running code polls this
    /// and exits voluntarily.
    pub fn killed(&self) -> bool {
        self.inner.procs[self.slot].killed
    }

    /// Gives up the CPU for one scheduling round.
    pub fn yield_now(&mut self) {
        self.inner.procs[self.slot].state = ProcState::Runnable;
    }

    /// Blocks on `channel` until a matching `wakeup` (or `kill`).
    pub fn sleep(&mut self, channel: Channel) {
        self.inner.sleep(self.slot, channel);
    }

    /// Like [`sleep`](Running::sleep), dropping the lock protecting the
    /// awaited condition now that the table lock is held.
    pub fn sleep_with<T>(&mut self, channel: Channel, condition: MutexGuard<'_, T>) {
        drop(condition);
        self.inner.sleep(self.slot, channel);
    }

    pub fn exit(&mut self, files: &mut impl Files) {
        self.inner.exit(self.slot, files);
    }

    pub fn wait(&mut self, vm: &mut impl Vm) -> Result<WaitOutcome, KernelError> {
        self.inner.wait(self.slot, vm)
    }

    pub fn wakeup(&mut self, channel: Channel) {
        self.inner.wakeup1(channel);
    }
}

/// Diagnostics snapshot of one table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotStat {
    pub pid: Pid,
    pub in_use: bool,
    pub state: ProcState,
    pub priority: usize,
    pub ticks: [usize; NLAYER],
    pub wait_ticks: [usize; NLAYER],
}

/// Diagnostics snapshot of the whole table.
#[derive(Debug, Clone)]
pub struct ProcStat {
    pub slots: Vec<SlotStat>,
}
