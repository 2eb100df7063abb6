use log::{debug, trace};

use crate::param::{NLAYER, promote_threshold, quantum};
use crate::proc::{ProcState, ProcTable, Running, TableInner};
use crate::swtch::ContextSwitch;

/// Per-CPU dispatch loop over the shared process table.
///
/// Several schedulers (one per CPU) may share one [`ProcTable`]; every
/// decision is made under the table lock. Within a CPU, execution is
/// cooperative: a dispatched process keeps the CPU until it yields, sleeps,
/// or exits through its [`Running`] handle, and only then does the loop
/// reconcile its counters and pick again.
pub struct Scheduler<'t, S: ContextSwitch> {
    table: &'t ProcTable,
    switch: S,
}

impl<'t, S: ContextSwitch> Scheduler<'t, S> {
    pub fn new(table: &'t ProcTable, switch: S) -> Self {
        Self { table, switch }
    }

    /// One scheduling attempt.
    ///
    /// Takes the table lock and holds it across every dispatch of the
    /// attempt, scanning levels from 3 down to 0. A dispatch from level 2, 1
    /// or 0 restarts the scan from level 3, so anything promoted or woken at
    /// a higher level preempts the rest of the sweep; a dispatch from level 3
    /// continues in place, giving plain round-robin at the top. The attempt
    /// (and the lock) ends once a full sweep finds nothing runnable; the
    /// CPU's outer loop then tries again.
    ///
    /// Returns the number of dispatches performed. Like its caller's loop,
    /// this does not return while some process below the top level stays
    /// runnable forever without blocking.
    pub fn schedule(&mut self) -> usize {
        let table = self.table;
        let mut guard = table.lock();
        let inner = &mut *guard;

        let mut dispatched = 0;

        // per-attempt scan cursors for levels 3..1; level 0 is FIFO from the
        // front on every sweep
        let mut c3 = 0;
        let mut c2 = 0;
        let mut c1 = 0;

        'search: loop {
            while c3 < inner.queues.len(3) {
                let slot = inner.queues.get(3, c3);
                if inner.procs[slot].state != ProcState::Runnable {
                    c3 += 1;
                    continue;
                }

                self.dispatch(inner, 3, slot);
                dispatched += 1;

                // advance unless the slot left the queue (demotion or exit
                // shifted its successor into this position)
                if inner.queues.position(3, slot).is_some() {
                    c3 += 1;
                }
            }

            while c2 < inner.queues.len(2) {
                let slot = inner.queues.get(2, c2);
                if inner.procs[slot].state != ProcState::Runnable {
                    c2 += 1;
                    continue;
                }

                self.dispatch(inner, 2, slot);
                dispatched += 1;

                // higher-priority work may have appeared; rescan from the top
                c3 = 0;
                continue 'search;
            }

            while c1 < inner.queues.len(1) {
                let slot = inner.queues.get(1, c1);
                if inner.procs[slot].state != ProcState::Runnable {
                    c1 += 1;
                    continue;
                }

                self.dispatch(inner, 1, slot);
                dispatched += 1;

                c3 = 0;
                c2 = 0;
                continue 'search;
            }

            let mut c0 = 0;
            while c0 < inner.queues.len(0) {
                let slot = inner.queues.get(0, c0);
                if inner.procs[slot].state != ProcState::Runnable {
                    c0 += 1;
                    continue;
                }

                self.dispatch(inner, 0, slot);
                dispatched += 1;

                c3 = 0;
                c2 = 0;
                c1 = 0;
                continue 'search;
            }

            // a full sweep found nothing runnable; the attempt is over
            break;
        }

        dispatched
    }

    /// Runs the chosen process, then settles the books: the aging pass for
    /// everyone who waited, quantum accounting and possible demotion for the
    /// process itself.
    fn dispatch(&mut self, inner: &mut TableInner, level: usize, slot: usize) {
        debug_assert_eq!(inner.procs[slot].priority, level, "dispatch level mismatch");

        let pid = inner.procs[slot].pid;
        trace!("dispatch: pid {pid} at lv{level}");
        inner.procs[slot].state = ProcState::Running;

        self.switch.transfer(Running {
            slot,
            inner: &mut *inner,
        });

        // It must have changed its state before coming back.
        assert!(
            inner.procs[slot].state != ProcState::Running,
            "sched running"
        );

        // It did not wait while it ran; clear before the aging pass, then
        // count one tick of bookkeeping like everyone else.
        inner.procs[slot].wait_ticks[level] = 0;
        age_waiters(inner, slot);
        inner.procs[slot].wait_ticks[level] += 1;

        inner.procs[slot].ticks[level] += 1;

        // quantum exhausted: push down one level. Level 0 has no quantum and
        // a slot that exited during its slice is already out of the queues.
        if let Some(quantum) = quantum(level)
            && inner.procs[slot].ticks[level] >= quantum
            && inner.queues.position(level, slot).is_some()
        {
            let new = inner.queues.demote(level, slot);
            inner.procs[slot].priority = new;
            debug!("demote: pid {pid} to lv{new}");
        }
    }
}

/// Advances the wait counter of every queued process except the one that just
/// ran, promoting any that crossed its level's starvation threshold.
///
/// Top level first: a process promoted into a level during this pass lands at
/// its tail after that level was handled, so nothing is aged twice.
fn age_waiters(inner: &mut TableInner, running: usize) {
    for level in (0..NLAYER).rev() {
        let mut index = 0;
        while index < inner.queues.len(level) {
            let slot = inner.queues.get(level, index);
            if slot == running {
                index += 1;
                continue;
            }

            let proc = &mut inner.procs[slot];
            proc.wait_ticks[level] += 1;

            if let Some(threshold) = promote_threshold(level)
                && proc.wait_ticks[level] >= threshold
            {
                let pid = proc.pid;
                proc.priority = level + 1;
                // waiting starts over at the new level
                proc.wait_ticks[level + 1] = 0;
                inner.queues.promote(level, slot);
                debug!("promote: pid {pid} to lv{}", level + 1);

                // the removal shifted the next entry into `index`
                continue;
            }

            index += 1;
        }
    }
}
