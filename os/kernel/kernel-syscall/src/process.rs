//! Process descriptors and the queues the scheduler keeps them in.

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use kernel_info::memory::MAX_PRIORITY;
use kernel_mm::MemoryContext;
use kernel_vmem::{DefaultPageTable, PageTable};

/// Process id.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Pid(u32);

impl Pid {
    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID({})", self.0)
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A process as far as memory management is concerned.
pub struct Process<T: PageTable = DefaultPageTable> {
    pid: Pid,
    priority: u32,
    mm: MemoryContext<T>,
}

impl<T: PageTable> Process<T> {
    #[must_use]
    pub const fn new(pid: Pid, priority: u32, mm: MemoryContext<T>) -> Self {
        Self { pid, priority, mm }
    }

    #[inline]
    #[must_use]
    pub const fn pid(&self) -> Pid {
        self.pid
    }

    /// Lower is more urgent.
    #[inline]
    #[must_use]
    pub const fn priority(&self) -> u32 {
        self.priority
    }

    #[inline]
    #[must_use]
    pub const fn mm(&self) -> &MemoryContext<T> {
        &self.mm
    }
}

impl<T: PageTable> fmt::Debug for Process<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// An ordered queue of processes.
pub struct ProcessQueue<T: PageTable = DefaultPageTable> {
    procs: VecDeque<Arc<Process<T>>>,
}

impl<T: PageTable> Default for ProcessQueue<T> {
    fn default() -> Self {
        Self {
            procs: VecDeque::new(),
        }
    }
}

impl<T: PageTable> ProcessQueue<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, process: Arc<Process<T>>) {
        self.procs.push_back(process);
    }

    /// Remove and return the head of the queue.
    pub fn dequeue(&mut self) -> Option<Arc<Process<T>>> {
        self.procs.pop_front()
    }

    /// Remove and return the most urgent process; ties go to the earliest.
    pub fn dequeue_most_urgent(&mut self) -> Option<Arc<Process<T>>> {
        let index = self
            .procs
            .iter()
            .enumerate()
            .min_by_key(|(i, p)| (p.priority, *i))
            .map(|(i, _)| i)?;
        self.procs.remove(index)
    }

    /// Remove the process with id `pid`.
    pub fn purge(&mut self, pid: Pid) -> Option<Arc<Process<T>>> {
        let index = self.procs.iter().position(|p| p.pid == pid)?;
        self.procs.remove(index)
    }

    #[must_use]
    pub fn find(&self, pid: Pid) -> Option<&Arc<Process<T>>> {
        self.procs.iter().find(|p| p.pid == pid)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.procs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.procs.is_empty()
    }
}

/// The running, ready and per-priority queues.
///
/// Only membership matters here; the order in which processes run is up to
/// the caller.
pub struct Scheduler<T: PageTable = DefaultPageTable> {
    running: ProcessQueue<T>,
    ready: ProcessQueue<T>,
    mlq: Vec<ProcessQueue<T>>,
}

impl<T: PageTable> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            running: ProcessQueue::new(),
            ready: ProcessQueue::new(),
            mlq: (0..MAX_PRIORITY).map(|_| ProcessQueue::new()).collect(),
        }
    }
}

impl<T: PageTable> Scheduler<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a process on the ready queue.
    pub fn admit(&mut self, process: Arc<Process<T>>) {
        log::debug!("admit {:?} (priority {})", process.pid, process.priority);
        self.ready.enqueue(process);
    }

    /// Put a process into the bucket of its priority, clamped to the last bucket.
    pub fn admit_by_priority(&mut self, process: Arc<Process<T>>) {
        let last = self.mlq.len() - 1;
        let bucket = usize::try_from(process.priority).map_or(last, |p| p.min(last));
        log::debug!("admit {:?} to priority bucket {bucket}", process.pid);
        self.mlq[bucket].enqueue(process);
    }

    /// Move `pid` from the ready or priority queues to the running queue.
    pub fn start(&mut self, pid: Pid) -> Option<Arc<Process<T>>> {
        let process = self
            .ready
            .purge(pid)
            .or_else(|| self.mlq.iter_mut().find_map(|q| q.purge(pid)))?;
        self.running.enqueue(Arc::clone(&process));
        Some(process)
    }

    /// Remove `pid` from the running queue.
    pub fn finish(&mut self, pid: Pid) -> Option<Arc<Process<T>>> {
        self.running.purge(pid)
    }

    /// Look a process up in the running, ready and priority queues, in that order.
    #[must_use]
    pub fn find(&self, pid: Pid) -> Option<&Arc<Process<T>>> {
        self.running
            .find(pid)
            .or_else(|| self.ready.find(pid))
            .or_else(|| self.mlq.iter().find_map(|q| q.find(pid)))
    }

    #[must_use]
    pub const fn running(&self) -> &ProcessQueue<T> {
        &self.running
    }

    #[must_use]
    pub const fn ready(&self) -> &ProcessQueue<T> {
        &self.ready
    }
}
