//! FIFO-fair read/write lock
//!
//! Acquisitions are granted strictly in arrival order across both kinds, with
//! one relaxation: a contiguous run of queued readers at the head of the queue
//! is granted as a batch. A reader that arrives behind a queued writer waits
//! for that writer even while other readers hold the lock.
//!
//! Waiters park on a oneshot channel; the grant bookkeeping happens under a
//! `parking_lot::Mutex` before the waiter is woken, so a woken waiter already
//! owns its grant.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::oneshot;
use tracing::{error, trace};

use crate::error::LockError;

/// Kind of a lock acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    Read,
    Write,
}

/// Snapshot of the lock bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockStatus {
    pub read_count: usize,
    pub write_count: usize,
    /// Kinds of the queued acquisitions, head first
    pub queued: Vec<LockKind>,
}

impl LockStatus {
    pub fn queue_len(&self) -> usize {
        self.queued.len()
    }
}

struct Waiter {
    id: u64,
    kind: LockKind,
    grant: oneshot::Sender<()>,
}

#[derive(Default)]
struct LockState {
    read_count: usize,
    write_count: usize,
    queue: VecDeque<Waiter>,
    next_waiter_id: u64,
}

impl LockState {
    /// Grant without queueing if nothing is waiting and the kind is compatible
    fn try_grant_now(&mut self, kind: LockKind) -> bool {
        if !self.queue.is_empty() {
            return false;
        }
        match kind {
            LockKind::Read if self.write_count == 0 => {
                self.read_count += 1;
                true
            }
            LockKind::Write if self.read_count == 0 && self.write_count == 0 => {
                self.write_count = 1;
                true
            }
            _ => false,
        }
    }

    fn enqueue(&mut self, kind: LockKind, grant: oneshot::Sender<()>) -> u64 {
        let id = self.next_waiter_id;
        self.next_waiter_id += 1;
        self.queue.push_back(Waiter { id, kind, grant });
        id
    }

    fn release(&mut self, kind: LockKind) -> Result<(), LockError> {
        match kind {
            LockKind::Read => {
                if self.read_count == 0 {
                    return Err(LockError::NoReadLockHeld);
                }
                self.read_count -= 1;
                if self.read_count == 0 {
                    self.drain();
                }
            }
            LockKind::Write => {
                if self.write_count != 1 {
                    return Err(LockError::NoWriteLockHeld);
                }
                self.write_count = 0;
                self.drain();
            }
        }
        Ok(())
    }

    /// Grant from the head of the queue.
    ///
    /// A writer at the head is granted only when the lock is completely free.
    /// Readers at the head are granted together, up to the first queued writer.
    fn drain(&mut self) {
        match self.queue.front().map(|w| w.kind) {
            None => {}
            Some(LockKind::Write) => {
                if self.read_count == 0 && self.write_count == 0 {
                    if let Some(waiter) = self.queue.pop_front() {
                        self.write_count = 1;
                        trace!(waiter = waiter.id, "granting queued write");
                        // A dropped receiver is settled by its PendingAcquire
                        let _ = waiter.grant.send(());
                    }
                }
            }
            Some(LockKind::Read) => {
                let mut granted = 0usize;
                while self.write_count == 0
                    && self.queue.front().is_some_and(|w| w.kind == LockKind::Read)
                {
                    if let Some(waiter) = self.queue.pop_front() {
                        self.read_count += 1;
                        granted += 1;
                        let _ = waiter.grant.send(());
                    }
                }
                trace!(granted, "granting queued reads");
            }
        }
    }

    /// Settle an acquisition whose future was dropped before it completed
    fn cancel(&mut self, id: u64, kind: LockKind) {
        if let Some(pos) = self.queue.iter().position(|w| w.id == id) {
            self.queue.remove(pos);
            if pos == 0 {
                self.drain();
            }
        } else if let Err(e) = self.release(kind) {
            // Granted but never observed: the grant is ours to give back
            error!(error = %e, "failed to release abandoned grant");
        }
    }

    fn status(&self) -> LockStatus {
        LockStatus {
            read_count: self.read_count,
            write_count: self.write_count,
            queued: self.queue.iter().map(|w| w.kind).collect(),
        }
    }
}

/// Gives the queued slot or the grant back if the acquiring future is dropped
struct PendingAcquire<'a> {
    state: &'a Mutex<LockState>,
    id: u64,
    kind: LockKind,
    settled: bool,
}

impl Drop for PendingAcquire<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.state.lock().cancel(self.id, self.kind);
        }
    }
}

/// A held grant; released on drop
struct Grant<'a> {
    state: &'a Mutex<LockState>,
    kind: LockKind,
}

impl Drop for Grant<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.state.lock().release(self.kind) {
            error!(error = %e, kind = ?self.kind, "fair lock guard released an unheld grant");
        }
    }
}

/// FIFO-fair async read/write lock guarding a value
///
/// Use [`read`](Self::read) / [`write`](Self::write) for scoped guards. The
/// raw `acquire_*`/`release_*` pair exposes the protocol itself; mixing raw
/// releases with live guards is a programming error.
pub struct FairRwLock<T> {
    state: Mutex<LockState>,
    // Only touched while holding a fair grant, so it never contends
    data: RwLock<T>,
}

impl<T> FairRwLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            data: RwLock::new(value),
        }
    }

    async fn acquire(&self, kind: LockKind) {
        let (id, granted) = {
            let mut state = self.state.lock();
            if state.try_grant_now(kind) {
                return;
            }
            let (tx, rx) = oneshot::channel();
            (state.enqueue(kind, tx), rx)
        };

        let mut pending = PendingAcquire {
            state: &self.state,
            id,
            kind,
            settled: false,
        };
        // The sender only goes away after granting, or through our own cancel
        let _ = granted.await;
        pending.settled = true;
    }

    /// Wait for a shared grant
    pub async fn acquire_read(&self) {
        self.acquire(LockKind::Read).await
    }

    /// Wait for the exclusive grant
    pub async fn acquire_write(&self) {
        self.acquire(LockKind::Write).await
    }

    /// Give back a shared grant obtained with [`acquire_read`](Self::acquire_read)
    pub fn release_read(&self) -> Result<(), LockError> {
        self.state.lock().release(LockKind::Read)
    }

    /// Give back the exclusive grant obtained with [`acquire_write`](Self::acquire_write)
    pub fn release_write(&self) -> Result<(), LockError> {
        self.state.lock().release(LockKind::Write)
    }

    pub fn status(&self) -> LockStatus {
        self.state.lock().status()
    }

    /// Acquire shared access to the value
    pub async fn read(&self) -> FairReadGuard<'_, T> {
        self.acquire_read().await;
        let grant = Grant {
            state: &self.state,
            kind: LockKind::Read,
        };
        FairReadGuard {
            data: self.data.read(),
            _grant: grant,
        }
    }

    /// Acquire exclusive access to the value
    pub async fn write(&self) -> FairWriteGuard<'_, T> {
        self.acquire_write().await;
        let grant = Grant {
            state: &self.state,
            kind: LockKind::Write,
        };
        FairWriteGuard {
            data: self.data.write(),
            _grant: grant,
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: Default> Default for FairRwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Shared access; fields drop in order, so the data guard goes before the grant
pub struct FairReadGuard<'a, T> {
    data: RwLockReadGuard<'a, T>,
    _grant: Grant<'a>,
}

impl<T> Deref for FairReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

/// Exclusive access
pub struct FairWriteGuard<'a, T> {
    data: RwLockWriteGuard<'a, T>,
    _grant: Grant<'a>,
}

impl<T> Deref for FairWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> DerefMut for FairWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}
