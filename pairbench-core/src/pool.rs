//! Connection Pool
//!
//! Fixed-capacity pool shared by every work unit of a batch. At most
//! `max_size` sessions exist at once; callers beyond that block until a
//! session is returned. That wait is part of what a benchmark measures, so
//! the pool never grows past its configured capacity.
//!
//! Idle sessions live in a bounded crossbeam channel. A checkout is a
//! [`PooledSession`] guard that hands the session back on drop, on every exit
//! path of the caller (including `?` and panics).
//!
//! A slot can also be freed without a session coming back: a failed connect
//! or a [`PooledSession::discard`]. Blocked callers therefore wake up every
//! `SLOT_RECHECK` and try to open a session themselves.

use crate::error::StoreError;
use crate::store::ConnectionManager;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// How long a blocked checkout waits for a returned session before checking
/// for a freed slot.
const SLOT_RECHECK: Duration = Duration::from_millis(10);

struct PoolInner<M: ConnectionManager> {
    manager: M,
    max_size: usize,
    idle_tx: Sender<M::Session>,
    idle_rx: Receiver<M::Session>,
    /// Sessions currently open (idle + checked out)
    opened: AtomicUsize,
    checked_out: AtomicUsize,
    peak_checked_out: AtomicUsize,
}

/// Shared handle to a connection pool. Cloning is cheap.
pub struct Pool<M: ConnectionManager> {
    inner: Arc<PoolInner<M>>,
}

impl<M: ConnectionManager> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Configured capacity
    pub max_size: usize,
    /// Sessions currently open
    pub opened: usize,
    /// Sessions currently checked out
    pub checked_out: usize,
    /// Highest simultaneous checkout count observed
    pub peak_checked_out: usize,
}

impl<M: ConnectionManager> Pool<M> {
    /// Create a pool. Sessions are opened lazily. `max_size == 0` is treated as 1.
    pub fn new(manager: M, max_size: usize) -> Self {
        let max_size = max_size.max(1);
        let (idle_tx, idle_rx) = channel::bounded(max_size);
        Self {
            inner: Arc::new(PoolInner {
                manager,
                max_size,
                idle_tx,
                idle_rx,
                opened: AtomicUsize::new(0),
                checked_out: AtomicUsize::new(0),
                peak_checked_out: AtomicUsize::new(0),
            }),
        }
    }

    /// The connection manager backing this pool.
    pub fn manager(&self) -> &M {
        &self.inner.manager
    }

    /// Check out a session, opening one if under capacity, otherwise
    /// blocking until another caller returns theirs.
    pub fn get(&self) -> Result<PooledSession<'_, M>, StoreError> {
        let inner = &*self.inner;
        let closed = || StoreError::Unavailable("pool closed".to_string());

        let session = loop {
            match inner.idle_rx.try_recv() {
                Ok(session) => break session,
                Err(TryRecvError::Disconnected) => return Err(closed()),
                Err(TryRecvError::Empty) => {}
            }
            if let Some(session) = self.try_open()? {
                break session;
            }
            match inner.idle_rx.recv_timeout(SLOT_RECHECK) {
                Ok(session) => break session,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Err(closed()),
            }
        };

        let now = inner.checked_out.fetch_add(1, Ordering::AcqRel) + 1;
        inner.peak_checked_out.fetch_max(now, Ordering::AcqRel);

        Ok(PooledSession {
            pool: inner,
            session: Some(session),
        })
    }

    /// Reserve a slot and open a session, or `None` when at capacity.
    fn try_open(&self) -> Result<Option<M::Session>, StoreError> {
        let inner = &*self.inner;
        let mut opened = inner.opened.load(Ordering::Acquire);
        loop {
            if opened >= inner.max_size {
                return Ok(None);
            }
            match inner.opened.compare_exchange_weak(
                opened,
                opened + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => opened = actual,
            }
        }

        match inner.manager.connect() {
            Ok(session) => {
                tracing::trace!(opened = opened + 1, "opened pooled session");
                Ok(Some(session))
            }
            Err(e) => {
                inner.opened.fetch_sub(1, Ordering::AcqRel);
                Err(e)
            }
        }
    }

    /// Current counters.
    pub fn stats(&self) -> PoolStats {
        let inner = &*self.inner;
        PoolStats {
            max_size: inner.max_size,
            opened: inner.opened.load(Ordering::Acquire),
            checked_out: inner.checked_out.load(Ordering::Acquire),
            peak_checked_out: inner.peak_checked_out.load(Ordering::Acquire),
        }
    }

    /// Reset the peak checkout counter (between benchmark entries).
    pub fn reset_peak(&self) {
        let inner = &*self.inner;
        inner.peak_checked_out.store(
            inner.checked_out.load(Ordering::Acquire),
            Ordering::Release,
        );
    }
}

/// A checked-out session. Returned to the pool on drop.
pub struct PooledSession<'a, M: ConnectionManager> {
    pool: &'a PoolInner<M>,
    session: Option<M::Session>,
}

impl<M: ConnectionManager> PooledSession<'_, M> {
    /// Close this session instead of returning it, freeing its slot so the
    /// pool can open a replacement. Use after an error that leaves the
    /// connection in an unknown state.
    pub fn discard(mut self) {
        if self.session.take().is_some() {
            self.pool.opened.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl<M: ConnectionManager> Deref for PooledSession<'_, M> {
    type Target = M::Session;

    fn deref(&self) -> &Self::Target {
        self.session
            .as_ref()
            .unwrap_or_else(|| unreachable!("session is present until drop"))
    }
}

impl<M: ConnectionManager> DerefMut for PooledSession<'_, M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session
            .as_mut()
            .unwrap_or_else(|| unreachable!("session is present until drop"))
    }
}

impl<M: ConnectionManager> Drop for PooledSession<'_, M> {
    fn drop(&mut self) {
        self.pool.checked_out.fetch_sub(1, Ordering::AcqRel);
        if let Some(session) = self.session.take() {
            // The channel holds max_size slots and at most max_size sessions
            // exist, so this never blocks.
            if self.pool.idle_tx.try_send(session).is_err() {
                self.pool.opened.fetch_sub(1, Ordering::AcqRel);
            }
        }
    }
}
