//! Single-threaded readiness reactor.
//!
//! Components register interest in a descriptor becoming readable or
//! writable. Each tick the reactor blocks in `poll(2)` over every registered
//! descriptor, then invokes the owners whose descriptors are ready: the read
//! batch first, then the write batch. Handlers run synchronously and must not
//! block; they may register or deregister interests, which take effect for
//! the next tick (an entry deregistered earlier in the current tick is not
//! invoked).
//!
//! ```text
//!   register_read/write ──► interest sets ──► poll(2) ──► on_ready(event)
//!                                   ▲                         │
//!                                   └──── (de)register ◄──────┘
//! ```
//!
//! Shutdown is cooperative: [`StopHandle::stop`] may be called from any
//! thread. It sets a flag and wakes the poll; at the next tick boundary every
//! still-registered owner receives `on_stop` and [`Reactor::start`] returns.

use std::cell::RefCell;
use std::io::{ErrorKind, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use crate::error::Result;
use crate::observer::{BrokerEvent, BrokerObserver};

/// Which handler an owner wants invoked when its descriptor is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoEvent {
    /// A listening socket has a pending connection.
    Accept,
    /// A connection has bytes (or EOF) to read.
    Read,
    /// A connection can take more outgoing bytes.
    Write,
}

/// An owner of a descriptor that the reactor can notify.
pub trait IoHandler {
    /// Descriptor to watch.
    fn source(&self) -> BorrowedFd<'_>;

    /// Called when the descriptor is ready for the registered event.
    fn on_ready(&self, event: IoEvent);

    /// Called once per still-registered event when the reactor stops.
    fn on_stop(&self, _event: IoEvent) {}
}

#[derive(Clone)]
struct Registration {
    owner: Rc<dyn IoHandler>,
    event: IoEvent,
}

impl Registration {
    fn matches(&self, owner: *const (), event: IoEvent) -> bool {
        Rc::as_ptr(&self.owner).cast::<()>() == owner && self.event == event
    }
}

fn owner_id(owner: &dyn IoHandler) -> *const () {
    std::ptr::from_ref(owner).cast::<()>()
}

/// Thread-safe handle that asks a reactor to stop.
#[derive(Debug, Clone)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
    waker: Arc<UnixStream>,
}

impl StopHandle {
    /// Request shutdown at the next tick boundary.
    pub fn stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
        // A full wake-up buffer means a wake-up is already pending.
        let _ = (&*self.waker).write(&[1]);
    }

    /// Whether shutdown has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

struct Inner {
    reads: RefCell<Vec<Registration>>,
    writes: RefCell<Vec<Registration>>,
    stop: StopHandle,
    wake_rx: UnixStream,
    observer: Rc<dyn BrokerObserver>,
}

/// Handle to a single-threaded reactor. Clones share the same interest sets.
#[derive(Clone)]
pub struct Reactor {
    inner: Rc<Inner>,
}

impl Reactor {
    /// Create a reactor with empty interest sets.
    pub fn new(observer: Rc<dyn BrokerObserver>) -> Result<Self> {
        let (wake_rx, wake_tx) = UnixStream::pair()?;
        wake_rx.set_nonblocking(true)?;
        wake_tx.set_nonblocking(true)?;

        Ok(Self {
            inner: Rc::new(Inner {
                reads: RefCell::new(Vec::new()),
                writes: RefCell::new(Vec::new()),
                stop: StopHandle {
                    requested: Arc::new(AtomicBool::new(false)),
                    waker: Arc::new(wake_tx),
                },
                wake_rx,
                observer,
            }),
        })
    }

    pub fn register_read(&self, owner: Rc<dyn IoHandler>, event: IoEvent) {
        register_on(&self.inner.reads, owner, event);
    }

    pub fn register_write(&self, owner: Rc<dyn IoHandler>, event: IoEvent) {
        register_on(&self.inner.writes, owner, event);
    }

    pub fn deregister_read(&self, owner: &dyn IoHandler, event: IoEvent) {
        deregister_on(&self.inner.reads, owner_id(owner), event);
    }

    pub fn deregister_write(&self, owner: &dyn IoHandler, event: IoEvent) {
        deregister_on(&self.inner.writes, owner_id(owner), event);
    }

    pub fn is_registered_read(&self, owner: &dyn IoHandler, event: IoEvent) -> bool {
        contains(&self.inner.reads, owner_id(owner), event)
    }

    pub fn is_registered_write(&self, owner: &dyn IoHandler, event: IoEvent) -> bool {
        contains(&self.inner.writes, owner_id(owner), event)
    }

    /// Number of (read, write) registrations.
    pub fn interest_counts(&self) -> (usize, usize) {
        (self.inner.reads.borrow().len(), self.inner.writes.borrow().len())
    }

    /// Handle for stopping this reactor from any thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.inner.stop.clone()
    }

    /// Request shutdown at the next tick boundary.
    pub fn stop(&self) {
        self.inner.stop.stop();
    }

    /// Run ticks until stopped.
    ///
    /// Returns `Ok(())` only after a stop request has been honoured. A failing
    /// readiness poll is returned as an error.
    pub fn start(&self) -> Result<()> {
        loop {
            if self.inner.stop.is_stop_requested() {
                self.shutdown();
                return Ok(());
            }
            self.run_once(None)?;
        }
    }

    /// Run a single tick, waiting at most `timeout` (forever when `None`).
    ///
    /// Returns the number of handlers invoked.
    pub fn run_once(&self, timeout: Option<Duration>) -> Result<usize> {
        let reads = self.inner.reads.borrow().clone();
        let writes = self.inner.writes.borrow().clone();

        let ready = match self.poll_ready(&reads, &writes, timeout) {
            Ok(ready) => ready,
            Err(Errno::EINTR) => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let (ready_reads, ready_writes) = ready.split_at(reads.len());

        let mut dispatched = 0;
        for (registration, _) in reads.iter().zip(ready_reads).filter(|(_, ready)| **ready) {
            let owner = Rc::as_ptr(&registration.owner).cast::<()>();
            if contains(&self.inner.reads, owner, registration.event) {
                registration.owner.on_ready(registration.event);
                dispatched += 1;
            }
        }
        for (registration, _) in writes.iter().zip(ready_writes).filter(|(_, ready)| **ready) {
            let owner = Rc::as_ptr(&registration.owner).cast::<()>();
            if contains(&self.inner.writes, owner, registration.event) {
                registration.owner.on_ready(registration.event);
                dispatched += 1;
            }
        }

        Ok(dispatched)
    }

    fn poll_ready(
        &self,
        reads: &[Registration],
        writes: &[Registration],
        timeout: Option<Duration>,
    ) -> nix::Result<Vec<bool>> {
        let ready = {
            let mut fds = Vec::with_capacity(1 + reads.len() + writes.len());
            fds.push(PollFd::new(self.inner.wake_rx.as_fd(), PollFlags::POLLIN));
            fds.extend(
                reads
                    .iter()
                    .map(|r| PollFd::new(r.owner.source(), PollFlags::POLLIN)),
            );
            fds.extend(
                writes
                    .iter()
                    .map(|r| PollFd::new(r.owner.source(), PollFlags::POLLOUT)),
            );

            poll(&mut fds, poll_timeout(timeout))?;

            fds.iter().map(is_ready).collect::<Vec<_>>()
        };

        if ready[0] {
            self.drain_waker();
        }
        Ok(ready[1..].to_vec())
    }

    fn drain_waker(&self) {
        let mut buf = [0u8; 64];
        loop {
            match (&self.inner.wake_rx).read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    }

    fn shutdown(&self) {
        let writes = std::mem::take(&mut *self.inner.writes.borrow_mut());
        let reads = std::mem::take(&mut *self.inner.reads.borrow_mut());

        for registration in writes.iter().chain(reads.iter()) {
            registration.owner.on_stop(registration.event);
        }

        self.inner.observer.observe(BrokerEvent::StoppingReactor);
    }
}

fn register_on(set: &RefCell<Vec<Registration>>, owner: Rc<dyn IoHandler>, event: IoEvent) {
    let id = Rc::as_ptr(&owner).cast::<()>();
    let mut set = set.borrow_mut();
    if !set.iter().any(|r| r.matches(id, event)) {
        set.push(Registration { owner, event });
    }
}

fn deregister_on(set: &RefCell<Vec<Registration>>, owner: *const (), event: IoEvent) {
    set.borrow_mut().retain(|r| !r.matches(owner, event));
}

fn contains(set: &RefCell<Vec<Registration>>, owner: *const (), event: IoEvent) -> bool {
    set.borrow().iter().any(|r| r.matches(owner, event))
}

// Hang-ups and errors count as ready so the handler observes EOF or the reset.
fn is_ready(fd: &PollFd<'_>) -> bool {
    fd.revents().is_some_and(|revents| !revents.is_empty())
}

fn poll_timeout(timeout: Option<Duration>) -> PollTimeout {
    match timeout {
        None => PollTimeout::NONE,
        Some(timeout) => {
            PollTimeout::from(u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX))
        }
    }
}

#[cfg(test)]
mod tests;
