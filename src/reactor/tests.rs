use super::*;
use std::cell::{Cell, RefCell};
use std::io::{Read, Write};
use std::rc::Weak;

use crate::test_utils::RecordingObserver;

/// Handler over one end of a Unix socket pair that records what it saw.
struct SocketHandler {
    socket: UnixStream,
    ready: RefCell<Vec<IoEvent>>,
    stopped: RefCell<Vec<IoEvent>>,
}

impl SocketHandler {
    fn pair() -> (Rc<Self>, UnixStream) {
        let (ours, theirs) = UnixStream::pair().unwrap();
        ours.set_nonblocking(true).unwrap();
        let handler = Rc::new(Self {
            socket: ours,
            ready: RefCell::new(Vec::new()),
            stopped: RefCell::new(Vec::new()),
        });
        (handler, theirs)
    }

    fn drain(&self) {
        let mut buf = [0u8; 256];
        while let Ok(n) = (&self.socket).read(&mut buf) {
            if n == 0 {
                break;
            }
        }
    }
}

impl IoHandler for SocketHandler {
    fn source(&self) -> BorrowedFd<'_> {
        self.socket.as_fd()
    }

    fn on_ready(&self, event: IoEvent) {
        self.ready.borrow_mut().push(event);
        if event == IoEvent::Read {
            self.drain();
        }
    }

    fn on_stop(&self, event: IoEvent) {
        self.stopped.borrow_mut().push(event);
    }
}

fn reactor() -> (Reactor, Rc<RecordingObserver>) {
    let observer = Rc::new(RecordingObserver::new());
    let reactor = Reactor::new(observer.clone()).unwrap();
    (reactor, observer)
}

const TICK: Option<Duration> = Some(Duration::from_millis(200));
const IDLE: Option<Duration> = Some(Duration::from_millis(20));

#[test]
fn test_register_is_idempotent() {
    let (reactor, _) = reactor();
    let (handler, _peer) = SocketHandler::pair();

    reactor.register_read(handler.clone(), IoEvent::Read);
    reactor.register_read(handler.clone(), IoEvent::Read);
    reactor.register_write(handler.clone(), IoEvent::Write);

    assert_eq!(reactor.interest_counts(), (1, 1));
    assert!(reactor.is_registered_read(&*handler, IoEvent::Read));
    assert!(!reactor.is_registered_read(&*handler, IoEvent::Accept));
}

#[test]
fn test_same_owner_different_events_are_distinct() {
    let (reactor, _) = reactor();
    let (handler, _peer) = SocketHandler::pair();

    reactor.register_read(handler.clone(), IoEvent::Read);
    reactor.register_read(handler.clone(), IoEvent::Accept);

    assert_eq!(reactor.interest_counts(), (2, 0));
}

#[test]
fn test_deregister_unknown_is_noop() {
    let (reactor, _) = reactor();
    let (registered, _p1) = SocketHandler::pair();
    let (stranger, _p2) = SocketHandler::pair();

    reactor.register_read(registered.clone(), IoEvent::Read);
    reactor.deregister_read(&*stranger, IoEvent::Read);
    reactor.deregister_write(&*registered, IoEvent::Write);

    assert_eq!(reactor.interest_counts(), (1, 0));
}

#[test]
fn test_read_handler_invoked_when_data_arrives() {
    let (reactor, _) = reactor();
    let (handler, mut peer) = SocketHandler::pair();
    reactor.register_read(handler.clone(), IoEvent::Read);

    assert_eq!(reactor.run_once(IDLE).unwrap(), 0);
    assert!(handler.ready.borrow().is_empty());

    peer.write_all(b"hello").unwrap();
    assert_eq!(reactor.run_once(TICK).unwrap(), 1);
    assert_eq!(*handler.ready.borrow(), vec![IoEvent::Read]);
}

#[test]
fn test_write_handler_invoked_on_writable_socket() {
    let (reactor, _) = reactor();
    let (handler, _peer) = SocketHandler::pair();
    reactor.register_write(handler.clone(), IoEvent::Write);

    assert_eq!(reactor.run_once(TICK).unwrap(), 1);
    assert_eq!(*handler.ready.borrow(), vec![IoEvent::Write]);
}

#[test]
fn test_read_batch_runs_before_write_batch() {
    let (reactor, _) = reactor();
    let (handler, mut peer) = SocketHandler::pair();
    reactor.register_write(handler.clone(), IoEvent::Write);
    reactor.register_read(handler.clone(), IoEvent::Read);
    peer.write_all(b"x").unwrap();

    assert_eq!(reactor.run_once(TICK).unwrap(), 2);
    assert_eq!(*handler.ready.borrow(), vec![IoEvent::Read, IoEvent::Write]);
}

#[test]
fn test_hangup_reaches_read_handler() {
    let (reactor, _) = reactor();
    let (handler, peer) = SocketHandler::pair();
    reactor.register_read(handler.clone(), IoEvent::Read);

    drop(peer);

    assert_eq!(reactor.run_once(TICK).unwrap(), 1);
}

/// Deregisters another owner when it becomes readable.
struct Evictor {
    socket: UnixStream,
    reactor: Reactor,
    victim: RefCell<Weak<SocketHandler>>,
    fired: Cell<bool>,
}

impl IoHandler for Evictor {
    fn source(&self) -> BorrowedFd<'_> {
        self.socket.as_fd()
    }

    fn on_ready(&self, _event: IoEvent) {
        self.fired.set(true);
        if let Some(victim) = self.victim.borrow().upgrade() {
            self.reactor.deregister_read(&*victim, IoEvent::Read);
        }
    }
}

#[test]
fn test_entry_deregistered_in_same_tick_is_skipped() {
    let (reactor, _) = reactor();
    let (evictor_socket, mut evictor_peer) = UnixStream::pair().unwrap();
    let (victim, mut victim_peer) = SocketHandler::pair();

    let evictor = Rc::new(Evictor {
        socket: evictor_socket,
        reactor: reactor.clone(),
        victim: RefCell::new(Rc::downgrade(&victim)),
        fired: Cell::new(false),
    });
    reactor.register_read(evictor.clone(), IoEvent::Read);
    reactor.register_read(victim.clone(), IoEvent::Read);

    evictor_peer.write_all(b"go").unwrap();
    victim_peer.write_all(b"data").unwrap();

    assert_eq!(reactor.run_once(TICK).unwrap(), 1);
    assert!(evictor.fired.get());
    assert!(victim.ready.borrow().is_empty());
    assert_eq!(reactor.interest_counts(), (1, 0));
}

#[test]
fn test_stop_runs_stop_handlers_and_returns() {
    let (reactor, observer) = reactor();
    let (reader, _p1) = SocketHandler::pair();
    let (writer, _p2) = SocketHandler::pair();
    reactor.register_read(reader.clone(), IoEvent::Read);
    reactor.register_write(writer.clone(), IoEvent::Write);

    reactor.stop();
    reactor.start().unwrap();

    assert_eq!(*reader.stopped.borrow(), vec![IoEvent::Read]);
    assert_eq!(*writer.stopped.borrow(), vec![IoEvent::Write]);
    assert_eq!(reactor.interest_counts(), (0, 0));
    assert!(observer.saw("stopping_reactor"));
}

#[test]
fn test_stop_from_another_thread_wakes_blocked_poll() {
    let (reactor, observer) = reactor();
    let (handler, _peer) = SocketHandler::pair();
    reactor.register_read(handler.clone(), IoEvent::Read);

    let stop = reactor.stop_handle();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        stop.stop();
    });

    reactor.start().unwrap();
    stopper.join().unwrap();

    assert!(handler.ready.borrow().is_empty());
    assert_eq!(*handler.stopped.borrow(), vec![IoEvent::Read]);
    assert_eq!(observer.count("stopping_reactor"), 1);
}

#[test]
fn test_stop_handle_reports_request() {
    let (reactor, _) = reactor();
    let stop = reactor.stop_handle();
    assert!(!stop.is_stop_requested());
    stop.stop();
    stop.stop();
    assert!(stop.is_stop_requested());
}
