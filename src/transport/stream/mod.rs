//! Newline-framed, non-blocking message stream over one TCP connection.
//!
//! Reads are performed one chunk per readiness notification and appended to
//! an accumulation buffer; every complete frame in the buffer is handed to
//! the [`MessageListener`] with its boundary stripped, and any trailing
//! partial frame stays buffered for the next read. Writes append
//! `message + boundary` to an outgoing buffer that is flushed as the socket
//! becomes writable, so framing and byte order survive partial OS writes.

use std::cell::RefCell;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::os::fd::{AsFd, BorrowedFd};
use std::rc::{Rc, Weak};

use bytes::{Buf, BufMut, BytesMut};

use crate::observer::{BrokerEvent, BrokerObserver};
use crate::reactor::{IoEvent, IoHandler, Reactor};

/// Byte terminating every frame on the wire.
pub const MESSAGE_BOUNDARY: u8 = b'\n';

/// Maximum bytes taken from the socket per read notification.
pub const READ_CHUNK_SIZE: usize = 4096;

/// Receives complete frames read from a [`FramedStream`].
pub trait MessageListener {
    /// Called once per frame, in arrival order. `stream` is the stream the
    /// frame arrived on, so the listener can reply or keep it as a sink.
    fn on_message(&self, frame: &str, stream: &Rc<FramedStream>);
}

#[derive(Default)]
struct StreamState {
    read_buf: BytesMut,
    write_buf: BytesMut,
    listener: Option<Rc<dyn MessageListener>>,
    closed: bool,
}

/// A framed, full-duplex connection registered with the reactor.
pub struct FramedStream {
    socket: TcpStream,
    peer: Option<SocketAddr>,
    reactor: Reactor,
    observer: Rc<dyn BrokerObserver>,
    this: Weak<FramedStream>,
    state: RefCell<StreamState>,
}

impl FramedStream {
    /// Wrap a connected socket. The socket is switched to non-blocking mode.
    pub fn new(
        socket: TcpStream,
        reactor: Reactor,
        observer: Rc<dyn BrokerObserver>,
    ) -> std::io::Result<Rc<Self>> {
        socket.set_nonblocking(true)?;
        let peer = socket.peer_addr().ok();

        Ok(Rc::new_cyclic(|this| Self {
            socket,
            peer,
            reactor,
            observer,
            this: this.clone(),
            state: RefCell::new(StreamState::default()),
        }))
    }

    /// Start delivering frames to `listener`.
    pub fn read(&self, listener: Rc<dyn MessageListener>) {
        {
            let mut state = self.state.borrow_mut();
            if state.closed {
                return;
            }
            state.listener = Some(listener);
        }
        if let Some(this) = self.this.upgrade() {
            self.reactor.register_read(this, IoEvent::Read);
        }
    }

    /// Queue one outgoing frame. Writes to a closed stream are dropped.
    pub fn write(&self, message: &str) {
        {
            let mut state = self.state.borrow_mut();
            if state.closed {
                return;
            }
            state.write_buf.reserve(message.len() + 1);
            state.write_buf.put_slice(message.as_bytes());
            state.write_buf.put_u8(MESSAGE_BOUNDARY);
        }
        if let Some(this) = self.this.upgrade() {
            self.reactor.register_write(this, IoEvent::Write);
        }
    }

    /// Whether the connection has been released.
    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    /// Bytes queued but not yet written to the socket.
    pub fn pending_write_bytes(&self) -> usize {
        self.state.borrow().write_buf.len()
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn on_readable(&self) {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = (&self.socket).read(&mut chunk);

        match read {
            Ok(0) => self.close(),
            Ok(n) => self.stream_messages(&chunk[..n]),
            Err(e) if is_transient(e.kind()) => {}
            Err(_) => self.close(),
        }
    }

    fn stream_messages(&self, bytes: &[u8]) {
        let (frames, listener) = {
            let mut state = self.state.borrow_mut();
            state.read_buf.extend_from_slice(bytes);

            let mut frames = Vec::new();
            while let Some(pos) = state.read_buf.iter().position(|b| *b == MESSAGE_BOUNDARY) {
                let frame = state.read_buf.split_to(pos + 1);
                frames.push(String::from_utf8_lossy(&frame[..pos]).into_owned());
            }
            (frames, state.listener.clone())
        };

        let (Some(listener), Some(this)) = (listener, self.this.upgrade()) else {
            return;
        };
        for frame in frames {
            if self.is_closed() {
                break;
            }
            self.observer
                .observe(BrokerEvent::StreamingMessage { frame: &frame });
            listener.on_message(&frame, &this);
        }
    }

    fn on_writable(&self) {
        let drained = {
            let mut state = self.state.borrow_mut();
            if !state.write_buf.is_empty() {
                match (&self.socket).write(&state.write_buf) {
                    Ok(n) => state.write_buf.advance(n),
                    Err(e) if is_transient(e.kind()) => return,
                    Err(_) => {
                        drop(state);
                        self.close();
                        return;
                    }
                }
            }
            state.write_buf.is_empty()
        };

        if drained {
            self.reactor.deregister_write(self, IoEvent::Write);
        }
    }

    /// Release the connection: no further callbacks, later writes dropped.
    fn close(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.closed {
                return;
            }
            state.closed = true;
            state.listener = None;
            state.read_buf.clear();
            state.write_buf.clear();
        }
        self.reactor.deregister_read(self, IoEvent::Read);
        self.reactor.deregister_write(self, IoEvent::Write);
        let _ = self.socket.shutdown(Shutdown::Both);
        self.observer.observe(BrokerEvent::ConnectionClosed);
    }
}

impl IoHandler for FramedStream {
    fn source(&self) -> BorrowedFd<'_> {
        self.socket.as_fd()
    }

    fn on_ready(&self, event: IoEvent) {
        match event {
            IoEvent::Read => self.on_readable(),
            IoEvent::Write => self.on_writable(),
            IoEvent::Accept => {}
        }
    }

    fn on_stop(&self, _event: IoEvent) {
        let mut state = self.state.borrow_mut();
        if !state.closed {
            state.closed = true;
            state.listener = None;
            let _ = self.socket.shutdown(Shutdown::Both);
        }
    }
}

fn is_transient(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::WouldBlock | ErrorKind::Interrupted)
}
