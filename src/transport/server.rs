//! Non-blocking TCP listener.
//!
//! A [`Server`] registers its listening socket with the reactor. Readiness on
//! a listening socket means a connection is pending; each notification
//! performs one non-blocking accept, wraps the connection in a
//! [`FramedStream`] and hands it to the [`ConnectionListener`].

use std::cell::{Cell, RefCell};
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener};
use std::os::fd::{AsFd, BorrowedFd};
use std::rc::{Rc, Weak};

use crate::error::{BrokerError, Result};
use crate::observer::{BrokerEvent, BrokerObserver};
use crate::reactor::{IoEvent, IoHandler, Reactor};

use super::FramedStream;

/// Receives every connection accepted by a [`Server`].
pub trait ConnectionListener {
    fn on_connection(&self, stream: Rc<FramedStream>);
}

/// A listening socket driven by the reactor.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    reactor: Reactor,
    observer: Rc<dyn BrokerObserver>,
    this: Weak<Server>,
    on_connection: RefCell<Option<Rc<dyn ConnectionListener>>>,
    stopped: Cell<bool>,
}

impl Server {
    /// Bind a listening socket on `host:port`. Port 0 picks an ephemeral port.
    ///
    /// Failing to bind aborts startup with [`BrokerError::Bind`].
    pub fn bind(
        host: &str,
        port: u16,
        reactor: Reactor,
        observer: Rc<dyn BrokerObserver>,
    ) -> Result<Rc<Self>> {
        let addr = format!("{}:{}", host, port);
        let bind_error = |source| BrokerError::Bind {
            addr: addr.clone(),
            source,
        };

        let listener = TcpListener::bind(&addr).map_err(bind_error)?;
        listener.set_nonblocking(true).map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        Ok(Rc::new_cyclic(|this| Self {
            listener,
            local_addr,
            reactor,
            observer,
            this: this.clone(),
            on_connection: RefCell::new(None),
            stopped: Cell::new(false),
        }))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Start accepting connections, handing each one to `on_connection`.
    pub fn accept_connections(&self, on_connection: Rc<dyn ConnectionListener>) {
        self.observer
            .observe(BrokerEvent::ServerAcceptingConnections { port: self.port() });
        *self.on_connection.borrow_mut() = Some(on_connection);
        if let Some(this) = self.this.upgrade() {
            self.reactor.register_read(this, IoEvent::Accept);
        }
    }

    /// Whether the reactor has stopped this server.
    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }

    fn process_new_connection(&self) {
        let socket = match self.listener.accept() {
            Ok((socket, _peer)) => socket,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => return,
            Err(e) => {
                self.observer.observe(BrokerEvent::AcceptFailed {
                    port: self.port(),
                    error: &e,
                });
                return;
            }
        };

        let stream = match FramedStream::new(socket, self.reactor.clone(), self.observer.clone()) {
            Ok(stream) => stream,
            Err(e) => {
                self.observer.observe(BrokerEvent::AcceptFailed {
                    port: self.port(),
                    error: &e,
                });
                return;
            }
        };

        self.observer
            .observe(BrokerEvent::ConnectionAccepted { port: self.port() });

        let listener = self.on_connection.borrow().clone();
        if let Some(listener) = listener {
            listener.on_connection(stream);
        }
    }
}

impl IoHandler for Server {
    fn source(&self) -> BorrowedFd<'_> {
        self.listener.as_fd()
    }

    fn on_ready(&self, event: IoEvent) {
        if event == IoEvent::Accept {
            self.process_new_connection();
        }
    }

    /// The listening socket is closed when the last handle to the server drops;
    /// the reactor releases its handle as part of stopping.
    fn on_stop(&self, _event: IoEvent) {
        if !self.stopped.replace(true) {
            self.on_connection.borrow_mut().take();
            self.observer
                .observe(BrokerEvent::StoppingServer { port: self.port() });
        }
    }
}
