//! Broker wiring and process lifecycle.
//!
//! ```text
//!   event source ──► Server ──► FramedStream ──► EventSourceReader ──► parse
//!                                                                       │
//!          Router ◄── TypeDispatcher ◄── Resequencer ◄──────────────────┘
//!            │
//!            └──► DeliveryRegistry ──► subscriber FramedStreams
//!                      ▲
//!   subscribers ──► Server ──► FramedStream ──► SubscriptionHandshake
//! ```

use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;

use crate::config::BrokerConfig;
use crate::error::Result;
use crate::notification::{parse, NotificationListener, ParseError};
use crate::observer::{BrokerEvent, BrokerObserver};
use crate::ordering::Resequencer;
use crate::reactor::Reactor;
pub use crate::reactor::StopHandle;
use crate::routing::{Router, TypeDispatcher};
use crate::subscription::SubscriptionHandshake;
use crate::transport::{ConnectionListener, FramedStream, MessageListener, Server};

// ============================================================================
// Event Source
// ============================================================================

/// Parses event-source frames and feeds them to the resequencer.
///
/// Frames that do not parse are reported and dropped.
pub struct EventSourceReader {
    resequencer: Rc<Resequencer>,
    observer: Rc<dyn BrokerObserver>,
}

impl EventSourceReader {
    pub fn new(resequencer: Rc<Resequencer>, observer: Rc<dyn BrokerObserver>) -> Self {
        Self {
            resequencer,
            observer,
        }
    }
}

impl MessageListener for EventSourceReader {
    fn on_message(&self, frame: &str, _stream: &Rc<FramedStream>) {
        match parse(frame) {
            Ok(notification) => self.resequencer.process(notification),
            Err(ParseError::Malformed { frame, reason }) => {
                self.observer.observe(BrokerEvent::MalformedMessage {
                    frame: &frame,
                    reason: &reason,
                })
            }
            Err(ParseError::UnknownType { frame, tag }) => self
                .observer
                .observe(BrokerEvent::UnknownNotificationType {
                    frame: &frame,
                    tag: &tag,
                }),
        }
    }
}

/// Starts reading every accepted connection with a fixed listener.
struct ReadWith(Rc<dyn MessageListener>);

impl ConnectionListener for ReadWith {
    fn on_connection(&self, stream: Rc<FramedStream>) {
        stream.read(self.0.clone());
    }
}

// ============================================================================
// Broker
// ============================================================================

/// A fully wired broker: both listeners bound, pipeline connected.
///
/// Each listener is owned by its reactor registration, so stopping the
/// reactor closes both listening sockets.
pub struct Broker {
    reactor: Reactor,
    event_source_addr: SocketAddr,
    subscriber_addr: SocketAddr,
    router: Rc<Router>,
    resequencer: Rc<Resequencer>,
}

impl Broker {
    /// Wire the pipeline and bind both listeners.
    ///
    /// A listener that cannot be bound aborts startup.
    pub fn bind(config: &BrokerConfig, observer: Rc<dyn BrokerObserver>) -> Result<Self> {
        observer.observe(BrokerEvent::StartingBroker);

        let reactor = Reactor::new(observer.clone())?;

        let router = Rc::new(Router::new(config.routing.clone(), observer.clone()));
        let dispatcher = Rc::new(TypeDispatcher::new(router.clone()));
        let resequencer = Rc::new(Resequencer::new(dispatcher, observer.clone()));

        let event_source = Server::bind(
            &config.server.host,
            config.server.event_source_port,
            reactor.clone(),
            observer.clone(),
        )?;
        let subscribers = Server::bind(
            &config.server.host,
            config.server.subscriber_port,
            reactor.clone(),
            observer.clone(),
        )?;

        let reader = EventSourceReader::new(resequencer.clone(), observer.clone());
        event_source.accept_connections(Rc::new(ReadWith(Rc::new(reader))));

        let handshake = SubscriptionHandshake::new(router.clone(), observer);
        subscribers.accept_connections(Rc::new(ReadWith(Rc::new(handshake))));

        Ok(Self {
            reactor,
            event_source_addr: event_source.local_addr(),
            subscriber_addr: subscribers.local_addr(),
            router,
            resequencer,
        })
    }

    pub fn event_source_addr(&self) -> SocketAddr {
        self.event_source_addr
    }

    pub fn subscriber_addr(&self) -> SocketAddr {
        self.subscriber_addr
    }

    pub fn router(&self) -> &Rc<Router> {
        &self.router
    }

    pub fn resequencer(&self) -> &Rc<Resequencer> {
        &self.resequencer
    }

    /// Handle for stopping the broker from any thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.reactor.stop_handle()
    }

    /// Run one reactor tick.
    pub fn run_once(&self, timeout: Option<Duration>) -> Result<usize> {
        self.reactor.run_once(timeout)
    }

    /// Run until stopped. Both listening sockets are closed on return.
    pub fn run(&self) -> Result<()> {
        self.reactor.start()
    }
}

// ============================================================================
// Application Runner
// ============================================================================

/// `start`/`stop` lifecycle around a [`Broker`].
pub struct ApplicationRunner {
    broker: Broker,
    stop: StopHandle,
}

impl ApplicationRunner {
    /// Bind the broker. Startup failures are returned here.
    pub fn new(config: &BrokerConfig, observer: Rc<dyn BrokerObserver>) -> Result<Self> {
        let broker = Broker::bind(config, observer)?;
        let stop = broker.stop_handle();
        Ok(Self { broker, stop })
    }

    pub fn event_source_addr(&self) -> SocketAddr {
        self.broker.event_source_addr()
    }

    pub fn subscriber_addr(&self) -> SocketAddr {
        self.broker.subscriber_addr()
    }

    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    /// Run the broker until [`stop`](Self::stop) is requested.
    ///
    /// Once stopped the listeners are closed, so a later call returns
    /// immediately.
    pub fn start(&self) -> Result<()> {
        self.broker.run()
    }

    /// Request shutdown. The loop ends at the next tick boundary.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Handle for requesting shutdown from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream;

    use crate::test_utils::RecordingObserver;

    const TICK: Option<Duration> = Some(Duration::from_millis(50));

    fn broker() -> (Broker, Rc<RecordingObserver>) {
        let observer = Rc::new(RecordingObserver::new());
        let broker = Broker::bind(&BrokerConfig::for_test(), observer.clone()).unwrap();
        (broker, observer)
    }

    fn pump(broker: &Broker) {
        for _ in 0..5 {
            broker.run_once(TICK).unwrap();
        }
    }

    fn client(addr: SocketAddr) -> TcpStream {
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(1)))
            .unwrap();
        stream
    }

    fn subscriber(broker: &Broker, id: u64) -> TcpStream {
        let mut stream = client(broker.subscriber_addr());
        stream.write_all(format!("{}\n", id).as_bytes()).unwrap();
        pump(broker);
        stream
    }

    fn read_frame(stream: &mut TcpStream, len: usize) -> String {
        let mut buf = vec![0u8; len];
        stream.read_exact(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_bind_observes_startup() {
        let (broker, observer) = broker();
        assert_ne!(broker.event_source_addr().port(), 0);
        assert_ne!(broker.subscriber_addr(), broker.event_source_addr());
        assert_eq!(
            observer.names(),
            vec![
                "starting_broker",
                "server_accepting_connections",
                "server_accepting_connections",
            ]
        );
    }

    #[test]
    fn test_bind_conflict_aborts_startup() {
        let (running, _) = broker();
        let mut config = BrokerConfig::for_test();
        config.server.event_source_port = running.event_source_addr().port();

        let result = Broker::bind(&config, Rc::new(RecordingObserver::new()));
        assert!(matches!(result, Err(crate::error::BrokerError::Bind { .. })));
    }

    #[test]
    fn test_broadcast_reaches_subscriber() {
        let (broker, _) = broker();
        let mut sub = subscriber(&broker, 123);
        assert!(broker.router().is_subscribed(123));

        let mut source = client(broker.event_source_addr());
        source.write_all(b"1|B\n").unwrap();
        pump(&broker);

        assert_eq!(read_frame(&mut sub, 4), "1|B\n");
    }

    #[test]
    fn test_bad_frames_are_reported_and_dropped() {
        let (broker, observer) = broker();
        let mut source = client(broker.event_source_addr());
        source.write_all(b"x|B\n1|X\n1|B\n").unwrap();
        pump(&broker);

        assert!(observer.saw("malformed_message"));
        assert!(observer.saw("unknown_notification_type"));
        assert_eq!(broker.resequencer().last_forwarded(), Some(1));
    }

    #[test]
    fn test_out_of_order_frames_are_buffered() {
        let (broker, observer) = broker();
        let mut source = client(broker.event_source_addr());
        source.write_all(b"3|B\n2|B\n").unwrap();
        pump(&broker);

        assert_eq!(broker.resequencer().pending(), 2);
        assert_eq!(observer.count("notification_buffered"), 2);
        assert!(observer
            .events()
            .iter()
            .any(|event| event.contains("id: 2") && event.contains("pending: 2")));
    }

    #[test]
    fn test_disconnected_subscriber_is_released() {
        let (broker, _) = broker();
        let sub = subscriber(&broker, 123);
        assert!(broker.router().is_subscribed(123));

        drop(sub);
        pump(&broker);

        assert!(!broker.router().is_subscribed(123));
        assert_eq!(broker.router().subscriber_count(), 0);
    }

    #[test]
    fn test_run_closes_listeners_while_broker_alive() {
        let (broker, _) = broker();
        let event_source = broker.event_source_addr();
        let subscribers = broker.subscriber_addr();

        broker.stop_handle().stop();
        broker.run().unwrap();

        assert!(TcpStream::connect(event_source).is_err());
        assert!(TcpStream::connect(subscribers).is_err());
        assert_eq!(broker.event_source_addr(), event_source);
    }

    #[test]
    fn test_runner_stop_closes_listeners() {
        let observer = Rc::new(RecordingObserver::new());
        let runner = ApplicationRunner::new(&BrokerConfig::for_test(), observer.clone()).unwrap();
        let addr = runner.event_source_addr();

        runner.stop();
        runner.start().unwrap();

        assert!(observer.saw("stopping_reactor"));
        assert_eq!(observer.count("stopping_server"), 2);
        assert!(TcpStream::connect(addr).is_err());
    }
}
