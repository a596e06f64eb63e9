//! activity-broker: follower-aware notification broker
//!
//! Accepts one event-source connection and any number of subscriber
//! connections, and routes each event to the subscribers it concerns.
//!
//! ## Architecture
//! ```text
//! [event source] --(9090)--> [activity-broker] --(9099)--> [subscribers]
//! ```
//!
//! ## Configuration
//! - First argument: path to a YAML config file (optional)
//! - BROKER_CONFIG: path to a YAML config file (optional)
//! - BROKER__SERVER__EVENT_SOURCE_PORT, BROKER__SERVER__SUBSCRIBER_PORT, ...
//! - BROKER_LOG: log filter, overrides `logging.level`

use std::rc::Rc;

use tracing::{error, info};

use activity_broker::config::BrokerConfig;
use activity_broker::observer::TracingObserver;
use activity_broker::reactor::StopHandle;
use activity_broker::runner::ApplicationRunner;
use activity_broker::utils::bootstrap::init_tracing;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args().nth(1);
    let config = BrokerConfig::load(path.as_deref())?;
    init_tracing(&config.logging);

    let runner = ApplicationRunner::new(&config, Rc::new(TracingObserver))?;
    info!(
        event_source = %runner.event_source_addr(),
        subscribers = %runner.subscriber_addr(),
        "activity-broker started"
    );

    watch_for_interrupt(runner.stop_handle());

    runner.start()?;
    Ok(())
}

/// Stop the broker on Ctrl-C, watched from a helper thread.
fn watch_for_interrupt(stop: StopHandle) {
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(error = %e, "Failed to start signal watcher");
                return;
            }
        };

        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, shutting down");
                stop.stop();
            }
        });
    });
}
