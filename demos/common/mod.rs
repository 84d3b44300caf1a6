//! Events and a mock transport shared by the demos.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_eventing::{
    Dispatcher, Event, EventEnvelope, EventManager, Listener, OwnerId, ReceiveOptions, Result,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct ConnectRequested {
    pub address: String,
    pub delay: Duration,
}

impl Event for ConnectRequested {
    fn event_type() -> &'static str {
        "ConnectRequested"
    }
}

#[derive(Debug, Clone)]
pub struct Connected {
    pub address: String,
}

impl Event for Connected {
    fn event_type() -> &'static str {
        "Connected"
    }
}

#[derive(Debug, Clone)]
pub struct CancelRequested;

impl Event for CancelRequested {
    fn event_type() -> &'static str {
        "CancelRequested"
    }
}

#[derive(Debug, Clone)]
pub struct ServerFound;

impl Event for ServerFound {
    fn event_type() -> &'static str {
        "ServerFound"
    }
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Answers every connect request with `Connected` after the requested delay.
#[derive(Debug)]
pub struct MockTransport {
    id: OwnerId,
    manager: Arc<EventManager>,
    runtime: Handle,
}

impl MockTransport {
    pub fn start(manager: Arc<EventManager>, dispatcher: &Dispatcher) -> Result<Arc<Self>> {
        let transport = Arc::new(Self {
            id: OwnerId::named("mock-transport"),
            manager: manager.clone(),
            runtime: Handle::current(),
        });

        manager.listen(
            &transport,
            |transport: &MockTransport, event: &ConnectRequested| transport.connect(event),
            ReceiveOptions::new().dispatcher(dispatcher.clone()),
        )?;

        info!("Mock transport initialized");
        Ok(transport)
    }

    fn connect(&self, request: &ConnectRequested) {
        let manager = self.manager.clone();
        let request = request.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(request.delay).await;
            manager.raise_event(Connected {
                address: request.address,
            });
        });
    }
}

impl Listener for MockTransport {
    fn listener_id(&self) -> OwnerId {
        self.id
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.manager.stop_receiving(self.id);
    }
}

pub fn check_status(event: Option<EventEnvelope>) {
    match event {
        None => warn!("Connection timeout"),
        Some(envelope) if envelope.is::<CancelRequested>() => warn!("Connection cancelled"),
        Some(envelope) => match envelope.downcast_ref::<Connected>() {
            Some(connected) => warn!(address = %connected.address, "Connected"),
            None => warn!(event_type = envelope.event_type(), "Unexpected event"),
        },
    }
}
