//! Every handler runs on one client dispatcher.
//!
//! The runtime is single threaded, so an event raised before a wait is
//! registered is still handled after the wait exists.

mod common;

use common::{check_status, init_tracing, CancelRequested, ConnectRequested, Connected, MockTransport};
use std::sync::Arc;
use std::time::Duration;
use tokio_eventing::{Dispatcher, EventManager, Result, WaitOptions};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();

    let client = Dispatcher::new("client");
    client.run()?;

    let manager = Arc::new(EventManager::builder().build()?);
    let transport = MockTransport::start(manager.clone(), &client)?;

    run_client(&manager, &client).await?;

    drop(transport);
    client.complete();
    client.join()?;
    Ok(())
}

async fn run_client(manager: &EventManager, client: &Dispatcher) -> Result<()> {
    let mut request = ConnectRequested {
        address: "http://localhost".to_string(),
        delay: Duration::ZERO,
    };

    // Raised first, waited for second.
    manager.raise_event(request.clone());
    let event = manager
        .wait_for_any::<(Connected, CancelRequested)>(
            WaitOptions::new()
                .timeout(Duration::from_millis(50))
                .filter(|envelope| {
                    envelope
                        .downcast_ref::<Connected>()
                        .map_or(true, |connected| connected.address == "http://localhost")
                })
                .dispatcher(client.clone()),
        )?
        .await;
    // Expected: connected
    check_status(event);

    request.delay = Duration::from_millis(100);
    manager.raise_event(request.clone());
    let event = manager
        .wait_for_any::<(Connected, CancelRequested)>(
            WaitOptions::new()
                .timeout(Duration::from_millis(50))
                .dispatcher(client.clone()),
        )?
        .await;
    // Expected: timeout, the connect delay is longer than the wait
    check_status(event);

    manager.raise_event(request);
    let wait = manager.wait_for_any::<(Connected, CancelRequested)>(
        WaitOptions::new()
            .timeout(Duration::from_millis(50))
            .dispatcher(client.clone()),
    )?;
    manager.raise_event(CancelRequested);
    // Expected: cancelled, the cancel arrives before the connection
    check_status(wait.await);

    Ok(())
}
