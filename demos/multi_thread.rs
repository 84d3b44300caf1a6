//! A client and a server exchanging events from two dispatchers.

mod common;

use common::{check_status, init_tracing, CancelRequested, ConnectRequested, Connected, ServerFound};
use std::sync::Arc;
use std::time::Duration;
use tokio_eventing::{Dispatcher, EventManager, OwnerId, ReceiveOptions, Result, WaitOptions};
use tracing::{error, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let server = Dispatcher::new("server");
    let client = Dispatcher::new("client");
    server.run()?;
    client.run()?;

    let manager = Arc::new(EventManager::builder().build()?);

    // The client must be waiting before the server announces itself.
    let server_found = manager.wait_for::<ServerFound>(WaitOptions::new().dispatcher(client.clone()))?;

    let server_task = tokio::spawn(run_server(manager.clone(), server.clone()));
    run_client(&manager, &client, server_found).await?;

    match server_task.await {
        Ok(result) => result?,
        Err(e) => error!(error = %e, "Server task failed"),
    }

    for dispatcher in [&client, &server] {
        dispatcher.complete();
        dispatcher.join()?;
    }
    Ok(())
}

async fn run_server(manager: Arc<EventManager>, server: Dispatcher) -> Result<()> {
    let owner = OwnerId::named("server");

    // Receiving and waiting for the same type at once is allowed.
    manager.start_receiving(
        |_: &ConnectRequested| warn!("Connect requested"),
        ReceiveOptions::owned_by(owner).dispatcher(server.clone()),
    )?;

    // Wait first: the client may answer as soon as it sees ServerFound.
    let request = manager.wait_for::<ConnectRequested>(
        WaitOptions::new()
            .timeout(Duration::from_secs(1))
            .dispatcher(server.clone()),
    )?;
    manager.raise_event(ServerFound);

    let Some(envelope) = request.await else {
        warn!("Timeout");
        return Ok(());
    };
    if let Some(request) = envelope.downcast_ref::<ConnectRequested>() {
        warn!(address = %request.address, "Processing client request");
        manager.raise_event(Connected {
            address: request.address.clone(),
        });
    }

    manager.stop_receiving(owner);
    Ok(())
}

async fn run_client(
    manager: &EventManager,
    client: &Dispatcher,
    server_found: tokio_eventing::WaitFor,
) -> Result<()> {
    if server_found.await.is_none() {
        warn!("Server never showed up");
        return Ok(());
    }

    let connected = manager.wait_for_any::<(Connected, CancelRequested)>(
        WaitOptions::new()
            .timeout(Duration::from_secs(1))
            .dispatcher(client.clone()),
    )?;
    manager.raise_event(ConnectRequested {
        address: "http://localhost".to_string(),
        delay: Duration::ZERO,
    });

    // Expected: connected
    check_status(connected.await);
    Ok(())
}
