//! Camera-side demo
//!
//! Registers a camera identity with a coordination server, goes live, and
//! logs viewer membership as it changes.
//!
//! Run with: cargo run --example camera [SERVER_URL]
//!
//! Examples:
//!   cargo run --example camera                          # discovers a server on the LAN
//!   cargo run --example camera ws://127.0.0.1:8787/ws   # explicit server

use std::sync::Arc;

use camlink::client::{CamlinkClient, ClientConfig};
use camlink::coordinator::CoordinatorEvent;
use camlink::media::SimulatedMedia;
use camlink::transport::{discover_server, DiscoveryConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("camlink=debug".parse()?),
        )
        .init();

    let url = match std::env::args().nth(1) {
        Some(url) => url,
        None => {
            println!("Scanning for a coordination server...");
            let result = discover_server(&DiscoveryConfig::default()).await;
            match result.url {
                Some(url) => url,
                None => {
                    eprintln!(
                        "No server found after probing {} addresses; pass a URL explicitly",
                        result.probed
                    );
                    std::process::exit(1);
                }
            }
        }
    };

    println!("Connecting to {}", url);
    let client = CamlinkClient::new(
        ClientConfig::with_url(url),
        Arc::new(SimulatedMedia::new()),
    );

    if !client.connect().await {
        eprintln!("Connection failed; retrying in the background");
    }

    let mut events = client.subscribe();
    let publisher = client.publisher();

    // Wait for the coordination layer to come up before registering
    while !client.is_connected() {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    let camera_id = publisher.register_identity("Demo camera").await?;
    publisher.start_publishing().await?;
    println!("Publishing as {}", camera_id);

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(CoordinatorEvent::CameraListChanged(_)) => {
                        let state = publisher.state();
                        println!("Viewers: {:?}", state.connected_viewers);
                    }
                    Ok(CoordinatorEvent::ConnectionChanged { connected, .. }) => {
                        println!("Transport connected: {}", connected);
                    }
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                publisher.stop_publishing().await;
                publisher.unregister().await;
                client.shutdown().await;
                break;
            }
        }
    }

    Ok(())
}
