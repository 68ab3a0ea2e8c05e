//! Viewer-side demo
//!
//! Connects to a coordination server, waits for a camera to appear, joins
//! its stream, and logs session state changes.
//!
//! Run with: cargo run --example viewer <SERVER_URL> [CAMERA_ID]
//!
//! With no CAMERA_ID, the first camera the server announces is used.

use std::sync::Arc;

use camlink::client::{CamlinkClient, ClientConfig};
use camlink::coordinator::CoordinatorEvent;
use camlink::media::SimulatedMedia;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("camlink=debug".parse()?),
        )
        .init();

    let url = std::env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: viewer <SERVER_URL> [CAMERA_ID]");
        std::process::exit(1);
    });
    let wanted_camera = std::env::args().nth(2);

    println!("Connecting to {}", url);
    let client = CamlinkClient::new(
        ClientConfig::with_url(url),
        Arc::new(SimulatedMedia::new()),
    );
    client.connect().await;

    let mut events = client.subscribe();
    let viewer = client.viewer();
    let mut watching = false;

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(CoordinatorEvent::CameraListChanged(cameras)) if !watching => {
                        let target = match &wanted_camera {
                            Some(id) => cameras.iter().find(|c| &c.id == id),
                            None => cameras.first(),
                        };

                        if let Some(camera) = target {
                            println!("Joining {} ({})", camera.display_name, camera.id);
                            match viewer.start_watching(&camera.id).await {
                                Ok(session) => {
                                    watching = true;
                                    println!("Session {} created", session.session_id);
                                }
                                Err(e) => eprintln!("Join failed: {}", e),
                            }
                        }
                    }
                    Ok(CoordinatorEvent::SessionChanged(session)) => {
                        println!("Session {} is {:?}", session.session_id, session.state);
                    }
                    Ok(CoordinatorEvent::RemoteMedia { session_id, handle }) => {
                        println!("Remote media for {}: {}", session_id, handle.id);
                    }
                    Ok(CoordinatorEvent::SessionEnded { session_id, reason, .. }) => {
                        println!("Session {} ended: {:?}", session_id, reason);
                        watching = false;
                    }
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nLeaving...");
                viewer.stop_watching().await;
                client.shutdown().await;
                break;
            }
        }
    }

    Ok(())
}
