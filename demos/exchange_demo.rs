//! Exchange Demo
//!
//! Connects a session to an in-process responder, registers a printing
//! observer and sends one value.

use ackframe::{Exchange, Loopback};
use std::error::Error;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let mut session = Exchange::new(Loopback::default());

    session.connect().await?;
    session.on_acknowledgment(|success| {
        println!("Success: {}", success);
    });

    info!("Sending value 0...");
    let ack = session.send(0).await?;
    let accepted = ack.await?;
    info!("Peer answered: {}", if accepted { "accepted" } else { "rejected" });

    session.disconnect().await?;
    Ok(())
}
