//! Loopback demo: connects a client to the in-process transport, subscribes
//! and publishes according to the loaded settings, and prints what arrives.

use std::sync::mpsc;
use std::time::Duration;

use mqtt_session::config::load_settings;
use mqtt_session::transport::{MemoryBroker, MemoryTransport};
use mqtt_session::utils::logging;
use mqtt_session::{Client, Message, READ_LENGTH_UNLIMITED, Subscription};
use tracing::{error, info};

fn main() {
    if let Err(e) = run() {
        error!("Demo failed: {}", e);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_settings("config/default")?;
    logging::init(&settings.log_level);

    let broker = MemoryBroker::new();
    let client = Client::new(settings.client, MemoryTransport::new(&broker))?;
    client.connect()?;
    info!(client_id = client.id(), uri = ?client.connected_uri(), "demo connected");

    let (tx, rx) = mpsc::channel();
    for config in &settings.subscriptions {
        let subscription = client.subscribe(config)?;
        let tx = tx.clone();
        subscription.set_data_available_listener(move |sub: &Subscription| {
            let _ = tx.send(sub.clone());
        })?;
    }
    drop(tx);

    for config in &settings.publications {
        let publication = client.publish(config)?;
        let sample = Message::new(config.topic.as_str(), b"hello from mqtt-session".to_vec()).to_sample()?;
        publication.write(&sample)?;
    }

    while let Ok(subscription) = rx.recv_timeout(Duration::from_millis(200)) {
        let batch = subscription.read(READ_LENGTH_UNLIMITED)?;
        for message in batch.iter() {
            println!("{} <- {}", message.topic, String::from_utf8_lossy(&message.payload));
        }
        subscription.return_loan(batch)?;
    }

    client.disconnect()?;
    Ok(())
}
