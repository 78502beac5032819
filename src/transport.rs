//! MQTT adapter for the outbound channel.

use anyhow::Result;
use log::{error, info, warn};
use rumqttc::{Client, Event, MqttOptions, Outgoing, Packet, QoS};
use std::{sync::mpsc::Sender, thread, time::Duration};

use crate::config::TransportConfig;
use crate::emitter::{PublishError, Publisher};

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected(String),
}

fn mqtt_options(cfg: &TransportConfig) -> MqttOptions {
    let mut opts = MqttOptions::new(cfg.client_id.clone(), cfg.host.clone(), cfg.port);
    opts.set_keep_alive(Duration::from_secs(cfg.keep_alive_s.max(5)));
    opts
}

pub struct MqttTransport {
    client: Client,
}

impl MqttTransport {
    /// Spawns the connection loop; status changes arrive on `tx_evt`.
    pub fn connect(cfg: &TransportConfig, tx_evt: Sender<TransportEvent>) -> Result<Self> {
        let (client, mut connection) = Client::new(mqtt_options(cfg), 64);
        let endpoint = format!("{}:{}", cfg.host, cfg.port);
        info!("transport: connecting to {endpoint}");

        thread::Builder::new()
            .name("mqtt-connection".into())
            .spawn(move || {
                let mut up = false;
                for notification in connection.iter() {
                    match notification {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            up = true;
                            if tx_evt.send(TransportEvent::Connected).is_err() {
                                break;
                            }
                        }
                        Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            if up {
                                warn!("transport: connection to {endpoint} lost: {e}");
                            }
                            up = false;
                            if tx_evt
                                .send(TransportEvent::Disconnected(e.to_string()))
                                .is_err()
                            {
                                break;
                            }
                            // rumqttc reconnects on the next poll
                            thread::sleep(Duration::from_secs(1));
                        }
                    }
                }
                error!("transport: connection loop ended");
            })?;

        Ok(Self { client })
    }
}

impl Publisher for MqttTransport {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), PublishError> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .map_err(|e| PublishError::Rejected(e.to_string()))
    }

    fn close(&mut self) {
        if let Err(e) = self.client.try_disconnect() {
            warn!("transport: disconnect failed: {e}");
        }
    }
}

/// Prints messages instead of sending them; used by offline simulation.
#[derive(Debug, Default)]
pub struct StdoutPublisher;

impl Publisher for StdoutPublisher {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), PublishError> {
        println!("{topic} <- {payload}");
        Ok(())
    }
}

/// Connect, send one payload, and leave.
pub fn publish_once(cfg: &TransportConfig, topic: &str, payload: &str) -> Result<()> {
    let (client, mut connection) = Client::new(mqtt_options(cfg), 4);
    client.publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())?;
    for notification in connection.iter() {
        if let Event::Outgoing(Outgoing::Publish(_)) = notification? {
            break;
        }
    }
    let _ = client.disconnect();
    Ok(())
}
