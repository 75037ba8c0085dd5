//! MQTT subscriber feeding device messages to the dispatcher.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mqtt_exporter_common::{ConnectionState, Error, MqttConfig, mqtt_options, qos_from_level};
use rumqttc::{AsyncClient, Event, EventLoop, Packet, QoS};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::dispatcher::Dispatcher;

/// Capacity of the client request channel.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Delay before polling again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// MQTT subscriber that feeds inbound messages to the [`Dispatcher`].
pub struct TelemetrySubscriber {
    dispatcher: Arc<Dispatcher>,
    mqtt_config: MqttConfig,
    connection: ConnectionState,
}

impl TelemetrySubscriber {
    /// Create a new subscriber. `connection` is updated as the broker
    /// connection comes and goes.
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        mqtt_config: MqttConfig,
        connection: ConnectionState,
    ) -> Self {
        Self {
            dispatcher,
            mqtt_config,
            connection,
        }
    }

    /// Run the subscriber until the shutdown signal is received.
    ///
    /// Fails if the first connection attempt fails. Later disconnects are
    /// retried by polling the event loop again.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let options = mqtt_options(&self.mqtt_config)?;
        let qos = qos_from_level(self.mqtt_config.qos)?;

        info!(broker = %self.mqtt_config.broker, "Connecting to MQTT broker...");

        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        let mut ever_connected = false;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Shutdown signal received, stopping subscriber");
                        break;
                    }
                }

                event = event_loop.poll() => {
                    match event {
                        Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                            ever_connected = true;
                            self.connection.set_connected(true);
                            info!(
                                broker = %self.mqtt_config.broker,
                                session_present = ack.session_present,
                                "Connected to MQTT broker"
                            );
                            self.subscribe_all(&client, qos)?;
                        }
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            trace!(
                                topic = %publish.topic,
                                payload_len = publish.payload.len(),
                                "Received message"
                            );
                            self.dispatcher.handle(&publish.topic, &publish.payload);
                        }
                        Ok(Event::Incoming(Packet::SubAck(ack))) => {
                            debug!(pkid = ack.pkid, return_codes = ?ack.return_codes, "Subscription acknowledged");
                        }
                        Ok(Event::Incoming(Packet::Disconnect)) => {
                            self.connection.set_connected(false);
                            warn!("Broker closed the connection");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            self.connection.set_connected(false);

                            if !ever_connected {
                                return Err(Error::Connection(e)).with_context(|| {
                                    format!("Failed to connect to MQTT broker {}", self.mqtt_config.broker)
                                });
                            }

                            warn!(error = %e, "MQTT connection lost, reconnecting");
                            tokio::select! {
                                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                                _ = shutdown.changed() => {
                                    if *shutdown.borrow() {
                                        info!("Shutdown signal received, stopping subscriber");
                                        break;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        self.disconnect(&client, &mut event_loop).await;

        info!("Subscriber stopped");
        Ok(())
    }

    /// Queue a subscription for every configured topic.
    fn subscribe_all(&self, client: &AsyncClient, qos: QoS) -> Result<(), Error> {
        for topic in self.mqtt_config.topics.iter().filter(|t| !t.is_empty()) {
            client.try_subscribe(topic.as_str(), qos)?;
            info!(topic = %topic, qos = ?qos, "Subscribing to topic");
        }
        Ok(())
    }

    /// Send a DISCONNECT and drain the event loop until the connection closes.
    async fn disconnect(&self, client: &AsyncClient, event_loop: &mut EventLoop) {
        let was_connected = self.connection.set_connected(false);
        if !was_connected {
            return;
        }

        if let Err(e) = client.try_disconnect() {
            debug!(error = %e, "Failed to queue disconnect");
            return;
        }

        let drained = tokio::time::timeout(Duration::from_secs(1), async {
            while event_loop.poll().await.is_ok() {}
        })
        .await;

        if drained.is_err() {
            debug!("Timed out waiting for the broker to close the connection");
        }
    }
}
