use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info};
use rumqttc::{MqttOptions, QoS, SubscribeFilter};
use serde_derive::Serialize;
use tokio::sync::mpsc;

use crate::config;
use crate::error::SinkError;
use crate::messages::Trigger;
use crate::occupancy::{AggregationMode, OccupancyVerdict};
use crate::sensor::{OccupancySink, SensorState};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct MqttClient {
    client: rumqttc::AsyncClient,
    sensor_name: String,
    mode: AggregationMode,
    state_topic: String,
}

/// Requests accepted on the sensor's command topics.
#[derive(Debug, Clone, Copy, PartialEq)]
enum MqttRequest {
    Refresh,
    Get,
}

#[derive(Debug, Serialize)]
struct OccupancyMqttMessage<'a> {
    name: &'a str,
    occupancy: bool,
    mode: AggregationMode,
    retained: bool,
}

impl MqttClient {
    pub fn new(
        config: &config::MqttConfig,
        sensor: &config::SensorConfig,
    ) -> (Self, rumqttc::EventLoop) {
        let publisher_id = config
            .publisher_id
            .clone()
            .unwrap_or_else(|| "unifi-occupancy".to_string());
        let topic_path = config
            .topic_path
            .clone()
            .unwrap_or_else(|| "occupancy".to_string());

        let mut mqttoptions = MqttOptions::new(
            publisher_id.clone(),
            config.host.clone(),
            config.port.unwrap_or(1883),
        );

        mqttoptions.set_keep_alive(Duration::from_secs(config.keep_alive_seconds.unwrap_or(5)));

        if let (Some(username), Some(password)) =
            (config.username.as_ref(), config.password.as_ref())
        {
            mqttoptions.set_credentials(username.clone(), password.clone());
        }

        let (client, eventloop) = rumqttc::AsyncClient::new(mqttoptions, 10);

        (
            MqttClient {
                client,
                sensor_name: sensor.name.clone(),
                mode: sensor.mode,
                state_topic: format!(
                    "{}/{}/{}",
                    topic_path,
                    publisher_id,
                    sanitize_name(&sensor.name)
                ),
            },
            eventloop,
        )
    }

    fn refresh_topic(&self) -> String {
        format!("{}/refresh", self.state_topic)
    }

    fn get_topic(&self) -> String {
        format!("{}/get", self.state_topic)
    }

    fn reply_topic(&self) -> String {
        format!("{}/state", self.state_topic)
    }

    fn route(&self, topic: &str) -> Option<MqttRequest> {
        if topic == self.refresh_topic() {
            Some(MqttRequest::Refresh)
        } else if topic == self.get_topic() {
            Some(MqttRequest::Get)
        } else {
            None
        }
    }

    pub async fn subscribe(&self) -> Result<(), rumqttc::ClientError> {
        self.client
            .subscribe_many(vec![
                SubscribeFilter::new(self.refresh_topic(), QoS::AtMostOnce),
                SubscribeFilter::new(self.get_topic(), QoS::AtMostOnce),
            ])
            .await?;

        Ok(())
    }

    /// Poll the broker connection. Refresh requests become scheduler
    /// triggers; state requests are answered from the last published value
    /// on a separate, non-retained reply topic.
    pub async fn event_loop(
        &self,
        eventloop: &mut rumqttc::EventLoop,
        tx: mpsc::Sender<Trigger>,
        state: Arc<SensorState>,
    ) {
        loop {
            match eventloop.poll().await {
                Ok(notification) => match notification {
                    rumqttc::Event::Incoming(rumqttc::Packet::Publish(p)) => {
                        debug!("Received MQTT message on topic {}: {:?}", p.topic, p.payload);

                        match self.route(&p.topic) {
                            Some(MqttRequest::Refresh) => {
                                if tx.send(Trigger::Refresh).await.is_err() {
                                    debug!("Scheduler stopped, leaving MQTT event loop");
                                    break;
                                }
                            }
                            Some(MqttRequest::Get) => {
                                if let Err(err) = self.reply_state(state.get()).await {
                                    error!("Error answering state request: {:?}", err);
                                }
                            }
                            None => {}
                        }
                    }
                    rumqttc::Event::Incoming(rumqttc::Packet::SubAck(_)) => {
                        debug!("Subscription acknowledged");
                    }
                    rumqttc::Event::Incoming(rumqttc::Packet::ConnAck(_)) => {
                        debug!("Connection acknowledged");
                        if let Err(err) = self.subscribe().await {
                            error!("Error subscribing to MQTT topics: {:?}", err);
                        }
                    }
                    _ => {}
                },
                Err(e) => {
                    error!("Error polling MQTT event loop: {:?}", e);
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    pub async fn announce_occupancy(&self, verdict: OccupancyVerdict) -> Result<(), SinkError> {
        info!(
            "Announcing {} for {} on MQTT",
            verdict, self.sensor_name
        );
        let payload = occupancy_payload(&self.sensor_name, verdict, self.mode, true)?;
        self.client
            .publish(self.state_topic.clone(), QoS::AtLeastOnce, true, payload)
            .await?;
        Ok(())
    }

    /// Answer a state request without touching the retained state topic.
    async fn reply_state(&self, verdict: OccupancyVerdict) -> Result<(), SinkError> {
        debug!("Replying with {} for {}", verdict, self.sensor_name);
        let payload = occupancy_payload(&self.sensor_name, verdict, self.mode, false)?;
        self.client
            .publish(self.reply_topic(), QoS::AtMostOnce, false, payload)
            .await?;
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<(), rumqttc::ClientError> {
        debug!("Disconnecting MQTT client");
        self.client.disconnect().await
    }
}

#[async_trait]
impl OccupancySink for MqttClient {
    async fn publish(&self, verdict: OccupancyVerdict) -> Result<(), SinkError> {
        self.announce_occupancy(verdict).await
    }
}

fn occupancy_payload(
    name: &str,
    verdict: OccupancyVerdict,
    mode: AggregationMode,
    retained: bool,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&OccupancyMqttMessage {
        name,
        occupancy: verdict.is_detected(),
        mode,
        retained,
    })
}

fn sanitize_name(name: &str) -> String {
    // Remove any non-alphanumeric characters and replace spaces with underscores
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
}
