use std::time::Duration;

use futures::future::BoxFuture;
use log::{debug, warn};
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event::Incoming, EventLoop, MqttOptions, Packet, QoS,
};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::{LinkEvent, Transport, TransportError};

/// Pause between poll attempts while the broker is unreachable.
const RECONNECT_PAUSE: Duration = Duration::from_secs(1);

/// MQTT adapter over rumqttc.
///
/// The event loop runs on its own task and is polled continuously so the
/// session stays alive between sampling cycles (rumqttc only answers
/// keep-alive pings while polled). The task reports session state through a
/// watch channel, QoS-1 acks through an ack channel, and lost sessions as
/// link events for the pipeline to apply at the next cycle boundary.
pub struct MqttTransport {
    client: AsyncClient,
    connected: watch::Receiver<bool>,
    acks: mpsc::UnboundedReceiver<()>,
    link_events: mpsc::UnboundedReceiver<LinkEvent>,
    attempt_timeout: Duration,
}

impl MqttTransport {
    pub fn new(host: &str, port: u16, keep_alive: Duration, attempt_timeout: Duration) -> Self {
        let client_id = format!("plant-node-{}", Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(keep_alive);

        let (client, eventloop) = AsyncClient::new(options, 10);
        let (connected_tx, connected_rx) = watch::channel(false);
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        let (link_tx, link_rx) = mpsc::unbounded_channel();

        tokio::spawn(drive_event_loop(eventloop, connected_tx, ack_tx, link_tx));

        Self {
            client,
            connected: connected_rx,
            acks: ack_rx,
            link_events: link_rx,
            attempt_timeout,
        }
    }
}

/// Owns the event loop for the lifetime of the transport. Exits once the
/// transport is dropped.
async fn drive_event_loop(
    mut eventloop: EventLoop,
    connected: watch::Sender<bool>,
    acks: mpsc::UnboundedSender<()>,
    links: mpsc::UnboundedSender<LinkEvent>,
) {
    let mut was_up = false;
    loop {
        if connected.is_closed() {
            return;
        }

        match eventloop.poll().await {
            Ok(Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    debug!("broker session established");
                    was_up = true;
                    let _ = connected.send(true);
                } else {
                    warn!("broker refused session: {:?}", ack.code);
                    let _ = connected.send(false);
                }
            }
            Ok(Incoming(Packet::PubAck(_))) => {
                let _ = acks.send(());
            }
            Ok(Incoming(Packet::Disconnect)) => {
                let _ = connected.send(false);
                if was_up {
                    was_up = false;
                    let _ = links.send(LinkEvent::Down);
                }
            }
            Ok(event) => debug!("mqtt event: {event:?}"),
            Err(e) => {
                let _ = connected.send(false);
                if was_up {
                    was_up = false;
                    warn!("broker session lost: {e}");
                    let _ = links.send(LinkEvent::Down);
                } else {
                    debug!("broker unreachable: {e}");
                }
                tokio::time::sleep(RECONNECT_PAUSE).await;
            }
        }
    }
}

impl Transport for MqttTransport {
    fn connect(&mut self) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            let limit = self.attempt_timeout;
            match tokio::time::timeout(limit, self.connected.wait_for(|up| *up)).await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(_)) => Err(TransportError::Connect(
                    "event loop task stopped".to_string(),
                )),
                Err(_) => {
                    warn!("broker connect timed out after {limit:?}");
                    Err(TransportError::Timeout)
                }
            }
        })
    }

    fn publish<'a>(
        &'a mut self,
        topic: &'a str,
        payload: &'a [u8],
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            // At most one publish is in flight, so any ack still queued
            // belongs to a wait that timed out earlier.
            while self.acks.try_recv().is_ok() {}

            self.client
                .publish(topic, QoS::AtLeastOnce, false, payload.to_vec())
                .await
                .map_err(|e| TransportError::Publish(e.to_string()))?;

            let limit = self.attempt_timeout;
            match tokio::time::timeout(limit, self.acks.recv()).await {
                Ok(Some(())) => Ok(()),
                Ok(None) => Err(TransportError::Publish(
                    "event loop task stopped".to_string(),
                )),
                Err(_) => {
                    warn!("publish ack timed out after {limit:?}");
                    Err(TransportError::Timeout)
                }
            }
        })
    }

    fn poll_link_event(&mut self) -> Option<LinkEvent> {
        self.link_events.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_times_out_when_broker_unreachable() {
        let mut transport = MqttTransport::new(
            "127.0.0.1",
            1,
            Duration::from_secs(5),
            Duration::from_millis(200),
        );

        match transport.connect().await {
            Err(TransportError::Timeout) => {}
            other => panic!("expected timeout, got {other:?}"),
        }

        // A session that never came up produces no Down notifications.
        assert_eq!(transport.poll_link_event(), None);
    }
}
