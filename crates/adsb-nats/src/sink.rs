use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use adsb_domain::{EventSink, PositionEvent, SinkError, SinkResult};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::traits::EventPublisher;

/// Fire-and-forget bridge onto the message bus.
///
/// A failed publish never fails the pipeline: downstream consumers are
/// best-effort, the files and the database remain the system of record.
/// Failures are logged and counted instead.
pub struct BusSink {
    publisher: Arc<dyn EventPublisher>,
    subject: String,
    publish_failures: AtomicU64,
}

impl BusSink {
    pub fn new(publisher: Arc<dyn EventPublisher>, subject: String) -> Self {
        Self {
            publisher,
            subject,
            publish_failures: AtomicU64::new(0),
        }
    }

    pub fn publish_failures(&self) -> u64 {
        self.publish_failures.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventSink for BusSink {
    fn name(&self) -> &'static str {
        "bus"
    }

    async fn accept(&self, event: &PositionEvent) -> SinkResult<()> {
        let payload = match serde_json::to_vec(event) {
            Ok(bytes) => bytes,
            Err(err) => {
                return Err(SinkError::persistent(anyhow::anyhow!(
                    "failed to serialize position event: {err}"
                )));
            }
        };

        match self
            .publisher
            .publish(self.subject.clone(), Bytes::from(payload))
            .await
        {
            Ok(()) => {
                debug!(
                    subject = %self.subject,
                    icao = %event.aircraft.icao_hex,
                    "published position event"
                );
            }
            Err(err) => {
                let total = self.publish_failures.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    subject = %self.subject,
                    icao = %event.aircraft.icao_hex,
                    failures = total,
                    "failed to publish position event: {err:#}"
                );
            }
        }
        Ok(())
    }

    async fn flush(&self) -> SinkResult<()> {
        self.publisher.flush().await.map_err(SinkError::transient)?;
        Ok(())
    }

    async fn close(&self) -> SinkResult<()> {
        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockEventPublisher;
    use adsb_domain::{Aircraft, Codes, Position, RawMessage, EVENT_TYPE};
    use chrono::{TimeZone, Utc};

    fn event(icao: &str) -> PositionEvent {
        PositionEvent {
            event_type: EVENT_TYPE.to_string(),
            source: "TEST".to_string(),
            received_at: Utc.timestamp_millis_opt(1_765_127_000_000).unwrap(),
            aircraft: Aircraft {
                icao_hex: icao.to_string(),
                callsign: Some("EWG4TV".to_string()),
                registration: None,
                icao_type: None,
                model: None,
                is_military: None,
                is_interesting: None,
                is_pia: None,
                is_ladd: None,
            },
            position: Position {
                lat: 45.63,
                lon: 8.936,
                altitude_ft: Some(38000),
                ground_speed_kts: Some(376.0),
                track_deg: None,
                vertical_rate_fpm: None,
            },
            codes: Codes::default(),
            raw: RawMessage {
                sbs: "MSG,3".to_string(),
                message_type: "MSG".to_string(),
                transmission_type: Some(3),
            },
        }
    }

    #[tokio::test]
    async fn publishes_json_envelope_to_configured_subject() {
        let mut publisher = MockEventPublisher::new();
        publisher
            .expect_publish()
            .withf(|subject, payload| {
                let value: serde_json::Value = serde_json::from_slice(payload.as_ref()).unwrap();
                subject == "adsb.position.v1"
                    && value["eventType"] == "adsb.position.v1"
                    && value["aircraft"]["icaoHex"] == "3C5EF2"
                    && value["receivedAtMs"] == 1_765_127_000_000i64
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let sink = BusSink::new(Arc::new(publisher), "adsb.position.v1".to_string());
        sink.accept(&event("3C5EF2")).await.unwrap();
        assert_eq!(sink.publish_failures(), 0);
    }

    #[tokio::test]
    async fn publish_failure_is_swallowed_and_counted() {
        let mut publisher = MockEventPublisher::new();
        publisher
            .expect_publish()
            .times(2)
            .returning(|_, _| Err(anyhow::anyhow!("connection reset")));

        let sink = BusSink::new(Arc::new(publisher), "adsb.position.v1".to_string());
        sink.accept(&event("3C5EF2")).await.unwrap();
        sink.accept(&event("AE01CE")).await.unwrap();
        assert_eq!(sink.publish_failures(), 2);
    }

    #[tokio::test]
    async fn flush_delegates_to_publisher() {
        let mut publisher = MockEventPublisher::new();
        publisher.expect_flush().times(1).returning(|| Ok(()));

        let sink = BusSink::new(Arc::new(publisher), "adsb.position.v1".to_string());
        sink.flush().await.unwrap();
    }
}
