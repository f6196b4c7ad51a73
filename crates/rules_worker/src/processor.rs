use async_nats::jetstream::Message;
use std::sync::Arc;
use tracing::{debug, error, warn};

use vitalstream_domain::events::EnrichedTelemetry;
use vitalstream_domain::rules_service::RulesService;
use vitalstream_nats::{BatchProcessor, ProcessingResult};

/// Batch processor for the enriched topic. A message is acked only once both
/// the scored event and, when due, the alert have been acknowledged by the
/// broker; anything less naks the input so the whole step is redelivered.
pub fn create_rules_processor(service: Arc<RulesService>) -> BatchProcessor {
    Box::new(move |messages: &[Message]| {
        let service = Arc::clone(&service);

        let message_data: Vec<(usize, Vec<u8>, String)> = messages
            .iter()
            .enumerate()
            .map(|(idx, msg)| (idx, msg.payload.to_vec(), msg.subject.to_string()))
            .collect();

        Box::pin(async move {
            let mut ack = Vec::new();
            let mut nak = Vec::new();

            for (idx, payload, subject) in message_data {
                let enriched: EnrichedTelemetry = match serde_json::from_slice(&payload) {
                    Ok(event) => event,
                    Err(e) => {
                        error!(
                            error = %e,
                            subject = %subject,
                            "Failed to decode enriched telemetry payload"
                        );
                        nak.push((idx, Some(format!("decode error: {e}"))));
                        continue;
                    }
                };

                match service.process(enriched).await {
                    Ok(scored) => {
                        debug!(
                            index = idx,
                            event_id = %scored.envelope.event_id,
                            severity = scored.severity.as_str(),
                            "Scored telemetry"
                        );
                        ack.push(idx);
                    }
                    Err(e) => {
                        warn!(error = %e, index = idx, "Failed to score telemetry");
                        nak.push((idx, Some(e.to_string())));
                    }
                }
            }

            Ok(ProcessingResult { ack, nak })
        })
    })
}
