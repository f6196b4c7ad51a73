use async_nats::jetstream::Message;
use std::sync::Arc;
use tracing::{debug, error, warn};

use vitalstream_domain::enricher_service::EnricherService;
use vitalstream_domain::events::NormalizedTelemetry;
use vitalstream_nats::{BatchProcessor, ProcessingResult};

/// Batch processor for the normalized topic: decode, enrich, settle.
pub fn create_enricher_processor(service: Arc<EnricherService>) -> BatchProcessor {
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
                let normalized: NormalizedTelemetry = match serde_json::from_slice(&payload) {
                    Ok(event) => event,
                    Err(e) => {
                        error!(
                            error = %e,
                            subject = %subject,
                            "Failed to decode normalized telemetry payload"
                        );
                        nak.push((idx, Some(format!("decode error: {e}"))));
                        continue;
                    }
                };

                match service.process(normalized).await {
                    Ok(enriched) => {
                        debug!(
                            index = idx,
                            event_id = %enriched.envelope.event_id,
                            orphan = enriched.orphan,
                            "Enriched telemetry"
                        );
                        ack.push(idx);
                    }
                    Err(e) => {
                        warn!(error = %e, index = idx, "Failed to enrich telemetry");
                        nak.push((idx, Some(e.to_string())));
                    }
                }
            }

            Ok(ProcessingResult { ack, nak })
        })
    })
}
