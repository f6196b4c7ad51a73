use async_nats::jetstream::Message;
use std::sync::Arc;
use tracing::{debug, error, warn};

use vitalstream_domain::events::RawTelemetry;
use vitalstream_domain::normalizer_service::NormalizerService;
use vitalstream_nats::{BatchProcessor, ProcessingResult};

/// Batch processor for the raw topic: decode each message, run the
/// normalizer, ack on success and nak on failure. A payload that fails to
/// decode is nak'd and eventually dropped by the consumer's poison handling.
pub fn create_normalizer_processor(service: Arc<NormalizerService>) -> BatchProcessor {
    Box::new(move |messages: &[Message]| {
        let service = Arc::clone(&service);

        // Message borrows from the slice, so payloads are copied out before
        // the async block takes ownership.
        let message_data: Vec<(usize, Vec<u8>, String)> = messages
            .iter()
            .enumerate()
            .map(|(idx, msg)| (idx, msg.payload.to_vec(), msg.subject.to_string()))
            .collect();

        Box::pin(async move {
            let mut ack = Vec::new();
            let mut nak = Vec::new();

            for (idx, payload, subject) in message_data {
                let raw: RawTelemetry = match serde_json::from_slice(&payload) {
                    Ok(event) => event,
                    Err(e) => {
                        error!(
                            error = %e,
                            subject = %subject,
                            "Failed to decode raw telemetry payload"
                        );
                        nak.push((idx, Some(format!("decode error: {e}"))));
                        continue;
                    }
                };

                match service.process(raw).await {
                    Ok(normalized) => {
                        debug!(
                            index = idx,
                            event_id = %normalized.envelope.event_id,
                            "Normalized raw telemetry"
                        );
                        ack.push(idx);
                    }
                    Err(e) => {
                        warn!(error = %e, index = idx, "Failed to normalize raw telemetry");
                        nak.push((idx, Some(e.to_string())));
                    }
                }
            }

            Ok(ProcessingResult { ack, nak })
        })
    })
}
