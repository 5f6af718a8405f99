use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use crate::api::models::build_models_response_body;
use crate::config::AppConfig;
use crate::routing::ModelTable;
use crate::transport::{HttpTransport, PreparedUpstream};

/// Shared application state accessible to all handlers.
///
/// Constructed once at startup and shared behind an `Arc`; everything in it
/// is read-only for the lifetime of the process.
pub struct AppState {
    pub config: AppConfig,
    pub transport: HttpTransport,
    pub model_table: ModelTable,
    pub upstream: PreparedUpstream,
    models_body: Bytes,
    request_ids: RequestIdGenerator,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: AppConfig,
        transport: HttpTransport,
        model_table: ModelTable,
        upstream: PreparedUpstream,
    ) -> Self {
        let models_body = build_models_response_body(&model_table);
        Self {
            config,
            transport,
            model_table,
            upstream,
            models_body,
            request_ids: RequestIdGenerator::new(),
        }
    }

    pub fn next_request_seq(&self) -> u64 {
        self.request_ids.next_seq()
    }

    #[must_use]
    pub fn request_uuid(&self, request_seq: u64) -> uuid::Uuid {
        self.request_ids.request_uuid(request_seq)
    }

    #[must_use]
    pub fn models_response_body(&self) -> Bytes {
        self.models_body.clone()
    }
}

/// Per-process request id source: a random seed xored with a sequence
/// counter yields stable, non-guessable correlation ids without coordination.
struct RequestIdGenerator {
    seed: u128,
    counter: AtomicU64,
}

impl RequestIdGenerator {
    #[must_use]
    fn new() -> Self {
        let seed_hi = u128::from(fastrand::u64(..));
        let seed_lo = u128::from(fastrand::u64(..));
        Self {
            seed: (seed_hi << 64) | seed_lo,
            counter: AtomicU64::new(1),
        }
    }

    fn next_seq(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    #[must_use]
    fn request_uuid(&self, request_seq: u64) -> uuid::Uuid {
        uuid::Uuid::from_u128(self.seed ^ u128::from(request_seq))
    }
}
