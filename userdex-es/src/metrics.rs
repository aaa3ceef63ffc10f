//! Request metrics for calls into the search engine

use crate::error::EsError;
use std::time::Instant;

/// Times one REST call and records its outcome
pub(crate) struct RequestTimer {
    operation: &'static str,
    start: Instant,
}

impl RequestTimer {
    pub(crate) fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    pub(crate) fn observe<T>(self, result: &Result<T, EsError>) {
        metrics::histogram!(
            "userdex_es_request_duration_seconds",
            "operation" => self.operation,
        )
        .record(self.start.elapsed().as_secs_f64());

        match result {
            Ok(_) => {
                metrics::counter!(
                    "userdex_es_requests_total",
                    "operation" => self.operation,
                    "status" => "ok",
                )
                .increment(1);
            }
            Err(e) => {
                metrics::counter!(
                    "userdex_es_requests_total",
                    "operation" => self.operation,
                    "status" => "error",
                )
                .increment(1);
                metrics::counter!(
                    "userdex_es_errors_total",
                    "operation" => self.operation,
                    "error_type" => e.error_type(),
                )
                .increment(1);
            }
        }
    }
}
