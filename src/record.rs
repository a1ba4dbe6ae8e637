//! Terminal per-session result record

use chrono::{DateTime, Utc};

use crate::error::SessionError;
use crate::gpu::GpuSample;

/// Column names of the persisted record, in row order.
pub const RESULT_FIELDS: [&str; 12] = [
    "session_id",
    "start_time",
    "end_time",
    "latency_s",
    "prompt_tokens",
    "completion_tokens",
    "total_tokens",
    "tps",
    "error",
    "gpu_util_percent",
    "gpu_memory_mib",
    "output_head",
];

/// The terminal record for one session.
///
/// Exactly one terminal state holds: success (error is `None`; end time and
/// latency present) or failure (error set; fields that were never measured
/// stay `None` and render as empty cells, distinguishing "not measured"
/// from "measured as zero").
#[derive(Debug, Clone)]
pub struct SessionResult {
    /// Batch-unique opaque session identifier.
    pub session_id: String,
    /// UTC timestamp taken before the permit was acquired.
    pub start_time: DateTime<Utc>,
    /// UTC timestamp at finalization. Absent on early failure.
    pub end_time: Option<DateTime<Utc>>,
    /// Wall-clock seconds between the monotonic start and end instants.
    pub latency_s: Option<f64>,
    /// Server-reported prompt token count.
    pub prompt_tokens: Option<u64>,
    /// Server-reported completion count, or the observed content-increment
    /// count when the server never reported usage.
    pub completion_tokens: Option<u64>,
    /// Server-reported total token count.
    pub total_tokens: Option<u64>,
    /// Completion tokens per second of latency.
    pub tps: Option<f64>,
    /// Failure classification; `None` means success.
    pub error: Option<SessionError>,
    /// Accelerator sample at completion. Absent when the session failed
    /// before completion; `(-1, -1)` when the probe itself failed.
    pub gpu: Option<GpuSample>,
    /// Generated-text preview, newlines flattened to spaces.
    pub output_head: String,
}

impl SessionResult {
    /// Whether the session reached its success terminal state.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Render the record as its 12 CSV cells.
    pub fn to_row(&self) -> [String; 12] {
        [
            self.session_id.clone(),
            format_timestamp(self.start_time),
            self.end_time.map(format_timestamp).unwrap_or_default(),
            self.latency_s
                .map(|v| format!("{:.3}", v))
                .unwrap_or_default(),
            format_count(self.prompt_tokens),
            format_count(self.completion_tokens),
            format_count(self.total_tokens),
            format_tps(self.tps),
            self.error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_default(),
            self.gpu
                .map(|g| g.util_percent.to_string())
                .unwrap_or_default(),
            self.gpu.map(|g| g.memory_mib.to_string()).unwrap_or_default(),
            self.output_head.clone(),
        ]
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

fn format_count(count: Option<u64>) -> String {
    count.map(|v| v.to_string()).unwrap_or_default()
}

/// A throughput of exactly zero renders as an empty cell. This matches the
/// historical record format, which dropped falsy throughput values, and is
/// kept so old and new result files read the same way.
fn format_tps(tps: Option<f64>) -> String {
    match tps {
        Some(v) if v != 0.0 => format!("{:.2}", v),
        _ => String::new(),
    }
}
