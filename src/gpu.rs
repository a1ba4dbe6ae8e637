//! Accelerator utilization probe
//!
//! Queries `nvidia-smi` for the primary device's utilization percent and
//! memory used (MiB). The probe is best effort: any failure (missing
//! utility, non-zero exit, unparsable output, timeout) degrades to the
//! `(-1, -1)` sentinel and never fails the calling session.

use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

/// One accelerator sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuSample {
    /// Device utilization percent, or -1 when unavailable.
    pub util_percent: i64,
    /// Device memory used in MiB, or -1 when unavailable.
    pub memory_mib: i64,
}

impl GpuSample {
    /// Sentinel returned when the probe fails for any reason.
    pub const UNAVAILABLE: GpuSample = GpuSample {
        util_percent: -1,
        memory_mib: -1,
    };
}

/// Sample the primary accelerator, bounded by `timeout`.
pub async fn sample(timeout: Duration) -> GpuSample {
    match tokio::time::timeout(timeout, query()).await {
        Ok(Some(sample)) => sample,
        Ok(None) => {
            debug!("accelerator probe unavailable");
            GpuSample::UNAVAILABLE
        }
        Err(_) => {
            debug!(timeout_ms = timeout.as_millis() as u64, "accelerator probe timed out");
            GpuSample::UNAVAILABLE
        }
    }
}

async fn query() -> Option<GpuSample> {
    let output = Command::new("nvidia-smi")
        .arg("--query-gpu=utilization.gpu,memory.used")
        .arg("--format=csv,noheader,nounits")
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    parse_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parse the first output line's two comma-separated integers.
fn parse_output(stdout: &str) -> Option<GpuSample> {
    let line = stdout.lines().next()?;
    let mut fields = line.split(',');
    let util_percent = fields.next()?.trim().parse().ok()?;
    let memory_mib = fields.next()?.trim().parse().ok()?;
    Some(GpuSample {
        util_percent,
        memory_mib,
    })
}
