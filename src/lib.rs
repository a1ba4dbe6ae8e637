//! Concurrent load-test harness for streaming chat-completion endpoints
//!
//! Dispatches N simultaneous chat-completion requests under a bounded
//! concurrency limit, decodes each response as an incremental event
//! stream, derives per-session metrics (latency, token counts, tokens per
//! second), samples accelerator utilization at completion, and persists
//! one CSV record per session.
//!
//! The typical entry point is [`BatchRunner`]:
//!
//! ```no_run
//! use llm_stress::{BatchRunner, RunConfig};
//!
//! # async fn run() -> Result<(), llm_stress::HarnessError> {
//! let runner = BatchRunner::new(RunConfig::new(4))?;
//! let results = runner.run().await;
//! assert_eq!(results.len(), 4);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod gpu;
pub mod output;
pub mod record;
pub mod request;
pub mod session;
pub mod stream;

pub use batch::BatchRunner;
pub use config::{ConfigError, RunConfig};
pub use error::{HarnessError, Result, SessionError};
pub use gpu::GpuSample;
pub use record::{SessionResult, RESULT_FIELDS};
pub use session::SessionRunner;
pub use stream::{StreamDecoder, StreamIncrement, UsageAggregate, UsageSnapshot};
