#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::invalid_codeblock_attributes)]
#![deny(rustdoc::invalid_html_tags)]
#![deny(rustdoc::bare_urls)]
#![deny(clippy::missing_panics_doc)]

//! Human-loop is an asynchronous human-in-the-loop query rendezvous for
//! autonomous agents. An agent invocation pauses mid-reasoning to ask a
//! human a question, suspends on a per-query waiter, and resumes with the
//! answer once one is submitted, or with a distinguishable timeout outcome
//! when nobody answers in time. The in-memory query store's atomic state
//! transitions adjudicate every race, so each query resolves exactly once.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use human_loop::human_input::{ControllerConfig, QueryLifecycleController, QueryRequest};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let controller = Arc::new(QueryLifecycleController::local(ControllerConfig::default()));
//!
//!     // Agent side: ask and wait (spawned so a human can answer meanwhile)
//!     let asker = tokio::spawn({
//!         let controller = Arc::clone(&controller);
//!         async move {
//!             controller
//!                 .ask(QueryRequest::new("Ship the release?").with_context("v1.2.0"))
//!                 .await
//!         }
//!     });
//!
//!     // Human side: answer the first pending query
//!     tokio::time::sleep(std::time::Duration::from_millis(50)).await;
//!     let pending = controller.list_pending_queries().await;
//!     if let Some(query) = pending.first() {
//!         controller.submit_answer(&query.query_id, "yes").await?;
//!     }
//!
//!     let outcome = asker.await??;
//!     println!("Outcome: {:?}", outcome);
//!     Ok(())
//! }
//! ```

/// Configuration management
pub mod config;

/// Error types for human-loop
pub mod error;

/// The query rendezvous core: store, waiter, dispatcher and controller
pub mod human_input;

/// Telemetry and observability
pub mod telemetry;

/// HTTP server, HTTP client and console responder
pub mod transport;

// Re-export the core types for convenience
pub use error::{Error, Result};
pub use human_input::{
    AwaitOutcome, CallbackDispatcher, CallbackPayload, ControllerConfig, HttpCallbackDispatcher,
    HumanQuery, LocalCallbackDispatcher, PendingQuery, QueryLifecycleController, QueryRequest,
    QueryState, QueryStats, QueryStore, ResponseWaiter, SweeperHandle,
};
pub use transport::{ConsoleResponder, HumanApiClient, HumanApiServer};

/// Re-export telemetry types and functions for easier access
pub use telemetry::{add_metric, add_metrics, init_telemetry, TelemetryConfig};
