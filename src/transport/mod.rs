//! HTTP and console transports around the rendezvous core.
//!
//! These are thin wrappers over the boundary operations: the axum server
//! exposes them to humans and remote agents, the reqwest client consumes
//! them, and the console responder drives the client interactively.

mod client;
mod console;
mod server;

// Re-export key components
pub use client::HumanApiClient;
pub use console::ConsoleResponder;
pub use server::{CreateQueryResponse, HealthBody, HumanApiServer, RespondRequest, ResponseCheck};
