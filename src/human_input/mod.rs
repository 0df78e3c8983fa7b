//! Asynchronous human-query rendezvous.
//!
//! An agent invocation registers a question, suspends on a per-query waiter,
//! and resumes when a human answers or its deadline elapses. The store's
//! atomic state transition is the single adjudicator of the answer/timeout
//! race, so exactly one outcome reaches the waiting invocation.

mod controller;
mod dispatch;
mod store;
mod types;
mod waiter;

// Re-export key components
pub use controller::{ControllerConfig, QueryLifecycleController, SweeperHandle};
pub use dispatch::{CallbackDispatcher, HttpCallbackDispatcher, LocalCallbackDispatcher};
pub use store::QueryStore;
pub use types::{
    AwaitOutcome, CallbackPayload, HumanQuery, PendingQuery, QueryRequest, QueryState, QueryStats,
};
pub use waiter::ResponseWaiter;
