//! Durable, leased, retryable task queue backing swarm execution (C12).
mod queue;
mod store;
mod task;

pub use queue::TaskQueue;
pub use task::{Task, TaskStatus};
