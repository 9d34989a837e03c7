//! Ways jobs reach the handler: a local HTTP endpoint or a polled job queue.

pub mod http;
pub mod queue;
