//! A serverless visitor counter.
//!
//! Every invocation, whatever the HTTP method, path or body, adds one to a
//! single counter record in DynamoDB and answers with `{"Count": n}`. Store
//! failures answer with a 500 and `{"error": "..."}`; both carry the same
//! CORS header set so a static site on the allowed origin can read them.

pub mod config;
pub mod cors;
pub mod error;
pub mod service;
pub mod store;

pub use config::{Config, IncrementMode};
pub use error::{ConfigError, StoreError};
pub use service::CounterService;
pub use store::{CounterStore, DynamoStore, MemoryStore};
