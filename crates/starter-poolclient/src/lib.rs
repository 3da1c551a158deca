//! Pool-manager HTTP/SSE client: paginated pool listing and the pool
//! lifecycle event stream, both feeding the pool registry's startup
//! rehydration and ongoing event processing.

mod client;
mod error;
mod events;
mod models;
mod sse;

pub use client::PoolManagerClient;
pub use error::PoolClientError;
pub use events::{parse_pool_event, PoolEvent, PoolEventParseError};
pub use models::{Page, Pool, PoolHealth, PoolNode, PoolNodeGroup, PoolOperation, PoolOperationType, PoolResourceAvailability};
pub use sse::{SseDecoder, SseFrame};
