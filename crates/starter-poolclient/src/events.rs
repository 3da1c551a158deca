use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolEventParseError {
    #[error("unknown pool event type '{0}'")]
    UnknownType(String),
    #[error("malformed pool event payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct PoolIdPayload {
    pool_id: String,
}

#[derive(Debug, Deserialize)]
struct NodeAddedPayload {
    pool_id: String,
    node_name: String,
    cpu: i64,
    ram: i64,
}

#[derive(Debug, Deserialize)]
struct NodeRemovedPayload {
    pool_id: String,
    node_name: String,
}

/// A pool lifecycle event as published on the pool-manager SSE stream. Wire
/// types are `bondifuzz.pools.<verb>`, reconstructed here rather than taken
/// as bare verbs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    Creating { pool_id: String },
    Created { pool_id: String },
    Updating { pool_id: String },
    Updated { pool_id: String },
    Deleting { pool_id: String },
    Deleted { pool_id: String },
    NodeAdded { pool_id: String, node_name: String, cpu: i64, ram: i64 },
    NodeRemoved { pool_id: String, node_name: String },
}

impl PoolEvent {
    pub fn pool_id(&self) -> &str {
        match self {
            PoolEvent::Creating { pool_id }
            | PoolEvent::Created { pool_id }
            | PoolEvent::Updating { pool_id }
            | PoolEvent::Updated { pool_id }
            | PoolEvent::Deleting { pool_id }
            | PoolEvent::Deleted { pool_id }
            | PoolEvent::NodeAdded { pool_id, .. }
            | PoolEvent::NodeRemoved { pool_id, .. } => pool_id,
        }
    }
}

const PFX: &str = "bondifuzz.pools.";

/// Parses one SSE `(event, data)` pair. The `ping` keepalive event type is
/// not a [`PoolEvent`] and callers should treat its `Ok(None)` as a no-op.
pub fn parse_pool_event(event_type: &str, raw_data: &str) -> Result<Option<PoolEvent>, PoolEventParseError> {
    if event_type == "ping" {
        return Ok(None);
    }

    let verb = event_type
        .strip_prefix(PFX)
        .ok_or_else(|| PoolEventParseError::UnknownType(event_type.to_string()))?;

    let event = match verb {
        "creating" => PoolEvent::Creating {
            pool_id: serde_json::from_str::<PoolIdPayload>(raw_data)?.pool_id,
        },
        "created" => PoolEvent::Created {
            pool_id: serde_json::from_str::<PoolIdPayload>(raw_data)?.pool_id,
        },
        "updating" => PoolEvent::Updating {
            pool_id: serde_json::from_str::<PoolIdPayload>(raw_data)?.pool_id,
        },
        "updated" => PoolEvent::Updated {
            pool_id: serde_json::from_str::<PoolIdPayload>(raw_data)?.pool_id,
        },
        "deleting" => PoolEvent::Deleting {
            pool_id: serde_json::from_str::<PoolIdPayload>(raw_data)?.pool_id,
        },
        "deleted" => PoolEvent::Deleted {
            pool_id: serde_json::from_str::<PoolIdPayload>(raw_data)?.pool_id,
        },
        "node-added" => {
            let payload: NodeAddedPayload = serde_json::from_str(raw_data)?;
            PoolEvent::NodeAdded {
                pool_id: payload.pool_id,
                node_name: payload.node_name,
                cpu: payload.cpu,
                ram: payload.ram,
            }
        }
        "node-removed" => {
            let payload: NodeRemovedPayload = serde_json::from_str(raw_data)?;
            PoolEvent::NodeRemoved {
                pool_id: payload.pool_id,
                node_name: payload.node_name,
            }
        }
        _ => return Err(PoolEventParseError::UnknownType(event_type.to_string())),
    };

    Ok(Some(event))
}
