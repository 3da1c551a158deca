use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PoolHealth {
    Ok,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PoolNode {
    pub name: String,
    pub cpu: i64,
    pub ram: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PoolResourceAvailability {
    pub cpu_total: i64,
    pub ram_total: i64,
    pub node_count: i64,
    pub nodes: Vec<PoolNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PoolNodeGroup {
    pub node_cpu: i64,
    pub node_ram: i64,
    pub node_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PoolOperationType {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PoolOperation {
    #[serde(rename = "type")]
    pub kind: PoolOperationType,
    pub scheduled_for: String,
    pub yc_operation_id: Option<String>,
    pub error_msg: Option<String>,
}

/// One pool as reported by the pool manager's `/api/v1/pools` listing.
/// `operation.is_some()` means the pool is mid-lifecycle-transition and
/// should be rehydrated locked.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Pool {
    pub id: String,
    pub name: String,
    pub description: String,
    pub user_id: Option<String>,
    pub exp_date: Option<String>,
    pub node_group: PoolNodeGroup,
    pub operation: Option<PoolOperation>,
    pub health: PoolHealth,
    pub created_at: String,
    pub rs_avail: PoolResourceAvailability,
}

impl Pool {
    pub fn is_locked(&self) -> bool {
        self.operation.is_some()
    }
}

/// One page of a `{pg_num, pg_size, items}` paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Page<T> {
    pub pg_num: i64,
    pub pg_size: i64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    /// A page with fewer items than its size is necessarily the last one.
    pub fn is_last(&self) -> bool {
        (self.items.len() as i64) < self.pg_size
    }
}
