mod types;

pub use types::{AggregateId, TenantId};
