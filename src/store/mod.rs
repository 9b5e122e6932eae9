//! Record store backends.
//!
//! Entity services talk to a [`RecordStore`] rather than to HTTP directly, so
//! the same service code runs against the remote record store or against the
//! in-memory fixture store used for demos and tests. Which one is built is
//! decided by [`crate::config::Backend`].

use async_trait::async_trait;

use crate::api::{BatchResponse, FetchQuery, FetchResponse, Record, RecordResponse};
use crate::error::ApiResult;
use crate::models::{Identity, RecordId};

pub mod fixture;
pub mod remote;

pub use fixture::{FixtureStore, TableSeed};
pub use remote::RemoteStore;

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch_records(&self, table: &str, query: &FetchQuery) -> ApiResult<FetchResponse>;

    async fn get_record_by_id(
        &self,
        table: &str,
        id: RecordId,
        fields: &[&str],
    ) -> ApiResult<RecordResponse>;

    /// Records carry only updateable fields; `actor` is recorded as creator.
    async fn create_records(
        &self,
        table: &str,
        records: Vec<Record>,
        actor: &Identity,
    ) -> ApiResult<BatchResponse>;

    /// Every record must carry its `Id`.
    async fn update_records(
        &self,
        table: &str,
        records: Vec<Record>,
        actor: &Identity,
    ) -> ApiResult<BatchResponse>;

    async fn delete_records(&self, table: &str, ids: &[RecordId]) -> ApiResult<BatchResponse>;
}
