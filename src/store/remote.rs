use async_trait::async_trait;

use super::RecordStore;
use crate::api::{BatchResponse, FetchQuery, FetchResponse, Record, RecordClient, RecordResponse};
use crate::error::ApiResult;
use crate::models::{Identity, RecordId};

/// Record store reached over HTTP. The backend stamps audit fields from the
/// API key, so the acting identity is only logged here.
pub struct RemoteStore {
    client: RecordClient,
}

impl RemoteStore {
    pub fn new(client: RecordClient) -> Self {
        RemoteStore { client }
    }
}

#[async_trait]
impl RecordStore for RemoteStore {
    async fn fetch_records(&self, table: &str, query: &FetchQuery) -> ApiResult<FetchResponse> {
        tracing::debug!(table, limit = query.paging_info.limit, "fetching records");
        self.client.fetch_records(table, query).await
    }

    async fn get_record_by_id(
        &self,
        table: &str,
        id: RecordId,
        fields: &[&str],
    ) -> ApiResult<RecordResponse> {
        tracing::debug!(table, id, "fetching record");
        self.client.get_record_by_id(table, id, fields).await
    }

    async fn create_records(
        &self,
        table: &str,
        records: Vec<Record>,
        actor: &Identity,
    ) -> ApiResult<BatchResponse> {
        tracing::debug!(table, count = records.len(), actor = %actor.name, "creating records");
        self.client.create_record(table, &records).await
    }

    async fn update_records(
        &self,
        table: &str,
        records: Vec<Record>,
        actor: &Identity,
    ) -> ApiResult<BatchResponse> {
        tracing::debug!(table, count = records.len(), actor = %actor.name, "updating records");
        self.client.update_record(table, &records).await
    }

    async fn delete_records(&self, table: &str, ids: &[RecordId]) -> ApiResult<BatchResponse> {
        tracing::debug!(table, ?ids, "deleting records");
        self.client.delete_record(table, ids).await
    }
}
