//! Per-entity façades over a [`RecordStore`].
//!
//! Every operation comes in two flavours: `try_*` returns the error for callers
//! that want to show it, the plain one logs and hands back an empty sentinel
//! (`Vec::new()`, `None`, `false`). Nothing is retried.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::api::{field_refs, BatchResponse, FetchQuery, OrderBy, PagingInfo, Record, SortType};
use crate::config::{Backend, Config};
use crate::error::{ApiError, ApiResult};
use crate::fixtures::seed_tables;
use crate::models::{Identity, RecordId};
use crate::store::{FixtureStore, RecordStore, RemoteStore};

pub mod staff;
pub mod tag;
pub mod task;

pub use staff::StaffService;
pub use tag::TagService;
pub use task::TaskService;

/// A record type with a fixed schema in the record store.
pub trait Entity: DeserializeOwned + Send + Sync + 'static {
    /// Updateable fields accepted on create.
    type Draft: Serialize + Send + Sync;
    /// Updateable fields accepted on update; unset fields are left alone.
    type Patch: Serialize + Send + Sync;

    const KIND: &'static str;
    /// Fields requested from the store. Anything else in a response is dropped.
    const FIELDS: &'static [&'static str];

    fn id(&self) -> RecordId;
}

pub struct EntityService<E: Entity> {
    store: Arc<dyn RecordStore>,
    table: String,
    identity: Identity,
    page_size: u32,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> EntityService<E> {
    pub fn new(
        store: Arc<dyn RecordStore>,
        table: impl Into<String>,
        identity: Identity,
        page_size: u32,
    ) -> Self {
        EntityService {
            store,
            table: table.into(),
            identity,
            page_size,
            _entity: PhantomData,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn list_query(&self, offset: u32) -> FetchQuery {
        FetchQuery {
            fields: field_refs(E::FIELDS),
            order_by: vec![OrderBy {
                field_name: "ModifiedOn".to_string(),
                sort_type: SortType::Desc,
            }],
            paging_info: PagingInfo {
                limit: self.page_size,
                offset,
            },
        }
    }

    fn decode(record: Record) -> ApiResult<E> {
        let known: Record = record
            .into_iter()
            .filter(|(field, _)| E::FIELDS.contains(&field.as_str()))
            .collect();
        serde_json::from_value(Value::Object(known)).map_err(|source| ApiError::Schema {
            entity: E::KIND,
            source,
        })
    }

    fn encode<T: Serialize>(payload: &T) -> ApiResult<Record> {
        match serde_json::to_value(payload)? {
            Value::Object(map) => Ok(map),
            other => Err(ApiError::Decode(serde::ser::Error::custom(format!(
                "{} payload must be an object, got {}",
                E::KIND,
                other
            )))),
        }
    }

    /// First successful record of a create/update batch; failed entries are logged.
    fn first_success(&self, op: &'static str, res: BatchResponse) -> ApiResult<E> {
        if !res.success {
            return Err(ApiError::Backend(
                res.message.unwrap_or_else(|| format!("{} {} failed", op, E::KIND)),
            ));
        }

        let total = res.results.len();
        let mut failed = 0;
        let mut first = None;
        for result in res.results {
            if result.success {
                if first.is_none() {
                    first = result.data;
                }
            } else {
                failed += 1;
                tracing::error!(
                    table = %self.table,
                    op,
                    message = ?result.message,
                    errors = ?result.errors,
                    "{} record rejected",
                    E::KIND
                );
            }
        }

        match first {
            Some(data) => Self::decode(data),
            None if total == 0 => Err(ApiError::Backend(format!("{} returned no results", op))),
            None => Err(ApiError::Partial { failed, total }),
        }
    }

    /// One page at `offset`. Also returns how many raw records came back, so
    /// callers can tell a short page even when some were skipped.
    pub(crate) async fn fetch_page(&self, offset: u32) -> ApiResult<(Vec<E>, usize)> {
        let res = self
            .store
            .fetch_records(&self.table, &self.list_query(offset))
            .await?;
        if !res.success {
            return Err(ApiError::Backend(
                res.message.unwrap_or_else(|| format!("fetching {} failed", E::KIND)),
            ));
        }

        let fetched = res.data.len();
        let records = res
            .data
            .into_iter()
            .filter_map(|record| match Self::decode(record) {
                Ok(entity) => Some(entity),
                Err(err) => {
                    tracing::warn!(table = %self.table, error = %err, "skipping record");
                    None
                }
            })
            .collect();
        Ok((records, fetched))
    }

    /// First page only; lists never go past the fixed page size.
    pub async fn fetch_all(&self) -> ApiResult<Vec<E>> {
        Ok(self.fetch_page(0).await?.0)
    }

    pub async fn get_all(&self) -> Vec<E> {
        match self.fetch_all().await {
            Ok(records) => records,
            Err(err) => {
                tracing::error!(table = %self.table, error = %err, "error fetching {}", E::KIND);
                Vec::new()
            }
        }
    }

    pub async fn try_get_by_id(&self, id: RecordId) -> ApiResult<Option<E>> {
        let res = self
            .store
            .get_record_by_id(&self.table, id, E::FIELDS)
            .await?;
        if !res.success {
            return Err(ApiError::Backend(
                res.message.unwrap_or_else(|| format!("fetching {} {} failed", E::KIND, id)),
            ));
        }
        res.data.map(Self::decode).transpose()
    }

    pub async fn get_by_id(&self, id: RecordId) -> Option<E> {
        match self.try_get_by_id(id).await {
            Ok(entity) => entity,
            Err(err) => {
                tracing::error!(table = %self.table, id, error = %err, "error fetching {}", E::KIND);
                None
            }
        }
    }

    pub async fn try_create(&self, draft: &E::Draft) -> ApiResult<E> {
        let record = Self::encode(draft)?;
        let res = self
            .store
            .create_records(&self.table, vec![record], &self.identity)
            .await?;
        self.first_success("create", res)
    }

    pub async fn create(&self, draft: &E::Draft) -> Option<E> {
        match self.try_create(draft).await {
            Ok(entity) => {
                tracing::info!(table = %self.table, id = entity.id(), "created {}", E::KIND);
                Some(entity)
            }
            Err(err) => {
                tracing::error!(table = %self.table, error = %err, "error creating {}", E::KIND);
                None
            }
        }
    }

    pub async fn try_update(&self, id: RecordId, patch: &E::Patch) -> ApiResult<E> {
        let mut record = Self::encode(patch)?;
        record.insert("Id".to_string(), json!(id));
        let res = self
            .store
            .update_records(&self.table, vec![record], &self.identity)
            .await?;
        self.first_success("update", res)
    }

    pub async fn update(&self, id: RecordId, patch: &E::Patch) -> Option<E> {
        match self.try_update(id, patch).await {
            Ok(entity) => Some(entity),
            Err(err) => {
                tracing::error!(table = %self.table, id, error = %err, "error updating {}", E::KIND);
                None
            }
        }
    }

    /// Succeeds only if every id was deleted.
    pub async fn try_delete(&self, ids: &[RecordId]) -> ApiResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let res = self.store.delete_records(&self.table, ids).await?;
        if !res.success {
            return Err(ApiError::Backend(
                res.message.unwrap_or_else(|| format!("deleting {} failed", E::KIND)),
            ));
        }

        let mut deleted = 0;
        for (idx, result) in res.results.iter().enumerate() {
            if result.success {
                deleted += 1;
            } else {
                tracing::error!(
                    table = %self.table,
                    id = ?ids.get(idx),
                    message = ?result.message,
                    "{} not deleted",
                    E::KIND
                );
            }
        }

        if deleted == ids.len() {
            Ok(())
        } else {
            Err(ApiError::Partial {
                failed: ids.len().saturating_sub(deleted),
                total: ids.len(),
            })
        }
    }

    pub async fn delete(&self, ids: &[RecordId]) -> bool {
        match self.try_delete(ids).await {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(table = %self.table, error = %err, "error deleting {}", E::KIND);
                false
            }
        }
    }
}

/// All entity services, sharing one store.
pub struct Services {
    pub tasks: TaskService,
    pub staff: StaffService,
    pub tags: TagService,
}

impl Services {
    pub fn new(store: Arc<dyn RecordStore>, config: &Config) -> Self {
        let identity = config.identity.clone();
        Services {
            tasks: TaskService::new(
                store.clone(),
                &config.tables.tasks,
                identity.clone(),
                config.page_size,
            ),
            staff: StaffService::new(
                store.clone(),
                &config.tables.staff,
                identity.clone(),
                config.page_size,
            ),
            tags: TagService::new(EntityService::new(
                store,
                &config.tables.tags,
                identity,
                config.page_size,
            )),
        }
    }

    pub async fn from_config(config: &Config) -> ApiResult<Self> {
        let store = build_store(config).await?;
        Ok(Self::new(store, config))
    }
}

pub async fn build_store(config: &Config) -> ApiResult<Arc<dyn RecordStore>> {
    match config.backend {
        Backend::Remote => {
            let client = crate::api::RecordClient::new(
                config.instance_url.as_deref().unwrap_or_default(),
                config.api_key.as_deref().unwrap_or_default(),
            );
            tracing::info!(url = ?config.instance_url, "using remote record store");
            Ok(Arc::new(RemoteStore::new(client)))
        }
        Backend::Fixture => {
            let store = FixtureStore::new(config.data_dir.clone());
            for seed in seed_tables(&config.tables)? {
                store.add_table(seed).await?;
            }
            tracing::info!(mirror = ?config.data_dir, "using fixture record store");
            Ok(Arc::new(store))
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{fixture_store, identity, FlakyStore};
    use super::*;
    use crate::models::{NewTask, Task, TaskPatch};
    use pretty_assertions::assert_eq;

    fn tasks_over(store: Arc<dyn RecordStore>) -> TaskService {
        TaskService::new(store, "task_c", identity(), 100)
    }

    #[tokio::test]
    async fn test_get_all_orders_by_modified_desc() {
        let tasks = tasks_over(fixture_store().await).get_all().await;
        let ids: Vec<_> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![6, 5, 4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_get_all_is_empty_on_failure() {
        let service: TaskService =
            EntityService::new(fixture_store().await, "missing_table", identity(), 100);
        assert!(service.get_all().await.is_empty());
        assert!(service.fetch_all().await.is_err());
        assert!(service.get_by_id(1).await.is_none());
    }

    #[tokio::test]
    async fn test_update_name_leaves_tags_and_owner() {
        let service = tasks_over(fixture_store().await);
        let before = service.get_by_id(1).await.unwrap();

        let patch = TaskPatch {
            name: Some("New".to_string()),
            ..Default::default()
        };
        let after = service.update(1, &patch).await.unwrap();

        assert_eq!(after.name, "New");
        assert_eq!(after.id, before.id);
        assert_eq!(after.tags, before.tags);
        assert_eq!(after.owner, before.owner);
        assert_eq!(after.modified_by.unwrap().name, "Dana");
    }

    #[tokio::test]
    async fn test_update_missing_record_returns_none() {
        let service = tasks_over(fixture_store().await);
        let patch = TaskPatch {
            name: Some("x".to_string()),
            ..Default::default()
        };
        assert!(service.update(999, &patch).await.is_none());
    }

    #[tokio::test]
    async fn test_create_stamps_identity() {
        let service = tasks_over(fixture_store().await);
        let created: Task = service
            .create(&NewTask {
                name: "Write release notes".to_string(),
                tags: vec!["docs".to_string()],
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(created.id, 7);
        assert_eq!(created.tags, vec!["docs"]);
        assert_eq!(created.created_by.unwrap().name, "Dana");
        assert!(service.get_by_id(7).await.is_some());
    }

    #[tokio::test]
    async fn test_bulk_delete_all_succeed() {
        let service = tasks_over(fixture_store().await);
        assert!(service.delete(&[1, 2, 3]).await);

        let remaining: Vec<_> = service.get_all().await.iter().map(|t| t.id).collect();
        assert_eq!(remaining, vec![6, 5, 4]);
    }

    #[tokio::test]
    async fn test_bulk_delete_partial_failure_keeps_failed_ids() {
        let inner = fixture_store().await;
        let store = Arc::new(FlakyStore {
            inner: inner.clone(),
            undeletable: vec![2],
        });
        let service = tasks_over(store);

        assert!(!service.delete(&[1, 2, 3]).await);
        let err = service.try_delete(&[4, 2]).await.unwrap_err();
        assert!(matches!(err, ApiError::Partial { failed: 1, total: 2 }));

        let mut remaining: Vec<_> = tasks_over(inner)
            .get_all()
            .await
            .iter()
            .map(|t| t.id)
            .collect();
        remaining.sort();
        assert_eq!(remaining, vec![2, 5, 6]);
    }

    #[tokio::test]
    async fn test_records_missing_required_fields_are_skipped() {
        let store = fixture_store().await;
        let actor = identity();
        let mut broken = Record::new();
        broken.insert("Tags".to_string(), json!("orphan"));
        store
            .create_records("task_c", vec![broken], &actor)
            .await
            .unwrap();

        let tasks = tasks_over(store).get_all().await;
        assert_eq!(tasks.len(), 6);
        assert!(tasks.iter().all(|t| !t.name.is_empty()));
    }
}
