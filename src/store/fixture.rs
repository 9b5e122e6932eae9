use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use super::RecordStore;
use crate::api::{
    BatchResponse, FetchQuery, FetchResponse, Record, RecordResponse, RecordResult, SortType,
};
use crate::error::ApiResult;
use crate::models::{timestamp, Identity, RecordId};

const ID_FIELD: &str = "Id";

/// Initial contents of one fixture table.
#[derive(Clone, Debug)]
pub struct TableSeed {
    pub table: String,
    /// File stem used when the table is mirrored to disk.
    pub storage_key: String,
    /// Audited tables get `CreatedOn`/`CreatedBy`/`ModifiedOn`/`ModifiedBy` stamped.
    pub audited: bool,
    pub records: Vec<Record>,
}

struct FixtureTable {
    storage_key: String,
    audited: bool,
    records: Vec<Record>,
}

impl FixtureTable {
    fn next_id(&self) -> RecordId {
        self.records.iter().filter_map(record_id).max().unwrap_or(0) + 1
    }

    fn position(&self, id: RecordId) -> Option<usize> {
        self.records.iter().position(|r| record_id(r) == Some(id))
    }
}

fn record_id(record: &Record) -> Option<RecordId> {
    record.get(ID_FIELD).and_then(Value::as_i64)
}

/// In-memory record store seeded from fixtures, optionally mirrored to a
/// directory so demo edits survive restarts.
pub struct FixtureStore {
    tables: Mutex<HashMap<String, FixtureTable>>,
    mirror_dir: Option<PathBuf>,
}

impl FixtureStore {
    pub fn new(mirror_dir: Option<PathBuf>) -> Self {
        FixtureStore {
            tables: Mutex::new(HashMap::new()),
            mirror_dir,
        }
    }

    /// Registers a table. A mirror file left by an earlier run wins over the seed.
    pub async fn add_table(&self, seed: TableSeed) -> ApiResult<()> {
        let records = match self.load_mirror(&seed.storage_key).await? {
            Some(records) => {
                tracing::info!(table = %seed.table, count = records.len(), "loaded fixture mirror");
                records
            }
            None => seed.records,
        };
        let table = FixtureTable {
            storage_key: seed.storage_key,
            audited: seed.audited,
            records,
        };
        self.persist(&table).await?;
        self.tables.lock().await.insert(seed.table, table);
        Ok(())
    }

    fn mirror_path(&self, storage_key: &str) -> Option<PathBuf> {
        self.mirror_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", storage_key)))
    }

    async fn load_mirror(&self, storage_key: &str) -> ApiResult<Option<Vec<Record>>> {
        let Some(path) = self.mirror_path(storage_key) else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn persist(&self, table: &FixtureTable) -> ApiResult<()> {
        let Some(path) = self.mirror_path(&table.storage_key) else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(&table.records)?;
        tokio::fs::write(&path, body).await?;
        Ok(())
    }
}

fn unknown_table(table: &str) -> String {
    format!("Unknown table {}", table)
}

fn project(record: &Record, fields: &[&str]) -> Record {
    if fields.is_empty() {
        return record.clone();
    }
    record
        .iter()
        .filter(|(k, _)| k.as_str() == ID_FIELD || fields.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_lowercase()),
        Value::Object(map) => map.get("Name").and_then(Value::as_str).map(str::to_lowercase),
        _ => None,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
                return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            }
            if let (Some(x), Some(y)) = (a.as_str(), b.as_str()) {
                if let (Some(x), Some(y)) = (timestamp::parse(x), timestamp::parse(y)) {
                    return x.cmp(&y);
                }
            }
            value_text(a).cmp(&value_text(b))
        }
    }
}

#[async_trait]
impl RecordStore for FixtureStore {
    async fn fetch_records(&self, table: &str, query: &FetchQuery) -> ApiResult<FetchResponse> {
        let tables = self.tables.lock().await;
        let Some(t) = tables.get(table) else {
            return Ok(FetchResponse {
                success: false,
                data: Vec::new(),
                message: Some(unknown_table(table)),
            });
        };

        let mut rows: Vec<&Record> = t.records.iter().collect();
        // Stable sorts applied last key first give a lexicographic multi-key order
        for order in query.order_by.iter().rev() {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.field_name), b.get(&order.field_name));
                match order.sort_type {
                    SortType::Asc => ord,
                    SortType::Desc => ord.reverse(),
                }
            });
        }

        let fields = query.field_names();
        let data = rows
            .into_iter()
            .skip(query.paging_info.offset as usize)
            .take(query.paging_info.limit as usize)
            .map(|r| project(r, &fields))
            .collect();

        Ok(FetchResponse {
            success: true,
            data,
            message: None,
        })
    }

    async fn get_record_by_id(
        &self,
        table: &str,
        id: RecordId,
        fields: &[&str],
    ) -> ApiResult<RecordResponse> {
        let tables = self.tables.lock().await;
        let Some(t) = tables.get(table) else {
            return Ok(RecordResponse {
                success: false,
                data: None,
                message: Some(unknown_table(table)),
            });
        };

        Ok(match t.position(id) {
            Some(idx) => RecordResponse {
                success: true,
                data: Some(project(&t.records[idx], fields)),
                message: None,
            },
            None => RecordResponse {
                success: false,
                data: None,
                message: Some(format!("Record {} not found", id)),
            },
        })
    }

    async fn create_records(
        &self,
        table: &str,
        records: Vec<Record>,
        actor: &Identity,
    ) -> ApiResult<BatchResponse> {
        let mut tables = self.tables.lock().await;
        let Some(t) = tables.get_mut(table) else {
            return Ok(BatchResponse {
                success: false,
                results: Vec::new(),
                message: Some(unknown_table(table)),
            });
        };

        let now = Utc::now().to_rfc3339();
        let by = json!(actor.to_lookup());
        let mut results = Vec::with_capacity(records.len());
        for mut record in records {
            record.remove(ID_FIELD);
            record.insert(ID_FIELD.to_string(), json!(t.next_id()));
            if t.audited {
                record.insert("CreatedOn".to_string(), json!(now));
                record.insert("CreatedBy".to_string(), by.clone());
                record.insert("ModifiedOn".to_string(), json!(now));
                record.insert("ModifiedBy".to_string(), by.clone());
                if record.get("Owner").map_or(true, Value::is_null) {
                    record.insert("Owner".to_string(), by.clone());
                }
            }
            t.records.push(record.clone());
            results.push(RecordResult::ok(Some(record)));
        }

        self.persist(t).await?;
        Ok(BatchResponse {
            success: true,
            results,
            message: None,
        })
    }

    async fn update_records(
        &self,
        table: &str,
        records: Vec<Record>,
        actor: &Identity,
    ) -> ApiResult<BatchResponse> {
        let mut tables = self.tables.lock().await;
        let Some(t) = tables.get_mut(table) else {
            return Ok(BatchResponse {
                success: false,
                results: Vec::new(),
                message: Some(unknown_table(table)),
            });
        };

        let now = Utc::now().to_rfc3339();
        let mut results = Vec::with_capacity(records.len());
        for record in records {
            let Some(id) = record_id(&record) else {
                results.push(RecordResult::failed("Missing Id"));
                continue;
            };
            let Some(idx) = t.position(id) else {
                results.push(RecordResult::failed(format!("Record {} not found", id)));
                continue;
            };

            let audited = t.audited;
            let existing = &mut t.records[idx];
            for (field, value) in record {
                if field != ID_FIELD {
                    existing.insert(field, value);
                }
            }
            if audited {
                existing.insert("ModifiedOn".to_string(), json!(now));
                existing.insert("ModifiedBy".to_string(), json!(actor.to_lookup()));
            }
            results.push(RecordResult::ok(Some(existing.clone())));
        }

        self.persist(t).await?;
        Ok(BatchResponse {
            success: true,
            results,
            message: None,
        })
    }

    async fn delete_records(&self, table: &str, ids: &[RecordId]) -> ApiResult<BatchResponse> {
        let mut tables = self.tables.lock().await;
        let Some(t) = tables.get_mut(table) else {
            return Ok(BatchResponse {
                success: false,
                results: Vec::new(),
                message: Some(unknown_table(table)),
            });
        };

        let results = ids
            .iter()
            .map(|&id| match t.position(id) {
                Some(idx) => {
                    t.records.remove(idx);
                    RecordResult::ok(None)
                }
                None => RecordResult::failed(format!("Record {} not found", id)),
            })
            .collect();

        self.persist(t).await?;
        Ok(BatchResponse {
            success: true,
            results,
            message: None,
        })
    }
}
