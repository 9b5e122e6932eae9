use crate::api::Record;
use crate::config::TableNames;
use crate::error::ApiResult;
use crate::store::TableSeed;

const TASKS: &str = include_str!("../fixtures/tasks.json");
const STAFF: &str = include_str!("../fixtures/staff.json");
const TAGS: &str = include_str!("../fixtures/tags.json");

pub const TASKS_KEY: &str = "taskflow_tasks";
pub const STAFF_KEY: &str = "taskflow_staff";
pub const TAGS_KEY: &str = "taskflow_tags";

fn parse(raw: &str) -> ApiResult<Vec<Record>> {
    Ok(serde_json::from_str(raw)?)
}

/// Seeds for the demo tables, named after the configured tables.
pub fn seed_tables(tables: &TableNames) -> ApiResult<Vec<TableSeed>> {
    Ok(vec![
        TableSeed {
            table: tables.tasks.clone(),
            storage_key: TASKS_KEY.to_string(),
            audited: true,
            records: parse(TASKS)?,
        },
        TableSeed {
            table: tables.staff.clone(),
            storage_key: STAFF_KEY.to_string(),
            audited: true,
            records: parse(STAFF)?,
        },
        TableSeed {
            table: tables.tags.clone(),
            storage_key: TAGS_KEY.to_string(),
            audited: false,
            records: parse(TAGS)?,
        },
    ])
}
