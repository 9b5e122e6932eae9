use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type RecordId = i64;

pub const DEFAULT_TAG_COLOR: &str = "#3b82f6";

// Reference to a user-like record, as returned in lookup fields
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Lookup {
    pub id: RecordId,
    pub name: String,
}

/// The user on whose behalf creates and updates are made.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub id: RecordId,
    pub name: String,
}

impl Identity {
    pub fn new(id: RecordId, name: impl Into<String>) -> Self {
        Identity {
            id,
            name: name.into(),
        }
    }

    pub fn to_lookup(&self) -> Lookup {
        Lookup {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    #[default]
    Active,
    Other(String),
}

impl From<String> for TaskStatus {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("active") {
            TaskStatus::Active
        } else {
            TaskStatus::Other(value)
        }
    }
}

impl From<TaskStatus> for String {
    fn from(value: TaskStatus) -> Self {
        match value {
            TaskStatus::Active => "active".to_string(),
            TaskStatus::Other(s) => s,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Active => f.write_str("active"),
            TaskStatus::Other(s) => f.write_str(s),
        }
    }
}

// Task struct
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Task {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub owner: Option<Lookup>,
    #[serde(default, with = "tag_list")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, with = "timestamp")]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<Lookup>,
    #[serde(default, with = "timestamp")]
    pub modified_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_by: Option<Lookup>,
}

// Staff member struct, same audit shape as Task
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Staff {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub owner: Option<Lookup>,
    #[serde(default, with = "tag_list")]
    pub tags: Vec<String>,
    #[serde(default, with = "timestamp")]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<Lookup>,
    #[serde(default, with = "timestamp")]
    pub modified_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_by: Option<Lookup>,
}

// Tag struct
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "Id")]
    pub id: RecordId,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "color_c", alias = "color", default = "default_color")]
    pub color: String,
}

fn default_color() -> String {
    DEFAULT_TAG_COLOR.to_string()
}

/// Updateable fields of a new task.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct NewTask {
    pub name: String,
    #[serde(default, with = "tag_list")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: TaskStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "tag_list::option"
    )]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct NewStaff {
    pub name: String,
    #[serde(default, with = "tag_list")]
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct StaffPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "tag_list::option"
    )]
    pub tags: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewTag {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "color_c", default = "default_color")]
    pub color: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagPatch {
    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "color_c", default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

pub fn join_tags(tags: &[String]) -> String {
    tags.join(", ")
}

/// Tag names compare trimmed and case-folded (full Unicode lowercase).
pub fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

pub fn split_tags(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tags travel as a comma-joined string; some tables hand back an array.
pub mod tag_list {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Joined(String),
        List(Vec<String>),
    }

    fn normalize(repr: Option<Repr>) -> Vec<String> {
        match repr {
            Some(Repr::Joined(text)) => super::split_tags(&text),
            Some(Repr::List(items)) => items
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn serialize<S: Serializer>(tags: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::join_tags(tags))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(normalize(Option::<Repr>::deserialize(deserializer)?))
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            tags: &Option<Vec<String>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match tags {
                Some(tags) => serializer.serialize_str(&crate::models::join_tags(tags)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec<String>>, D::Error> {
            let repr = Option::<super::Repr>::deserialize(deserializer)?;
            Ok(repr.map(|r| super::normalize(Some(r))))
        }
    }
}

/// Accepts RFC 3339, naive date-times and bare dates (taken as midnight UTC).
pub mod timestamp {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(naive.and_utc());
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => parse(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp `{}`", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_decodes_joined_tags_and_lookups() {
        let task: Task = serde_json::from_value(json!({
            "Id": 7,
            "Name": "Ship release",
            "Tags": "urgent, ops ,",
            "Owner": {"Id": 2, "Name": "Alice", "Email": "alice@example.com"},
            "Status": "active",
            "CreatedOn": "2024-01-01T09:30:00Z",
            "CreatedBy": null
        }))
        .unwrap();

        assert_eq!(task.tags, vec!["urgent", "ops"]);
        assert_eq!(task.owner.unwrap().name, "Alice");
        assert_eq!(task.status, TaskStatus::Active);
        assert!(task.created_by.is_none());
        assert!(task.modified_on.is_none());
    }

    #[test]
    fn test_task_decodes_tag_array_and_bare_date() {
        let task: Task = serde_json::from_value(json!({
            "Id": 1,
            "Name": "A",
            "Tags": ["low", " "],
            "CreatedOn": "2024-02-01",
            "Status": "archived"
        }))
        .unwrap();

        assert_eq!(task.tags, vec!["low"]);
        assert_eq!(
            task.created_on.unwrap().to_rfc3339(),
            "2024-02-01T00:00:00+00:00"
        );
        assert_eq!(task.status, TaskStatus::Other("archived".to_string()));
    }

    #[test]
    fn test_task_patch_serializes_only_supplied_fields() {
        let patch = TaskPatch {
            name: Some("New".to_string()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"Name": "New"}));

        let patch = TaskPatch {
            tags: Some(vec!["a".to_string(), "b".to_string()]),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"Tags": "a, b"}));
    }

    #[test]
    fn test_drafts_reject_unknown_fields() {
        let err = serde_json::from_value::<NewTask>(json!({"Name": "x", "Priority": 3}));
        assert!(err.is_err());

        let err = serde_json::from_value::<StaffPatch>(json!({"Owner": 4}));
        assert!(err.is_err());
    }

    #[test]
    fn test_tag_color_defaults_and_alias() {
        let tag: Tag = serde_json::from_value(json!({"Id": 1, "Name": "urgent"})).unwrap();
        assert_eq!(tag.color, DEFAULT_TAG_COLOR);

        let tag: Tag =
            serde_json::from_value(json!({"Id": 2, "Name": "low", "color": "#10b981"})).unwrap();
        assert_eq!(tag.color, "#10b981");
    }
}
