use crate::error::{ApiError, ApiResult};
use crate::models::RecordId;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A raw record as the store sees it: field name to JSON value.
pub type Record = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortType {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    #[serde(rename = "fieldName")]
    pub field_name: String,
    #[serde(rename = "sorttype")]
    pub sort_type: SortType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingInfo {
    pub limit: u32,
    pub offset: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    pub field: FieldName,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldName {
    #[serde(rename = "Name")]
    pub name: String,
}

pub fn field_refs(fields: &[&str]) -> Vec<FieldRef> {
    fields
        .iter()
        .map(|f| FieldRef {
            field: FieldName {
                name: f.to_string(),
            },
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FetchQuery {
    pub fields: Vec<FieldRef>,
    #[serde(rename = "orderBy", default)]
    pub order_by: Vec<OrderBy>,
    #[serde(rename = "pagingInfo")]
    pub paging_info: PagingInfo,
}

impl FetchQuery {
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.field.name.as_str()).collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Vec<Record>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<Record>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RecordResult {
    pub fn ok(data: Option<Record>) -> Self {
        RecordResult {
            success: true,
            data,
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        RecordResult {
            success: false,
            message: Some(message.into()),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub success: bool,
    #[serde(default)]
    pub results: Vec<RecordResult>,
    #[serde(default)]
    pub message: Option<String>,
}

/// HTTP adapter for the record store. One instance per configured backend.
#[derive(Clone)]
pub struct RecordClient {
    client: Client,
    instance_url: String,
    api_key: String,
}

impl RecordClient {
    pub fn new(instance_url: &str, api_key: &str) -> Self {
        RecordClient {
            client: Client::new(),
            instance_url: instance_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/api/v1/tables/{}", self.instance_url, path);
        self.client
            .request(method, &url)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> ApiResult<T> {
        let res = req.send().await?;

        if res.status().is_success() {
            let body = res.bytes().await?;
            Ok(serde_json::from_slice(&body)?)
        } else {
            let status = res.status();
            let body = res.text().await?;
            Err(ApiError::Status { status, body })
        }
    }

    pub async fn fetch_records(&self, table: &str, query: &FetchQuery) -> ApiResult<FetchResponse> {
        let req = self
            .request(Method::POST, &format!("{}/query", table))
            .json(query);
        self.send(req).await
    }

    pub async fn get_record_by_id(
        &self,
        table: &str,
        id: RecordId,
        fields: &[&str],
    ) -> ApiResult<RecordResponse> {
        let req = self
            .request(Method::POST, &format!("{}/records/{}/query", table, id))
            .json(&json!({ "fields": field_refs(fields) }));
        self.send(req).await
    }

    pub async fn create_record(&self, table: &str, records: &[Record]) -> ApiResult<BatchResponse> {
        let req = self
            .request(Method::POST, &format!("{}/records", table))
            .json(&json!({ "records": records }));
        self.send(req).await
    }

    pub async fn update_record(&self, table: &str, records: &[Record]) -> ApiResult<BatchResponse> {
        let req = self
            .request(Method::PATCH, &format!("{}/records", table))
            .json(&json!({ "records": records }));
        self.send(req).await
    }

    pub async fn delete_record(&self, table: &str, ids: &[RecordId]) -> ApiResult<BatchResponse> {
        let req = self
            .request(Method::DELETE, &format!("{}/records", table))
            .json(&json!({ "RecordIds": ids }));
        self.send(req).await
    }
}
