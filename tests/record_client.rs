use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use taskflow::api::RecordClient;
use taskflow::error::ApiError;
use taskflow::models::{Identity, NewTag, NewTask, TaskPatch, TaskStatus};
use taskflow::services::{EntityService, StaffService, TagService, TaskService};
use taskflow::store::{RecordStore, RemoteStore};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "test-key";

fn store(server: &MockServer) -> Arc<dyn RecordStore> {
    Arc::new(RemoteStore::new(RecordClient::new(&server.uri(), KEY)))
}

fn identity() -> Identity {
    Identity::new(4, "Morgan")
}

fn tasks(server: &MockServer) -> TaskService {
    TaskService::new(store(server), "task_c", identity(), 100)
}

fn task_record(id: i64, name: &str, tags: &str) -> Value {
    json!({
        "Id": id,
        "Name": name,
        "Tags": tags,
        "Status": "active",
        "Owner": {"Id": 4, "Name": "Morgan"},
        "CreatedOn": "2024-05-01T10:00:00Z",
        "CreatedBy": {"Id": 4, "Name": "Morgan"},
        "ModifiedOn": "2024-05-02T10:00:00.000",
        "ModifiedBy": {"Id": 4, "Name": "Morgan"}
    })
}

async fn request_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_fetch_all_sends_query_and_decodes() {
    let server = MockServer::start().await;
    let mut unknown_field = task_record(2, "Audit vendors", "");
    unknown_field["Priority_c"] = json!("high");

    Mock::given(method("POST"))
        .and(path("/api/v1/tables/task_c/query"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "orderBy": [{"fieldName": "ModifiedOn", "sorttype": "DESC"}],
            "pagingInfo": {"limit": 100, "offset": 0}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [
                task_record(1, "Ship release", "ops, urgent"),
                unknown_field,
                {"Id": 3, "Tags": "no name"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let all = tasks(&server).get_all().await;

    assert_eq!(all.len(), 2);
    assert_eq!(all[0].tags, vec!["ops", "urgent"]);
    assert_eq!(all[0].owner.as_ref().unwrap().name, "Morgan");
    assert!(all[1].modified_on.is_some());

    let body = &request_bodies(&server).await[0];
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"]["Name"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"Id"));
    assert!(fields.contains(&"Owner"));
    assert!(fields.contains(&"ModifiedBy"));
}

#[tokio::test]
async fn test_reported_failure_yields_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/tables/staff_c/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "table locked"
        })))
        .mount(&server)
        .await;

    let staff = StaffService::new(store(&server), "staff_c", identity(), 100);
    assert!(staff.get_all().await.is_empty());

    match staff.fetch_all().await {
        Err(ApiError::Backend(message)) => assert_eq!(message, "table locked"),
        other => panic!("expected backend error, got {:?}", other.map(|v| v.len())),
    }
}

#[tokio::test]
async fn test_http_error_yields_sentinels() {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let service = tasks(&server);
    assert!(service.get_all().await.is_empty());
    assert!(service.get_by_id(1).await.is_none());
    assert!(service.create(&NewTask::default()).await.is_none());
    assert!(service.update(1, &TaskPatch::default()).await.is_none());
    assert!(!service.delete(&[1]).await);

    match service.try_get_by_id(1).await {
        Err(ApiError::Status { status, body }) => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected status error, got {:?}", other.is_ok()),
    }
}

#[tokio::test]
async fn test_get_by_id_posts_field_list() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/tables/task_c/records/7/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": task_record(7, "Ship release", "ops")
        })))
        .expect(1)
        .mount(&server)
        .await;

    let task = tasks(&server).get_by_id(7).await.unwrap();
    assert_eq!(task.id, 7);
    assert_eq!(task.status, TaskStatus::Active);

    let body = &request_bodies(&server).await[0];
    assert!(body["fields"].as_array().unwrap().len() > 1);
}

#[tokio::test]
async fn test_create_sends_only_updateable_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/tables/task_c/records"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "results": [{"success": true, "data": task_record(11, "Ship release", "ops, urgent")}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let draft = NewTask {
        name: "Ship release".to_string(),
        tags: vec!["ops".to_string(), "urgent".to_string()],
        status: TaskStatus::Active,
    };
    let created = tasks(&server).create(&draft).await.unwrap();
    assert_eq!(created.id, 11);

    let body = &request_bodies(&server).await[0];
    assert_eq!(
        body,
        &json!({"records": [{"Name": "Ship release", "Tags": "ops, urgent", "Status": "active"}]})
    );
}

#[tokio::test]
async fn test_update_patches_only_supplied_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v1/tables/task_c/records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "results": [{"success": true, "data": task_record(5, "Renamed", "ops")}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let patch = TaskPatch {
        name: Some("Renamed".to_string()),
        ..Default::default()
    };
    let updated = tasks(&server).update(5, &patch).await.unwrap();
    assert_eq!(updated.name, "Renamed");

    let body = &request_bodies(&server).await[0];
    assert_eq!(body, &json!({"records": [{"Id": 5, "Name": "Renamed"}]}));
}

#[tokio::test]
async fn test_rejected_update_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "results": [{"success": false, "errors": [{"fieldLabel": "Name", "message": "too long"}]}]
        })))
        .mount(&server)
        .await;

    let service = tasks(&server);
    let patch = TaskPatch {
        name: Some("x".repeat(500)),
        ..Default::default()
    };
    assert!(service.update(5, &patch).await.is_none());
    assert!(matches!(
        service.try_update(5, &patch).await,
        Err(ApiError::Partial { failed: 1, total: 1 })
    ));
}

#[tokio::test]
async fn test_bulk_delete_reports_partial_failure() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/tables/task_c/records"))
        .and(body_partial_json(json!({"RecordIds": [3, 4]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "results": [{"success": true}, {"success": false, "message": "in use"}]
        })))
        .mount(&server)
        .await;

    let service = tasks(&server);
    assert!(!service.delete(&[3, 4]).await);
    assert!(matches!(
        service.try_delete(&[3, 4]).await,
        Err(ApiError::Partial { failed: 1, total: 2 })
    ));
}

#[tokio::test]
async fn test_empty_delete_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    assert!(tasks(&server).delete(&[]).await);
}

#[tokio::test]
async fn test_tag_lookup_reuses_existing_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/tables/tag_c/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{"Id": 1, "Name": "Urgent", "color_c": "#ef4444"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/tables/tag_c/records"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tags = TagService::new(EntityService::new(store(&server), "tag_c", identity(), 100));
    let tag = tags
        .create(&NewTag {
            name: " urgent ".to_string(),
            color: "#3b82f6".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(tag.id, 1);
    assert_eq!(tag.name, "Urgent");
    assert_eq!(tag.color, "#ef4444");
}

#[tokio::test]
async fn test_tag_create_when_missing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/tables/tag_c/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": []
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/tables/tag_c/records"))
        .and(body_partial_json(json!({"records": [{"Name": "events", "color_c": "#10b981"}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "results": [{"success": true, "data": {"Id": 9, "Name": "events", "color_c": "#10b981"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tags = TagService::new(EntityService::new(store(&server), "tag_c", identity(), 100));
    let tag = tags
        .create(&NewTag {
            name: "events ".to_string(),
            color: "#10b981".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(tag.id, 9);
}
