//! Calendar endpoints

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::Value;

use weekplan_core::CalendarDocument;
use weekplan_core::WeekplanError;
use weekplan_core::protocol::{CalendarList, CreateResponse, SaveReply};
use weekplan_core::sync::SaveRequest;

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/calendar/new", post(create_calendar))
        .route("/api/calendar/{id}", get(get_calendar).post(save_calendar))
        .route("/api/calendars", get(list_calendars))
}

/// GET /api/calendar/:id - Fetch a calendar, empty if it was never saved
async fn get_calendar(
    State(state): State<AppState>,
    Path(calendar_id): Path<String>,
) -> Result<Json<CalendarDocument>, AppError> {
    let document = state.service().fetch(&calendar_id).await?;
    Ok(Json(document))
}

/// POST /api/calendar/:id - Save a calendar
///
/// Body is the client's document plus an optional `clientLastModified`.
/// Answers 409 with the server's copy when that token is stale.
async fn save_calendar(
    State(state): State<AppState>,
    Path(calendar_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let request = SaveRequest::from_body(body);
    let outcome = state.service().save(&calendar_id, request).await?;

    let response = match SaveReply::from(outcome) {
        SaveReply::Accepted(reply) => Json(reply).into_response(),
        SaveReply::Conflict(reply) => (StatusCode::CONFLICT, Json(reply)).into_response(),
    };
    Ok(response)
}

/// POST /api/calendar/new - Create a calendar, optionally seeded
async fn create_calendar(State(state): State<AppState>, body: Bytes) -> Result<Json<CreateResponse>, AppError> {
    let seed = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| WeekplanError::InvalidInput(format!("Invalid seed document: {}", e)))?;
        Some(value)
    };

    let id = state.service().create(seed).await?;
    Ok(Json(CreateResponse { id, success: true }))
}

/// GET /api/calendars - List every stored calendar ID
async fn list_calendars(State(state): State<AppState>) -> Result<Json<CalendarList>, AppError> {
    let calendars = state.service().list().await?;
    Ok(Json(CalendarList { calendars }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request, header};
    use serde_json::json;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use weekplan_core::storage::FileStore;
    use weekplan_core::sync::CalendarService;

    use crate::routes::app;

    use super::*;

    fn test_app(dir: &TempDir) -> Router {
        let service = CalendarService::new(Arc::new(FileStore::new(dir.path())))
            .with_id_generator(|| "abc123".to_string());
        app(AppState::with_service(service))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);

        let (status, created) = send(&app, Method::POST, "/api/calendar/new", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created, json!({ "id": "abc123", "success": true }));

        let (status, fetched) = send(&app, Method::GET, "/api/calendar/abc123", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["tasks"], json!([]));
        assert_eq!(fetched["scheduledTasks"], json!([]));
        assert_eq!(fetched["dateVersion"], json!(2));
        let created_token = fetched["lastModified"].clone();

        let mut doc = fetched.clone();
        doc["tasks"] = json!([{ "id": "t1", "name": "Write report", "durationMinutes": 60 }]);
        doc["clientLastModified"] = created_token.clone();
        let (status, saved) = send(&app, Method::POST, "/api/calendar/abc123", Some(doc.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["success"], json!(true));
        assert_eq!(saved["hasChanges"], json!(true));
        assert_eq!(saved["message"], json!("Calendar updated"));

        let (_, reloaded) = send(&app, Method::GET, "/api/calendar/abc123", None).await;
        assert_eq!(reloaded["tasks"][0]["name"], json!("Write report"));
        assert_eq!(reloaded["lastModified"], saved["lastModified"]);

        doc["tasks"] = json!([]);
        doc["clientLastModified"] = json!("2000-01-01T00:00:00.000Z");
        let (status, conflict) = send(&app, Method::POST, "/api/calendar/abc123", Some(doc)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(conflict["error"], json!("Conflict detected"));
        assert_eq!(conflict["message"], json!("Calendar has been modified by another client"));
        assert_eq!(conflict["serverLastModified"], saved["lastModified"]);
        assert_eq!(conflict["serverData"]["tasks"][0]["name"], json!("Write report"));

        let (status, list) = send(&app, Method::GET, "/api/calendars", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list, json!({ "calendars": ["abc123"] }));
    }

    #[tokio::test]
    async fn test_noop_save_reports_no_changes() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);
        send(&app, Method::POST, "/api/calendar/new", None).await;

        let (_, mut doc) = send(&app, Method::GET, "/api/calendar/abc123", None).await;
        doc["clientLastModified"] = doc["lastModified"].clone();

        let (status, saved) = send(&app, Method::POST, "/api/calendar/abc123", Some(doc.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["hasChanges"], json!(false));
        assert_eq!(saved["message"], json!("No changes detected"));
        assert_eq!(saved["lastModified"], doc["lastModified"]);
    }

    #[tokio::test]
    async fn test_undefined_id_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);

        let (status, body) = send(&app, Method::GET, "/api/calendar/undefined", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("undefined"));
    }

    #[tokio::test]
    async fn test_create_with_seed() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);

        let seed = json!({
            "dateVersion": 2,
            "weekAnchorDate": "2024-01-01",
            "meetings": [{
                "id": "m1", "name": "Standup", "recurring": true,
                "seriesId": "s1", "byDay": 0, "startMinutes": 540, "durationMinutes": 15
            }]
        });
        let (status, _) = send(&app, Method::POST, "/api/calendar/new", Some(seed)).await;
        assert_eq!(status, StatusCode::OK);

        let (_, fetched) = send(&app, Method::GET, "/api/calendar/abc123", None).await;
        assert_eq!(fetched["meetings"][0]["seriesId"], json!("s1"));
        assert!(fetched["created"].is_string());
    }

    #[tokio::test]
    async fn test_create_rejects_malformed_seed() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/calendar/new")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);

        let (status, body) = send(&app, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("ok"));
    }
}
