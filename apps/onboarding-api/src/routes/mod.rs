//! Roteador HTTP do serviço de cadastro
//!
//! Camadas (externa → interna): trace → CORS → compressão → timeout → limite de concorrência

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::ServerConfig;
use crate::state::AppState;

pub mod activities;
pub mod dashboard;
pub mod documents;
pub mod emergency;
pub mod health;
pub mod patients;

pub fn router(state: AppState, server: &ServerConfig) -> Router {
    let api = Router::new()
        .route("/patients", get(patients::list).post(patients::create))
        .route("/patients/:id", get(patients::show))
        .route("/patients/:id/personal", put(patients::update_personal))
        .route("/patients/:id/insurance", put(patients::insurance))
        .route("/patients/:id/medical", put(patients::medical))
        .route("/patients/:id/complete", post(patients::complete))
        .route("/patients/:id/activities", get(patients::activities))
        .route("/activities", get(activities::recent))
        .route("/dashboard/stats", get(dashboard::stats))
        .route("/documents/analyze", post(documents::analyze))
        .route("/emergency/dispatch", post(emergency::dispatch));

    Router::new()
        .route("/health", get(health::check))
        .nest("/api", api)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&server.cors_origins))
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(server.request_timeout()))
                .layer(ConcurrencyLimitLayer::new(server.max_concurrent_requests)),
        )
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Origem CORS inválida ignorada");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use common_db::{MemoryStore, PatientStore};
    use onboarding_core::prefill::{
        AnalyzerError, DocumentAnalysis, ExtractedFields, MockDocumentAnalyzer,
    };
    use onboarding_core::PrefillService;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::config::OnboardingConfig;
    use crate::error::FIRST_STEP_PATH;

    fn app_with(store: &MemoryStore, analyzer: MockDocumentAnalyzer) -> Router {
        let prefill = PrefillService::new(Arc::new(analyzer), Duration::from_secs(5), 0.5);
        let state = AppState::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            &OnboardingConfig::default(),
            prefill,
        );
        router(state, &ServerConfig::default())
    }

    fn test_app() -> (Router, MemoryStore) {
        let store = MemoryStore::new();
        (app_with(&store, MockDocumentAnalyzer::new()), store)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn jane() -> Value {
        json!({
            "firstName": "Jane",
            "lastName": "Doe",
            "dateOfBirth": "1990-01-01",
            "phone": "5551234567",
            "address": "1 Main St"
        })
    }

    async fn create_patient(app: &Router, body: Value) -> String {
        let (status, patient) = send(app, json_request("POST", "/api/patients", body)).await;
        assert_eq!(status, StatusCode::CREATED);
        patient["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_reports_version() {
        let (app, _) = test_app();
        let (status, body) = send(&app, empty_request("GET", "/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_jane_doe_scenario_over_http() {
        let (app, _) = test_app();
        let (status, patient) = send(&app, json_request("POST", "/api/patients", jane())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(patient["onboardingStep"], 1);
        assert_eq!(patient["isCompleted"], false);

        let id = patient["id"].as_str().unwrap();
        let (status, patient) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/patients/{}/complete", id),
                json!({ "admissionLocation": "General Admission - Room 204B" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(patient["isCompleted"], true);
        assert_eq!(patient["admissionLocation"], "General Admission - Room 204B");

        let (_, activities) = send(&app, empty_request("GET", "/api/activities")).await;
        let activities = activities.as_array().unwrap();
        assert_eq!(activities.len(), 2);
        assert_eq!(activities[0]["action"], "onboarding_completed");
        assert_eq!(activities[1]["action"], "patient_created");
    }

    #[tokio::test]
    async fn test_standard_steps_over_http() {
        let (app, _) = test_app();
        let id = create_patient(&app, jane()).await;

        let (status, patient) = send(
            &app,
            json_request(
                "PUT",
                &format!("/api/patients/{}/insurance", id),
                json!({ "provider": "Acme Health", "policyNumber": "POL-123" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(patient["onboardingStep"], 2);
        assert_eq!(patient["insurance"]["status"], "pending");

        let (status, patient) = send(
            &app,
            json_request(
                "PUT",
                &format!("/api/patients/{}/medical", id),
                json!({ "allergies": "penicilina" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(patient["onboardingStep"], 3);

        let (status, patient) = send(
            &app,
            empty_request("POST", &format!("/api/patients/{}/complete", id)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(patient["onboardingStep"], 4);
        assert_eq!(patient["admissionLocation"], "General Admission");

        let (status, activities) = send(
            &app,
            empty_request("GET", &format!("/api/patients/{}/activities", id)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(activities.as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_emergency_cardiac_completion_uses_lookup() {
        let (app, _) = test_app();
        let mut body = jane();
        body["isEmergency"] = json!(true);
        body["emergencyType"] = json!("cardiac");
        let id = create_patient(&app, body).await;

        let (status, error) = send(
            &app,
            json_request(
                "PUT",
                &format!("/api/patients/{}/insurance", id),
                json!({ "provider": "Acme Health", "policyNumber": "POL-123" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error["error"]["code"], "STEP_NOT_ON_PATH");

        let (status, patient) = send(
            &app,
            empty_request("POST", &format!("/api/patients/{}/complete", id)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(patient["admissionLocation"], "Cardiac Unit");
        assert_eq!(patient["onboardingStep"], 2);
    }

    #[tokio::test]
    async fn test_invalid_personal_info_lists_fields() {
        let (app, store) = test_app();
        let mut body = jane();
        body["phone"] = json!("123");
        body["address"] = json!("");

        let (status, error) = send(&app, json_request("POST", "/api/patients", body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(error["error"]["fields"]["phone"].is_string());
        assert!(error["error"]["fields"]["address"].is_string());

        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_and_unknown_ids_redirect_to_first_step() {
        let (app, _) = test_app();

        let (status, error) = send(
            &app,
            json_request(
                "PUT",
                "/api/patients/nao-e-um-id/insurance",
                json!({ "provider": "Acme Health", "policyNumber": "POL-123" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"]["redirectTo"], FIRST_STEP_PATH);

        let unknown = uuid::Uuid::new_v4();
        let (status, error) = send(
            &app,
            empty_request("POST", &format!("/api/patients/{}/complete", unknown)),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["error"]["redirectTo"], FIRST_STEP_PATH);
    }

    #[tokio::test]
    async fn test_completed_patient_rejects_resubmission() {
        let (app, _) = test_app();
        let id = create_patient(&app, jane()).await;
        send(
            &app,
            empty_request("POST", &format!("/api/patients/{}/complete", id)),
        )
        .await;

        let (status, error) = send(
            &app,
            json_request("PUT", &format!("/api/patients/{}/personal", id), jane()),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error["error"]["code"], "ALREADY_COMPLETED");
    }

    #[tokio::test]
    async fn test_dashboard_stats_counts() {
        let (app, _) = test_app();
        let (status, stats) = send(&app, empty_request("GET", "/api/dashboard/stats")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            stats,
            json!({
                "totalPatientsToday": 0,
                "pendingOnboarding": 0,
                "emergencyCases": 0,
                "completedToday": 0
            })
        );

        let id = create_patient(&app, jane()).await;
        send(
            &app,
            empty_request("POST", &format!("/api/patients/{}/complete", id)),
        )
        .await;

        let (_, stats) = send(&app, empty_request("GET", "/api/dashboard/stats")).await;
        assert_eq!(stats["totalPatientsToday"], 1);
        assert_eq!(stats["completedToday"], 1);
        assert_eq!(stats["pendingOnboarding"], 0);
    }

    #[tokio::test]
    async fn test_store_outage_is_service_unavailable() {
        let (app, store) = test_app();
        store.set_unavailable(true);

        let (status, error) = send(&app, json_request("POST", "/api/patients", jane())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error["error"]["code"], "PERSISTENCE_FAILED");
    }

    #[tokio::test]
    async fn test_document_prefill_fills_blanks_and_records_upload() {
        let store = MemoryStore::new();
        let mut analyzer = MockDocumentAnalyzer::new();
        analyzer.expect_analyze().times(1).returning(|_| {
            Ok(DocumentAnalysis {
                text: "JANE DOE".to_string(),
                confidence: 0.9,
                fields: ExtractedFields {
                    first_name: Some("Jane".to_string()),
                    last_name: Some("Doe".to_string()),
                    ..Default::default()
                },
            })
        });
        let app = app_with(&store, analyzer);

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/documents/analyze",
                json!({
                    "content": "aWRlbnRpZGFkZQ==",
                    "mimeType": "image/png",
                    "personal": { "firstName": "Janet" }
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["degraded"], false);
        assert_eq!(body["personal"]["firstName"], "Janet");
        assert_eq!(body["personal"]["lastName"], "Doe");

        let (_, activities) = send(&app, empty_request("GET", "/api/activities")).await;
        assert_eq!(activities[0]["action"], "document_uploaded");
        assert_eq!(activities[0]["patientId"], Value::Null);
    }

    #[tokio::test]
    async fn test_document_prefill_degrades_when_analyzer_fails() {
        let store = MemoryStore::new();
        let mut analyzer = MockDocumentAnalyzer::new();
        analyzer
            .expect_analyze()
            .returning(|_| Err(AnalyzerError::Request("recusado".to_string())));
        let app = app_with(&store, analyzer);
        let id = create_patient(&app, jane()).await;

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/documents/analyze",
                json!({ "patientId": id, "content": "eA==", "mimeType": "application/pdf" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["degraded"], true);

        let (_, activities) = send(
            &app,
            empty_request("GET", &format!("/api/patients/{}/activities", id)),
        )
        .await;
        assert_eq!(activities[0]["action"], "document_uploaded");
    }

    #[tokio::test]
    async fn test_ambulance_dispatch_is_recorded() {
        let (app, _) = test_app();

        let (status, error) = send(
            &app,
            json_request("POST", "/api/emergency/dispatch", json!({ "pickupLocation": " " })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(error["error"]["fields"]["pickupLocation"].is_string());

        let (status, activity) = send(
            &app,
            json_request(
                "POST",
                "/api/emergency/dispatch",
                json!({ "pickupLocation": "Av. Paulista, 1000", "emergencyType": "trauma" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(activity["action"], "ambulance_dispatched");
        assert_eq!(activity["description"], "Ambulância enviada para Av. Paulista, 1000 (trauma)");
    }

    #[tokio::test]
    async fn test_recent_activities_respects_limit() {
        let (app, _) = test_app();
        for _ in 0..3 {
            create_patient(&app, jane()).await;
        }

        let (_, activities) = send(&app, empty_request("GET", "/api/activities?limit=2")).await;
        assert_eq!(activities.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_complete_rejects_unreadable_body() {
        let (app, store) = test_app();
        let id = create_patient(&app, jane()).await;
        let uri = format!("/api/patients/{}/complete", id);

        let malformed = Request::builder()
            .method("POST")
            .uri(&uri)
            .header("content-type", "application/json")
            .body(Body::from("{\"admissionLocation\": "))
            .unwrap();
        let (status, body) = send(&app, malformed).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "INVALID_BODY");

        let (status, _) = send(
            &app,
            json_request("POST", &uri, json!({ "admissionLocation": 42 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let without_content_type = Request::builder()
            .method("POST")
            .uri(&uri)
            .body(Body::from(json!({ "admissionLocation": "ICU" }).to_string()))
            .unwrap();
        let (status, _) = send(&app, without_content_type).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let patient = store.get(id.parse().unwrap()).await.unwrap();
        assert!(!patient.is_completed);
        assert_eq!(patient.admission_location, None);
    }
}
