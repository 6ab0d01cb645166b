use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::award::collaborators::{AcknowledgingResponder, PlainTextExtractor};
use crate::workflows::award::domain::SessionId;
use crate::workflows::award::repository::SessionRepository;
use crate::workflows::award::router::{award_router, SESSION_HEADER};
use crate::workflows::award::scoring::ScoringEngine;
use crate::workflows::award::store::FileSessionRepository;
use crate::workflows::award::AwardWorkflowService;

async fn send(router: &Router, request: Request<Body>) -> Response {
    router
        .clone()
        .oneshot(request)
        .await
        .expect("route executes")
}

fn post_json(uri: &str, session: Option<&SessionId>, body: Value) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(id) = session {
        builder = builder.header(SESSION_HEADER, id.to_string());
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn post_empty(uri: &str, session: &SessionId) -> Request<Body> {
    Request::post(uri)
        .header(SESSION_HEADER, session.to_string())
        .body(Body::empty())
        .unwrap()
}

async fn open_session(router: &Router) -> SessionId {
    let response = send(
        router,
        Request::get("/api/session").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let header = response
        .headers()
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(SessionId::parse)
        .expect("session header");
    let payload = read_json_body(response).await;
    assert_eq!(payload["success"], true);
    assert_eq!(payload["session"]["session_id"], header.to_string());
    header
}

#[tokio::test]
async fn current_session_handler_issues_a_session_header() {
    let (service, repository) = build_service();
    let response = crate::workflows::award::router::current_session_handler::<
        MemoryRepository,
        AcknowledgingResponder,
    >(State(Arc::new(service)), HeaderMap::new())
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::OK);
    let id = response
        .headers()
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(SessionId::parse)
        .expect("session header");
    assert!(repository.stored(&id).is_some());
}

#[tokio::test]
async fn garbage_session_header_starts_a_new_session() {
    let (service, _) = build_service();
    let mut headers = HeaderMap::new();
    headers.insert(SESSION_HEADER, HeaderValue::from_static("not-a-uuid"));

    let response = crate::workflows::award::router::current_session_handler::<
        MemoryRepository,
        AcknowledgingResponder,
    >(State(Arc::new(service)), headers)
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn repository_outage_maps_to_internal_error() {
    let service = Arc::new(AwardWorkflowService::new(
        Arc::new(UnavailableRepository),
        Arc::new(AcknowledgingResponder),
        Arc::new(PlainTextExtractor),
        ScoringEngine::default(),
    ));
    let response = crate::workflows::award::router::current_session_handler::<
        UnavailableRepository,
        AcknowledgingResponder,
    >(State(service), HeaderMap::new())
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let payload = read_json_body(response).await;
    assert_eq!(payload["success"], false);
    assert_eq!(payload["type"], "repository");
}

#[tokio::test]
async fn actions_require_the_session_header() {
    let router = award_router_with_service(build_service().0);
    let response = send(&router, post_json("/api/recommend", None, json!({}))).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(payload["success"], false);
    assert_eq!(payload["type"], "validation");
    assert!(payload["error"]
        .as_str()
        .is_some_and(|message| message.contains(SESSION_HEADER)));
}

#[tokio::test]
async fn recommend_without_achievements_is_rejected() {
    let router = award_router_with_service(build_service().0);
    let id = open_session(&router).await;

    let response = send(&router, post_empty("/api/recommend", &id)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(payload["type"], "validation");
}

#[tokio::test]
async fn improve_before_recommend_is_a_conflict() {
    let router = award_router_with_service(build_service().0);
    let id = open_session(&router).await;
    send(
        &router,
        post_json("/api/chat", Some(&id), json!({ "message": SCENARIO_NARRATIVE })),
    )
    .await;

    let response = send(&router, post_empty("/api/improve", &id)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert_eq!(payload["type"], "state");
}

#[tokio::test]
async fn unknown_and_malformed_session_ids() {
    let router = award_router_with_service(build_service().0);

    let missing = send(
        &router,
        Request::get(format!("/api/session/{}", SessionId::new()))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json_body(missing).await["type"], "not_found");

    let malformed = send(
        &router,
        Request::get("/api/session/abc").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn drafting_flow_over_http() {
    let router = award_router_with_service(build_service().0);
    let id = open_session(&router).await;

    let chat = send(
        &router,
        post_json("/api/chat", Some(&id), json!({ "message": STRONG_NARRATIVE })),
    )
    .await;
    assert_eq!(chat.status(), StatusCode::OK);
    let payload = read_json_body(chat).await;
    assert!(payload["response"].as_str().is_some());
    assert!(payload.get("timestamp").is_some());

    let recommend = send(
        &router,
        post_json(
            "/api/recommend",
            Some(&id),
            json!({
                "awardee_info": {
                    "name": "J. Smith",
                    "rank": "PO2",
                    "unit": "Station Grand Haven",
                    "position": "Boatswain's Mate",
                    "date_start": "2024-01-01",
                    "date_end": "",
                    "operational_device": false
                }
            }),
        ),
    )
    .await;
    assert_eq!(recommend.status(), StatusCode::OK);
    let payload = read_json_body(recommend).await;
    assert_eq!(payload["success"], true);
    assert!(payload["award"].as_str().is_some());
    assert!(payload["explanation"].as_str().is_some());

    let improve = send(
        &router,
        post_json(
            "/api/improve",
            Some(&id),
            json!({ "current_award": "Legion of Merit" }),
        ),
    )
    .await;
    assert_eq!(improve.status(), StatusCode::OK);
    let payload = read_json_body(improve).await;
    assert!(payload["suggestions"].is_array());

    let bad_tier = send(
        &router,
        post_json("/api/finalize", Some(&id), json!({ "award": "Medal of Honor" })),
    )
    .await;
    assert_eq!(bad_tier.status(), StatusCode::BAD_REQUEST);

    let finalize = send(
        &router,
        post_json(
            "/api/finalize",
            Some(&id),
            json!({ "award": "Coast Guard Achievement Medal" }),
        ),
    )
    .await;
    assert_eq!(finalize.status(), StatusCode::OK);
    let payload = read_json_body(finalize).await;
    assert_eq!(payload["award"], "achievement_medal");
    assert!(payload["citation"]
        .as_str()
        .is_some_and(|citation| citation.starts_with("For professional achievement")));
    assert!(payload["display_citation"].as_str().is_some());

    let unsupported = send(
        &router,
        post_json("/api/export", Some(&id), json!({ "format": "pdf" })),
    )
    .await;
    assert_eq!(unsupported.status(), StatusCode::BAD_REQUEST);

    let export = send(
        &router,
        post_json("/api/export", Some(&id), json!({ "format": "txt" })),
    )
    .await;
    assert_eq!(export.status(), StatusCode::OK);
    let payload = read_json_body(export).await;
    assert!(payload["filename"]
        .as_str()
        .is_some_and(|name| name.starts_with("award_package_J._Smith_")));
    assert!(payload["content"]
        .as_str()
        .is_some_and(|content| content.contains("FINAL AWARD:")));

    let cleared = send(&router, post_empty("/api/session/clear", &id)).await;
    assert_eq!(cleared.status(), StatusCode::OK);
    let reloaded = send(
        &router,
        Request::get(format!("/api/session/{id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    let payload = read_json_body(reloaded).await;
    assert_eq!(payload["session"]["workflow_state"], "input");
    assert_eq!(payload["session"]["messages"], json!([]));
}

#[tokio::test]
async fn session_upsert_uses_the_header_id() {
    let router = award_router_with_service(build_service().0);
    let id = open_session(&router).await;

    let response = send(
        &router,
        post_json(
            "/api/session",
            Some(&id),
            json!({ "session_name": "Smith end of tour" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["session_id"], id.to_string());
    assert_eq!(payload["session_name"], "Smith end of tour");
}

#[tokio::test]
async fn upload_accepts_multipart_text() {
    let (service, repository) = build_service();
    let router = award_router_with_service(service);
    let id = open_session(&router).await;

    let boundary = "award-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"eval.txt\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         Coordinated 14 boardings across the sector.\r\n\
         --{boundary}--\r\n"
    );
    let response = send(
        &router,
        Request::post("/api/upload")
            .header(SESSION_HEADER, id.to_string())
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["message"], "Successfully analyzed eval.txt");
    assert_eq!(payload["kind"], "text");
    assert_eq!(
        payload["extracted_text"],
        "Coordinated 14 boardings across the sector."
    );

    let stored = repository.stored(&id).expect("session stored");
    assert_eq!(stored.messages.len(), 1);
}

#[tokio::test]
async fn malformed_awardee_info_is_rejected_not_ignored() {
    let (service, repository) = build_service();
    let router = award_router_with_service(service);
    let id = open_session(&router).await;
    send(
        &router,
        post_json("/api/chat", Some(&id), json!({ "message": STRONG_NARRATIVE })),
    )
    .await;

    let response = send(
        &router,
        post_json(
            "/api/recommend",
            Some(&id),
            json!({ "awardee_info": { "name": "J. Smith", "date_start": "06/30/2025" } }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(payload["success"], false);
    assert_eq!(payload["type"], "validation");

    let stored = repository.stored(&id).expect("session stored");
    assert!(stored.recommendation.is_none());
    assert_eq!(stored.awardee_info.name, "");
}

#[tokio::test]
async fn wrong_typed_fields_are_validation_errors() {
    let router = award_router_with_service(build_service().0);
    let id = open_session(&router).await;
    send(
        &router,
        post_json("/api/chat", Some(&id), json!({ "message": STRONG_NARRATIVE })),
    )
    .await;
    let recommend = send(&router, post_empty("/api/recommend", &id)).await;
    assert_eq!(recommend.status(), StatusCode::OK);

    let improve = send(
        &router,
        post_json("/api/improve", Some(&id), json!({ "current_award": 42 })),
    )
    .await;
    assert_eq!(improve.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json_body(improve).await["type"], "validation");

    let finalize = send(
        &router,
        post_json(
            "/api/finalize",
            Some(&id),
            json!({ "awardee_info": { "operational_device": "yes" } }),
        ),
    )
    .await;
    assert_eq!(finalize.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json_body(finalize).await["type"], "validation");
}

#[tokio::test]
async fn unparseable_bodies_use_the_error_envelope() {
    let router = award_router_with_service(build_service().0);
    let id = open_session(&router).await;

    for uri in ["/api/chat", "/api/recommend", "/api/export"] {
        let response = send(
            &router,
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .header(SESSION_HEADER, id.to_string())
                .body(Body::from("{\"message\": "))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        let payload = read_json_body(response).await;
        assert_eq!(payload["success"], false, "{uri}");
        assert_eq!(payload["type"], "validation", "{uri}");
    }
}

#[tokio::test]
async fn text_export_of_a_recommendation_is_free_of_markup() {
    let router = award_router_with_service(build_service().0);
    let id = open_session(&router).await;
    send(
        &router,
        post_json("/api/chat", Some(&id), json!({ "message": STRONG_NARRATIVE })),
    )
    .await;
    send(&router, post_empty("/api/recommend", &id)).await;

    let export = send(
        &router,
        post_json("/api/export", Some(&id), json!({ "format": "txt" })),
    )
    .await;
    assert_eq!(export.status(), StatusCode::OK);
    let payload = read_json_body(export).await;
    let content = payload["content"].as_str().expect("text content");
    assert!(content.contains("RECOMMENDED AWARD:"));
    assert!(content.contains("Weighted score: "));
    assert!(!content.contains("**"));
    assert!(!content.contains("##"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn file_backed_sessions_are_served_from_the_blocking_pool() {
    let dir = tempfile::tempdir().expect("temp dir");
    let repository =
        Arc::new(FileSessionRepository::open(dir.path()).expect("session directory"));
    let router = award_router(Arc::new(AwardWorkflowService::new(
        repository.clone(),
        Arc::new(AcknowledgingResponder),
        Arc::new(PlainTextExtractor),
        ScoringEngine::default(),
    )));

    let id = open_session(&router).await;
    let chat = send(
        &router,
        post_json("/api/chat", Some(&id), json!({ "message": STRONG_NARRATIVE })),
    )
    .await;
    assert_eq!(chat.status(), StatusCode::OK);
    let recommend = send(&router, post_empty("/api/recommend", &id)).await;
    assert_eq!(recommend.status(), StatusCode::OK);

    assert!(dir.path().join(format!("{id}.json")).exists());
    let stored = repository
        .fetch(&id)
        .expect("record readable")
        .expect("record present");
    assert_eq!(stored.messages.len(), 2);
    assert!(stored.recommendation.is_some());
}
