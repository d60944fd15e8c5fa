use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use eventhub_server::config::Config;
use eventhub_server::mail::RecordingMailer;
use eventhub_server::models::NewRegistration;
use eventhub_server::routes::create_routes;
use eventhub_server::store::{MemoryStore, Store};
use eventhub_server::AppState;

const ADMIN: &str = "admin-token";
const VOLUNTEER: &str = "door-token";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    mailer: Arc<RecordingMailer>,
}

fn test_app(upload_dir: &Path, mailer: RecordingMailer) -> TestApp {
    let mut config = Config::default();
    config.admin_token = Some(ADMIN.into());
    config.volunteer_token = Some(VOLUNTEER.into());
    config.ticket_logo_path = None;
    config.upload_dir = upload_dir.to_path_buf();
    config.certificates.script_font = None;

    let store = Arc::new(MemoryStore::new());
    let mailer = Arc::new(mailer);
    let router = create_routes(AppState::new(store.clone(), mailer.clone(), config));
    TestApp {
        router,
        store,
        mailer,
    }
}

impl TestApp {
    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn create_event(&self, extra: Value) -> String {
        let mut body = json!({
            "title": "Rust Meetup",
            "description": "Monthly meetup",
            "venue": "Hall A",
            "dateTime": "2030-01-01T18:00:00Z"
        });
        if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                body.insert(k.clone(), v.clone());
            }
        }
        let (status, json) = self.call(Method::POST, "/events", Some(ADMIN), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["data"]["_id"].as_str().unwrap().to_string()
    }

    async fn register(&self, event_id: &str, email: &str) -> (StatusCode, Value) {
        self.call(
            Method::POST,
            "/registrations",
            None,
            Some(json!({
                "eventId": event_id,
                "userName": "Grace Hopper",
                "userEmail": email,
                "userPhone": "555-0100"
            })),
        )
        .await
    }
}

fn write_template(dir: &Path) {
    let img = image::RgbImage::from_pixel(400, 300, image::Rgb([250, 248, 240]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    std::fs::write(dir.join("cert.png"), out.into_inner()).unwrap();
}

#[tokio::test]
async fn health_is_public() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), RecordingMailer::new());
    let (status, json) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "ok");
}

#[tokio::test]
async fn registering_twice_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), RecordingMailer::new());
    let event_id = app.create_event(json!({})).await;

    let (status, json) = app.register(&event_id, "grace@example.com").await;
    assert_eq!(status, StatusCode::CREATED);
    let token = json["data"]["tokenId"].as_str().unwrap();
    assert_eq!(token.len(), 12);
    assert_eq!(json["data"]["isAttended"], false);

    let (status, json) = app.register(&event_id, "Grace@Example.com").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "DUPLICATE_REGISTRATION");

    let stored = app
        .store
        .list_registrations(Some(Uuid::parse_str(&event_id).unwrap()), None)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(app.mailer.sent().await.len(), 1);
}

#[tokio::test]
async fn registration_requires_fields() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), RecordingMailer::new());
    let event_id = app.create_event(json!({})).await;

    let (status, json) = app
        .call(
            Method::POST,
            "/registrations",
            None,
            Some(json!({ "eventId": event_id, "userName": "Grace" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn ticket_lookup_and_download() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), RecordingMailer::new());
    let event_id = app.create_event(json!({})).await;
    let (_, json) = app.register(&event_id, "grace@example.com").await;
    let token = json["data"]["tokenId"].as_str().unwrap().to_string();

    let (status, json) = app
        .call(Method::GET, &format!("/registrations/ticket/{token}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["event"]["title"], "Rust Meetup");
    assert_eq!(json["data"]["userEmail"], "grace@example.com");

    let request = Request::builder()
        .uri(format!("/registrations/ticket/{token}/pdf"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/pdf"
    );

    let (status, _) = app
        .call(Method::GET, "/registrations/ticket/unknown", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn check_in_distinguishes_outcomes() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), RecordingMailer::new());
    let event_id = app.create_event(json!({})).await;
    let (_, json) = app.register(&event_id, "grace@example.com").await;
    let token = json["data"]["tokenId"].as_str().unwrap().to_string();

    // Scanner payload carrying the full ticket URL, URL-encoded.
    let scanned = format!("https%3A%2F%2Fevents.example.com%2Fticket%2F{token}");
    let (status, json) = app
        .call(
            Method::PUT,
            &format!("/registrations/checkin/{scanned}"),
            Some(VOLUNTEER),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["isAttended"], true);
    assert_eq!(json["data"]["userName"], "Grace Hopper");
    assert_eq!(json["data"]["tokenId"], token.as_str());

    let (status, json) = app
        .call(
            Method::PUT,
            &format!("/registrations/checkin/{token}"),
            Some(VOLUNTEER),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "ALREADY_CHECKED_IN");
    assert_eq!(json["error"]["details"]["userName"], "Grace Hopper");

    let (status, json) = app
        .call(
            Method::PUT,
            "/registrations/checkin/NOPE12345678",
            Some(VOLUNTEER),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "INVALID_TICKET");
}

#[tokio::test]
async fn attendance_toggle_can_undo() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), RecordingMailer::new());
    let event_id = app.create_event(json!({})).await;
    let (_, json) = app.register(&event_id, "grace@example.com").await;
    let id = json["data"]["_id"].as_str().unwrap().to_string();
    let token = json["data"]["tokenId"].as_str().unwrap().to_string();

    app.call(
        Method::PUT,
        &format!("/registrations/checkin/{token}"),
        Some(VOLUNTEER),
        None,
    )
    .await;

    let (status, json) = app
        .call(
            Method::PUT,
            &format!("/registrations/{id}/attendance"),
            Some(VOLUNTEER),
            Some(json!({ "isAttended": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["isAttended"], false);
    assert_eq!(json["data"]["status"], "registered");
}

#[tokio::test]
async fn staff_routes_need_the_right_role() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), RecordingMailer::new());
    let body = json!({
        "title": "T", "description": "D", "venue": "V", "dateTime": "2030-01-01T18:00:00Z"
    });

    let (status, json) = app
        .call(Method::POST, "/events", None, Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "AUTH_ERROR");

    let (status, _) = app
        .call(Method::POST, "/events", Some("wrong"), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = app
        .call(Method::POST, "/events", Some(VOLUNTEER), Some(body))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "FORBIDDEN");

    let (status, _) = app
        .call(Method::GET, "/registrations/recent", Some(VOLUNTEER), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn certificate_batch_reports_partial_failure() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path());
    let app = test_app(dir.path(), RecordingMailer::new());
    let event_id = app
        .create_event(json!({
            "isCertificateEnabled": true,
            "certificateTemplateUrl": "/uploads/cert.png",
            "certNameX": 400, "certNameY": 300, "certFontSize": 40,
            "certFontFamily": "Times"
        }))
        .await;

    for n in 0..4 {
        let (status, _) = app.register(&event_id, &format!("p{n}@example.com")).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    // Legacy record whose address never validated.
    app.store
        .insert_registration(NewRegistration {
            event_id: Uuid::parse_str(&event_id).unwrap(),
            user_id: None,
            user_name: "No Mail".into(),
            user_email: String::new(),
            user_phone: None,
            token_id: "LEGACY000001".into(),
        })
        .await
        .unwrap();

    let (status, json) = app
        .call(
            Method::POST,
            &format!("/events/{event_id}/certificates/send"),
            Some(ADMIN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["sent"], 4);
    assert_eq!(json["data"]["failed"], 1);
    assert_eq!(json["data"]["failures"][0]["userName"], "No Mail");
    assert_eq!(json["message"], "Sent 4 emails, 1 failed.");

    let certificates: Vec<_> = app
        .mailer
        .sent()
        .await
        .into_iter()
        .filter(|m| m.subject == "Your Certificate for Rust Meetup")
        .collect();
    assert_eq!(certificates.len(), 4);
    assert_eq!(
        certificates[0].attachments[0].filename,
        "Grace_Hopper_Certificate.pdf"
    );
}

#[tokio::test]
async fn certificate_batch_without_registrations_sends_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path());
    let app = test_app(dir.path(), RecordingMailer::new());
    let event_id = app
        .create_event(json!({
            "isCertificateEnabled": true,
            "certificateTemplateUrl": "/uploads/cert.png"
        }))
        .await;

    let (status, json) = app
        .call(
            Method::POST,
            &format!("/events/{event_id}/certificates/send"),
            Some(ADMIN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "PRECONDITION_FAILED");
    assert!(app.mailer.sent().await.is_empty());
}

#[tokio::test]
async fn layout_updates_are_validated_and_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), RecordingMailer::new());
    let event_id = app.create_event(json!({})).await;

    let (status, json) = app
        .call(
            Method::PUT,
            &format!("/events/{event_id}"),
            Some(ADMIN),
            Some(json!({ "certNameX": 120.5, "certNameY": 0, "certFontSize": 36, "certFontFamily": "Great Vibes" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["certNameX"], 120.5);
    assert_eq!(json["data"]["certNameY"], 0.0);
    assert_eq!(json["data"]["certFontFamily"], "Great Vibes");

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/events/{event_id}"),
            Some(ADMIN),
            Some(json!({ "certFontSize": -4 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/events/{event_id}"),
            Some(ADMIN),
            Some(json!({ "status": "archived" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_an_event_removes_its_registrations() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), RecordingMailer::new());
    let event_id = app.create_event(json!({})).await;
    let (_, json) = app.register(&event_id, "grace@example.com").await;
    let token = json["data"]["tokenId"].as_str().unwrap().to_string();

    let (status, _) = app
        .call(Method::DELETE, &format!("/events/{event_id}"), Some(ADMIN), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    assert!(app.store.registration_by_token(&token).await.unwrap().is_none());
    let (status, _) = app
        .call(Method::GET, &format!("/events/{event_id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn preview_download_name_is_header_safe() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path());
    let app = test_app(dir.path(), RecordingMailer::new());
    let event_id = app
        .create_event(json!({
            "isCertificateEnabled": true,
            "certificateTemplateUrl": "/uploads/cert.png"
        }))
        .await;

    let request = Request::builder()
        .method(Method::GET)
        .uri(format!(
            "/events/{event_id}/certificates/preview?name=Ada%20%22Q%22%0D%0ALovelace"
        ))
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN}"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Ada__Q___Lovelace_Certificate.pdf\""
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}
