//! HTTP-level tests for the envelopd router.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use envelope_daemon::config::ServerConfig;
use envelope_daemon::{create_router, AppState};
use envelope_service::{
    templates, EnvelopeService, RecordingNotifier, ServiceComponents, ServiceConfig,
};
use http_body_util::BodyExt;
use lopdf::{dictionary, Document, Object, Stream};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

// ── Test app builder ───────────────────────────────────────────

struct TestApp {
    router: axum::Router,
    notifier: Arc<RecordingNotifier>,
}

fn build_test_app() -> TestApp {
    let notifier = Arc::new(RecordingNotifier::new());
    let components = ServiceComponents::in_memory().with_notifier(notifier.clone());
    let service = EnvelopeService::new(ServiceConfig::default(), components).unwrap();
    let router = create_router(AppState::new(service), &ServerConfig::default());
    TestApp { router, notifier }
}

impl TestApp {
    async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(request).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn owner(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-tenant-id", "acme")
            .header("x-actor-id", "owner@acme.test");
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        };
        self.call(request.unwrap()).await
    }

    async fn signer(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .header("user-agent", "Mozilla/5.0 (iPad)")
                .header("x-forwarded-for", "192.0.2.10")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn token_for(&self, email: &str) -> String {
        for _ in 0..200 {
            if let Some(n) = self
                .notifier
                .sent_to(email, templates::RECIPIENT_ACTIVATED)
                .last()
            {
                return n.data["token"].as_str().unwrap().to_string();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no token delivered to {}", email);
    }

    async fn upload(&self, bytes: Vec<u8>) -> (StatusCode, Value) {
        self.call(
            Request::builder()
                .method("POST")
                .uri("/v1/documents")
                .header("x-tenant-id", "acme")
                .header("x-actor-id", "owner@acme.test")
                .header("content-type", "application/pdf")
                .body(Body::from(bytes))
                .unwrap(),
        )
        .await
    }

    /// Upload a one-page document and create a two-signer parallel envelope.
    async fn draft(&self) -> String {
        let (status, uploaded) = self.upload(blank_pdf(1)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(uploaded["pages"], 1);

        let field = |recipient: usize| {
            json!({
                "recipient": recipient,
                "kind": "signature",
                "position": { "page": 1, "x": 10.0, "y": 20.0 + 10.0 * recipient as f64, "width": 30.0, "height": 6.0 },
                "required": true,
            })
        };
        let (status, envelope) = self
            .owner(
                "POST",
                "/v1/envelopes",
                Some(json!({
                    "title": "Contractor agreement",
                    "document_key": uploaded["key"],
                    "workflow": "PARALLEL",
                    "recipients": [
                        { "order": 1, "role": "SIGNER", "name": "Ada", "email": "ada@client.test" },
                        { "order": 1, "role": "SIGNER", "name": "Ben", "email": "ben@client.test" },
                    ],
                    "fields": [field(0), field(1)],
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", envelope);
        envelope["id"].as_str().unwrap().to_string()
    }
}

/// A PDF with `pages` empty US-letter pages.
fn blank_pdf(pages: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            })
            .into()
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

// ── Tests ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_no_auth() {
    let app = build_test_app();
    let (status, body) = app
        .call(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_owner_routes_require_actor_headers() {
    let app = build_test_app();
    let (status, body) = app
        .call(
            Request::builder()
                .uri("/v1/envelopes")
                .header("x-tenant-id", "acme")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthenticated");
}

#[tokio::test]
async fn test_signing_flow_over_http() {
    let app = build_test_app();
    let id = app.draft().await;

    let (status, sent) = app
        .owner("POST", &format!("/v1/envelopes/{}/send", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sent["status"], "SENT");
    // Tokens never appear in owner responses.
    let ada = app.token_for("ada@client.test").await;
    assert!(!sent.to_string().contains(&ada));

    let (status, view) = app
        .call(
            Request::builder()
                .uri(format!("/v1/sign/{}", ada))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["can_act"], true);
    assert_eq!(view["fields"].as_array().unwrap().len(), 1);

    let complete_uri = format!("/v1/sign/{}/complete", ada);
    let (status, done) = app
        .signer("POST", &complete_uri, json!({ "method": "typed", "consent": true }))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", done);
    assert_eq!(done["recipient_status"], "SIGNED");
    assert_eq!(done["envelope_status"], "IN_PROGRESS");

    let (status, again) = app
        .signer("POST", &complete_uri, json!({ "method": "typed", "consent": true }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(again["code"], "conflict");

    let (status, signatures) = app
        .owner("GET", &format!("/v1/envelopes/{}/signatures", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let metadata = &signatures[0]["metadata"];
    assert_eq!(metadata["ip_address"], "192.0.2.10");
    assert_eq!(metadata["device_class"], "tablet");
}

#[tokio::test]
async fn test_error_statuses_follow_the_taxonomy() {
    let app = build_test_app();
    let id = app.draft().await;

    // Other tenants see nothing.
    let (status, _) = app
        .call(
            Request::builder()
                .uri(format!("/v1/envelopes/{}", id))
                .header("x-tenant-id", "globex")
                .header("x-actor-id", "mallory")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(
            Request::builder()
                .uri("/v1/sign/0123456789abcdef0123456789abcdef")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.owner("POST", &format!("/v1/envelopes/{}/send", id), None)
        .await;
    let ben = app.token_for("ben@client.test").await;

    let (status, body) = app
        .signer("POST", &format!("/v1/sign/{}/decline", ben), json!({ "reason": "" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = app
        .signer(
            "POST",
            &format!("/v1/sign/{}/decline", ben),
            json!({ "reason": "rate is wrong" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["envelope_status"], "DECLINED");

    let (status, _) = app
        .owner("DELETE", &format!("/v1/envelopes/{}", id), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, audit) = app
        .owner("GET", &format!("/v1/envelopes/{}/audit", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(audit["verification"]["valid"], true);
}

#[tokio::test]
async fn test_send_without_signature_field_is_unprocessable() {
    let app = build_test_app();
    let id = app.draft().await;
    let (_, envelope) = app
        .owner("GET", &format!("/v1/envelopes/{}", id), None)
        .await;
    let field_id = envelope["fields"][0]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .owner(
            "DELETE",
            &format!("/v1/envelopes/{}/fields/{}", id, field_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .owner("POST", &format!("/v1/envelopes/{}/send", id), None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "incomplete_layout");
}

#[tokio::test]
async fn test_unusable_documents_and_pages_are_rejected() {
    let app = build_test_app();
    let (status, body) = app.upload(b"%PDF-1.7\n%stub\n".to_vec()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "validation_error");

    let (status, uploaded) = app.upload(blank_pdf(2)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(uploaded["pages"], 2);
    let (status, body) = app
        .owner(
            "POST",
            "/v1/envelopes",
            Some(json!({
                "title": "Lease",
                "document_key": uploaded["key"],
                "recipients": [
                    { "order": 1, "role": "SIGNER", "name": "Ada", "email": "ada@client.test" },
                ],
                "fields": [{
                    "recipient": 0,
                    "kind": "signature",
                    "position": { "page": 5, "x": 10.0, "y": 20.0, "width": 30.0, "height": 6.0 },
                    "required": true,
                }],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "validation_error");
}
