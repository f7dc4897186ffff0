use std::sync::Arc;

use actix_web::cookie::Cookie;
use actix_web::middleware::from_fn;
use actix_web::{test, web, App};
use chrono::Utc;
use fl_api::middleware::issue_csrf_cookie;
use fl_api::{configure_routes, AppState};
use fl_auth_simple::SimpleAuthProvider;
use fl_core::{AccountStatus, AuthProvider, Role, User, UserRepo};
use fl_db_sqlite::SqliteFarmRepo;
use fl_services::Services;
use fl_storage_local::LocalMediaStore;
use serde_json::Value;
use uuid::Uuid;

const CSRF: &str = "test-csrf-token";
const BOUNDARY: &str = "----farmlogboundary";

struct Harness {
    state: web::Data<AppState>,
    repo: Arc<SqliteFarmRepo>,
    auth: Arc<SimpleAuthProvider>,
}

impl Harness {
    async fn new() -> Self {
        let repo = Arc::new(SqliteFarmRepo::new("sqlite::memory:").await.unwrap());
        let media = Arc::new(LocalMediaStore::new(
            std::env::temp_dir().join(format!("fl-api-{}", Uuid::new_v4())),
        ));
        let auth = Arc::new(SimpleAuthProvider::new(b"route-test-secret-0123456789").unwrap());
        let services = Services::new(repo.clone(), media, auth.clone());
        let mut state = AppState::new(services, auth.clone());
        state.secure_cookies = false;
        Self { state: web::Data::new(state), repo, auth }
    }

    async fn user(&self, role: Role, status: AccountStatus) -> (User, String) {
        let user = User {
            id: Uuid::now_v7(),
            email: format!("{}@farm.test", Uuid::new_v4().simple()),
            password_hash: self.auth.hash_password("password123").unwrap(),
            role,
            status,
            created_at: Utc::now(),
        };
        self.repo.create_user(user.clone()).await.unwrap();
        let token = self.auth.issue_session(user.id);
        (user, token)
    }
}

macro_rules! app {
    ($h:expr) => {
        test::init_service(
            App::new()
                .app_data($h.state.clone())
                .wrap(from_fn(issue_csrf_cookie))
                .configure(configure_routes),
        )
        .await
    };
}

fn multipart(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    if let Some((name, content_type, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"note.pdf\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn authed(req: test::TestRequest, session: &str) -> test::TestRequest {
    req.cookie(Cookie::new("session", session.to_string()))
        .cookie(Cookie::new("csrf", CSRF))
        .insert_header(("x-csrf-token", CSRF))
}

#[actix_web::test]
async fn test_csrf_cookie_issued_and_enforced() {
    let h = Harness::new().await;
    let app = app!(h);
    let (_, session) = h.user(Role::Staff, AccountStatus::Active).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/auth/captcha").to_request()).await;
    assert!(resp.status().is_success());
    assert!(resp.response().cookies().any(|c| c.name() == "csrf"));
    assert!(resp.response().cookies().any(|c| c.name() == "captcha"));

    let req = test::TestRequest::post()
        .uri("/api/farm")
        .cookie(Cookie::new("session", session.clone()))
        .cookie(Cookie::new("csrf", CSRF))
        .insert_header(("x-csrf-token", "something-else"))
        .set_form([("totalChickens", "10"), ("eggsToday", "5"), ("feedCost", "0"), ("medicineCost", "0")])
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);
}

#[actix_web::test]
async fn test_anonymous_is_unauthorized() {
    let h = Harness::new().await;
    let app = app!(h);
    let req = test::TestRequest::get().uri("/api/comments/landing").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "UNAUTHORIZED");

    let forged = test::TestRequest::get()
        .uri("/api/farm")
        .cookie(Cookie::new("session", Uuid::new_v4().to_string()))
        .to_request();
    assert_eq!(test::call_service(&app, forged).await.status(), 401);
}

#[actix_web::test]
async fn test_comment_flow_over_http() {
    let h = Harness::new().await;
    let app = app!(h);
    let (_, staff) = h.user(Role::Staff, AccountStatus::Active).await;
    let (_, supervisor) = h.user(Role::Supervisor, AccountStatus::Active).await;
    let (_, reader) = h.user(Role::User, AccountStatus::Active).await;

    let req = authed(test::TestRequest::post().uri("/api/farm"), &staff)
        .set_form([
            ("recordDate", "2025-03-14"),
            ("totalChickens", "320"),
            ("eggsToday", "210"),
            ("feedCost", "780000"),
            ("medicineCost", "95000"),
            ("notes", "ayam lesu"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let record: Value = test::read_body_json(resp).await;
    let record_id = record["id"].as_str().unwrap().to_string();

    let body = multipart(
        &[
            ("resourceType", "farm"),
            ("resourceId", &record_id),
            ("content", "Perlu cek pakan"),
            ("issueTags", "pakan, kesehatan"),
        ],
        Some(("attachment", "application/pdf", b"%PDF-1.4 laporan")),
    );
    let req = authed(test::TestRequest::post().uri("/api/comments"), &staff)
        .insert_header(("content-type", format!("multipart/form-data; boundary={BOUNDARY}")))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let comment: Value = test::read_body_json(resp).await;
    assert_eq!(comment["status"], "PENDING");
    assert_eq!(comment["issue_tags"], serde_json::json!(["pakan", "kesehatan"]));
    let comment_id = comment["id"].as_str().unwrap().to_string();

    let list_uri = format!("/api/comments?resourceType=FARM_DATA&resourceId={record_id}");
    let req = authed(test::TestRequest::get().uri(&list_uri), &supervisor).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let view: Value = test::read_body_json(resp).await;
    assert_eq!(view["comments"].as_array().unwrap().len(), 1);

    let req = authed(test::TestRequest::get().uri(&list_uri), &reader).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = authed(test::TestRequest::get().uri(&format!("/api/comments/attachment/{comment_id}")), &staff)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("content-type").unwrap(), "application/pdf");
    assert_eq!(test::read_body(resp).await.as_ref(), b"%PDF-1.4 laporan");

    let req = authed(test::TestRequest::post().uri("/api/comments/update"), &supervisor)
        .set_form([("commentId", comment_id.as_str()), ("action", "status"), ("status", "APPROVED")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let updated: Value = test::read_body_json(resp).await;
    assert_eq!(updated["status"], "APPROVED");

    let req = authed(test::TestRequest::post().uri("/api/comments/update"), &supervisor)
        .set_form([("commentId", comment_id.as_str()), ("action", "pin"), ("redirectTo", "/laporan")])
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = authed(test::TestRequest::post().uri("/api/comments/delete"), &supervisor)
        .set_form([("commentId", comment_id.as_str()), ("redirectTo", "/laporan")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 303);
    assert_eq!(resp.headers().get("location").unwrap(), "/laporan");
}

#[actix_web::test]
async fn test_disallowed_attachment_is_rejected() {
    let h = Harness::new().await;
    let app = app!(h);
    let (_, staff) = h.user(Role::Staff, AccountStatus::Active).await;

    let req = authed(test::TestRequest::post().uri("/api/farm"), &staff)
        .set_form([("totalChickens", "1"), ("eggsToday", "1"), ("feedCost", "1"), ("medicineCost", "1")])
        .to_request();
    let record: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let record_id = record["id"].as_str().unwrap().to_string();

    let body = multipart(
        &[("resourceType", "FARM_DATA"), ("resourceId", &record_id), ("content", "lihat")],
        Some(("attachment", "application/x-msdownload", b"MZ")),
    );
    let req = authed(test::TestRequest::post().uri("/api/comments"), &staff)
        .insert_header(("content-type", format!("multipart/form-data; boundary={BOUNDARY}")))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[actix_web::test]
async fn test_register_approve_login() {
    let h = Harness::new().await;
    let app = app!(h);
    let (_, admin) = h.user(Role::Admin, AccountStatus::Active).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .cookie(Cookie::new("csrf", CSRF))
        .set_form([("email", "Peternak@Farm.test"), ("password", "rahasia123"), ("csrf", CSRF)])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let user: Value = test::read_body_json(resp).await;
    assert_eq!(user["status"], "PENDING");
    assert!(user.get("password_hash").is_none());
    let user_id = user["id"].as_str().unwrap().to_string();

    let login = |captcha_token: String, answer: String| {
        test::TestRequest::post()
            .uri("/api/auth/login")
            .cookie(Cookie::new("csrf", CSRF))
            .cookie(Cookie::new("captcha", captcha_token))
            .set_form([
                ("email", "peternak@farm.test".to_string()),
                ("password", "rahasia123".to_string()),
                ("captcha", answer),
                ("csrf", CSRF.to_string()),
            ])
            .to_request()
    };

    let captcha = h.auth.create_captcha();
    let resp = test::call_service(&app, login(captcha.token, captcha.answer)).await;
    assert_eq!(resp.status(), 403);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "PENDING_APPROVAL");

    let req = authed(test::TestRequest::post().uri("/api/admin/approve-user"), &admin)
        .set_form([("userId", user_id.as_str()), ("action", "approve")])
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let captcha = h.auth.create_captcha();
    let resp = test::call_service(&app, login(captcha.token.clone(), "99".into())).await;
    assert_eq!(resp.status(), 400);

    let resp = test::call_service(&app, login(captcha.token, captcha.answer)).await;
    assert_eq!(resp.status(), 200);
    let session = resp
        .response()
        .cookies()
        .find(|c| c.name() == "session")
        .map(|c| c.value().to_string())
        .unwrap();

    let req = test::TestRequest::get()
        .uri("/api/farm")
        .cookie(Cookie::new("session", session))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
}
