use actix_web::http::{StatusCode, header};
use actix_web::{App, test, web};
use bookshelf::application::auth_service::AuthService;
use bookshelf::application::book_service::BookService;
use bookshelf::data::book_repository::InMemoryBookRepository;
use bookshelf::data::cover_storage::FsCoverStorage;
use bookshelf::data::user_repository::InMemoryUserRepository;
use bookshelf::domain::user::{CreateUser, LoginRequest};
use bookshelf::presentation::books::{BookListResponse, BookView};
use bookshelf::presentation::handlers::AppState;
use bookshelf::presentation::middleware::JwtAuthMiddleware;
use bookshelf::presentation::routes;
use serde_json::json;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

macro_rules! setup_test {
    () => {{
        let jwt_secret = "test-secret-key-for-testing-only".to_string();
        let auth_service =
            AuthService::new(Arc::new(InMemoryUserRepository::new()), jwt_secret.clone());

        auth_service
            .ensure_admin("admin@example.com", "admin1234")
            .await
            .unwrap();
        auth_service
            .register_user(CreateUser {
                email: "user@example.com".to_string(),
                password: "user1234".to_string(),
            })
            .await
            .unwrap();

        let admin_token = auth_service
            .login(LoginRequest {
                email: "admin@example.com".to_string(),
                password: "admin1234".to_string(),
            })
            .await
            .unwrap();
        let user_token = auth_service
            .login(LoginRequest {
                email: "user@example.com".to_string(),
                password: "user1234".to_string(),
            })
            .await
            .unwrap();

        let cover_dir =
            std::env::temp_dir().join(format!("bookshelf-api-{}", uuid::Uuid::new_v4()));
        let books = BookService::new(
            Arc::new(InMemoryBookRepository::new()),
            Arc::new(FsCoverStorage::new(cover_dir)),
        );

        let state = web::Data::new(AppState {
            books,
            auth_service: Arc::new(auth_service),
        });

        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .wrap(JwtAuthMiddleware::new(jwt_secret))
                .configure(routes::configure(routes::DEFAULT_JSON_LIMIT)),
        )
        .await;

        (app, admin_token, user_token)
    }};
}

/// Collects every event's fields as one line of text.
#[derive(Clone, Default)]
struct CapturedEvents(Arc<Mutex<Vec<String>>>);

impl CapturedEvents {
    fn any_contains(&self, needle: &str) -> bool {
        self.0.lock().unwrap().iter().any(|line| line.contains(needle))
    }
}

struct FieldWriter<'a>(&'a mut String);

impl Visit for FieldWriter<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let _ = write!(self.0, "{}={:?} ", field.name(), value);
    }
}

impl<S: tracing::Subscriber> Layer<S> for CapturedEvents {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut line = String::new();
        event.record(&mut FieldWriter(&mut line));
        self.0.lock().unwrap().push(line);
    }
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

#[actix_web::test]
async fn test_health_is_public() {
    let (app, _, _) = setup_test!();

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_index() {
    let (app, admin_token, _) = setup_test!();

    let req = test::TestRequest::get()
        .uri("/api/books")
        .insert_header(bearer(&admin_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let listing: BookListResponse = test::read_body_json(resp).await;
    assert!(listing.books.is_empty());
    assert!(listing.permissions.create);
    assert!(listing.permissions.edit);
    assert!(listing.permissions.delete);
}

#[actix_web::test]
async fn test_only_admin_can_add_books() {
    let (app, _, user_token) = setup_test!();

    let req = test::TestRequest::get()
        .uri("/api/books")
        .insert_header(bearer(&user_token))
        .to_request();
    let listing: BookListResponse = test::call_and_read_body_json(&app, req).await;
    assert!(!listing.permissions.create);
    assert!(!listing.permissions.edit);
    assert!(!listing.permissions.delete);

    let req = test::TestRequest::get()
        .uri("/api/books/new")
        .insert_header(bearer(&user_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri("/api/books")
        .insert_header(bearer(&user_token))
        .set_json(json!({ "title": "Testing", "price": "10,99" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri("/api/books")
        .insert_header(bearer(&user_token))
        .to_request();
    let listing: BookListResponse = test::call_and_read_body_json(&app, req).await;
    assert!(listing.books.is_empty());
}

#[actix_web::test]
async fn test_new_form_for_admin() {
    let (app, admin_token, _) = setup_test!();

    let req = test::TestRequest::get()
        .uri("/api/books/new")
        .insert_header(bearer(&admin_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let form: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(form["title"], "");
    assert_eq!(form["price"], "");
}

#[actix_web::test]
async fn test_new() {
    let (app, admin_token, _) = setup_test!();

    let req = test::TestRequest::post()
        .uri("/api/books")
        .insert_header(bearer(&admin_token))
        .set_json(json!({ "title": "Testing", "price": "10,99" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap(),
        "/api/books"
    );

    let req = test::TestRequest::get()
        .uri("/api/books")
        .insert_header(bearer(&admin_token))
        .to_request();
    let listing: BookListResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listing.books.len(), 1);

    let book = &listing.books[0];
    assert_eq!(book.title, "Testing");
    assert_eq!(book.price_in_cents, 1099);
    assert_eq!(book.price, "10,99");
    assert!(book.cover_path.is_none());
}

#[actix_web::test]
async fn test_new_rejects_bad_price() {
    let (app, admin_token, _) = setup_test!();

    for price in ["10.99", "abc", "-1", "10,999", ""] {
        let req = test::TestRequest::post()
            .uri("/api/books")
            .insert_header(bearer(&admin_token))
            .set_json(json!({ "title": "Testing", "price": price }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "price {:?}", price);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["details"]["field"], "price");
    }

    let req = test::TestRequest::post()
        .uri("/api/books")
        .insert_header(bearer(&admin_token))
        .set_json(json!({ "price": "10" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["details"]["field"], "title");

    let req = test::TestRequest::get()
        .uri("/api/books")
        .insert_header(bearer(&admin_token))
        .to_request();
    let listing: BookListResponse = test::call_and_read_body_json(&app, req).await;
    assert!(listing.books.is_empty());
}

#[actix_web::test]
async fn test_show() {
    let (app, admin_token, user_token) = setup_test!();

    let req = test::TestRequest::post()
        .uri("/api/books")
        .insert_header(bearer(&admin_token))
        .set_json(json!({ "title": "Title", "price": "10" }))
        .to_request();
    let created: BookView = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::get()
        .uri(&format!("/api/books/{}", created.id))
        .insert_header(bearer(&user_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let book: BookView = test::read_body_json(resp).await;
    assert_eq!(book.title, "Title");
    assert_eq!(book.price_in_cents, 1000);
}

#[actix_web::test]
async fn test_show_unknown_book() {
    let (app, admin_token, _) = setup_test!();

    let req = test::TestRequest::get()
        .uri("/api/books/404")
        .insert_header(bearer(&admin_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_edit() {
    let (app, admin_token, _) = setup_test!();

    let req = test::TestRequest::post()
        .uri("/api/books")
        .insert_header(bearer(&admin_token))
        .set_json(json!({ "title": "Value", "price": "10" }))
        .to_request();
    let created: BookView = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::put()
        .uri(&format!("/api/books/{}", created.id))
        .insert_header(bearer(&admin_token))
        .set_json(json!({ "title": "Something New", "price": "10,80" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap(),
        "/api/books"
    );

    let req = test::TestRequest::get()
        .uri("/api/books")
        .insert_header(bearer(&admin_token))
        .to_request();
    let listing: BookListResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listing.books[0].title, "Something New");
    assert_eq!(listing.books[0].price_in_cents, 1080);
}

#[actix_web::test]
async fn test_non_admin_cannot_edit_or_delete() {
    let (app, admin_token, user_token) = setup_test!();

    let req = test::TestRequest::post()
        .uri("/api/books")
        .insert_header(bearer(&admin_token))
        .set_json(json!({ "title": "Value", "price": "10" }))
        .to_request();
    let created: BookView = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::put()
        .uri(&format!("/api/books/{}", created.id))
        .insert_header(bearer(&user_token))
        .set_json(json!({ "title": "Hijacked" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/books/{}", created.id))
        .insert_header(bearer(&user_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri(&format!("/api/books/{}", created.id))
        .insert_header(bearer(&user_token))
        .to_request();
    let book: BookView = test::call_and_read_body_json(&app, req).await;
    assert_eq!(book.title, "Value");
    assert_eq!(book.updated_at, created.updated_at);
}

#[actix_web::test]
async fn test_remove() {
    let (app, admin_token, _) = setup_test!();

    let mut ids = Vec::new();
    for title in ["Value", "Other"] {
        let req = test::TestRequest::post()
            .uri("/api/books")
            .insert_header(bearer(&admin_token))
            .set_json(json!({ "title": title, "price": "10" }))
            .to_request();
        let created: BookView = test::call_and_read_body_json(&app, req).await;
        ids.push(created.id);
    }

    let req = test::TestRequest::delete()
        .uri(&format!("/api/books/{}", ids[0]))
        .insert_header(bearer(&admin_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap(),
        "/api/books"
    );

    let req = test::TestRequest::get()
        .uri(&format!("/api/books/{}", ids[0]))
        .insert_header(bearer(&admin_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get()
        .uri("/api/books")
        .insert_header(bearer(&admin_token))
        .to_request();
    let listing: BookListResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listing.books.len(), 1);
    assert_eq!(listing.books[0].id, ids[1]);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/books/{}", ids[0]))
        .insert_header(bearer(&admin_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_unauthenticated_access() {
    let (app, _, _) = setup_test!();

    let req = test::TestRequest::get().uri("/api/books").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/api/books")
        .insert_header(("Authorization", "Bearer not.a.token"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_malformed_json_uses_error_body() {
    let (app, admin_token, _) = setup_test!();

    let req = test::TestRequest::post()
        .uri("/api/books")
        .insert_header(bearer(&admin_token))
        .set_json(json!({ "title": 5, "price": "10" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().is_some());
    assert!(body["details"]["message"].as_str().is_some());

    let req = test::TestRequest::post()
        .uri("/api/books")
        .insert_header(bearer(&admin_token))
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{\"title\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body["details"]["message"].as_str().is_some());
}

#[actix_web::test]
async fn test_rejected_create_does_not_log_title() {
    let (app, admin_token, user_token) = setup_test!();
    let events = CapturedEvents::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(events.clone()));

    let req = test::TestRequest::post()
        .uri("/api/books")
        .insert_header(bearer(&user_token))
        .set_json(json!({ "title": "UnprivilegedTitle", "price": "10" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(!events.any_contains("UnprivilegedTitle"));

    let req = test::TestRequest::post()
        .uri("/api/books")
        .insert_header(bearer(&admin_token))
        .set_json(json!({ "title": "AdminTitle", "price": "10" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert!(events.any_contains("AdminTitle"));
}
