//! Integration tests for login, signup, logout and account deletion

use std::sync::Arc;

use mockito::{Matcher, Server};
use mockview_core::auth::MemoryBackend;
use mockview_core::{
    ApiError, CredentialPair, CredentialStore, RecordingNavigator, Route, SessionController,
    SessionState, User,
};
use serde_json::json;

fn user(id: &str, username: &str) -> User {
    serde_json::from_value(json!({ "id": id, "username": username }))
        .expect("test user should deserialize")
}

fn controller(base_url: &str, backend: &MemoryBackend) -> (SessionController, Arc<RecordingNavigator>) {
    let navigator = Arc::new(RecordingNavigator::new());
    let controller = SessionController::new(
        base_url,
        CredentialStore::new(backend.clone()),
        navigator.clone(),
    )
    .expect("Failed to build session controller");
    (controller, navigator)
}

/// Seed `backend` as if a previous run had signed in.
fn seed_session(backend: &MemoryBackend, access: &str, refresh: &str, user: &User) {
    CredentialStore::new(backend.clone())
        .store_session(&CredentialPair::new(access, refresh), user)
        .expect("Failed to seed session");
}

#[tokio::test]
async fn login_persists_session_and_authenticates() {
    //* Given
    let mut server = Server::new_async().await;
    let backend = MemoryBackend::new();

    let login_mock = server
        .mock("POST", "/v1/auth/login")
        .match_header("authorization", Matcher::Missing)
        .match_body(Matcher::Json(json!({"email": "a@b.com", "password": "pw123456"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"user":{"id":"1","username":"a"},"tokens":{"access":"A1","refresh":"R1"}}"#)
        .expect(1)
        .create_async()
        .await;

    let (controller, _navigator) = controller(&server.url(), &backend);
    controller.initialize();

    //* When
    let logged_in = controller
        .login("a@b.com", "pw123456")
        .await
        .expect("Login should succeed");

    //* Then
    login_mock.assert_async().await;
    assert_eq!(logged_in, user("1", "a"));
    assert_eq!(controller.state(), SessionState::Authenticated(user("1", "a")));
    assert_eq!(backend.len(), 3, "store holds exactly access, refresh and user");

    let reopened = CredentialStore::new(backend.clone());
    assert_eq!(reopened.get(), Some(CredentialPair::new("A1", "R1")));
    assert_eq!(reopened.cached_user(), Some(user("1", "a")));
}

#[tokio::test]
async fn login_is_sent_without_a_stored_token() {
    //* Given
    let mut server = Server::new_async().await;
    let backend = MemoryBackend::new();
    seed_session(&backend, "OLD", "OLDR", &user("9", "old"));

    let login_mock = server
        .mock("POST", "/v1/auth/login")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body(r#"{"user":{"id":"2","username":"b"},"tokens":{"access":"A2","refresh":"R2"}}"#)
        .expect(1)
        .create_async()
        .await;

    let (controller, _navigator) = controller(&server.url(), &backend);
    controller.initialize();

    //* When
    controller.login("b@b.com", "pw").await.expect("Login should succeed");

    //* Then
    login_mock.assert_async().await;
    assert_eq!(controller.current_user(), Some(user("2", "b")));
    assert_eq!(
        controller.store().get(),
        Some(CredentialPair::new("A2", "R2"))
    );
}

#[tokio::test]
async fn failed_login_leaves_store_untouched() {
    //* Given
    let mut server = Server::new_async().await;
    let backend = MemoryBackend::new();

    let login_mock = server
        .mock("POST", "/v1/auth/login")
        .with_status(401)
        .with_body(r#"{"error":"Invalid credentials"}"#)
        .expect(1)
        .create_async()
        .await;
    let refresh_mock = server
        .mock("POST", "/v1/auth/refresh")
        .expect(0)
        .create_async()
        .await;

    let (controller, _navigator) = controller(&server.url(), &backend);
    controller.initialize();

    //* When
    let result = controller.login("a@b.com", "wrong").await;

    //* Then
    login_mock.assert_async().await;
    refresh_mock.assert_async().await;
    assert!(matches!(result, Err(ApiError::InvalidCredentials(_))));
    assert_eq!(controller.state(), SessionState::Unauthenticated);
    assert!(backend.is_empty());
}

#[tokio::test]
async fn failed_login_keeps_existing_session() {
    //* Given
    let mut server = Server::new_async().await;
    let backend = MemoryBackend::new();
    seed_session(&backend, "A0", "R0", &user("u1", "ada"));

    let _login_mock = server
        .mock("POST", "/v1/auth/login")
        .with_status(400)
        .with_body(r#"{"password":["This field may not be blank."]}"#)
        .create_async()
        .await;

    let (controller, _navigator) = controller(&server.url(), &backend);
    controller.initialize();

    //* When
    let result = controller.login("a@b.com", "").await;

    //* Then
    match result {
        Err(ApiError::Validation(fields)) => {
            assert_eq!(fields.len(), 1);
            assert_eq!(fields[0].field, "password");
            assert_eq!(fields[0].message, "This field may not be blank.");
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(controller.state(), SessionState::Authenticated(user("u1", "ada")));
    assert_eq!(
        controller.store().get(),
        Some(CredentialPair::new("A0", "R0"))
    );
    assert_eq!(backend.len(), 3);
}

#[tokio::test]
async fn initialize_restores_session_without_network() {
    //* Given
    let backend = MemoryBackend::new();
    seed_session(&backend, "a1", "r1", &user("u1", "ada"));

    // Nothing listens here; any request would fail
    let (controller, navigator) = controller("http://127.0.0.1:9", &backend);
    assert!(controller.is_initializing());

    //* When
    let state = controller.initialize();

    //* Then
    assert_eq!(state, SessionState::Authenticated(user("u1", "ada")));
    assert!(controller.is_authenticated());
    assert!(navigator.visited().is_empty());
}

#[tokio::test]
async fn signup_returns_server_message_without_creating_session() {
    //* Given
    let mut server = Server::new_async().await;
    let backend = MemoryBackend::new();

    let register_mock = server
        .mock("POST", "/v1/auth/register")
        .match_header("authorization", Matcher::Missing)
        .match_body(Matcher::Json(json!({
            "username": "ada",
            "email": "ada@example.com",
            "password": "pw123456",
            "confirm_password": "pw123456",
        })))
        .with_status(201)
        .with_body(r#"{"message":"Account created! Please check your email to verify your account."}"#)
        .expect(1)
        .create_async()
        .await;

    let (controller, _navigator) = controller(&server.url(), &backend);
    controller.initialize();

    //* When
    let message = controller
        .signup("ada", "ada@example.com", "pw123456")
        .await
        .expect("Signup should succeed");

    //* Then
    register_mock.assert_async().await;
    assert_eq!(
        message,
        "Account created! Please check your email to verify your account."
    );
    assert_eq!(controller.state(), SessionState::Unauthenticated);
    assert!(backend.is_empty());
}

#[tokio::test]
async fn signup_without_message_uses_default() {
    //* Given
    let mut server = Server::new_async().await;
    let _register_mock = server
        .mock("POST", "/v1/auth/register")
        .with_status(201)
        .create_async()
        .await;

    let (controller, _navigator) = controller(&server.url(), &MemoryBackend::new());

    //* When
    let message = controller
        .signup("ada", "ada@example.com", "pw123456")
        .await
        .expect("Signup should succeed");

    //* Then
    assert_eq!(message, "Account created successfully. Please sign in.");
    assert_eq!(controller.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn signup_surfaces_field_errors() {
    //* Given
    let mut server = Server::new_async().await;
    let _register_mock = server
        .mock("POST", "/v1/auth/register")
        .with_status(400)
        .with_body(r#"{"email":["user with this email already exists."]}"#)
        .create_async()
        .await;

    let (controller, _navigator) = controller(&server.url(), &MemoryBackend::new());
    controller.initialize();

    //* When
    let result = controller.signup("ada", "ada@example.com", "pw123456").await;

    //* Then
    match result {
        Err(ApiError::Validation(fields)) => {
            assert_eq!(fields[0].field, "email");
            assert_eq!(fields[0].message, "user with this email already exists.");
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(controller.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn resend_verification_returns_message() {
    //* Given
    let mut server = Server::new_async().await;
    let resend_mock = server
        .mock("POST", "/v1/auth/resend-verification")
        .match_body(Matcher::Json(json!({"email": "ada@example.com"})))
        .with_status(200)
        .with_body(r#"{"message":"Verification email sent to ada@example.com"}"#)
        .expect(1)
        .create_async()
        .await;

    let (controller, _navigator) = controller(&server.url(), &MemoryBackend::new());

    //* When
    let message = controller
        .resend_verification_email("ada@example.com")
        .await
        .expect("Resend should succeed");

    //* Then
    resend_mock.assert_async().await;
    assert_eq!(message, "Verification email sent to ada@example.com");
}

#[tokio::test]
async fn logout_notifies_server_and_clears_session() {
    //* Given
    let mut server = Server::new_async().await;
    let backend = MemoryBackend::new();
    seed_session(&backend, "A1", "R1", &user("u1", "ada"));

    let logout_mock = server
        .mock("POST", "/v1/auth/logout")
        .match_header("authorization", "Bearer A1")
        .match_body(Matcher::Json(json!({"refresh": "R1"})))
        .with_status(205)
        .expect(1)
        .create_async()
        .await;

    let (controller, navigator) = controller(&server.url(), &backend);
    controller.initialize();

    //* When
    controller.logout().await;

    //* Then
    logout_mock.assert_async().await;
    assert!(backend.is_empty());
    assert_eq!(controller.state(), SessionState::Unauthenticated);
    assert_eq!(navigator.visited(), vec![Route::Login]);
}

#[tokio::test]
async fn logout_succeeds_locally_when_server_fails() {
    //* Given
    let mut server = Server::new_async().await;
    let backend = MemoryBackend::new();
    seed_session(&backend, "A1", "R1", &user("u1", "ada"));

    let _logout_mock = server
        .mock("POST", "/v1/auth/logout")
        .with_status(500)
        .with_body("Internal Server Error")
        .create_async()
        .await;

    let (controller, navigator) = controller(&server.url(), &backend);
    controller.initialize();

    //* When
    controller.logout().await;

    //* Then
    assert!(backend.is_empty());
    assert_eq!(controller.state(), SessionState::Unauthenticated);
    assert_eq!(navigator.last(), Some(Route::Login));
}

#[tokio::test]
async fn logout_with_expired_token_does_not_refresh() {
    //* Given
    let mut server = Server::new_async().await;
    let backend = MemoryBackend::new();
    seed_session(&backend, "A0", "R0", &user("u1", "ada"));

    let logout_mock = server
        .mock("POST", "/v1/auth/logout")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh_mock = server
        .mock("POST", "/v1/auth/refresh")
        .expect(0)
        .create_async()
        .await;

    let (controller, navigator) = controller(&server.url(), &backend);
    controller.initialize();

    //* When
    controller.logout().await;

    //* Then
    logout_mock.assert_async().await;
    refresh_mock.assert_async().await;
    assert!(backend.is_empty());
    assert_eq!(navigator.visited(), vec![Route::Login]);
}

#[tokio::test]
async fn delete_account_clears_session_and_navigates_to_signup() {
    //* Given
    let mut server = Server::new_async().await;
    let backend = MemoryBackend::new();
    seed_session(&backend, "A1", "R1", &user("u1", "ada"));

    let delete_mock = server
        .mock("DELETE", "/v1/auth/delete-account")
        .match_header("authorization", "Bearer A1")
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let (controller, navigator) = controller(&server.url(), &backend);
    controller.initialize();

    //* When
    controller
        .delete_account()
        .await
        .expect("Deletion should succeed");

    //* Then
    delete_mock.assert_async().await;
    assert!(backend.is_empty());
    assert_eq!(controller.state(), SessionState::Unauthenticated);
    assert_eq!(navigator.visited(), vec![Route::Signup]);
}

#[tokio::test]
async fn failed_delete_account_keeps_session() {
    //* Given
    let mut server = Server::new_async().await;
    let backend = MemoryBackend::new();
    seed_session(&backend, "A1", "R1", &user("u1", "ada"));

    let _delete_mock = server
        .mock("DELETE", "/v1/auth/delete-account")
        .with_status(500)
        .with_body(r#"{"error":"database unavailable"}"#)
        .create_async()
        .await;

    let (controller, navigator) = controller(&server.url(), &backend);
    controller.initialize();

    //* When
    let result = controller.delete_account().await;

    //* Then
    assert!(matches!(result, Err(ApiError::ServerError(ref m)) if m == "database unavailable"));
    assert_eq!(controller.state(), SessionState::Authenticated(user("u1", "ada")));
    assert_eq!(backend.len(), 3);
    assert!(navigator.visited().is_empty());
}
