use std::path::Path;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Form, Router,
};
use lockbox_auth::{Authenticator, LoginOutcome};
use lockbox_core::{accounts::AccountStore, codec::CredentialCodec};
use serde::Deserialize;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::error;

use crate::views;

pub const SIGNUP_FAILED: &str = "Error signing up.";
pub const LOGIN_FAILED: &str = "Error logging in.";
pub const INVALID_CREDENTIALS: &str = "Invalid credentials.";

/// Form body shared by signup and login. Missing fields arrive as empty
/// strings; nothing is validated.
#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Pages, credential endpoints, and static assets for any path not routed.
pub fn router<S, C>(auth: Authenticator<S, C>, public_dir: &Path) -> Router
where
    S: AccountStore + 'static,
    C: CredentialCodec + 'static,
{
    Router::new()
        .route("/", get(home))
        .route("/signup", get(signup_page).post(signup::<S, C>))
        .route("/login", get(login_page).post(login::<S, C>))
        .route("/health", get(health_check))
        .fallback_service(ServeDir::new(public_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(auth)
}

async fn home() -> Response {
    page("home")
}

async fn signup_page() -> Response {
    page("signup")
}

async fn login_page() -> Response {
    page("login")
}

async fn health_check() -> &'static str {
    "ok"
}

async fn signup<S, C>(
    State(auth): State<Authenticator<S, C>>,
    Form(form): Form<CredentialsForm>,
) -> Response
where
    S: AccountStore + 'static,
    C: CredentialCodec + 'static,
{
    match auth.signup(&form.username, &form.password).await {
        Ok(_) => page("access"),
        Err(err) => {
            error!(error = %err, "signup failed");
            SIGNUP_FAILED.into_response()
        }
    }
}

async fn login<S, C>(
    State(auth): State<Authenticator<S, C>>,
    Form(form): Form<CredentialsForm>,
) -> Response
where
    S: AccountStore + 'static,
    C: CredentialCodec + 'static,
{
    match auth.login(&form.username, &form.password).await {
        Ok(LoginOutcome::Granted) => page("access"),
        Ok(LoginOutcome::InvalidCredentials) => INVALID_CREDENTIALS.into_response(),
        Err(err) => {
            error!(error = %err, "login failed");
            LOGIN_FAILED.into_response()
        }
    }
}

fn page(name: &str) -> Response {
    match views::render(name) {
        Ok(html) => html.into_response(),
        Err(err) => {
            error!(error = %err, "view rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error.").into_response()
        }
    }
}
