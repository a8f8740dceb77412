//! A small condominium-management resource server showing the full
//! authorization wiring: environment configuration, bearer
//! authentication, userinfo role augmentation, and per-endpoint role
//! guards.
//!
//! Required environment:
//!
//! * `ID_SERVER_URL` - base URL of the OpenID Connect authority
//! * `CLIENT_ID` - audience expected in inbound tokens
//! * `TOKEN_SIGNING_SECRET` - HS256 secret shared with the authority
//!
//! Optional environment:
//!
//! * `NAME_CLAIM`, `ROLE_NAMES`, `DANGER_ACCEPT_INVALID_CERTS` - see the
//!   `pordisto` configuration docs
//!
//! Production deployments validate RS256 signatures against the
//! authority's published keys; the shared-secret setup here keeps the
//! example self-contained.

use std::{env, process::ExitCode, sync::Arc};

use axum::{
    routing::{get, post},
    Extension, Router,
};
use jsonwebtoken::{Algorithm, DecodingKey};
use pordisto::AuthConfig;
use pordisto_axum::{role_guards, Authenticated, SharedResolver};
use pordisto_tower::{Authenticator, JwtAuthenticator, RoleAuthorizer};

role_guards! {
    guard AdminOnly = ["Administrator"];
    guard GuardOnly = ["SecurityGuard"];
    guard GateStaff = ["Administrator", "SecurityGuard"];
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = match AuthConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let signing_secret = match env::var("TOKEN_SIGNING_SECRET") {
        Ok(secret) if !secret.trim().is_empty() => secret,
        _ => {
            eprintln!("please configure the `TOKEN_SIGNING_SECRET` environment variable");
            return ExitCode::FAILURE;
        }
    };

    let userinfo = match config.userinfo_client() {
        Ok(client) => client,
        Err(err) => {
            eprintln!("failed to build the userinfo client: {err}");
            return ExitCode::FAILURE;
        }
    };

    let authenticator: Arc<dyn Authenticator> = Arc::new(
        JwtAuthenticator::new(
            DecodingKey::from_secret(signing_secret.as_bytes()),
            Algorithm::HS256,
            &config.authority,
            &config.audience,
        )
        .with_name_claim(config.name_claim.clone()),
    );

    let authorizer = RoleAuthorizer::new().with_verbose_error_handler::<axum::body::Body>();

    let app = Router::new()
        .route("/residents", get(list_residents))
        .route("/vehicles", post(create_vehicle))
        .route("/vehicles/entries", post(register_entry))
        .route("/vehicles/entries/log", get(entry_log))
        .route("/me", get(whoami))
        .layer(authorizer.authentication_layer(authenticator, userinfo))
        .layer(Extension(SharedResolver::new(config.resolver())));

    let listener = match tokio::net::TcpListener::bind("127.0.0.1:8080").await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("failed to bind 127.0.0.1:8080: {err}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("listening on 127.0.0.1:8080");

    if let Err(err) = axum::serve(listener, app).await {
        eprintln!("server error: {err}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn list_residents(guard: AdminOnly) -> String {
    format!(
        "residents roster, requested by {}",
        guard.principal().name().unwrap_or("an administrator")
    )
}

async fn create_vehicle(_: AdminOnly) -> &'static str {
    "vehicle registered"
}

async fn register_entry(guard: GuardOnly) -> String {
    format!(
        "entry recorded by {}",
        guard.principal().name().unwrap_or("the gate")
    )
}

async fn entry_log(_: GateStaff) -> &'static str {
    "the vehicle entry/exit log"
}

async fn whoami(Authenticated(principal): Authenticated) -> String {
    principal.name().unwrap_or("anonymous").to_owned()
}
