//! Axum server for the RDK ledger

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

use std::sync::Arc;

use anyhow::Result;
use axum::http::{header, HeaderName, Method};
use axum::routing::{get, post};
use axum::Router;
use rdk::ledger::Ledger;
use rdk::registration::RegistrationChecker;
use router_handlers::*;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

mod auth;
mod router_handlers;

pub use auth::{UserId, USER_ID_HEADER};
pub use router_handlers::{
    into_response, CheckRegistrationRequest, CompleteActionRequest, StartActionRequest,
};

/// RDK State
#[derive(Debug, Clone)]
pub struct RdkState {
    ledger: Arc<Ledger>,
    registration: Arc<RegistrationChecker>,
}

impl RdkState {
    /// Create new [`RdkState`]
    pub fn new(ledger: Arc<Ledger>, registration: Arc<RegistrationChecker>) -> Self {
        Self {
            ledger,
            registration,
        }
    }
}

/// Create the RDK router
pub async fn create_rdk_router(
    ledger: Arc<Ledger>,
    registration: Arc<RegistrationChecker>,
) -> Result<Router> {
    let state = RdkState::new(ledger, registration);

    let v1_router = Router::new()
        .route("/actions", get(get_actions))
        .route("/actions/resolve", post(post_resolve_action))
        .route("/actions/start", post(post_start_action))
        .route("/actions/complete", post(post_complete_action))
        .route("/users/me/actions", get(get_user_actions))
        .route("/users/me/rewards", get(get_user_rewards))
        .route("/users/me/progress", get(get_user_progress))
        .route("/rewards/{reward_id}/claim", post(post_claim_reward))
        .route("/registration/check", post(post_check_registration));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(USER_ID_HEADER),
        ]);

    let rdk_router = Router::new()
        .nest("/v1", v1_router)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(rdk_router)
}
