use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rdk::error::ErrorResponse;
use rdk::ledger::ActionProgress;
use rdk::rdk_database::CompletionReceipt;
use rdk::registration::RegistrationReport;
use rdk::{Action, ActionRef, Address, Chain, Proof, UserAction, UserReward};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{RdkState, UserId};

/// Start action request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartActionRequest {
    /// Action to start
    #[serde(flatten)]
    pub action: ActionRef,
}

/// Complete action request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteActionRequest {
    /// Action to complete
    #[serde(flatten)]
    pub action: ActionRef,
    /// Completion evidence, stored as sent
    #[serde(default)]
    pub proof: Proof,
}

/// Registration check request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRegistrationRequest {
    /// Address to look up
    pub address: Address,
    /// Chain of the registry
    pub chain: Chain,
    /// Registry contract
    pub contract_address: Address,
}

pub async fn get_actions(State(state): State<RdkState>) -> Result<Json<Vec<Action>>, Response> {
    let actions = state.ledger.list_actions().await.map_err(|err| {
        tracing::error!("Could not list actions: {}", err);
        into_response(err)
    })?;

    Ok(Json(actions))
}

pub async fn post_resolve_action(
    State(state): State<RdkState>,
    Json(payload): Json<ActionRef>,
) -> Result<Json<Action>, Response> {
    let action = state
        .ledger
        .resolve_action(&payload)
        .await
        .map_err(|err| {
            tracing::debug!("Could not resolve {}: {}", payload, err);
            into_response(err)
        })?;

    Ok(Json(action))
}

pub async fn post_start_action(
    State(state): State<RdkState>,
    UserId(user_id): UserId,
    Json(payload): Json<StartActionRequest>,
) -> Result<Json<UserAction>, Response> {
    let user_action = state
        .ledger
        .start_action(&user_id, &payload.action)
        .await
        .map_err(|err| {
            tracing::warn!("Could not start {} for {}: {}", payload.action, user_id, err);
            into_response(err)
        })?;

    Ok(Json(user_action))
}

pub async fn post_complete_action(
    State(state): State<RdkState>,
    UserId(user_id): UserId,
    Json(payload): Json<CompleteActionRequest>,
) -> Result<Json<CompletionReceipt>, Response> {
    let receipt = state
        .ledger
        .complete_action(&user_id, &payload.action, payload.proof)
        .await
        .map_err(|err| {
            tracing::warn!(
                "Could not complete {} for {}: {}",
                payload.action,
                user_id,
                err
            );
            into_response(err)
        })?;

    Ok(Json(receipt))
}

pub async fn get_user_actions(
    State(state): State<RdkState>,
    UserId(user_id): UserId,
) -> Result<Json<Vec<UserAction>>, Response> {
    let user_actions = state
        .ledger
        .list_user_actions(&user_id)
        .await
        .map_err(|err| {
            tracing::error!("Could not list actions of {}: {}", user_id, err);
            into_response(err)
        })?;

    Ok(Json(user_actions))
}

pub async fn get_user_rewards(
    State(state): State<RdkState>,
    UserId(user_id): UserId,
) -> Result<Json<Vec<UserReward>>, Response> {
    let rewards = state
        .ledger
        .list_user_rewards(&user_id)
        .await
        .map_err(|err| {
            tracing::error!("Could not list rewards of {}: {}", user_id, err);
            into_response(err)
        })?;

    Ok(Json(rewards))
}

pub async fn get_user_progress(
    State(state): State<RdkState>,
    UserId(user_id): UserId,
) -> Result<Json<ActionProgress>, Response> {
    let progress = state
        .ledger
        .action_progress(&user_id)
        .await
        .map_err(|err| {
            tracing::error!("Could not get progress of {}: {}", user_id, err);
            into_response(err)
        })?;

    Ok(Json(progress))
}

pub async fn post_claim_reward(
    State(state): State<RdkState>,
    UserId(user_id): UserId,
    Path(reward_id): Path<Uuid>,
) -> Result<Json<UserReward>, Response> {
    let reward = state
        .ledger
        .claim_user_reward(&user_id, &reward_id)
        .await
        .map_err(|err| {
            tracing::warn!("Could not claim {} for {}: {}", reward_id, user_id, err);
            into_response(err)
        })?;

    Ok(Json(reward))
}

/// Never fails on chain errors, the report says what went wrong
pub async fn post_check_registration(
    State(state): State<RdkState>,
    Json(payload): Json<CheckRegistrationRequest>,
) -> Json<RegistrationReport> {
    let report = state
        .registration
        .check_registration_detailed(&payload.address, payload.chain, &payload.contract_address)
        .await;

    Json(report)
}

/// Error response with the status of the error kind
pub fn into_response<T>(error: T) -> Response
where
    T: Into<ErrorResponse>,
{
    let error: ErrorResponse = error.into();
    let status = StatusCode::from_u16(error.code.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (status, Json::<ErrorResponse>(error)).into_response()
}
