use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::catalog::{self, RewardOption};
use crate::error::AppError;
use crate::pledge::intake::{self, PaymentAuthorization, PledgeSelection};
use crate::pledge::settlement::{self, ConfirmPledge, ConfirmedPledge};
use crate::pledge::StagedPledge;
use crate::projects;
use crate::state::AppState;

/// Everything a client needs to render the pledge form.
#[derive(Debug, Serialize, ToSchema)]
pub struct PledgeForm {
    pub project_id: Uuid,
    pub project_title: String,
    pub currency: String,
    pub publishable_key: String,
    pub rewards: Vec<RewardOption>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentIntentResponse {
    #[serde(flatten)]
    pub authorization: PaymentAuthorization,
    pub currency: String,
    pub publishable_key: String,
}

/// Pledge form data for a project
#[utoipa::path(
    get,
    path = "/projects/{id}/pledge",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Pledge form", body = PledgeForm),
        (status = 404, description = "No such project")
    ),
    tag = "pledges"
)]
pub async fn pledge_form(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<PledgeForm>, AppError> {
    let project = projects::find_project(&state.db, project_id).await?;
    let rewards = catalog::list_rewards(&state.db, project.id).await?;
    Ok(Json(PledgeForm {
        project_id: project.id,
        project_title: project.title,
        currency: state.currency.clone(),
        publishable_key: state.publishable_key.clone(),
        rewards: rewards.into_iter().map(RewardOption::from).collect(),
    }))
}

/// Validate a pledge selection without taking payment
#[utoipa::path(
    post,
    path = "/pledges/stage",
    request_body = PledgeSelection,
    responses(
        (status = 200, description = "Pledge staged", body = StagedPledge),
        (status = 404, description = "No such project or reward"),
        (status = 422, description = "Invalid amount or reward")
    ),
    security(("user_id" = [])),
    tag = "pledges"
)]
pub async fn stage_pledge(
    State(state): State<AppState>,
    CurrentUser(_caller): CurrentUser,
    Json(selection): Json<PledgeSelection>,
) -> Result<Json<StagedPledge>, AppError> {
    Ok(Json(intake::stage(&state.db, &selection).await?))
}

/// Open a payment intent for a pledge selection
#[utoipa::path(
    post,
    path = "/pledges/payment-intent",
    request_body = PledgeSelection,
    responses(
        (status = 201, description = "Payment intent created", body = PaymentIntentResponse),
        (status = 422, description = "Invalid amount or reward"),
        (status = 502, description = "Payment gateway failure")
    ),
    security(("user_id" = [])),
    tag = "pledges"
)]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(selection): Json<PledgeSelection>,
) -> Result<(StatusCode, Json<PaymentIntentResponse>), AppError> {
    let authorization = intake::create_payment_authorization(
        &state.db,
        state.gateway.as_ref(),
        &state.currency,
        &selection,
        caller.id,
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(PaymentIntentResponse {
            authorization,
            currency: state.currency.clone(),
            publishable_key: state.publishable_key.clone(),
        }),
    ))
}

/// Record a pledge once its payment intent has succeeded
#[utoipa::path(
    post,
    path = "/pledges/confirm",
    request_body = ConfirmPledge,
    responses(
        (status = 201, description = "Pledge recorded", body = ConfirmedPledge),
        (status = 200, description = "Intent already recorded; existing pledge returned", body = ConfirmedPledge),
        (status = 402, description = "Payment not completed"),
        (status = 409, description = "Reward sold out or pledge already recorded"),
        (status = 502, description = "Payment gateway failure")
    ),
    security(("user_id" = [])),
    tag = "pledges"
)]
pub async fn confirm_pledge(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<ConfirmPledge>,
) -> Result<(StatusCode, Json<ConfirmedPledge>), AppError> {
    let confirmed = settlement::confirm_pledge(
        &state.db,
        state.gateway.as_ref(),
        &state.currency,
        caller.id,
        &request,
    )
    .await?;
    let status = if confirmed.finalized.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(confirmed)))
}
