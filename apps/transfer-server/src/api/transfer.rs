// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transfer endpoints.
//!
//! A transfer takes two calls: `initiate` sends a one-time code to the
//! client's address, `confirm` spends it and moves the money.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::{
    auth::{Auth, ClientContext},
    error::ApiError,
    models::{
        ConfirmTransferRequest, ConfirmTransferResponse, InitiateTransferRequest,
        InitiateTransferResponse,
    },
    state::AppState,
};

/// Start a transfer and send its confirmation code.
///
/// The code is never part of the response. `warning` is set when the code
/// could not be delivered; the pending transfer stays valid.
#[utoipa::path(
    post,
    path = "/api/transfer/initiate",
    tag = "Transfers",
    security(("bearer_auth" = [])),
    request_body = InitiateTransferRequest,
    responses(
        (status = 200, description = "Code sent", body = InitiateTransferResponse),
        (status = 400, description = "Invalid request or insufficient funds"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Client, account or beneficiary not found")
    )
)]
pub async fn initiate_transfer(
    Auth(user): Auth,
    State(state): State<AppState>,
    ctx: ClientContext,
    body: Result<Json<InitiateTransferRequest>, JsonRejection>,
) -> Result<Json<InitiateTransferResponse>, ApiError> {
    let Json(request) = body?;
    let response = state.transfers().initiate(&user, &ctx, request).await?;
    Ok(Json(response))
}

/// Confirm the pending transfer with its one-time code.
#[utoipa::path(
    post,
    path = "/api/transfer/confirm",
    tag = "Transfers",
    security(("bearer_auth" = [])),
    request_body = ConfirmTransferRequest,
    responses(
        (status = 200, description = "Transfer recorded", body = ConfirmTransferResponse),
        (status = 400, description = "Missing or expired code, or insufficient funds"),
        (status = 401, description = "Unauthorized or wrong code"),
        (status = 404, description = "No pending transfer, or account/beneficiary gone")
    )
)]
pub async fn confirm_transfer(
    Auth(user): Auth,
    State(state): State<AppState>,
    ctx: ClientContext,
    body: Result<Json<ConfirmTransferRequest>, JsonRejection>,
) -> Result<Json<ConfirmTransferResponse>, ApiError> {
    let Json(request) = body?;
    let response = state.transfers().confirm(&user, &ctx, request).await?;
    Ok(Json(response))
}
