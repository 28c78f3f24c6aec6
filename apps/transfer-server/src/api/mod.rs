// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    body::Body,
    http::Request,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        AccountClass, AccountSummary, AccountsResponse, BeneficiaryRequest,
        ConfirmTransferRequest, ConfirmTransferResponse, HistoryEntry, HistoryResponse,
        InitiateTransferRequest, InitiateTransferResponse, SettlementClass, TransferReceipt,
        TransferStatus,
    },
    state::AppState,
    storage::StoredBeneficiary,
};

pub mod accounts;
pub mod beneficiaries;
pub mod health;
pub mod transfer;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/transfer/initiate", post(transfer::initiate_transfer))
        .route("/transfer/confirm", post(transfer::confirm_transfer))
        .route(
            "/beneficiaries",
            get(beneficiaries::list_beneficiaries).post(beneficiaries::create_beneficiary),
        )
        .route(
            "/beneficiaries/{beneficiary_id}",
            put(beneficiaries::update_beneficiary).delete(beneficiaries::delete_beneficiary),
        )
        .route("/accounts", get(accounts::list_accounts))
        .route("/transactions/history", get(accounts::transaction_history))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CorsLayer::permissive()),
        )
}

/// Bearer JWT scheme referenced by every `/api` operation.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Banque Transfer API",
        description = "Beneficiaries, accounts and two-step transfer confirmation"
    ),
    modifiers(&SecurityAddon),
    paths(
        transfer::initiate_transfer,
        transfer::confirm_transfer,
        beneficiaries::list_beneficiaries,
        beneficiaries::create_beneficiary,
        beneficiaries::update_beneficiary,
        beneficiaries::delete_beneficiary,
        accounts::list_accounts,
        accounts::transaction_history,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            InitiateTransferRequest,
            InitiateTransferResponse,
            ConfirmTransferRequest,
            ConfirmTransferResponse,
            TransferReceipt,
            SettlementClass,
            TransferStatus,
            AccountClass,
            BeneficiaryRequest,
            StoredBeneficiary,
            beneficiaries::BeneficiaryListResponse,
            beneficiaries::BeneficiaryResponse,
            beneficiaries::DeleteBeneficiaryResponse,
            AccountSummary,
            AccountsResponse,
            HistoryEntry,
            HistoryResponse,
            health::ReadyResponse,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Transfers", description = "Two-step transfer initiation and confirmation"),
        (name = "Beneficiaries", description = "Saved transfer destinations"),
        (name = "Accounts", description = "Balances and transfer history"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::extractor::tests::mint_token;
    use crate::state::tests::{test_state, test_state_with_notifier};
    use axum::http::{header, Method, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    #[tokio::test]
    async fn api_requires_a_bearer_token() {
        let (state, _temp) = test_state();
        let app = router(state);

        let (status, body) = call(&app, request(Method::GET, "/api/accounts", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let expired = mint_token("u1", -3600, None);
        let (status, body) = call(
            &app,
            request(Method::GET, "/api/accounts", Some(&expired), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "token_expired");
    }

    #[tokio::test]
    async fn transfer_round_trip_over_http() {
        let (state, notifier, _temp) = test_state_with_notifier();
        let app = router(state);
        let token = mint_token("u1", 3600, None);

        let (status, body) = call(
            &app,
            request(
                Method::POST,
                "/api/beneficiaries",
                Some(&token),
                Some(json!({
                    "name": "Bob Durand",
                    "bankName": "Banque Transfer",
                    "iban": "fr76 0002",
                    "type": "même banque"
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let beneficiary_id = body["beneficiary"]["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            request(
                Method::POST,
                "/api/transfer/initiate",
                Some(&token),
                Some(json!({
                    "sourceAccountId": "a1",
                    "beneficiaryId": beneficiary_id,
                    "amount": "250.00",
                    "currency": "EUR"
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(body.get("otp").is_none());

        let (status, body) = call(
            &app,
            request(
                Method::POST,
                "/api/transfer/confirm",
                Some(&token),
                Some(json!({ "otp": "00000000" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "otp_mismatch");

        let code = notifier.last_code("u1@example.test").unwrap();
        let (status, body) = call(
            &app,
            request(
                Method::POST,
                "/api/transfer/confirm",
                Some(&token),
                Some(json!({ "otp": code })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transaction"]["status"], "settled");

        let (status, body) = call(
            &app,
            request(Method::GET, "/api/transactions/history", Some(&token), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transactions"].as_array().unwrap().len(), 1);

        // The code is single-use.
        let (status, _) = call(
            &app,
            request(
                Method::POST,
                "/api/transfer/confirm",
                Some(&token),
                Some(json!({ "otp": code })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let (state, _temp) = test_state();
        let app = router(state);
        let token = mint_token("u1", 3600, None);

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/transfer/initiate")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = call(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn health_and_request_id() {
        let (state, _temp) = test_state();
        let app = router(state);

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/health/ready", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));

        let (status, _) = call(&app, request(Method::GET, "/health/live", None, None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn openapi_declares_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(doc.paths.paths.contains_key("/api/transfer/confirm"));
    }
}
