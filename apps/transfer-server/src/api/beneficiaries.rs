// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Beneficiary management API endpoints.
//!
//! All operations require authentication and are scoped to the caller's
//! client. A beneficiary of another client is reported as not found. Every
//! change, successful or not, is written to the audit log.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::{
    audit_log,
    auth::{Auth, AuthenticatedUser, ClientContext},
    error::ApiError,
    models::BeneficiaryRequest,
    state::AppState,
    storage::{
        AuditEvent, AuditEventType, BeneficiaryRepository, StorageError, StoredBeneficiary,
    },
};

const MSG_NOT_FOUND: &str = "Bénéficiaire non trouvé";

/// Response containing the caller's beneficiaries.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BeneficiaryListResponse {
    pub success: bool,
    /// Newest first.
    pub beneficiaries: Vec<StoredBeneficiary>,
}

/// Response after creating or updating a beneficiary.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BeneficiaryResponse {
    pub success: bool,
    pub beneficiary: StoredBeneficiary,
    pub message: String,
}

/// Response after deleting a beneficiary.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteBeneficiaryResponse {
    pub success: bool,
    pub message: String,
}

fn event(
    event_type: AuditEventType,
    action: &str,
    user: &AuthenticatedUser,
    ctx: &ClientContext,
) -> AuditEvent {
    AuditEvent::new(event_type, action)
        .with_user(&user.user_id)
        .with_origin(ctx.ip.as_deref(), ctx.user_agent.as_deref())
}

fn lookup_error(e: StorageError) -> ApiError {
    match e {
        StorageError::NotFound(_) => ApiError::not_found(MSG_NOT_FOUND),
        other => other.into(),
    }
}

/// List the caller's beneficiaries.
#[utoipa::path(
    get,
    path = "/api/beneficiaries",
    tag = "Beneficiaries",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Beneficiaries, newest first", body = BeneficiaryListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Client not found")
    )
)]
pub async fn list_beneficiaries(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<BeneficiaryListResponse>, ApiError> {
    let client = state.transfers().resolve_client(&user.user_id)?;
    let storage = state.storage();
    let beneficiaries = BeneficiaryRepository::new(&storage).list_by_client(&client.client_id)?;

    Ok(Json(BeneficiaryListResponse {
        success: true,
        beneficiaries,
    }))
}

/// Add a beneficiary.
///
/// `name`, `bankName`, `iban` and `type` are required. The IBAN is stored
/// normalised and must be unique among the caller's beneficiaries.
#[utoipa::path(
    post,
    path = "/api/beneficiaries",
    tag = "Beneficiaries",
    security(("bearer_auth" = [])),
    request_body = BeneficiaryRequest,
    responses(
        (status = 201, description = "Beneficiary created", body = BeneficiaryResponse),
        (status = 400, description = "Missing or invalid field"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "IBAN already registered")
    )
)]
pub async fn create_beneficiary(
    Auth(user): Auth,
    State(state): State<AppState>,
    ctx: ClientContext,
    body: Result<Json<BeneficiaryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BeneficiaryResponse>), ApiError> {
    let Json(request) = body?;
    let storage = state.storage();
    let audit = event(
        AuditEventType::BeneficiaryCreated,
        "Ajout bénéficiaire",
        &user,
        &ctx,
    );

    let result = (|| {
        let client = state.transfers().resolve_client(&user.user_id)?;
        let fields = request.validate().map_err(ApiError::bad_request)?;
        let beneficiary = StoredBeneficiary::new(&client.client_id, fields);
        BeneficiaryRepository::new(&storage).create(&beneficiary)?;
        Ok::<_, ApiError>(beneficiary)
    })();

    match result {
        Ok(beneficiary) => {
            audit_log!(
                &storage,
                audit
                    .with_resource("beneficiary", &beneficiary.id)
                    .with_details(json!({
                        "name": beneficiary.name,
                        "iban": beneficiary.routing_id,
                        "type": beneficiary.settlement_class,
                    }))
            );
            tracing::info!(user_id = %user.user_id, beneficiary_id = %beneficiary.id, "Beneficiary created");

            Ok((
                StatusCode::CREATED,
                Json(BeneficiaryResponse {
                    success: true,
                    beneficiary,
                    message: "Bénéficiaire ajouté avec succès".to_string(),
                }),
            ))
        }
        Err(e) => {
            audit_log!(&storage, audit.failed(&e.message));
            Err(e)
        }
    }
}

/// Replace a beneficiary's details.
#[utoipa::path(
    put,
    path = "/api/beneficiaries/{beneficiary_id}",
    tag = "Beneficiaries",
    security(("bearer_auth" = [])),
    params(
        ("beneficiary_id" = String, Path, description = "Beneficiary ID")
    ),
    request_body = BeneficiaryRequest,
    responses(
        (status = 200, description = "Beneficiary updated", body = BeneficiaryResponse),
        (status = 400, description = "Missing or invalid field"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Beneficiary not found"),
        (status = 409, description = "IBAN already registered")
    )
)]
pub async fn update_beneficiary(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(beneficiary_id): Path<String>,
    ctx: ClientContext,
    body: Result<Json<BeneficiaryRequest>, JsonRejection>,
) -> Result<Json<BeneficiaryResponse>, ApiError> {
    let Json(request) = body?;
    let storage = state.storage();
    let audit = event(
        AuditEventType::BeneficiaryUpdated,
        "Modification bénéficiaire",
        &user,
        &ctx,
    )
    .with_resource("beneficiary", &beneficiary_id);

    let result = (|| {
        let client = state.transfers().resolve_client(&user.user_id)?;
        let repo = BeneficiaryRepository::new(&storage);
        let current = repo
            .find_owned(&beneficiary_id, &client.client_id)
            .map_err(lookup_error)?;
        let fields = request.validate().map_err(ApiError::bad_request)?;
        let updated = current.with_fields(fields);
        repo.update(&updated)?;
        Ok::<_, ApiError>((current, updated))
    })();

    match result {
        Ok((before, after)) => {
            audit_log!(
                &storage,
                audit.with_details(json!({ "before": before, "after": after }))
            );

            Ok(Json(BeneficiaryResponse {
                success: true,
                beneficiary: after,
                message: "Bénéficiaire modifié avec succès".to_string(),
            }))
        }
        Err(e) => {
            audit_log!(&storage, audit.failed(&e.message));
            Err(e)
        }
    }
}

/// Delete a beneficiary.
///
/// Recorded transfers keep the beneficiary name and bank they were made with.
#[utoipa::path(
    delete,
    path = "/api/beneficiaries/{beneficiary_id}",
    tag = "Beneficiaries",
    security(("bearer_auth" = [])),
    params(
        ("beneficiary_id" = String, Path, description = "Beneficiary ID to delete")
    ),
    responses(
        (status = 200, description = "Beneficiary deleted", body = DeleteBeneficiaryResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Beneficiary not found")
    )
)]
pub async fn delete_beneficiary(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(beneficiary_id): Path<String>,
    ctx: ClientContext,
) -> Result<Json<DeleteBeneficiaryResponse>, ApiError> {
    let storage = state.storage();
    let audit = event(
        AuditEventType::BeneficiaryDeleted,
        "Suppression bénéficiaire",
        &user,
        &ctx,
    )
    .with_resource("beneficiary", &beneficiary_id);

    let result = (|| {
        let client = state.transfers().resolve_client(&user.user_id)?;
        let repo = BeneficiaryRepository::new(&storage);
        let beneficiary = repo
            .find_owned(&beneficiary_id, &client.client_id)
            .map_err(lookup_error)?;
        repo.delete(&beneficiary.id).map_err(lookup_error)?;
        Ok::<_, ApiError>(beneficiary)
    })();

    match result {
        Ok(beneficiary) => {
            audit_log!(
                &storage,
                audit.with_details(json!({ "name": beneficiary.name }))
            );

            Ok(Json(DeleteBeneficiaryResponse {
                success: true,
                message: "Bénéficiaire supprimé avec succès".to_string(),
            }))
        }
        Err(e) => {
            audit_log!(&storage, audit.failed(&e.message));
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SettlementClass;
    use crate::state::tests::test_state;
    use crate::storage::AuditRepository;
    use crate::transfer::service::tests::user;

    fn body(name: &str, iban: &str, kind: &str) -> Result<Json<BeneficiaryRequest>, JsonRejection> {
        Ok(Json(BeneficiaryRequest {
            name: Some(name.to_string()),
            bank_name: Some("Crédit Agricole".to_string()),
            account_number: None,
            rib: Some("30004 00001 0001".to_string()),
            iban: Some(iban.to_string()),
            kind: Some(kind.to_string()),
        }))
    }

    async fn create(state: &AppState, user_id: &str, iban: &str) -> StoredBeneficiary {
        let (status, Json(response)) = create_beneficiary(
            Auth(user(user_id)),
            State(state.clone()),
            ClientContext::default(),
            body("Alice Martin", iban, "autre banque nationale"),
        )
        .await
        .expect("beneficiary creation succeeds");
        assert_eq!(status, StatusCode::CREATED);
        response.beneficiary
    }

    #[tokio::test]
    async fn create_normalises_and_lists() {
        let (state, _temp) = test_state();
        let created = create(&state, "u1", "fr76 3000 4000").await;

        assert_eq!(created.routing_id, "FR7630004000");
        assert_eq!(created.settlement_class, SettlementClass::DomesticOther);
        assert_eq!(created.client_id, "c1");

        let Json(listed) = list_beneficiaries(Auth(user("u1")), State(state.clone()))
            .await
            .unwrap();
        assert_eq!(listed.beneficiaries, vec![created]);

        let Json(other) = list_beneficiaries(Auth(user("u2")), State(state.clone()))
            .await
            .unwrap();
        assert!(other.beneficiaries.is_empty());
    }

    #[tokio::test]
    async fn create_rejects_missing_fields_and_duplicates() {
        let (state, _temp) = test_state();

        let err = create_beneficiary(
            Auth(user("u1")),
            State(state.clone()),
            ClientContext::default(),
            body("", "FR76 1", "international"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Nom, banque, IBAN et type sont requis");

        create(&state, "u1", "FR76 1111").await;
        let err = create_beneficiary(
            Auth(user("u1")),
            State(state.clone()),
            ClientContext::default(),
            body("Bob", "fr76 1111", "international"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);

        // The same IBAN is fine for another client.
        create(&state, "u2", "FR76 1111").await;
    }

    #[tokio::test]
    async fn update_checks_ownership_and_uniqueness() {
        let (state, _temp) = test_state();
        let first = create(&state, "u1", "FR76 1111").await;
        let second = create(&state, "u1", "FR76 2222").await;

        let err = update_beneficiary(
            Auth(user("u2")),
            State(state.clone()),
            Path(first.id.clone()),
            ClientContext::default(),
            body("Mallory", "FR76 9999", "international"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = update_beneficiary(
            Auth(user("u1")),
            State(state.clone()),
            Path(first.id.clone()),
            ClientContext::default(),
            body("Alice", "FR76 2222", "international"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);

        let Json(updated) = update_beneficiary(
            Auth(user("u1")),
            State(state.clone()),
            Path(second.id.clone()),
            ClientContext::default(),
            body("Alice Dupont", "GB29 NWBK 6016", "banque étrangère"),
        )
        .await
        .unwrap();
        assert_eq!(updated.beneficiary.name, "Alice Dupont");
        assert_eq!(updated.beneficiary.settlement_class, SettlementClass::International);
        assert_eq!(updated.beneficiary.created_at, second.created_at);
    }

    #[tokio::test]
    async fn delete_is_scoped_and_audited() {
        let (state, _temp) = test_state();
        let created = create(&state, "u1", "FR76 1111").await;
        let ctx = ClientContext {
            ip: Some("198.51.100.4".to_string()),
            user_agent: None,
        };

        let err = delete_beneficiary(
            Auth(user("u2")),
            State(state.clone()),
            Path(created.id.clone()),
            ctx.clone(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let Json(response) = delete_beneficiary(
            Auth(user("u1")),
            State(state.clone()),
            Path(created.id.clone()),
            ctx,
        )
        .await
        .unwrap();
        assert!(response.success);
        assert!(!BeneficiaryRepository::new(&state.storage()).exists(&created.id));

        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        let storage = state.storage();
        let audit = AuditRepository::new(&storage);
        let failed = audit.search_by_user("u2", &today).unwrap();
        assert_eq!(failed.len(), 1);
        assert!(!failed[0].success);
        assert_eq!(failed[0].event_type, AuditEventType::BeneficiaryDeleted);

        let mine = audit.search_by_user("u1", &today).unwrap();
        let deleted = mine
            .iter()
            .find(|e| e.event_type == AuditEventType::BeneficiaryDeleted)
            .unwrap();
        assert!(deleted.success);
        assert_eq!(deleted.ip_address.as_deref(), Some("198.51.100.4"));
        assert_eq!(deleted.resource_id.as_deref(), Some(created.id.as_str()));
    }
}
