// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Accounts and transfer history of the caller.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::{
    auth::Auth,
    error::ApiError,
    models::{
        AccountSummary, AccountsResponse, HistoryEntry, HistoryQuery, HistoryResponse,
        TransferStatus,
    },
    state::AppState,
    storage::{StoredAccount, StoredTransfer, TransferFilter},
};

pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const MAX_HISTORY_LIMIT: usize = 200;

impl From<StoredAccount> for AccountSummary {
    fn from(account: StoredAccount) -> Self {
        Self {
            id: account.account_id,
            account_number: account.account_number,
            iban: account.routing_id,
            currency: account.currency,
            balance: account.balance,
            account_type: account.account_class,
        }
    }
}

impl From<StoredTransfer> for HistoryEntry {
    fn from(transfer: StoredTransfer) -> Self {
        Self {
            id: transfer.id,
            source_account_id: transfer.source_account_id,
            destination_account_id: transfer.destination_account_id,
            beneficiary_id: transfer.beneficiary_id,
            beneficiary: transfer.beneficiary_name,
            beneficiary_bank: transfer.beneficiary_bank,
            transfer_type: transfer.settlement_class,
            amount: transfer.amount,
            currency: transfer.currency,
            status: transfer.status,
            reference: transfer.reference,
            direction: "debit".to_string(),
            created_at: transfer.created_at,
            settled_at: transfer.settled_at,
        }
    }
}

/// List the caller's accounts with their balances.
#[utoipa::path(
    get,
    path = "/api/accounts",
    tag = "Accounts",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Accounts, by account number", body = AccountsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Client not found")
    )
)]
pub async fn list_accounts(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<AccountsResponse>, ApiError> {
    let client = state.transfers().resolve_client(&user.user_id)?;
    let accounts = state.ledger().list_accounts(&client.client_id)?;

    Ok(Json(AccountsResponse {
        success: true,
        accounts: accounts.into_iter().map(Into::into).collect(),
    }))
}

/// Transfers sent from any of the caller's accounts, newest first.
#[utoipa::path(
    get,
    path = "/api/transactions/history",
    tag = "Accounts",
    security(("bearer_auth" = [])),
    params(HistoryQuery),
    responses(
        (status = 200, description = "Transfer history", body = HistoryResponse),
        (status = 400, description = "Invalid filter"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Client not found")
    )
)]
pub async fn transaction_history(
    Auth(user): Auth,
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let Query(query) = query?;
    let filter = history_filter(&query)?;

    let client = state.transfers().resolve_client(&user.user_id)?;
    let transfers = state
        .ledger()
        .list_client_transfers(&client.client_id, &filter)?;

    Ok(Json(HistoryResponse {
        success: true,
        transactions: transfers.into_iter().map(Into::into).collect(),
    }))
}

fn history_filter(query: &HistoryQuery) -> Result<TransferFilter, ApiError> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(raw.parse::<TransferStatus>().map_err(ApiError::bad_request)?),
    };

    let from = query.start_date.map(start_of_day);
    let until = query
        .end_date
        .map(|date| end_of_day(date).ok_or_else(|| ApiError::bad_request("Paramètres invalides")))
        .transpose()?;
    if let (Some(from), Some(until)) = (from, until) {
        if from > until {
            return Err(ApiError::bad_request(
                "La date de début doit précéder la date de fin",
            ));
        }
    }

    Ok(TransferFilter {
        status,
        from,
        until,
        limit: query
            .limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT),
    })
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Last instant of `date`. Never steps past the day, so the largest date is fine.
fn end_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_nano_opt(23, 59, 59, 999_999_999)
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ClientContext;
    use crate::models::{ConfirmTransferRequest, InitiateTransferRequest, SettlementClass};
    use crate::state::tests::test_state_with_notifier;
    use crate::storage::ledger::tests::dec;
    use crate::transfer::service::tests::{add_beneficiary, user};

    async fn send(state: &AppState, notifier: &crate::notifier::RecordingNotifier, bn: &str, amount: &str) {
        let ctx = ClientContext::default();
        state
            .transfers()
            .initiate(
                &user("u1"),
                &ctx,
                InitiateTransferRequest {
                    source_account_id: Some("a1".to_string()),
                    beneficiary_id: Some(bn.to_string()),
                    amount: Some(dec(amount)),
                    currency: Some("EUR".to_string()),
                    reference: None,
                },
            )
            .await
            .unwrap();
        let code = notifier.last_code("u1@example.test").unwrap();
        state
            .transfers()
            .confirm(
                &user("u1"),
                &ctx,
                ConfirmTransferRequest { otp: Some(code) },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn accounts_are_scoped_to_the_caller() {
        let (state, _notifier, _temp) = test_state_with_notifier();

        let Json(response) = list_accounts(Auth(user("u1")), State(state.clone()))
            .await
            .unwrap();
        let ids: Vec<_> = response.accounts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a3"]);
        assert_eq!(response.accounts[0].iban, "FR760001");
        assert_eq!(response.accounts[0].balance, dec("1000.00"));

        let err = list_accounts(Auth(user("stranger")), State(state.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn history_lists_and_filters_transfers() {
        let (state, notifier, _temp) = test_state_with_notifier();
        let storage = state.storage();
        let internal = add_beneficiary(&storage, "c1", "FR76 0002", SettlementClass::SameInstitution);
        let external = add_beneficiary(&storage, "c1", "FR76 5555", SettlementClass::DomesticOther);

        send(&state, &notifier, &internal, "10").await;
        send(&state, &notifier, &external, "20").await;

        let Json(all) = transaction_history(
            Auth(user("u1")),
            State(state.clone()),
            Ok(Query(HistoryQuery::default())),
        )
        .await
        .unwrap();
        assert_eq!(all.transactions.len(), 2);
        assert_eq!(all.transactions[0].amount, dec("20"));
        assert_eq!(all.transactions[0].direction, "debit");

        let Json(pending) = transaction_history(
            Auth(user("u1")),
            State(state.clone()),
            Ok(Query(HistoryQuery {
                status: Some("pending".to_string()),
                ..Default::default()
            })),
        )
        .await
        .unwrap();
        assert_eq!(pending.transactions.len(), 1);
        assert_eq!(pending.transactions[0].beneficiary_id, external);

        let Json(limited) = transaction_history(
            Auth(user("u1")),
            State(state.clone()),
            Ok(Query(HistoryQuery {
                limit: Some(1),
                status: Some("all".to_string()),
                ..Default::default()
            })),
        )
        .await
        .unwrap();
        assert_eq!(limited.transactions.len(), 1);

        let Json(other) = transaction_history(
            Auth(user("u2")),
            State(state.clone()),
            Ok(Query(HistoryQuery::default())),
        )
        .await
        .unwrap();
        assert!(other.transactions.is_empty());
    }

    #[test]
    fn history_filter_validates_input() {
        let query = HistoryQuery {
            status: Some("unknown".to_string()),
            ..Default::default()
        };
        assert!(history_filter(&query).is_err());

        let query = HistoryQuery {
            start_date: NaiveDate::from_ymd_opt(2026, 3, 2),
            end_date: NaiveDate::from_ymd_opt(2026, 3, 1),
            ..Default::default()
        };
        assert!(history_filter(&query).is_err());

        let query = HistoryQuery {
            limit: Some(10_000),
            start_date: NaiveDate::from_ymd_opt(2026, 3, 1),
            end_date: NaiveDate::from_ymd_opt(2026, 3, 1),
            ..Default::default()
        };
        let filter = history_filter(&query).unwrap();
        assert_eq!(filter.limit, MAX_HISTORY_LIMIT);
        let from = filter.from.unwrap();
        let until = filter.until.unwrap();
        assert!(from < until);
        assert_eq!(until.date_naive(), from.date_naive());
    }

    #[tokio::test]
    async fn history_accepts_the_largest_end_date() {
        let (state, _notifier, _temp) = test_state_with_notifier();

        let filter = history_filter(&HistoryQuery {
            end_date: Some(NaiveDate::MAX),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(filter.until.unwrap().date_naive(), NaiveDate::MAX);

        let Json(response) = transaction_history(
            Auth(user("u1")),
            State(state),
            Ok(Query(HistoryQuery {
                start_date: Some(NaiveDate::MIN),
                end_date: Some(NaiveDate::MAX),
                ..Default::default()
            })),
        )
        .await
        .unwrap();
        assert!(response.transactions.is_empty());
    }
}
