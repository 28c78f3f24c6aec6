// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Banque Transfer Server - OTP-confirmed money transfers
//!
//! REST backend for the retail-banking app: saved beneficiaries, account
//! balances, and the two-step transfer workflow. A transfer is initiated,
//! a one-time code is delivered to the client, and the transfer is applied
//! to the ledger only once the code is confirmed.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Bearer JWT authentication and request context
//! - `challenge` - One-time code issue, verification and expiry
//! - `notifier` - Code delivery (webhook gateway or log)
//! - `storage` - Ledger database, beneficiary files, audit log
//! - `transfer` - Initiate/confirm orchestration and settlement

pub mod api;
pub mod auth;
pub mod challenge;
pub mod config;
pub mod error;
pub mod models;
pub mod notifier;
pub mod state;
pub mod storage;
pub mod transfer;
