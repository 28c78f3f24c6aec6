// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Transfer Orchestrator
//!
//! Two-step, code-confirmed transfers:
//!
//! ```text
//! initiate ──▶ challenge issued ──confirm──▶ settled | pending
//!                     │
//!                     └── expired / consumed ──▶ (new initiate required)
//! ```
//!
//! `initiate` validates the request against the ledger and the beneficiary
//! directory, issues a challenge bound to the transfer parameters and hands
//! the code to the notifier. `confirm` consumes the challenge and moves the
//! money inside one ledger unit. A consumed challenge is gone whatever the
//! outcome of the settlement.

pub mod error;
pub mod service;

pub use error::TransferError;
pub use service::TransferService;
