// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Caller identity is issued elsewhere (the login service) and arrives as a
//! bearer JWT. This module only verifies it and exposes the result.
//!
//! ## Auth Flow
//!
//! 1. The front-end authenticates the user with the login service
//! 2. Requests carry `Authorization: Bearer <JWT>` (HS256)
//! 3. This server:
//!    - Verifies signature, expiry and (when configured) issuer
//!    - Extracts `sub` → canonical `user_id`
//!
//! [`ClientContext`] carries the request origin (address, user agent) that
//! the audit log records next to the user.
//!
//! ## Security
//!
//! - All non-health endpoints require authentication
//! - Clock skew tolerance is 60 seconds
//! - Unsigned tokens are only accepted by builds with the `dev` feature

pub mod claims;
pub mod context;
pub mod error;
pub mod extractor;

pub use claims::AuthenticatedUser;
pub use context::ClientContext;
pub use error::AuthError;
pub use extractor::Auth;
