// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error taxonomy for the resolution engine.
//!
//! `NotFound` is the only checked failure of context building: the supplied
//! user identifier does not resolve to an existing user. Store failures are
//! propagated as `Database` without retry; the caller owns backoff policy.
//! Dangling references discovered mid-resolution are not errors — they are
//! soft-skipped and logged by the engine.

use vantage_core::UserId;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
	#[error("user not found: {0}")]
	NotFound(UserId),

	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("internal: {0}")]
	Internal(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn not_found_names_the_user() {
		let user_id = UserId::generate();
		let err = EngineError::NotFound(user_id);
		assert!(err.to_string().contains(&user_id.to_string()));
	}

	#[test]
	fn database_error_converts() {
		let err: EngineError = sqlx::Error::RowNotFound.into();
		assert!(matches!(err, EngineError::Database(_)));
	}
}
