// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access context resolution server for Vantage.
//!
//! This crate provides the server-side implementation of the access context
//! engine: entity storage, cached per-resource access resolution, and the
//! context façade consumed by request handlers.
//!
//! # Architecture
//!
//! - `store` - Database reads for users, roles, groups, capabilities, KPIs and scopes
//! - `engine` - Capability and data access resolution, context building
//! - `cache` - TTL cache for per-(user, KPI) access decisions
//! - `pool` - SQLite connection pool setup
//! - `testing` - In-memory schema and seed helpers for tests
//!
//! # Example
//!
//! ```ignore
//! use vantage_server::{ContextEngine, SqliteEntityStore, create_pool};
//!
//! let pool = create_pool("sqlite:vantage.db").await?;
//! let engine = ContextEngine::new(SqliteEntityStore::new(pool));
//!
//! // One consistent snapshot per request
//! let context = engine.build_context(user_id).await?;
//! if let Some(decision) = context.access_for("kpi:revenue") {
//!     // apply decision.filters() to the result set when restricted
//! }
//! ```

pub mod cache;
pub mod engine;
pub mod error;
pub mod pool;
pub mod store;
pub mod testing;

pub use cache::{ResolutionCache, DEFAULT_TTL};
pub use engine::{AccessContext, ContextEngine};
pub use error::{EngineError, Result};
pub use pool::create_pool;
pub use store::{EntityStore, SqliteEntityStore};

// Re-export core types for convenience
pub use vantage_core::*;
