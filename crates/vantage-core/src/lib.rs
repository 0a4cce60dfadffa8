// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Vantage access context resolution engine.
//!
//! This crate provides the shared types and the pure resolution logic for
//! per-resource, per-row data access: role-based capability grants, explicit
//! grant/revoke overrides at user and group scope, and dimension-keyed
//! row-level filters. It is consumed by the server-side engine
//! (`vantage-server`), which layers entity-store queries and caching on top.
//!
//! # Overview
//!
//! - [`capability`] — the tagged-source precedence function deciding effective
//!   capability membership (user override beats group override beats role)
//! - [`access`] — monotonic aggregation of per-role access types
//!   (OWNER > FULL > RESTRICTED) into an [`AccessDecision`]
//! - [`filters`] — [`ScopeFilters`], the per-dimension allow-list mapping and
//!   its row-match semantics
//! - [`types`] — ID newtypes and entity snapshot records
//!
//! Everything here is pure: no I/O, no clocks other than timestamps passed in.
//!
//! # Example
//!
//! ```
//! use vantage_core::{resolve_capabilities, CapabilitySource};
//!
//! let effective = resolve_capabilities([
//!     ("view:revenue_dashboard", CapabilitySource::Role),
//!     ("view:revenue_dashboard", CapabilitySource::GroupRevoke),
//!     ("view:costs", CapabilitySource::Role),
//! ]);
//!
//! assert!(!effective.contains("view:revenue_dashboard"));
//! assert!(effective.contains("view:costs"));
//! ```

pub mod access;
pub mod capability;
pub mod filters;
pub mod types;

pub use access::{aggregate_access, AccessDecision};
pub use capability::{is_granted, resolve_capabilities, CapabilitySource};
pub use filters::ScopeFilters;
pub use types::{
	AccessScope, AccessType, Capability, CapabilityId, CapabilityOverride, Dimension, DimensionId,
	EntityRef, Group, GroupId, Kpi, KpiId, OverrideAction, Permission, Role, RoleId, ScopeId, User,
	UserId, UserStatus,
};
