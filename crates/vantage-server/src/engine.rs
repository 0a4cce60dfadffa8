// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access context resolution.
//!
//! [`ContextEngine`] composes the capability resolver, the data access
//! resolver and the scope filter builder over an [`EntityStore`], with a
//! TTL cache in front of per-resource access resolution. It implements a
//! two-tier model:
//!
//! 1. **Capabilities**: functional rights resolved from role grants plus
//!    group- and user-level overrides under a fixed precedence order
//! 2. **Data access**: per-KPI visibility (OWNER/FULL/RESTRICTED/none) with
//!    dimension-keyed row filters for the restricted case
//!
//! All resolution is read-only; the engine never writes to the store.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::instrument;

use vantage_core::{
	aggregate_access, resolve_capabilities, AccessDecision, AccessType, CapabilitySource, EntityRef,
	Group, KpiId, OverrideAction, Permission, Role, RoleId, ScopeFilters, User, UserId,
};

use crate::cache::{ResolutionCache, DEFAULT_TTL};
use crate::error::{EngineError, Result};
use crate::store::EntityStore;

/// The resolved effective context for one user: an immutable snapshot of
/// their capabilities and per-resource data access.
///
/// `data_access` is keyed by KPI resource key (e.g. `kpi:revenue`); resources
/// the user has no access to are absent, never present with a NONE marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessContext {
	pub user: User,
	pub roles: Vec<String>,
	pub capabilities: BTreeSet<String>,
	pub data_access: BTreeMap<String, AccessDecision>,
}

impl AccessContext {
	/// Returns true if the context holds the given capability slug.
	pub fn has_capability(&self, slug: &str) -> bool {
		self.capabilities.contains(slug)
	}

	/// The access decision for a resource key, if any access exists.
	pub fn access_for(&self, resource_key: &str) -> Option<&AccessDecision> {
		self.data_access.get(resource_key)
	}
}

/// Resolution engine over an entity store.
pub struct ContextEngine<S> {
	store: S,
	cache: ResolutionCache,
}

impl<S: EntityStore> ContextEngine<S> {
	/// Creates an engine with the default 60-second decision cache.
	pub fn new(store: S) -> Self {
		Self::with_cache_ttl(store, DEFAULT_TTL)
	}

	/// Creates an engine with a custom cache TTL.
	pub fn with_cache_ttl(store: S, ttl: Duration) -> Self {
		ContextEngine {
			store,
			cache: ResolutionCache::new(ttl),
		}
	}

	/// The underlying store.
	pub fn store(&self) -> &S {
		&self.store
	}

	/// Resolves the effective capability set for a user.
	///
	/// Returns an empty set for a user with no roles, groups or overrides.
	/// The user's existence is a precondition; unknown ids resolve to the
	/// empty set without error.
	#[instrument(skip(self), fields(user_id = %user_id))]
	pub async fn resolve_capabilities(&self, user_id: UserId) -> Result<BTreeSet<String>> {
		let roles = self.store.get_roles_for_user(user_id).await?;
		let groups = self.store.get_groups_for_user(user_id).await?;
		self.resolve_capabilities_with(user_id, &roles, &groups).await
	}

	async fn resolve_capabilities_with(
		&self,
		user_id: UserId,
		roles: &[Role],
		groups: &[Group],
	) -> Result<BTreeSet<String>> {
		let role_ids: Vec<RoleId> = roles.iter().map(|r| r.id).collect();
		let mut observations: Vec<(String, CapabilitySource)> = self
			.store
			.get_capability_grants_for_roles(&role_ids)
			.await?
			.into_iter()
			.map(|slug| (slug, CapabilitySource::Role))
			.collect();

		let entities: Vec<EntityRef> = std::iter::once(EntityRef::User(user_id))
			.chain(groups.iter().map(|g| EntityRef::Group(g.id)))
			.collect();
		for override_ in self.store.get_capability_overrides(&entities).await? {
			let source = match (override_.entity, override_.action) {
				(EntityRef::User(_), OverrideAction::Grant) => CapabilitySource::UserGrant,
				(EntityRef::User(_), OverrideAction::Revoke) => CapabilitySource::UserRevoke,
				(EntityRef::Group(_), OverrideAction::Grant) => CapabilitySource::GroupGrant,
				(EntityRef::Group(_), OverrideAction::Revoke) => CapabilitySource::GroupRevoke,
			};
			observations.push((override_.slug, source));
		}

		let resolved = resolve_capabilities(observations);
		tracing::debug!(capabilities = resolved.len(), "capabilities resolved");
		Ok(resolved)
	}

	/// Resolves the aggregate access decision for one (user, KPI) pair,
	/// serving from the decision cache when a fresh entry exists.
	///
	/// `Ok(None)` means no role of the user carries any permission for the
	/// KPI — denied, and distinct from a RESTRICTED decision whose filter
	/// mapping is empty.
	#[instrument(skip(self), fields(user_id = %user_id, kpi_id = %kpi_id))]
	pub async fn resolve_access(
		&self,
		user_id: UserId,
		kpi_id: KpiId,
	) -> Result<Option<AccessDecision>> {
		if let Some(cached) = self.cache.get(user_id, kpi_id) {
			tracing::debug!("access decision served from cache");
			return Ok(cached);
		}

		let decision = self.resolve_access_uncached(user_id, kpi_id).await?;
		self.cache.put(user_id, kpi_id, decision.clone());
		Ok(decision)
	}

	/// Resolves an access decision bypassing the cache, for callers that need
	/// immediate consistency after an admin edit.
	#[instrument(skip(self), fields(user_id = %user_id, kpi_id = %kpi_id))]
	pub async fn resolve_access_uncached(
		&self,
		user_id: UserId,
		kpi_id: KpiId,
	) -> Result<Option<AccessDecision>> {
		let roles = self.store.get_roles_for_user(user_id).await?;
		let role_ids: Vec<RoleId> = roles.iter().map(|r| r.id).collect();
		let permissions = self.store.get_permissions(&role_ids, Some(kpi_id)).await?;

		match aggregate_access(permissions.iter().map(|p| &p.access_type)) {
			None => Ok(None),
			Some(AccessType::Owner) => Ok(Some(AccessDecision::Owner)),
			Some(AccessType::Full) => Ok(Some(AccessDecision::Full)),
			Some(AccessType::Restricted) => {
				let groups = self.store.get_groups_for_user(user_id).await?;
				let filters = self.build_filters_with(user_id, kpi_id, &groups).await?;
				Ok(Some(AccessDecision::Restricted { filters }))
			}
		}
	}

	/// Builds the per-dimension allow-lists for a RESTRICTED decision on a
	/// KPI: one entry per configured dimension (possibly empty), unioning the
	/// values of currently valid user-held and group-inherited scopes.
	#[instrument(skip(self), fields(user_id = %user_id, kpi_id = %kpi_id))]
	pub async fn build_filters(&self, user_id: UserId, kpi_id: KpiId) -> Result<ScopeFilters> {
		let groups = self.store.get_groups_for_user(user_id).await?;
		self.build_filters_with(user_id, kpi_id, &groups).await
	}

	async fn build_filters_with(
		&self,
		user_id: UserId,
		kpi_id: KpiId,
		groups: &[Group],
	) -> Result<ScopeFilters> {
		let dimensions = self.store.get_dimensions_for_kpi(kpi_id).await?;
		let entities: Vec<EntityRef> = std::iter::once(EntityRef::User(user_id))
			.chain(groups.iter().map(|g| EntityRef::Group(g.id)))
			.collect();

		let now = Utc::now();
		let mut filters = ScopeFilters::new();
		for dimension in dimensions {
			let key = dimension.filter_key();
			filters.require_dimension(key.clone());
			let scopes = self
				.store
				.get_valid_scopes(dimension.id, &entities, now)
				.await?;
			for scope in scopes {
				filters.allow(key.clone(), scope.value);
			}
		}
		Ok(filters)
	}

	/// Builds the full effective context snapshot for a user.
	///
	/// Roles and groups are read once and reused across every resource, so a
	/// single build never mixes two different membership views. Fails only
	/// with [`EngineError::NotFound`] when the user id is unknown; permission
	/// rows referencing a missing KPI are skipped and logged.
	#[instrument(skip(self), fields(user_id = %user_id))]
	pub async fn build_context(&self, user_id: UserId) -> Result<AccessContext> {
		let user = self
			.store
			.get_user(user_id)
			.await?
			.ok_or(EngineError::NotFound(user_id))?;

		let roles = self.store.get_roles_for_user(user_id).await?;
		let groups = self.store.get_groups_for_user(user_id).await?;
		let capabilities = self
			.resolve_capabilities_with(user_id, &roles, &groups)
			.await?;

		let role_ids: Vec<RoleId> = roles.iter().map(|r| r.id).collect();
		let permissions = self.store.get_permissions(&role_ids, None).await?;
		let kpis: HashMap<KpiId, _> = self
			.store
			.get_kpis_for_roles(&role_ids)
			.await?
			.into_iter()
			.map(|kpi| (kpi.id, kpi))
			.collect();

		let mut by_kpi: BTreeMap<KpiId, Vec<&Permission>> = BTreeMap::new();
		for permission in &permissions {
			by_kpi.entry(permission.kpi_id).or_default().push(permission);
		}

		let mut data_access = BTreeMap::new();
		for (kpi_id, rows) in by_kpi {
			let Some(kpi) = kpis.get(&kpi_id) else {
				tracing::warn!(%kpi_id, "skipping permission referencing missing KPI");
				continue;
			};

			let decision = match aggregate_access(rows.iter().map(|p| &p.access_type)) {
				None => continue,
				Some(AccessType::Owner) => AccessDecision::Owner,
				Some(AccessType::Full) => AccessDecision::Full,
				Some(AccessType::Restricted) => {
					let filters = self.build_filters_with(user_id, kpi_id, &groups).await?;
					AccessDecision::Restricted { filters }
				}
			};
			data_access.insert(kpi.resource_key.clone(), decision);
		}

		tracing::debug!(
			roles = roles.len(),
			capabilities = capabilities.len(),
			resources = data_access.len(),
			"context built"
		);

		Ok(AccessContext {
			user,
			roles: roles.into_iter().map(|r| r.name).collect(),
			capabilities,
			data_access,
		})
	}
}
