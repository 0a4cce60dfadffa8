// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Entity store query contracts and the SQLite implementation.
//!
//! The engine performs a bounded sequence of point reads, never writes.
//! Administrative mutation of users, roles, permissions and scopes happens
//! outside this crate; each query here assumes snapshot consistency on its
//! own, and a context build spanning several queries accepts the documented
//! eventual-consistency window.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::instrument;
use uuid::Uuid;

use vantage_core::{
	AccessScope, AccessType, CapabilityOverride, Dimension, DimensionId, EntityRef, Group, GroupId,
	Kpi, KpiId, OverrideAction, Permission, Role, RoleId, ScopeId, User, UserId, UserStatus,
};

use crate::error::{EngineError, Result};

/// Read-only query contracts the engine needs from the entity store.
#[async_trait]
pub trait EntityStore: Send + Sync {
	/// Fetches a user by id.
	async fn get_user(&self, id: UserId) -> Result<Option<User>>;

	/// Roles the user currently holds.
	async fn get_roles_for_user(&self, id: UserId) -> Result<Vec<Role>>;

	/// Groups the user currently belongs to.
	async fn get_groups_for_user(&self, id: UserId) -> Result<Vec<Group>>;

	/// Capability slugs granted by any of the given roles, deduplicated.
	async fn get_capability_grants_for_roles(&self, role_ids: &[RoleId]) -> Result<Vec<String>>;

	/// Explicit grant/revoke overrides held by the given users and groups.
	async fn get_capability_overrides(&self, entities: &[EntityRef])
		-> Result<Vec<CapabilityOverride>>;

	/// Permission rows for the given roles, optionally narrowed to one KPI.
	async fn get_permissions(
		&self,
		role_ids: &[RoleId],
		kpi_id: Option<KpiId>,
	) -> Result<Vec<Permission>>;

	/// KPIs referenced by any permission of the given roles.
	async fn get_kpis_for_roles(&self, role_ids: &[RoleId]) -> Result<Vec<Kpi>>;

	/// Dimensions configured on a KPI, ordered by name. Filter mappings are
	/// keyed, so the order only affects logs.
	async fn get_dimensions_for_kpi(&self, kpi_id: KpiId) -> Result<Vec<Dimension>>;

	/// Scopes on one dimension held by any of the given entities and valid at
	/// `as_of`.
	async fn get_valid_scopes(
		&self,
		dimension_id: DimensionId,
		entities: &[EntityRef],
		as_of: DateTime<Utc>,
	) -> Result<Vec<AccessScope>>;
}

/// SQLite implementation of the entity store.
#[derive(Clone)]
pub struct SqliteEntityStore {
	pool: SqlitePool,
}

impl SqliteEntityStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}
}

fn placeholders(count: usize) -> String {
	vec!["?"; count].join(", ")
}

fn parse_uuid(value: &str, field: &str) -> Result<Uuid> {
	Uuid::parse_str(value).map_err(|e| EngineError::Internal(format!("invalid {field} uuid: {e}")))
}

fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| EngineError::Internal(format!("invalid {field} timestamp: {e}")))
}

fn parse_access_type(value: &str) -> Result<AccessType> {
	match value {
		"FULL" => Ok(AccessType::Full),
		"RESTRICTED" => Ok(AccessType::Restricted),
		"OWNER" => Ok(AccessType::Owner),
		other => Err(EngineError::Internal(format!(
			"invalid access_type: {other}"
		))),
	}
}

fn parse_override_action(value: &str) -> Result<OverrideAction> {
	match value {
		"GRANT" => Ok(OverrideAction::Grant),
		"REVOKE" => Ok(OverrideAction::Revoke),
		other => Err(EngineError::Internal(format!(
			"invalid override action: {other}"
		))),
	}
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
	id: String,
	username: String,
	email: Option<String>,
	status: String,
}

impl TryFrom<UserRow> for User {
	type Error = EngineError;

	fn try_from(row: UserRow) -> Result<User> {
		let status = match row.status.as_str() {
			"active" => UserStatus::Active,
			"inactive" => UserStatus::Inactive,
			other => {
				return Err(EngineError::Internal(format!("invalid user status: {other}")));
			}
		};
		Ok(User {
			id: UserId::new(parse_uuid(&row.id, "user id")?),
			username: row.username,
			email: row.email,
			status,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
struct NamedRow {
	id: String,
	name: String,
	description: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct KpiRow {
	id: String,
	name: String,
	resource_key: String,
	description: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct PermissionRow {
	role_id: String,
	kpi_id: String,
	access_type: String,
}

impl TryFrom<PermissionRow> for Permission {
	type Error = EngineError;

	fn try_from(row: PermissionRow) -> Result<Permission> {
		Ok(Permission {
			role_id: RoleId::new(parse_uuid(&row.role_id, "role id")?),
			kpi_id: KpiId::new(parse_uuid(&row.kpi_id, "kpi id")?),
			access_type: parse_access_type(&row.access_type)?,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
struct OverrideRow {
	entity_id: String,
	slug: String,
	action: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ScopeRow {
	id: String,
	entity_type: String,
	entity_id: String,
	value: String,
	valid_from: String,
	valid_until: Option<String>,
}

impl ScopeRow {
	fn into_scope(self, dimension_id: DimensionId) -> Result<AccessScope> {
		let entity_uuid = parse_uuid(&self.entity_id, "scope entity id")?;
		let entity = match self.entity_type.as_str() {
			"USER" => EntityRef::User(UserId::new(entity_uuid)),
			"GROUP" => EntityRef::Group(GroupId::new(entity_uuid)),
			other => {
				return Err(EngineError::Internal(format!(
					"invalid scope entity type: {other}"
				)));
			}
		};
		Ok(AccessScope {
			id: ScopeId::new(parse_uuid(&self.id, "scope id")?),
			entity,
			dimension_id,
			value: self.value,
			valid_from: parse_timestamp(&self.valid_from, "valid_from")?,
			valid_until: self
				.valid_until
				.as_deref()
				.map(|v| parse_timestamp(v, "valid_until"))
				.transpose()?,
		})
	}
}

#[async_trait]
impl EntityStore for SqliteEntityStore {
	#[instrument(skip(self), fields(user_id = %id))]
	async fn get_user(&self, id: UserId) -> Result<Option<User>> {
		let row = sqlx::query_as::<_, UserRow>(
			r#"
			SELECT id, username, email, status
			FROM users
			WHERE id = ?
			"#,
		)
		.bind(id.0.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self), fields(user_id = %id))]
	async fn get_roles_for_user(&self, id: UserId) -> Result<Vec<Role>> {
		let rows = sqlx::query_as::<_, NamedRow>(
			r#"
			SELECT r.id, r.name, r.description
			FROM roles r
			JOIN user_roles ur ON ur.role_id = r.id
			WHERE ur.user_id = ?
			ORDER BY r.name ASC
			"#,
		)
		.bind(id.0.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows
			.into_iter()
			.map(|row| {
				Ok(Role {
					id: RoleId::new(parse_uuid(&row.id, "role id")?),
					name: row.name,
					description: row.description,
				})
			})
			.collect()
	}

	#[instrument(skip(self), fields(user_id = %id))]
	async fn get_groups_for_user(&self, id: UserId) -> Result<Vec<Group>> {
		let rows = sqlx::query_as::<_, NamedRow>(
			r#"
			SELECT g.id, g.name, g.description
			FROM groups g
			JOIN user_groups ug ON ug.group_id = g.id
			WHERE ug.user_id = ?
			ORDER BY g.name ASC
			"#,
		)
		.bind(id.0.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows
			.into_iter()
			.map(|row| {
				Ok(Group {
					id: GroupId::new(parse_uuid(&row.id, "group id")?),
					name: row.name,
					description: row.description,
				})
			})
			.collect()
	}

	#[instrument(skip(self, role_ids), fields(roles = role_ids.len()))]
	async fn get_capability_grants_for_roles(&self, role_ids: &[RoleId]) -> Result<Vec<String>> {
		if role_ids.is_empty() {
			return Ok(Vec::new());
		}

		let sql = format!(
			r#"
			SELECT DISTINCT c.slug
			FROM capabilities c
			JOIN role_capabilities rc ON rc.capability_id = c.id
			WHERE rc.role_id IN ({})
			ORDER BY c.slug ASC
			"#,
			placeholders(role_ids.len())
		);

		let mut query = sqlx::query_scalar::<_, String>(&sql);
		for role_id in role_ids {
			query = query.bind(role_id.0.to_string());
		}

		Ok(query.fetch_all(&self.pool).await?)
	}

	#[instrument(skip(self, entities), fields(entities = entities.len()))]
	async fn get_capability_overrides(
		&self,
		entities: &[EntityRef],
	) -> Result<Vec<CapabilityOverride>> {
		let user_ids: Vec<UserId> = entities
			.iter()
			.filter_map(|e| match e {
				EntityRef::User(id) => Some(*id),
				EntityRef::Group(_) => None,
			})
			.collect();
		let group_ids: Vec<GroupId> = entities
			.iter()
			.filter_map(|e| match e {
				EntityRef::Group(id) => Some(*id),
				EntityRef::User(_) => None,
			})
			.collect();

		let mut overrides = Vec::new();

		if !user_ids.is_empty() {
			let sql = format!(
				r#"
				SELECT uc.user_id AS entity_id, c.slug, uc.action
				FROM user_capabilities uc
				JOIN capabilities c ON c.id = uc.capability_id
				WHERE uc.user_id IN ({})
				"#,
				placeholders(user_ids.len())
			);
			let mut query = sqlx::query_as::<_, OverrideRow>(&sql);
			for user_id in &user_ids {
				query = query.bind(user_id.0.to_string());
			}
			for row in query.fetch_all(&self.pool).await? {
				overrides.push(CapabilityOverride {
					entity: EntityRef::User(UserId::new(parse_uuid(&row.entity_id, "user id")?)),
					slug: row.slug,
					action: parse_override_action(&row.action)?,
				});
			}
		}

		if !group_ids.is_empty() {
			let sql = format!(
				r#"
				SELECT gc.group_id AS entity_id, c.slug, gc.action
				FROM group_capabilities gc
				JOIN capabilities c ON c.id = gc.capability_id
				WHERE gc.group_id IN ({})
				"#,
				placeholders(group_ids.len())
			);
			let mut query = sqlx::query_as::<_, OverrideRow>(&sql);
			for group_id in &group_ids {
				query = query.bind(group_id.0.to_string());
			}
			for row in query.fetch_all(&self.pool).await? {
				overrides.push(CapabilityOverride {
					entity: EntityRef::Group(GroupId::new(parse_uuid(&row.entity_id, "group id")?)),
					slug: row.slug,
					action: parse_override_action(&row.action)?,
				});
			}
		}

		Ok(overrides)
	}

	#[instrument(skip(self, role_ids), fields(roles = role_ids.len(), kpi_id = kpi_id.map(tracing::field::display)))]
	async fn get_permissions(
		&self,
		role_ids: &[RoleId],
		kpi_id: Option<KpiId>,
	) -> Result<Vec<Permission>> {
		if role_ids.is_empty() {
			return Ok(Vec::new());
		}

		let mut sql = format!(
			r#"
			SELECT role_id, kpi_id, access_type
			FROM permissions
			WHERE role_id IN ({})
			"#,
			placeholders(role_ids.len())
		);
		if kpi_id.is_some() {
			sql.push_str(" AND kpi_id = ?");
		}

		let mut query = sqlx::query_as::<_, PermissionRow>(&sql);
		for role_id in role_ids {
			query = query.bind(role_id.0.to_string());
		}
		if let Some(kpi_id) = kpi_id {
			query = query.bind(kpi_id.0.to_string());
		}

		let rows = query.fetch_all(&self.pool).await?;
		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self, role_ids), fields(roles = role_ids.len()))]
	async fn get_kpis_for_roles(&self, role_ids: &[RoleId]) -> Result<Vec<Kpi>> {
		if role_ids.is_empty() {
			return Ok(Vec::new());
		}

		let sql = format!(
			r#"
			SELECT DISTINCT k.id, k.name, k.resource_key, k.description
			FROM kpis k
			JOIN permissions p ON p.kpi_id = k.id
			WHERE p.role_id IN ({})
			ORDER BY k.resource_key ASC
			"#,
			placeholders(role_ids.len())
		);

		let mut query = sqlx::query_as::<_, KpiRow>(&sql);
		for role_id in role_ids {
			query = query.bind(role_id.0.to_string());
		}

		let rows = query.fetch_all(&self.pool).await?;
		rows
			.into_iter()
			.map(|row| {
				Ok(Kpi {
					id: KpiId::new(parse_uuid(&row.id, "kpi id")?),
					name: row.name,
					resource_key: row.resource_key,
					description: row.description,
				})
			})
			.collect()
	}

	#[instrument(skip(self), fields(kpi_id = %kpi_id))]
	async fn get_dimensions_for_kpi(&self, kpi_id: KpiId) -> Result<Vec<Dimension>> {
		let rows = sqlx::query_as::<_, NamedRow>(
			r#"
			SELECT d.id, d.name, d.description
			FROM dimensions d
			JOIN kpi_dimensions kd ON kd.dimension_id = d.id
			WHERE kd.kpi_id = ?
			ORDER BY d.name ASC
			"#,
		)
		.bind(kpi_id.0.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows
			.into_iter()
			.map(|row| {
				Ok(Dimension {
					id: DimensionId::new(parse_uuid(&row.id, "dimension id")?),
					name: row.name,
					description: row.description,
				})
			})
			.collect()
	}

	#[instrument(skip(self, entities), fields(dimension_id = %dimension_id, entities = entities.len()))]
	async fn get_valid_scopes(
		&self,
		dimension_id: DimensionId,
		entities: &[EntityRef],
		as_of: DateTime<Utc>,
	) -> Result<Vec<AccessScope>> {
		if entities.is_empty() {
			return Ok(Vec::new());
		}

		let predicates = vec!["(entity_type = ? AND entity_id = ?)"; entities.len()].join(" OR ");
		let sql = format!(
			r#"
			SELECT id, entity_type, entity_id, value, valid_from, valid_until
			FROM access_scopes
			WHERE dimension_id = ?
			  AND ({predicates})
			  AND valid_from <= ?
			  AND (valid_until IS NULL OR valid_until > ?)
			ORDER BY valid_from ASC
			"#,
		);

		let mut query = sqlx::query_as::<_, ScopeRow>(&sql).bind(dimension_id.0.to_string());
		for entity in entities {
			match entity {
				EntityRef::User(id) => {
					query = query.bind("USER").bind(id.0.to_string());
				}
				EntityRef::Group(id) => {
					query = query.bind("GROUP").bind(id.0.to_string());
				}
			}
		}
		let as_of_str = as_of.to_rfc3339();
		query = query.bind(as_of_str.clone()).bind(as_of_str);

		let rows = query.fetch_all(&self.pool).await?;
		rows
			.into_iter()
			.map(|row| row.into_scope(dimension_id))
			.collect()
	}
}
