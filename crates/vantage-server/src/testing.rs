// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory SQLite fixtures and seed helpers for tests.
//!
//! Writes live here and nowhere else in this crate: the engine itself never
//! mutates the store. Override insertion uses upsert semantics, matching the
//! at-most-one-override-per-(entity, capability) invariant the admin surface
//! enforces in production.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

use vantage_core::{
	AccessType, CapabilityId, DimensionId, EntityRef, GroupId, KpiId, OverrideAction, RoleId,
	ScopeId, UserId, UserStatus,
};

use crate::store::SqliteEntityStore;

pub async fn create_test_pool() -> SqlitePool {
	SqlitePool::connect(":memory:").await.unwrap()
}

/// An entity store over a fresh in-memory database with the full schema.
pub async fn seeded_store() -> SqliteEntityStore {
	let pool = create_test_pool().await;
	create_schema(&pool).await;
	SqliteEntityStore::new(pool)
}

pub async fn create_schema(pool: &SqlitePool) {
	let statements = [
		r#"
		CREATE TABLE IF NOT EXISTS users (
			id TEXT PRIMARY KEY,
			username TEXT UNIQUE NOT NULL,
			email TEXT,
			status TEXT NOT NULL DEFAULT 'active'
		)
		"#,
		r#"
		CREATE TABLE IF NOT EXISTS roles (
			id TEXT PRIMARY KEY,
			name TEXT UNIQUE NOT NULL,
			description TEXT
		)
		"#,
		r#"
		CREATE TABLE IF NOT EXISTS user_roles (
			user_id TEXT NOT NULL REFERENCES users(id),
			role_id TEXT NOT NULL REFERENCES roles(id),
			PRIMARY KEY (user_id, role_id)
		)
		"#,
		r#"
		CREATE TABLE IF NOT EXISTS groups (
			id TEXT PRIMARY KEY,
			name TEXT UNIQUE NOT NULL,
			description TEXT
		)
		"#,
		r#"
		CREATE TABLE IF NOT EXISTS user_groups (
			user_id TEXT NOT NULL REFERENCES users(id),
			group_id TEXT NOT NULL REFERENCES groups(id),
			PRIMARY KEY (user_id, group_id)
		)
		"#,
		r#"
		CREATE TABLE IF NOT EXISTS capabilities (
			id TEXT PRIMARY KEY,
			slug TEXT UNIQUE NOT NULL,
			description TEXT
		)
		"#,
		r#"
		CREATE TABLE IF NOT EXISTS role_capabilities (
			role_id TEXT NOT NULL REFERENCES roles(id),
			capability_id TEXT NOT NULL REFERENCES capabilities(id),
			PRIMARY KEY (role_id, capability_id)
		)
		"#,
		r#"
		CREATE TABLE IF NOT EXISTS user_capabilities (
			user_id TEXT NOT NULL REFERENCES users(id),
			capability_id TEXT NOT NULL REFERENCES capabilities(id),
			action TEXT NOT NULL CHECK(action IN ('GRANT', 'REVOKE')),
			PRIMARY KEY (user_id, capability_id)
		)
		"#,
		r#"
		CREATE TABLE IF NOT EXISTS group_capabilities (
			group_id TEXT NOT NULL REFERENCES groups(id),
			capability_id TEXT NOT NULL REFERENCES capabilities(id),
			action TEXT NOT NULL CHECK(action IN ('GRANT', 'REVOKE')),
			PRIMARY KEY (group_id, capability_id)
		)
		"#,
		r#"
		CREATE TABLE IF NOT EXISTS kpis (
			id TEXT PRIMARY KEY,
			name TEXT NOT NULL,
			resource_key TEXT UNIQUE NOT NULL,
			description TEXT
		)
		"#,
		r#"
		CREATE TABLE IF NOT EXISTS dimensions (
			id TEXT PRIMARY KEY,
			name TEXT UNIQUE NOT NULL,
			description TEXT
		)
		"#,
		r#"
		CREATE TABLE IF NOT EXISTS kpi_dimensions (
			kpi_id TEXT NOT NULL,
			dimension_id TEXT NOT NULL REFERENCES dimensions(id),
			PRIMARY KEY (kpi_id, dimension_id)
		)
		"#,
		r#"
		CREATE TABLE IF NOT EXISTS permissions (
			role_id TEXT NOT NULL REFERENCES roles(id),
			kpi_id TEXT NOT NULL,
			access_type TEXT NOT NULL CHECK(access_type IN ('FULL', 'RESTRICTED', 'OWNER')),
			PRIMARY KEY (role_id, kpi_id)
		)
		"#,
		r#"
		CREATE TABLE IF NOT EXISTS access_scopes (
			id TEXT PRIMARY KEY,
			entity_type TEXT NOT NULL CHECK(entity_type IN ('USER', 'GROUP')),
			entity_id TEXT NOT NULL,
			dimension_id TEXT NOT NULL REFERENCES dimensions(id),
			value TEXT NOT NULL,
			valid_from TEXT NOT NULL,
			valid_until TEXT
		)
		"#,
		r#"
		CREATE INDEX IF NOT EXISTS idx_access_scopes_entity
		ON access_scopes(entity_type, entity_id)
		"#,
		r#"
		CREATE INDEX IF NOT EXISTS idx_permissions_role ON permissions(role_id)
		"#,
		r#"
		CREATE INDEX IF NOT EXISTS idx_permissions_kpi ON permissions(kpi_id)
		"#,
	];

	for statement in statements {
		sqlx::query(statement).execute(pool).await.unwrap();
	}
}

pub async fn insert_user(pool: &SqlitePool, username: &str, status: UserStatus) -> UserId {
	let id = UserId::generate();
	sqlx::query("INSERT INTO users (id, username, email, status) VALUES (?, ?, ?, ?)")
		.bind(id.0.to_string())
		.bind(username)
		.bind(format!("{username}@corp.example"))
		.bind(status.to_string())
		.execute(pool)
		.await
		.unwrap();
	id
}

pub async fn insert_role(pool: &SqlitePool, name: &str) -> RoleId {
	let id = RoleId::generate();
	sqlx::query("INSERT INTO roles (id, name) VALUES (?, ?)")
		.bind(id.0.to_string())
		.bind(name)
		.execute(pool)
		.await
		.unwrap();
	id
}

pub async fn assign_role(pool: &SqlitePool, user_id: UserId, role_id: RoleId) {
	sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES (?, ?)")
		.bind(user_id.0.to_string())
		.bind(role_id.0.to_string())
		.execute(pool)
		.await
		.unwrap();
}

pub async fn insert_group(pool: &SqlitePool, name: &str) -> GroupId {
	let id = GroupId::generate();
	sqlx::query("INSERT INTO groups (id, name) VALUES (?, ?)")
		.bind(id.0.to_string())
		.bind(name)
		.execute(pool)
		.await
		.unwrap();
	id
}

pub async fn add_group_member(pool: &SqlitePool, group_id: GroupId, user_id: UserId) {
	sqlx::query("INSERT INTO user_groups (user_id, group_id) VALUES (?, ?)")
		.bind(user_id.0.to_string())
		.bind(group_id.0.to_string())
		.execute(pool)
		.await
		.unwrap();
}

pub async fn remove_group_member(pool: &SqlitePool, group_id: GroupId, user_id: UserId) {
	sqlx::query("DELETE FROM user_groups WHERE user_id = ? AND group_id = ?")
		.bind(user_id.0.to_string())
		.bind(group_id.0.to_string())
		.execute(pool)
		.await
		.unwrap();
}

pub async fn insert_capability(pool: &SqlitePool, slug: &str) -> CapabilityId {
	let id = CapabilityId::generate();
	sqlx::query("INSERT INTO capabilities (id, slug) VALUES (?, ?)")
		.bind(id.0.to_string())
		.bind(slug)
		.execute(pool)
		.await
		.unwrap();
	id
}

pub async fn grant_role_capability(pool: &SqlitePool, role_id: RoleId, capability_id: CapabilityId) {
	sqlx::query("INSERT INTO role_capabilities (role_id, capability_id) VALUES (?, ?)")
		.bind(role_id.0.to_string())
		.bind(capability_id.0.to_string())
		.execute(pool)
		.await
		.unwrap();
}

pub async fn set_user_capability_override(
	pool: &SqlitePool,
	user_id: UserId,
	capability_id: CapabilityId,
	action: OverrideAction,
) {
	sqlx::query(
		"INSERT OR REPLACE INTO user_capabilities (user_id, capability_id, action) VALUES (?, ?, ?)",
	)
	.bind(user_id.0.to_string())
	.bind(capability_id.0.to_string())
	.bind(action.to_string())
	.execute(pool)
	.await
	.unwrap();
}

pub async fn set_group_capability_override(
	pool: &SqlitePool,
	group_id: GroupId,
	capability_id: CapabilityId,
	action: OverrideAction,
) {
	sqlx::query(
		"INSERT OR REPLACE INTO group_capabilities (group_id, capability_id, action) VALUES (?, ?, ?)",
	)
	.bind(group_id.0.to_string())
	.bind(capability_id.0.to_string())
	.bind(action.to_string())
	.execute(pool)
	.await
	.unwrap();
}

pub async fn insert_kpi(pool: &SqlitePool, name: &str, resource_key: &str) -> KpiId {
	let id = KpiId::generate();
	sqlx::query("INSERT INTO kpis (id, name, resource_key) VALUES (?, ?, ?)")
		.bind(id.0.to_string())
		.bind(name)
		.bind(resource_key)
		.execute(pool)
		.await
		.unwrap();
	id
}

pub async fn insert_dimension(pool: &SqlitePool, name: &str) -> DimensionId {
	let id = DimensionId::generate();
	sqlx::query("INSERT INTO dimensions (id, name) VALUES (?, ?)")
		.bind(id.0.to_string())
		.bind(name)
		.execute(pool)
		.await
		.unwrap();
	id
}

pub async fn tag_kpi_dimension(pool: &SqlitePool, kpi_id: KpiId, dimension_id: DimensionId) {
	sqlx::query("INSERT INTO kpi_dimensions (kpi_id, dimension_id) VALUES (?, ?)")
		.bind(kpi_id.0.to_string())
		.bind(dimension_id.0.to_string())
		.execute(pool)
		.await
		.unwrap();
}

pub async fn insert_permission(
	pool: &SqlitePool,
	role_id: RoleId,
	kpi_id: KpiId,
	access_type: AccessType,
) {
	sqlx::query("INSERT INTO permissions (role_id, kpi_id, access_type) VALUES (?, ?, ?)")
		.bind(role_id.0.to_string())
		.bind(kpi_id.0.to_string())
		.bind(access_type.to_string())
		.execute(pool)
		.await
		.unwrap();
}

/// Inserts a raw permission row pointing at a KPI id that has no `kpis` row.
/// Used to exercise dangling-reference handling.
pub async fn insert_dangling_permission(pool: &SqlitePool, role_id: RoleId) -> KpiId {
	let missing = KpiId::generate();
	sqlx::query("INSERT INTO permissions (role_id, kpi_id, access_type) VALUES (?, ?, 'FULL')")
		.bind(role_id.0.to_string())
		.bind(missing.0.to_string())
		.execute(pool)
		.await
		.unwrap();
	missing
}

pub async fn insert_scope(
	pool: &SqlitePool,
	entity: EntityRef,
	dimension_id: DimensionId,
	value: &str,
	valid_from: DateTime<Utc>,
	valid_until: Option<DateTime<Utc>>,
) -> ScopeId {
	let id = ScopeId::generate();
	let (entity_type, entity_id) = match entity {
		EntityRef::User(user_id) => ("USER", user_id.0.to_string()),
		EntityRef::Group(group_id) => ("GROUP", group_id.0.to_string()),
	};
	sqlx::query(
		r#"
		INSERT INTO access_scopes (id, entity_type, entity_id, dimension_id, value, valid_from, valid_until)
		VALUES (?, ?, ?, ?, ?, ?, ?)
		"#,
	)
	.bind(id.0.to_string())
	.bind(entity_type)
	.bind(entity_id)
	.bind(dimension_id.0.to_string())
	.bind(value)
	.bind(valid_from.to_rfc3339())
	.bind(valid_until.map(|dt| dt.to_rfc3339()))
	.execute(pool)
	.await
	.unwrap();
	id
}
