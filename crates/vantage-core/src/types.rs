// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions for access context resolution.
//!
//! This module defines the foundational types used throughout the engine:
//!
//! - **ID newtypes**: Type-safe wrappers around UUIDs for different entity types
//!   ([`UserId`], [`RoleId`], [`KpiId`], etc.) preventing accidental mixing
//! - **Entity structs**: Snapshot records read from the entity store ([`User`],
//!   [`Role`], [`Group`], [`Kpi`], [`Dimension`], [`Permission`], [`AccessScope`])
//! - **Access enums**: [`AccessType`] for per-role resource permissions and
//!   [`OverrideAction`] for explicit capability grant/revoke overrides
//!
//! All ID types implement transparent serde serialization (as UUID strings) and
//! provide conversion to/from [`uuid::Uuid`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(pub Uuid);

		impl $name {
			/// Create a new ID from a UUID.
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			/// Get the inner UUID value.
			pub fn into_inner(self) -> Uuid {
				self.0
			}

			/// Get a reference to the inner UUID.
			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}

		impl From<$name> for Uuid {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(UserId, "Unique identifier for a user.");
define_id_type!(RoleId, "Unique identifier for a role.");
define_id_type!(GroupId, "Unique identifier for a group.");
define_id_type!(CapabilityId, "Unique identifier for a capability.");
define_id_type!(KpiId, "Unique identifier for a KPI resource.");
define_id_type!(DimensionId, "Unique identifier for a dimension.");
define_id_type!(ScopeId, "Unique identifier for an access scope.");

// =============================================================================
// User Status
// =============================================================================

/// Account status for a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
	#[default]
	Active,
	Inactive,
}

impl fmt::Display for UserStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			UserStatus::Active => write!(f, "active"),
			UserStatus::Inactive => write!(f, "inactive"),
		}
	}
}

// =============================================================================
// Access Types
// =============================================================================

/// Per-role access type for a KPI resource.
///
/// Aggregation across a user's roles is monotonically permissive: `Owner`
/// beats `Full` beats `Restricted`. See [`crate::access::aggregate_access`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
	/// Unrestricted row visibility.
	Full,
	/// Row visibility filtered by the user's dimension scopes.
	Restricted,
	/// Owner-bound visibility; the most specific signal, short-circuits
	/// aggregation over other roles.
	Owner,
}

impl AccessType {
	/// Returns all access types.
	pub fn all() -> &'static [AccessType] {
		&[AccessType::Full, AccessType::Restricted, AccessType::Owner]
	}
}

impl fmt::Display for AccessType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AccessType::Full => write!(f, "FULL"),
			AccessType::Restricted => write!(f, "RESTRICTED"),
			AccessType::Owner => write!(f, "OWNER"),
		}
	}
}

/// Explicit capability override action at group or user scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideAction {
	Grant,
	Revoke,
}

impl fmt::Display for OverrideAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OverrideAction::Grant => write!(f, "GRANT"),
			OverrideAction::Revoke => write!(f, "REVOKE"),
		}
	}
}

// =============================================================================
// Entity References
// =============================================================================

/// A scope-holding entity: either a user directly or a group the user
/// belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
	User(UserId),
	Group(GroupId),
}

impl fmt::Display for EntityRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EntityRef::User(id) => write!(f, "user:{id}"),
			EntityRef::Group(id) => write!(f, "group:{id}"),
		}
	}
}

// =============================================================================
// Entities
// =============================================================================

/// A user identity as read from the entity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	pub id: UserId,
	pub username: String,
	pub email: Option<String>,
	pub status: UserStatus,
}

/// A named bundle of default capability grants and resource permissions.
///
/// Roles form a flat set; no hierarchy is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
	pub id: RoleId,
	pub name: String,
	pub description: Option<String>,
}

/// A named collection of users carrying its own capability overrides and
/// scope assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
	pub id: GroupId,
	pub name: String,
	pub description: Option<String>,
}

/// A grantable functional permission, identified by an opaque slug such as
/// `view:revenue_dashboard`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
	pub id: CapabilityId,
	pub slug: String,
	pub description: Option<String>,
}

/// A protected dataset. `resource_key` (e.g. `kpi:revenue`) keys the
/// `data_access` mapping of a resolved context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kpi {
	pub id: KpiId,
	pub name: String,
	pub resource_key: String,
	pub description: Option<String>,
}

/// A named categorical row attribute (e.g. `REGION`) used for row-level
/// scoping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
	pub id: DimensionId,
	pub name: String,
	pub description: Option<String>,
}

impl Dimension {
	/// The lowercased name under which this dimension appears in a filter
	/// mapping.
	pub fn filter_key(&self) -> String {
		self.name.to_lowercase()
	}
}

/// A role's access type for one KPI. At most one permission row exists per
/// (role, kpi) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
	pub role_id: RoleId,
	pub kpi_id: KpiId,
	pub access_type: AccessType,
}

/// An explicit capability override held by a user or group. At most one
/// override exists per (entity, capability) pair; writes replace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityOverride {
	pub entity: EntityRef,
	pub slug: String,
	pub action: OverrideAction,
}

/// An assignment of one concrete dimension value to a user or group, with an
/// optional expiry. Multiple scopes for the same (entity, dimension) pair
/// accumulate as an allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessScope {
	pub id: ScopeId,
	pub entity: EntityRef,
	pub dimension_id: DimensionId,
	pub value: String,
	pub valid_from: DateTime<Utc>,
	pub valid_until: Option<DateTime<Utc>>,
}

impl AccessScope {
	/// Returns true if this scope is live at `as_of`: `valid_from` has passed
	/// and `valid_until`, when set, has not.
	pub fn is_valid_at(&self, as_of: DateTime<Utc>) -> bool {
		self.valid_from <= as_of && self.valid_until.map(|until| until > as_of).unwrap_or(true)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Duration;
	use proptest::prelude::*;

	mod id_types {
		use super::*;

		#[test]
		fn user_id_roundtrips() {
			let uuid = Uuid::new_v4();
			let user_id = UserId::new(uuid);
			assert_eq!(user_id.into_inner(), uuid);
		}

		#[test]
		fn user_id_generates_unique() {
			let id1 = UserId::generate();
			let id2 = UserId::generate();
			assert_ne!(id1, id2);
		}

		#[test]
		fn kpi_id_serializes_as_uuid() {
			let uuid = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
			let kpi_id = KpiId::new(uuid);
			let json = serde_json::to_string(&kpi_id).unwrap();
			assert_eq!(json, "\"550e8400-e29b-41d4-a716-446655440000\"");
		}

		proptest! {
			#[test]
			fn user_id_roundtrip_any_uuid(a: u128) {
				let uuid = Uuid::from_u128(a);
				let user_id = UserId::new(uuid);
				prop_assert_eq!(user_id.into_inner(), uuid);
				prop_assert_eq!(Uuid::from(user_id), uuid);
			}

			#[test]
			fn user_id_display_matches_uuid(a: u128) {
				let uuid = Uuid::from_u128(a);
				prop_assert_eq!(UserId::new(uuid).to_string(), uuid.to_string());
			}
		}
	}

	mod access_type {
		use super::*;

		#[test]
		fn serializes_snake_case() {
			assert_eq!(
				serde_json::to_string(&AccessType::Restricted).unwrap(),
				"\"restricted\""
			);
		}

		#[test]
		fn display_uses_store_spelling() {
			assert_eq!(AccessType::Full.to_string(), "FULL");
			assert_eq!(AccessType::Owner.to_string(), "OWNER");
		}

		#[test]
		fn all_returns_three_types() {
			assert_eq!(AccessType::all().len(), 3);
		}
	}

	mod entity_ref {
		use super::*;

		#[test]
		fn display_includes_kind() {
			let user_id = UserId::generate();
			assert!(EntityRef::User(user_id).to_string().starts_with("user:"));
			let group_id = GroupId::generate();
			assert!(EntityRef::Group(group_id).to_string().starts_with("group:"));
		}

		#[test]
		fn serializes_tagged() {
			let group_id = GroupId::new(Uuid::nil());
			let json = serde_json::to_string(&EntityRef::Group(group_id)).unwrap();
			assert!(json.contains("\"type\":\"group\""), "got: {json}");
		}
	}

	mod scope_validity {
		use super::*;

		fn scope(valid_from: DateTime<Utc>, valid_until: Option<DateTime<Utc>>) -> AccessScope {
			AccessScope {
				id: ScopeId::generate(),
				entity: EntityRef::User(UserId::generate()),
				dimension_id: DimensionId::generate(),
				value: "NA".to_string(),
				valid_from,
				valid_until,
			}
		}

		#[test]
		fn permanent_scope_is_valid() {
			let now = Utc::now();
			assert!(scope(now - Duration::days(1), None).is_valid_at(now));
		}

		#[test]
		fn expired_scope_is_invalid() {
			let now = Utc::now();
			assert!(!scope(now - Duration::days(2), Some(now - Duration::days(1))).is_valid_at(now));
		}

		#[test]
		fn future_expiry_is_valid() {
			let now = Utc::now();
			assert!(scope(now - Duration::days(1), Some(now + Duration::days(1))).is_valid_at(now));
		}

		#[test]
		fn not_yet_started_scope_is_invalid() {
			let now = Utc::now();
			assert!(!scope(now + Duration::hours(1), None).is_valid_at(now));
		}

		#[test]
		fn expiry_boundary_is_exclusive() {
			let now = Utc::now();
			assert!(!scope(now - Duration::days(1), Some(now)).is_valid_at(now));
		}

		#[test]
		fn start_boundary_is_inclusive() {
			let now = Utc::now();
			assert!(scope(now, None).is_valid_at(now));
		}
	}

	mod dimension {
		use super::*;

		#[test]
		fn filter_key_is_lowercased() {
			let dim = Dimension {
				id: DimensionId::generate(),
				name: "REGION".to_string(),
				description: None,
			};
			assert_eq!(dim.filter_key(), "region");
		}
	}
}
