// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access decision aggregation across a user's roles.
//!
//! A user may hold several roles each carrying a different [`AccessType`] for
//! the same resource. Aggregation is monotonically permissive: OWNER beats
//! FULL beats RESTRICTED, and a resource with no permission rows at all is
//! NONE (`Option::None`), which callers must treat as denied — distinct from
//! a RESTRICTED decision whose filter mapping happens to be empty.

use crate::filters::ScopeFilters;
use crate::types::AccessType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The resolved access decision for one (user, resource) pair.
///
/// NONE is represented as `Option::<AccessDecision>::None` at the resolution
/// API; a decision value always means some level of access exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccessDecision {
	/// Owner-bound visibility; the most specific signal.
	Owner,
	/// Unrestricted row visibility.
	Full,
	/// Visibility filtered by per-dimension allow-lists. The filters may be
	/// empty, which denies all rows.
	Restricted { filters: ScopeFilters },
}

impl AccessDecision {
	/// The access type of this decision.
	pub fn access_type(&self) -> AccessType {
		match self {
			AccessDecision::Owner => AccessType::Owner,
			AccessDecision::Full => AccessType::Full,
			AccessDecision::Restricted { .. } => AccessType::Restricted,
		}
	}

	/// Returns the filter mapping for a restricted decision, if any.
	pub fn filters(&self) -> Option<&ScopeFilters> {
		match self {
			AccessDecision::Restricted { filters } => Some(filters),
			_ => None,
		}
	}
}

impl fmt::Display for AccessDecision {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.access_type())
	}
}

/// Aggregates the access types granted by a user's roles for one resource.
///
/// Returns `None` when no permission rows exist. OWNER short-circuits,
/// FULL is next, and only-RESTRICTED aggregates to RESTRICTED — the caller
/// then builds the filter mapping.
pub fn aggregate_access<'a, I>(types: I) -> Option<AccessType>
where
	I: IntoIterator<Item = &'a AccessType>,
{
	let mut result = None;
	for access_type in types {
		match access_type {
			AccessType::Owner => return Some(AccessType::Owner),
			AccessType::Full => result = Some(AccessType::Full),
			AccessType::Restricted => {
				if result.is_none() {
					result = Some(AccessType::Restricted);
				}
			}
		}
	}
	result
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	mod aggregation {
		use super::*;

		#[test]
		fn no_permissions_is_none() {
			assert_eq!(aggregate_access([]), None);
		}

		#[test]
		fn restricted_alone_is_restricted() {
			assert_eq!(
				aggregate_access(&[AccessType::Restricted]),
				Some(AccessType::Restricted)
			);
		}

		#[test]
		fn full_beats_restricted() {
			assert_eq!(
				aggregate_access(&[AccessType::Restricted, AccessType::Full]),
				Some(AccessType::Full)
			);
			assert_eq!(
				aggregate_access(&[AccessType::Full, AccessType::Restricted]),
				Some(AccessType::Full)
			);
		}

		#[test]
		fn owner_beats_full_and_restricted() {
			assert_eq!(
				aggregate_access(&[AccessType::Restricted, AccessType::Owner]),
				Some(AccessType::Owner)
			);
			assert_eq!(
				aggregate_access(&[AccessType::Full, AccessType::Owner, AccessType::Restricted]),
				Some(AccessType::Owner)
			);
		}
	}

	mod decision {
		use super::*;

		#[test]
		fn access_type_matches_variant() {
			assert_eq!(AccessDecision::Owner.access_type(), AccessType::Owner);
			assert_eq!(AccessDecision::Full.access_type(), AccessType::Full);
			let restricted = AccessDecision::Restricted {
				filters: ScopeFilters::new(),
			};
			assert_eq!(restricted.access_type(), AccessType::Restricted);
		}

		#[test]
		fn only_restricted_carries_filters() {
			assert!(AccessDecision::Owner.filters().is_none());
			assert!(AccessDecision::Full.filters().is_none());
			let restricted = AccessDecision::Restricted {
				filters: ScopeFilters::new(),
			};
			assert!(restricted.filters().is_some());
		}

		#[test]
		fn serializes_with_type_tag() {
			let json = serde_json::to_string(&AccessDecision::Full).unwrap();
			assert!(json.contains("\"type\":\"full\""), "got: {json}");

			let restricted = AccessDecision::Restricted {
				filters: ScopeFilters::new(),
			};
			let json = serde_json::to_string(&restricted).unwrap();
			assert!(json.contains("\"type\":\"restricted\""), "got: {json}");
			assert!(json.contains("\"filters\":{}"), "got: {json}");
		}
	}

	fn arb_access_type() -> impl Strategy<Value = AccessType> {
		prop_oneof![
			Just(AccessType::Full),
			Just(AccessType::Restricted),
			Just(AccessType::Owner),
		]
	}

	proptest! {
		#[test]
		fn aggregation_is_order_independent(mut types in prop::collection::vec(arb_access_type(), 0..8)) {
			let forward = aggregate_access(types.iter());
			types.reverse();
			prop_assert_eq!(aggregate_access(types.iter()), forward);
		}

		#[test]
		fn adding_a_grant_never_lowers_access(types in prop::collection::vec(arb_access_type(), 0..8), extra in arb_access_type()) {
			fn rank(t: Option<AccessType>) -> u8 {
				match t {
					None => 0,
					Some(AccessType::Restricted) => 1,
					Some(AccessType::Full) => 2,
					Some(AccessType::Owner) => 3,
				}
			}

			let before = rank(aggregate_access(types.iter()));
			let mut wider = types;
			wider.push(extra);
			let after = rank(aggregate_access(wider.iter()));
			prop_assert!(after >= before);
		}

		#[test]
		fn owner_present_always_wins(types in prop::collection::vec(arb_access_type(), 0..8)) {
			let mut with_owner = types;
			with_owner.push(AccessType::Owner);
			prop_assert_eq!(aggregate_access(with_owner.iter()), Some(AccessType::Owner));
		}
	}
}
