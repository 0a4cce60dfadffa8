// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Capability precedence resolution.
//!
//! Capability membership is decided per slug from the set of sources that
//! mention it. The precedence order is strict and total:
//!
//! 1. `UserRevoke` — excluded, terminal
//! 2. `UserGrant` — included, terminal
//! 3. `GroupRevoke` — excluded, terminal
//! 4. `GroupGrant` — included, terminal
//! 5. `Role` — included
//!
//! A revoke at a given tier masks a grant at any lower tier, and within the
//! group tier a revoke from any group masks a grant from any other group.
//! [`is_granted`] is the single function enforcing the order; resolution over
//! a whole observation set is a fold over it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Where a capability signal for a slug came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilitySource {
	/// Granted by one of the user's roles.
	Role,
	/// Granted by a group override.
	GroupGrant,
	/// Revoked by a group override.
	GroupRevoke,
	/// Granted by a user-level override.
	UserGrant,
	/// Revoked by a user-level override.
	UserRevoke,
}

impl fmt::Display for CapabilitySource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CapabilitySource::Role => write!(f, "ROLE"),
			CapabilitySource::GroupGrant => write!(f, "GROUP_GRANT"),
			CapabilitySource::GroupRevoke => write!(f, "GROUP_REVOKE"),
			CapabilitySource::UserGrant => write!(f, "USER_GRANT"),
			CapabilitySource::UserRevoke => write!(f, "USER_REVOKE"),
		}
	}
}

/// Decides membership for one slug given every source that mentioned it.
///
/// The outcome is independent of the order sources were discovered in.
pub fn is_granted<'a, I>(sources: I) -> bool
where
	I: IntoIterator<Item = &'a CapabilitySource>,
{
	let seen: BTreeSet<CapabilitySource> = sources.into_iter().copied().collect();

	if seen.contains(&CapabilitySource::UserRevoke) {
		return false;
	}
	if seen.contains(&CapabilitySource::UserGrant) {
		return true;
	}
	if seen.contains(&CapabilitySource::GroupRevoke) {
		return false;
	}
	if seen.contains(&CapabilitySource::GroupGrant) {
		return true;
	}
	seen.contains(&CapabilitySource::Role)
}

/// Resolves the effective capability set from tagged observations.
///
/// Each observation pairs a slug with the source that mentioned it; the same
/// slug may appear many times with different sources. Returns the sorted set
/// of slugs whose sources resolve to a grant under [`is_granted`].
pub fn resolve_capabilities<I, S>(observations: I) -> BTreeSet<String>
where
	I: IntoIterator<Item = (S, CapabilitySource)>,
	S: Into<String>,
{
	let mut by_slug: BTreeMap<String, BTreeSet<CapabilitySource>> = BTreeMap::new();
	for (slug, source) in observations {
		by_slug.entry(slug.into()).or_default().insert(source);
	}

	by_slug
		.into_iter()
		.filter(|(_, sources)| is_granted(sources.iter()))
		.map(|(slug, _)| slug)
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	use CapabilitySource::{GroupGrant, GroupRevoke, Role, UserGrant, UserRevoke};

	mod precedence {
		use super::*;

		#[test]
		fn role_alone_grants() {
			assert!(is_granted(&[Role]));
		}

		#[test]
		fn no_sources_denies() {
			assert!(!is_granted(&[]));
		}

		#[test]
		fn group_revoke_masks_role_grant() {
			assert!(!is_granted(&[Role, GroupRevoke]));
		}

		#[test]
		fn group_grant_without_role_grants() {
			assert!(is_granted(&[GroupGrant]));
		}

		#[test]
		fn group_revoke_masks_group_grant_across_groups() {
			assert!(!is_granted(&[GroupGrant, GroupRevoke]));
			assert!(!is_granted(&[GroupGrant, GroupRevoke, Role]));
		}

		#[test]
		fn user_grant_beats_group_revoke() {
			assert!(is_granted(&[Role, GroupRevoke, UserGrant]));
		}

		#[test]
		fn user_revoke_beats_everything() {
			assert!(!is_granted(&[Role, GroupGrant, UserGrant, UserRevoke]));
		}

		#[test]
		fn user_revoke_beats_user_grant() {
			assert!(!is_granted(&[UserGrant, UserRevoke]));
		}

		#[test]
		fn duplicate_sources_are_idempotent() {
			assert!(is_granted(&[Role, Role, GroupGrant, GroupGrant]));
			assert!(!is_granted(&[GroupRevoke, GroupRevoke]));
		}
	}

	mod resolve {
		use super::*;

		#[test]
		fn resolves_mixed_slugs_independently() {
			let resolved = resolve_capabilities([
				("view:revenue", Role),
				("view:revenue", GroupRevoke),
				("view:costs", Role),
				("export:data", GroupGrant),
				("export:data", UserRevoke),
			]);

			assert!(!resolved.contains("view:revenue"));
			assert!(resolved.contains("view:costs"));
			assert!(!resolved.contains("export:data"));
			assert_eq!(resolved.len(), 1);
		}

		#[test]
		fn scenario_role_grant_group_revoke_user_grant() {
			// ROLE grant revoked at group tier excludes the slug; an
			// additional USER_GRANT re-includes it.
			let without_user = resolve_capabilities([
				("view:revenue_dashboard", Role),
				("view:revenue_dashboard", GroupRevoke),
			]);
			assert!(!without_user.contains("view:revenue_dashboard"));

			let with_user = resolve_capabilities([
				("view:revenue_dashboard", Role),
				("view:revenue_dashboard", GroupRevoke),
				("view:revenue_dashboard", UserGrant),
			]);
			assert!(with_user.contains("view:revenue_dashboard"));
		}

		#[test]
		fn empty_observations_resolve_to_empty_set() {
			let resolved = resolve_capabilities(Vec::<(String, CapabilitySource)>::new());
			assert!(resolved.is_empty());
		}
	}

	fn arb_source() -> impl Strategy<Value = CapabilitySource> {
		prop_oneof![
			Just(Role),
			Just(GroupGrant),
			Just(GroupRevoke),
			Just(UserGrant),
			Just(UserRevoke),
		]
	}

	proptest! {
		#[test]
		fn decision_is_order_independent(
			mut sources in prop::collection::vec(arb_source(), 0..8),
			seed in any::<u64>(),
		) {
			let forward = is_granted(sources.iter());

			// Deterministic shuffle driven by the seed.
			let len = sources.len();
			let mut state = seed;
			for i in (1..len).rev() {
				state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
				let j = (state % (i as u64 + 1)) as usize;
				sources.swap(i, j);
			}

			prop_assert_eq!(is_granted(sources.iter()), forward);
		}

		#[test]
		fn decision_matches_priority_table(sources in prop::collection::vec(arb_source(), 0..8)) {
			let expected = if sources.contains(&UserRevoke) {
				false
			} else if sources.contains(&UserGrant) {
				true
			} else if sources.contains(&GroupRevoke) {
				false
			} else if sources.contains(&GroupGrant) {
				true
			} else {
				sources.contains(&Role)
			};

			prop_assert_eq!(is_granted(sources.iter()), expected);
		}

		#[test]
		fn user_revoke_always_excludes(sources in prop::collection::vec(arb_source(), 0..8)) {
			let mut with_revoke = sources;
			with_revoke.push(UserRevoke);
			prop_assert!(!is_granted(with_revoke.iter()));
		}

		#[test]
		fn resolved_set_only_contains_observed_slugs(
			observations in prop::collection::vec(("[a-z]{1,8}", arb_source()), 0..16),
		) {
			let slugs: BTreeSet<String> = observations.iter().map(|(s, _)| s.clone()).collect();
			let resolved = resolve_capabilities(observations);
			prop_assert!(resolved.is_subset(&slugs));
		}
	}
}
