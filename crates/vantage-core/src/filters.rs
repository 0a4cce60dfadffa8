// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Row-level filter mappings for restricted access.
//!
//! A [`ScopeFilters`] value maps lowercased dimension names to allow-lists of
//! permitted values. The mapping carries one entry per dimension configured
//! on the resource, even when the user holds no valid scope for it — an empty
//! allow-list on a required dimension admits zero rows, which is different
//! from the dimension being absent from the mapping entirely.
//!
//! Row-match semantics: a row matches iff, for every dimension key present in
//! the mapping, the row's value for that attribute is a member of the
//! dimension's allow-list. AND across dimensions, membership within one. A
//! row lacking a referenced attribute does not match.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-dimension allow-lists for a RESTRICTED access decision.
///
/// Built once per resolution; keys are lowercased dimension names, values are
/// deduplicated in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeFilters(BTreeMap<String, Vec<String>>);

impl ScopeFilters {
	/// Creates an empty filter mapping. Under RESTRICTED access this means
	/// "deny all rows", not "no filtering".
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a dimension key with an empty allow-list if absent. Every
	/// dimension configured on the resource must be registered, scoped or
	/// not.
	pub fn require_dimension(&mut self, key: impl Into<String>) {
		self.0.entry(key.into()).or_default();
	}

	/// Adds an allowed value to a dimension's allow-list, deduplicating.
	pub fn allow(&mut self, key: impl Into<String>, value: impl Into<String>) {
		let values = self.0.entry(key.into()).or_default();
		let value = value.into();
		if !values.contains(&value) {
			values.push(value);
		}
	}

	/// Merges another filter mapping into this one, unioning allow-lists.
	pub fn union(&mut self, other: &ScopeFilters) {
		for (key, values) in &other.0 {
			self.require_dimension(key.clone());
			for value in values {
				self.allow(key.clone(), value.clone());
			}
		}
	}

	/// Returns the allow-list for a dimension key, if the key is present.
	pub fn allowed_values(&self, key: &str) -> Option<&[String]> {
		self.0.get(key).map(Vec::as_slice)
	}

	/// Returns true if no dimension keys are present.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Number of dimension keys present.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true if any present dimension has an empty allow-list, which
	/// forces a zero-row result.
	pub fn has_unsatisfiable_dimension(&self) -> bool {
		self.0.values().any(|values| values.is_empty())
	}

	/// Iterates over (dimension key, allow-list) entries in key order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
	}

	/// Applies the row-match predicate to a row's attribute map.
	///
	/// Note the empty-mapping case: with no keys present every row matches,
	/// so callers holding a RESTRICTED decision must check
	/// [`deny_all_rows`](Self::deny_all_rows) first.
	pub fn matches_row(&self, row: &BTreeMap<String, String>) -> bool {
		self.0.iter().all(|(key, allowed)| {
			row
				.get(key)
				.map(|value| allowed.contains(value))
				.unwrap_or(false)
		})
	}

	/// Returns true if a RESTRICTED decision carrying these filters admits no
	/// rows at all: either no dimensions are configured on the resource or a
	/// required dimension has an empty allow-list.
	pub fn deny_all_rows(&self) -> bool {
		self.is_empty() || self.has_unsatisfiable_dimension()
	}

	/// Filters a row set down to the matching rows under RESTRICTED access,
	/// applying the deny-all interpretation of empty mappings.
	pub fn apply<'a>(&self, rows: &'a [BTreeMap<String, String>]) -> Vec<&'a BTreeMap<String, String>> {
		if self.deny_all_rows() {
			return Vec::new();
		}
		rows.iter().filter(|row| self.matches_row(row)).collect()
	}
}

impl FromIterator<(String, Vec<String>)> for ScopeFilters {
	fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}
