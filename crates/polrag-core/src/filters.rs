//! Boundary parsing of the optional structured filters.
//!
//! Raw strings are trimmed and matched case-insensitively against the closed
//! enumerations once; everything downstream only sees typed values.

use crate::error::{Error, Result};
use crate::types::{ContentType, PolicySource, Region};

/// A closed enumeration that can appear as a retrieval filter.
pub trait FilterValue: Copy + 'static {
    const FIELD: &'static str;
    fn variants() -> &'static [Self];
    fn as_str(&self) -> &'static str;
}

macro_rules! impl_filter_value {
    ($($ty:ty),+) => {$(
        impl FilterValue for $ty {
            const FIELD: &'static str = <$ty>::FIELD;
            fn variants() -> &'static [Self] { <$ty>::ALL }
            fn as_str(&self) -> &'static str { <$ty>::as_str(self) }
        }
    )+};
}

impl_filter_value!(Region, ContentType, PolicySource);

/// Normalize one optional raw filter value.
///
/// `None`, `""` and whitespace-only input mean "no filter". Anything else
/// must name a member of `T` or the call fails with `InvalidFilterValue`.
pub fn normalize_filter<T: FilterValue>(raw: Option<&str>) -> Result<Option<T>> {
    let Some(raw) = raw else { return Ok(None) };
    let needle = raw.trim().to_lowercase();
    if needle.is_empty() {
        return Ok(None);
    }
    T::variants()
        .iter()
        .copied()
        .find(|v| v.as_str() == needle)
        .map(Some)
        .ok_or_else(|| Error::InvalidFilterValue { field: T::FIELD, value: raw.to_string() })
}

/// Validated filters; each present field is an AND constraint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrievalFilters {
    pub region: Option<Region>,
    pub content_type: Option<ContentType>,
    pub policy_source: Option<PolicySource>,
}

impl RetrievalFilters {
    pub fn from_raw(region: Option<&str>, content_type: Option<&str>, policy_source: Option<&str>) -> Result<Self> {
        Ok(Self {
            region: normalize_filter(region)?,
            content_type: normalize_filter(content_type)?,
            policy_source: normalize_filter(policy_source)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.region.is_none() && self.content_type.is_none() && self.policy_source.is_none()
    }

    /// Client-side check with the same AND semantics the store applies.
    pub fn matches(&self, region: Region, content_type: ContentType, policy_source: PolicySource) -> bool {
        self.region.map_or(true, |r| r == region)
            && self.content_type.map_or(true, |c| c == content_type)
            && self.policy_source.map_or(true, |s| s == policy_source)
    }
}
