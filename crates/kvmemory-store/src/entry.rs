//! The entry record and the probe filter used to match it.

use chrono::DateTime;
use chrono_tz::Tz;

/// A named, opaque value identified by `key`.
///
/// `id` and the timestamps are owned by the store: a fresh entry has none
/// of them, a fetched entry has all of them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Entry {
    pub id: Option<u64>,
    pub created_at: Option<DateTime<Tz>>,
    pub updated_at: Option<DateTime<Tz>>,
    pub key: String,
    pub name: String,
    pub value: Vec<u8>,
}

impl Entry {
    /// A not-yet-persisted entry.
    pub fn new(key: impl Into<String>, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    /// The same entry bound to an existing row.
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

/// Match criteria for existence checks.
///
/// Every field is an independent equality constraint; `None` leaves the
/// column unconstrained, so `Some(String::new())` really matches empty
/// names. An all-`None` filter matches any row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryFilter {
    pub id: Option<u64>,
    pub created_at: Option<DateTime<Tz>>,
    pub updated_at: Option<DateTime<Tz>>,
    pub key: Option<String>,
    pub name: Option<String>,
    pub value: Option<Vec<u8>>,
}

impl EntryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn value(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Derive a filter from a partially filled entry, treating empty
    /// strings, empty values, zero or absent ids and absent timestamps as
    /// "don't care".
    pub fn from_probe(probe: &Entry) -> Self {
        Self {
            id: probe.id.filter(|&id| id != 0),
            created_at: probe.created_at,
            updated_at: probe.updated_at,
            key: Some(probe.key.clone()).filter(|k| !k.is_empty()),
            name: Some(probe.name.clone()).filter(|n| !n.is_empty()),
            value: Some(probe.value.clone()).filter(|v| !v.is_empty()),
        }
    }

    /// True when no column is constrained.
    pub fn is_unconstrained(&self) -> bool {
        *self == Self::default()
    }
}

impl From<&Entry> for EntryFilter {
    fn from(probe: &Entry) -> Self {
        Self::from_probe(probe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_is_not_persisted() {
        let entry = Entry::new("cfg:a", "alpha", "1");
        assert!(!entry.is_persisted());
        assert_eq!(entry.value, b"1");
        assert!(entry.created_at.is_none());
        assert!(entry.with_id(7).is_persisted());
    }

    #[test]
    fn probe_ignores_zero_values() {
        let filter = EntryFilter::from_probe(&Entry::new("cfg:a", "", Vec::new()));
        assert_eq!(filter, EntryFilter::new().key("cfg:a"));
    }

    #[test]
    fn empty_probe_is_unconstrained() {
        assert!(EntryFilter::from(&Entry::default()).is_unconstrained());
        assert!(!EntryFilter::new().name("").is_unconstrained());
    }

    #[test]
    fn probe_ignores_zero_id() {
        let filter = EntryFilter::from_probe(&Entry::new("cfg:a", "", Vec::new()).with_id(0));
        assert_eq!(filter, EntryFilter::new().key("cfg:a"));
    }

    #[test]
    fn probe_keeps_id() {
        let filter = EntryFilter::from_probe(&Entry::default().with_id(3));
        assert_eq!(filter.id, Some(3));
        assert!(filter.key.is_none());
    }
}
