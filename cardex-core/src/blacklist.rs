use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::StoreError;
use crate::persistence::StoreFile;

/// Default for how many failed requests lead to a permanently blacklisted
/// entry.
pub const DEFAULT_RETRY_THRESHOLD: u32 = 3;

/// The closed set of query kinds a failure can be recorded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Image,
    Title,
    Logo,
}

impl QueryKind {
    pub const ALL: [QueryKind; 3] = [QueryKind::Image, QueryKind::Title, QueryKind::Logo];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Image => "image",
            QueryKind::Title => "title",
            QueryKind::Logo => "logo",
        }
    }

    fn index(self) -> usize {
        match self {
            QueryKind::Image => 0,
            QueryKind::Title => 1,
            QueryKind::Logo => 2,
        }
    }
}

/// One negative-cache record: how often the lookup has failed, and when it
/// becomes eligible for another attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub failures: u32,
    pub next: DateTime<Utc>,
}

fn backoff() -> TimeDelta {
    TimeDelta::days(1)
}

/// Negative-result cache with debounced backoff.
///
/// Entries are created on first failure and only ever mutated by the backoff
/// rule: a repeated failure before `next` is a no-op, a failure at or after
/// `next` increments the count and pushes `next` out another day. Past the
/// retry threshold an entry is permanent. Every mutation is flushed to the
/// store before the call returns.
#[derive(Debug)]
pub struct BlacklistCache {
    file: StoreFile,
    sections: [BTreeMap<String, BlacklistEntry>; 3],
}

impl BlacklistCache {
    /// Load from the store, repairing structure as needed. A missing or
    /// foreign-format file yields an empty, usable cache.
    pub fn load(file: StoreFile) -> Self {
        let sections = match file.load() {
            Some(value) => Self::repair(value, Utc::now()),
            None => Default::default(),
        };
        Self { file, sections }
    }

    /// Validate a loaded document: missing sections are recreated empty and
    /// entries that are not well-formed records are reset to a fresh default
    /// rather than rejected, discarding only the unparseable history.
    fn repair(value: Value, now: DateTime<Utc>) -> [BTreeMap<String, BlacklistEntry>; 3] {
        let mut sections: [BTreeMap<String, BlacklistEntry>; 3] = Default::default();
        let Value::Object(root) = value else {
            return sections;
        };

        for kind in QueryKind::ALL {
            let Some(Value::Object(section)) = root.get(kind.as_str()) else {
                continue;
            };
            for (key, raw) in section {
                let entry = Self::repair_entry(kind, key, raw, now);
                sections[kind.index()].insert(key.clone(), entry);
            }
        }

        sections
    }

    fn repair_entry(
        kind: QueryKind,
        key: &str,
        raw: &Value,
        now: DateTime<Utc>,
    ) -> BlacklistEntry {
        let Value::Object(fields) = raw else {
            debug!(kind = kind.as_str(), key, "reset malformed blacklist entry");
            return BlacklistEntry { failures: 1, next: now };
        };

        let failures = match fields.get("failures").and_then(Value::as_u64) {
            Some(n) => u32::try_from(n).unwrap_or(u32::MAX),
            None => {
                debug!(kind = kind.as_str(), key, "reset failures for blacklist entry");
                1
            }
        };

        let next = match fields
            .get("next")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        {
            Some(next) => next.with_timezone(&Utc),
            None => {
                debug!(kind = kind.as_str(), key, "reset next for blacklist entry");
                now
            }
        };

        BlacklistEntry { failures, next }
    }

    pub fn is_blacklisted(&self, kind: QueryKind, key: &str, retry_threshold: u32) -> bool {
        self.is_blacklisted_at(kind, key, retry_threshold, Utc::now())
    }

    pub(crate) fn is_blacklisted_at(
        &self,
        kind: QueryKind,
        key: &str,
        retry_threshold: u32,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(entry) = self.sections[kind.index()].get(key) else {
            return false;
        };

        // Past the threshold the entry is permanent, regardless of `next`.
        if entry.failures > retry_threshold {
            return true;
        }

        now < entry.next
    }

    pub fn record_failure(&mut self, kind: QueryKind, key: &str) -> Result<(), StoreError> {
        self.record_failure_at(kind, key, Utc::now())
    }

    pub(crate) fn record_failure_at(
        &mut self,
        kind: QueryKind,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let next = now + backoff();
        match self.sections[kind.index()].get_mut(key) {
            Some(entry) if now >= entry.next => {
                entry.failures += 1;
                entry.next = next;
            }
            // Repeated failures within the waiting window are debounced and
            // do not inflate the count.
            Some(_) => return Ok(()),
            None => {
                self.sections[kind.index()]
                    .insert(key.to_owned(), BlacklistEntry { failures: 1, next });
            }
        }

        self.flush()
    }

    pub fn entries(
        &self,
        kind: QueryKind,
    ) -> impl Iterator<Item = (&str, &BlacklistEntry)> {
        self.sections[kind.index()]
            .iter()
            .map(|(key, entry)| (key.as_str(), entry))
    }

    fn flush(&self) -> Result<(), StoreError> {
        let mut root = serde_json::Map::new();
        for kind in QueryKind::ALL {
            root.insert(
                kind.as_str().to_owned(),
                serde_json::to_value(&self.sections[kind.index()])?,
            );
        }
        self.file.save(&Value::Object(root))
    }
}
