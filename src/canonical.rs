use tracing::debug;

use crate::tables::HeaderSynonyms;
use crate::types::{CanonicalField, Provenance};

/// What a single source header turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderTarget {
    Canonical(CanonicalField, Provenance),
    /// Not part of the schema; source spelling is preserved.
    Passthrough(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderEntry {
    pub raw: String,
    pub target: HeaderTarget,
}

/// Header mapping in source column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HeaderMapping {
    pub entries: Vec<HeaderEntry>,
}

impl HeaderMapping {
    pub fn get(&self, raw: &str) -> Option<&HeaderTarget> {
        self.entries.iter().find(|e| e.raw == raw).map(|e| &e.target)
    }

    /// Canonical name for `raw`, or `raw` itself when it is not recognized.
    pub fn canonical_name(&self, raw: &str) -> Option<String> {
        self.get(raw).map(|t| match t {
            HeaderTarget::Canonical(f, _) => f.name().to_string(),
            HeaderTarget::Passthrough(s) => s.clone(),
        })
    }

    /// Column indices mapped to `field`, left to right, with how they matched.
    pub fn columns_for(&self, field: CanonicalField) -> impl Iterator<Item = (usize, Provenance)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(move |(idx, e)| match e.target {
                HeaderTarget::Canonical(f, p) if f == field => Some((idx, p)),
                _ => None,
            })
    }

    /// Canonical field claimed by column `idx`, if any.
    pub fn field_at(&self, idx: usize) -> Option<CanonicalField> {
        match self.entries.get(idx).map(|e| &e.target) {
            Some(HeaderTarget::Canonical(f, _)) => Some(*f),
            _ => None,
        }
    }
}

/// Lowercase, trim, spell out `#` as "number", turn underscores into
/// spaces and collapse runs of whitespace.
pub fn normalize_header(raw: &str) -> String {
    let replaced = raw
        .trim()
        .to_lowercase()
        .replace('#', " number ")
        .replace('_', " ");
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Map every header onto the canonical schema. Pure: no I/O, no errors.
pub fn canonicalize(headers: &[String], synonyms: &HeaderSynonyms) -> HeaderMapping {
    let entries = headers
        .iter()
        .map(|raw| {
            let key = normalize_header(raw);
            let exact = CanonicalField::ALL
                .iter()
                .copied()
                .find(|f| f.name().to_lowercase() == key);
            let target = match exact {
                Some(f) => HeaderTarget::Canonical(f, Provenance::Header),
                None => match synonyms.lookup(&key) {
                    Some(f) => HeaderTarget::Canonical(f, Provenance::Synonym),
                    None => HeaderTarget::Passthrough(raw.clone()),
                },
            };
            debug!(header = %raw, normalized = %key, ?target, "header mapped");
            HeaderEntry {
                raw: raw.clone(),
                target,
            }
        })
        .collect();
    HeaderMapping { entries }
}
