// Immutable lookup tables: work-order type codes and header synonyms.
//
// Both are built once at startup (built-in defaults plus whatever the config
// file adds) and then handed to the pipeline by reference. Nothing mutates
// them after construction.
use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::canonical::normalize_header;
use crate::types::CanonicalField;

static BUILTIN_TYPE_CODES: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("1", "Maintenance Order"),
        ("2", "Preventive Maintenance"),
        ("3", "Corrective Maintenance"),
        ("4", "Urgent Corrective"),
        ("5", "Calibration"),
        ("6", "Inspection"),
        ("7", "Project Work"),
        ("8", "Safety"),
    ]
});

static BUILTIN_SYNONYMS: Lazy<Vec<(&'static str, CanonicalField)>> = Lazy::new(|| {
    use CanonicalField::*;
    vec![
        ("name", Name),
        ("employee", Name),
        ("employee name", Name),
        ("technician", Name),
        ("tech name", Name),
        ("full name", Name),
        ("work order", WorkOrderNumber),
        ("work order number", WorkOrderNumber),
        ("work order no", WorkOrderNumber),
        ("workorder", WorkOrderNumber),
        ("workorder number", WorkOrderNumber),
        ("wo", WorkOrderNumber),
        ("wo number", WorkOrderNumber),
        ("order", WorkOrderNumber),
        ("order number", WorkOrderNumber),
        ("hours", Hours),
        ("total hours", Hours),
        ("labor hours", Hours),
        ("actual hours", Hours),
        ("hrs", Hours),
        ("time hours", Hours),
        ("time", Hours),
        ("duration hours", Hours),
        ("type", Type),
        ("wo type", Type),
        ("work order type", Type),
        ("order type", Type),
        ("cost center", CostCenter),
        ("costcenter", CostCenter),
        ("cost centre", CostCenter),
        ("cost center number", CostCenter),
        ("description", Description),
        ("desc", Description),
        ("wo description", Description),
        ("work order description", Description),
        ("problem", Problem),
        ("problem description", Problem),
        ("problem code", Problem),
        ("production date", ProductionDate),
        ("prod date", ProductionDate),
        ("date", ProductionDate),
        ("work date", ProductionDate),
        ("posting date", ProductionDate),
        ("craft", Craft),
        ("craft description", Craft),
        ("trade", Craft),
        ("department", Craft),
    ]
});

/// Single-character work-order type codes and their display labels.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeCodeTable {
    labels: HashMap<String, String>,
}

impl Default for TypeCodeTable {
    fn default() -> Self {
        Self::from_pairs(BUILTIN_TYPE_CODES.iter().map(|(c, l)| (c.to_string(), l.to_string())))
    }
}

impl TypeCodeTable {
    pub fn from_pairs<I: IntoIterator<Item = (String, String)>>(pairs: I) -> Self {
        Self {
            labels: pairs
                .into_iter()
                .map(|(code, label)| (code.trim().to_string(), label))
                .collect(),
        }
    }

    /// Built-in table with extra entries layered on top; extras win.
    pub fn with_overrides<I: IntoIterator<Item = (String, String)>>(mut self, extra: I) -> Self {
        for (code, label) in extra {
            self.labels.insert(code.trim().to_string(), label);
        }
        self
    }

    /// Label for `raw`, or `None` when the value is not a known code.
    pub fn resolve(&self, raw: &str) -> Option<&str> {
        self.labels.get(raw.trim()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Normalized header text → canonical field.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderSynonyms {
    map: HashMap<String, CanonicalField>,
}

impl Default for HeaderSynonyms {
    fn default() -> Self {
        Self::from_pairs(BUILTIN_SYNONYMS.iter().map(|(k, f)| (k.to_string(), *f)))
    }
}

impl HeaderSynonyms {
    /// Keys are run through the same normalization as incoming headers, so
    /// `"WO #"` and `"wo number"` register the same entry.
    pub fn from_pairs<I: IntoIterator<Item = (String, CanonicalField)>>(pairs: I) -> Self {
        Self {
            map: pairs
                .into_iter()
                .map(|(k, f)| (normalize_header(&k), f))
                .collect(),
        }
    }

    pub fn with_overrides<I: IntoIterator<Item = (String, CanonicalField)>>(
        mut self,
        extra: I,
    ) -> Self {
        for (k, f) in extra {
            self.map.insert(normalize_header(&k), f);
        }
        self
    }

    /// Look up an already-normalized key.
    pub fn lookup(&self, normalized: &str) -> Option<CanonicalField> {
        self.map.get(normalized).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
