use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

use crate::types::{
    AggregateRow, CanonicalField, CanonicalRow, DateSelection, HoursRow, Rate, Totals, ALL_GROUP,
};
use crate::util::round2;

/// Aggregate rows plus their grand totals.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Aggregation {
    pub rows: Vec<AggregateRow>,
    pub totals: Totals,
}

impl Aggregation {
    /// Re-apply a rate to the stored hours. Grouping is not redone.
    pub fn reprice(&self, rate: Rate) -> Aggregation {
        let rows: Vec<AggregateRow> = self
            .rows
            .iter()
            .map(|r| AggregateRow {
                cost: rate.cost_for(r.hours),
                ..r.clone()
            })
            .collect();
        let totals = totals_for(&rows);
        Aggregation { rows, totals }
    }
}

/// Keep rows whose production date is in the selection.
///
/// Without any known dates there is nothing to select on, so the whole set
/// comes back as the single implicit "All Data" bucket.
pub fn filter_by_dates(rows: &[CanonicalRow], selection: &DateSelection) -> Vec<CanonicalRow> {
    let DateSelection::Only(dates) = selection else {
        return rows.to_vec();
    };
    if !rows.iter().any(|r| r.production_date.date().is_some()) {
        if !rows.is_empty() {
            warn!(
                selected = dates.len(),
                "no production dates in data; date selection ignored"
            );
        }
        return rows.to_vec();
    }
    rows.iter()
        .filter(|r| {
            r.production_date
                .date()
                .map(|d| dates.contains(&d))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// Distinct known production dates, oldest first.
pub fn available_dates(rows: &[CanonicalRow]) -> Vec<NaiveDate> {
    rows.iter()
        .filter_map(|r| r.production_date.date())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// `2025-03-14 (Fri)`
pub fn date_label(d: NaiveDate) -> String {
    d.format("%Y-%m-%d (%a)").to_string()
}

/// Sum hours per key tuple.
///
/// The last field in `group_by` is the inner key; the fields before it form
/// the outer group that percentages are relative to. Outer groups keep
/// first-seen order; inner keys are sorted by hours, descending, with ties
/// left in first-seen order.
pub fn aggregate_hours(rows: &[CanonicalRow], group_by: &[CanonicalField]) -> Vec<HoursRow> {
    struct InnerAcc {
        key: String,
        hours: f64,
    }
    struct OuterAcc {
        key: Vec<String>,
        inner: Vec<InnerAcc>,
        index: HashMap<String, usize>,
    }

    let mut outers: Vec<OuterAcc> = Vec::new();
    let mut outer_index: HashMap<Vec<String>, usize> = HashMap::new();

    for row in rows {
        let mut full: Vec<String> = group_by.iter().map(|f| row.key_for(*f)).collect();
        if full.is_empty() {
            full.push(ALL_GROUP.to_string());
        }
        // `full` always has at least one element, so `pop` cannot fail here.
        let inner_key = full.pop().unwrap_or_default();
        let outer_key = full;

        let oi = match outer_index.get(&outer_key) {
            Some(i) => *i,
            None => {
                outers.push(OuterAcc {
                    key: outer_key.clone(),
                    inner: Vec::new(),
                    index: HashMap::new(),
                });
                outer_index.insert(outer_key, outers.len() - 1);
                outers.len() - 1
            }
        };
        let outer = &mut outers[oi];
        let ii = match outer.index.get(&inner_key) {
            Some(i) => *i,
            None => {
                outer.inner.push(InnerAcc {
                    key: inner_key.clone(),
                    hours: 0.0,
                });
                outer.index.insert(inner_key, outer.inner.len() - 1);
                outer.inner.len() - 1
            }
        };
        outer.inner[ii].hours += row.hours;
    }

    let mut out = Vec::new();
    for mut outer in outers {
        let total: f64 = outer.inner.iter().map(|i| i.hours).sum();
        // `sort_by` is stable, which keeps ties in insertion order.
        outer
            .inner
            .sort_by(|a, b| b.hours.partial_cmp(&a.hours).unwrap_or(Ordering::Equal));
        for inner in outer.inner {
            let percent_of_group = if total > 0.0 {
                100.0 * inner.hours / total
            } else {
                0.0
            };
            let mut key = outer.key.clone();
            key.push(inner.key);
            out.push(HoursRow {
                key,
                hours: round2(inner.hours),
                percent_of_group,
            });
        }
    }
    out
}

/// Apply a rate to already-summed hours.
pub fn price(hours: &[HoursRow], rate: Rate) -> Vec<AggregateRow> {
    hours
        .iter()
        .map(|h| AggregateRow {
            key: h.key.clone(),
            hours: h.hours,
            percent_of_group: h.percent_of_group,
            cost: rate.cost_for(h.hours),
        })
        .collect()
}

pub fn aggregate(rows: &[CanonicalRow], group_by: &[CanonicalField], rate: Rate) -> Aggregation {
    let priced = price(&aggregate_hours(rows, group_by), rate);
    let totals = totals_for(&priced);
    Aggregation {
        rows: priced,
        totals,
    }
}

pub fn totals_for(rows: &[AggregateRow]) -> Totals {
    Totals {
        hours: round2(rows.iter().map(|r| r.hours).sum()),
        cost: round2(rows.iter().map(|r| r.cost).sum()),
    }
}
