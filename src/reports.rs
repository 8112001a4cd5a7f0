use std::collections::HashMap;
use tracing::info;

use crate::aggregate::{aggregate, Aggregation};
use crate::types::{
    AggregateRow, CanonicalField, CanonicalRow, Rate, ReportGroup, ReportPayload, SummaryMetrics,
    TopEntry, ALL_GROUP,
};

/// Build the sectioned report.
///
/// One section per distinct `group_by` value in first-seen order, or a single
/// `All` section when there is no grouping field. Each section carries its
/// detail rows, the `breakdown_by` aggregate and its totals.
pub fn assemble(
    rows: &[CanonicalRow],
    group_by: Option<CanonicalField>,
    breakdown_by: CanonicalField,
    rate: Rate,
) -> ReportPayload {
    let mut sections: Vec<(String, Vec<CanonicalRow>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in rows {
        let key = match group_by {
            Some(field) => row.key_for(field),
            None => ALL_GROUP.to_string(),
        };
        match index.get(&key) {
            Some(i) => sections[*i].1.push(row.clone()),
            None => {
                index.insert(key.clone(), sections.len());
                sections.push((key, vec![row.clone()]));
            }
        }
    }

    let groups: Vec<ReportGroup> = sections
        .into_iter()
        .map(|(key, members)| {
            let Aggregation { rows: aggregate_rows, totals } =
                aggregate(&members, &[breakdown_by], rate);
            ReportGroup {
                key,
                detail: members.iter().map(CanonicalRow::to_detail).collect(),
                aggregate: aggregate_rows,
                totals,
            }
        })
        .collect();

    // Concatenation in group order; zero groups leaves it empty.
    let full_detail = groups
        .iter()
        .flat_map(|g| g.detail.iter().cloned())
        .collect();

    info!(
        groups = groups.len(),
        rows = rows.len(),
        rate = rate.value(),
        "report assembled"
    );

    ReportPayload {
        group_field: group_by,
        breakdown_field: breakdown_by,
        rate: rate.value(),
        groups,
        full_detail,
        summary: summarize(rows, rate),
    }
}

/// Total hours, total cost and the top type by hours over the whole set.
pub fn summarize(rows: &[CanonicalRow], rate: Rate) -> SummaryMetrics {
    summary_from(aggregate(rows, &[CanonicalField::Type], rate))
}

fn summary_from(by_type: Aggregation) -> SummaryMetrics {
    let top_type = by_type.rows.first().map(|r| TopEntry {
        label: r.label().to_string(),
        hours: r.hours,
        percent: r.percent_of_group,
    });
    SummaryMetrics {
        total_hours: by_type.totals.hours,
        total_cost: by_type.totals.cost,
        top_type,
        by_type: by_type.rows,
    }
}

impl ReportPayload {
    /// Same report at a different rate. Hours, percentages and ordering are
    /// reused as they are; only costs and cost totals change.
    pub fn reprice(&self, rate: Rate) -> ReportPayload {
        let groups = self
            .groups
            .iter()
            .map(|g| {
                let repriced = Aggregation {
                    rows: g.aggregate.clone(),
                    totals: g.totals,
                }
                .reprice(rate);
                ReportGroup {
                    key: g.key.clone(),
                    detail: g.detail.clone(),
                    aggregate: repriced.rows,
                    totals: repriced.totals,
                }
            })
            .collect();
        let by_type = Aggregation {
            rows: self.summary.by_type.clone(),
            totals: Default::default(),
        }
        .reprice(rate);
        ReportPayload {
            group_field: self.group_field,
            breakdown_field: self.breakdown_field,
            rate: rate.value(),
            groups,
            full_detail: self.full_detail.clone(),
            summary: summary_from(by_type),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Every aggregate row of every section, in section order.
    pub fn all_aggregate_rows(&self) -> impl Iterator<Item = (&str, &AggregateRow)> + '_ {
        self.groups
            .iter()
            .flat_map(|g| g.aggregate.iter().map(move |r| (g.key.as_str(), r)))
    }
}
