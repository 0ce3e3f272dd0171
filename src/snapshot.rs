use chrono::FixedOffset;
use tracing::{info, instrument};

use crate::aggregator::compute_scoped;
use crate::error::Result;
use crate::models::CohortAnalysis;
use crate::period::Period;
use crate::store::{AnalyticsStore, CategoryScope, SnapshotFilter};

/// Recomputes the cohort for `period` and overwrites the stored snapshot.
///
/// The whole cohort is computed before anything is written, so a failed
/// read leaves the stored rows untouched.
#[instrument(skip(store, period), fields(period = %period))]
pub async fn save_cohort(
    store: &dyn AnalyticsStore,
    period: Period,
    offset: FixedOffset,
    category: Option<&str>,
) -> Result<Vec<CohortAnalysis>> {
    let category_id = match CategoryScope::resolve(store, category).await? {
        CategoryScope::All => None,
        CategoryScope::Only(id) => Some(id),
        CategoryScope::Missing => return Ok(Vec::new()),
    };

    let results = compute_scoped(store, period, offset, category_id).await?;
    let stored = store
        .replace_cohort_snapshots(period, category_id, &results)
        .await?;

    info!(rows = stored.len(), "cohort snapshot saved");
    Ok(stored)
}

pub async fn cohort_history(
    store: &dyn AnalyticsStore,
    category: Option<&str>,
    from: Option<Period>,
    to: Option<Period>,
) -> Result<Vec<CohortAnalysis>> {
    let category_id = match CategoryScope::resolve(store, category).await? {
        CategoryScope::All => None,
        CategoryScope::Only(id) => Some(id),
        CategoryScope::Missing => return Ok(Vec::new()),
    };

    let mut rows = store
        .fetch_cohort_snapshots(&SnapshotFilter {
            category_id,
            from,
            to,
        })
        .await?;
    rows.sort_by(|a, b| {
        (a.period, &a.category_name, &a.user_type).cmp(&(b.period, &b.category_name, &b.user_type))
    });
    Ok(rows)
}
