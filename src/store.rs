//! Store-access seam used by the aggregator, snapshot writer and analytics
//! views. `db::PgStore` is the production implementation.

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AnswerRecord, CohortAnalysis, CohortResult, ServiceCategory, SurveyScoreRecord, TicketRecord,
};
use crate::period::{Period, TimeRange};

#[cfg(test)]
pub mod memory;

#[derive(Debug, Clone, Copy, Default)]
pub struct TicketFilter {
    pub created: Option<TimeRange>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreFilter {
    /// Restricts on the creation time of the ticket the response belongs to.
    pub ticket_created: Option<TimeRange>,
    /// Restricts on the submission time of the response itself.
    pub submitted: Option<TimeRange>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotFilter {
    pub category_id: Option<Uuid>,
    pub from: Option<Period>,
    pub to: Option<Period>,
}

#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<ServiceCategory>>;

    async fn fetch_tickets(&self, filter: &TicketFilter) -> Result<Vec<TicketRecord>>;

    async fn fetch_survey_scores(&self, filter: &ScoreFilter) -> Result<Vec<SurveyScoreRecord>>;

    /// Answers of responses submitted inside `filter.submitted`.
    async fn fetch_survey_answers(&self, filter: &ScoreFilter) -> Result<Vec<AnswerRecord>>;

    /// Upserts `rows` and removes stale rows for the same period (and
    /// category, when given) in one transaction. Rows whose values did not
    /// change keep their timestamps.
    async fn replace_cohort_snapshots(
        &self,
        period: Period,
        category_id: Option<Uuid>,
        rows: &[CohortResult],
    ) -> Result<Vec<CohortAnalysis>>;

    async fn fetch_cohort_snapshots(&self, filter: &SnapshotFilter) -> Result<Vec<CohortAnalysis>>;
}

/// Looks up a category by UUID or case-insensitive name.
pub async fn find_category(
    store: &dyn AnalyticsStore,
    key: &str,
) -> Result<Option<ServiceCategory>> {
    let key = key.trim();
    let categories = store.list_categories().await?;

    if let Ok(id) = Uuid::parse_str(key) {
        return Ok(categories.into_iter().find(|category| category.id == id));
    }

    Ok(categories
        .into_iter()
        .find(|category| category.name.eq_ignore_ascii_case(key)))
}

/// Outcome of resolving an optional `--category` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryScope {
    All,
    Only(Uuid),
    /// A category was requested but does not exist; callers answer with an
    /// empty result.
    Missing,
}

impl CategoryScope {
    pub async fn resolve(store: &dyn AnalyticsStore, category: Option<&str>) -> Result<Self> {
        let Some(key) = category else {
            return Ok(Self::All);
        };

        match find_category(store, key).await? {
            Some(found) => Ok(Self::Only(found.id)),
            None => {
                warn!(category = key, "unknown service category");
                Ok(Self::Missing)
            }
        }
    }
}
