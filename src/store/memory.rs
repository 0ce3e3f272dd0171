use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{AnalyticsStore, ScoreFilter, SnapshotFilter, TicketFilter};
use crate::error::{AnalyticsError, Result};
use crate::models::{
    AnswerRecord, CohortAnalysis, CohortResult, ServiceCategory, SurveyScoreRecord, TicketRecord,
};
use crate::period::Period;

/// In-memory store for unit tests.
#[derive(Default)]
pub struct MemoryStore {
    pub categories: Vec<ServiceCategory>,
    pub tickets: Vec<TicketRecord>,
    pub scores: Vec<SurveyScoreRecord>,
    pub answers: Vec<(DateTime<Utc>, Uuid, AnswerRecord)>,
    snapshots: Mutex<Vec<CohortAnalysis>>,
    unavailable: AtomicBool,
}

pub fn at(timestamp: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(timestamp)
        .expect("valid rfc3339 timestamp")
        .with_timezone(&Utc)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_category(&mut self, name: &str) -> ServiceCategory {
        let category = ServiceCategory {
            id: Uuid::new_v4(),
            name: name.to_string(),
            requires_login: true,
        };
        self.categories.push(category.clone());
        category
    }

    pub fn add_ticket(
        &mut self,
        category: &ServiceCategory,
        user_type: &str,
        status: &str,
        created_at: &str,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.tickets.push(TicketRecord {
            id,
            ticket_number: format!("TKT-{}", self.tickets.len() + 1),
            status: status.to_string(),
            category_id: category.id,
            category_name: category.name.clone(),
            user_type: user_type.to_string(),
            is_guest: false,
            created_at: at(created_at),
            resolved_at: None,
        });
        id
    }

    pub fn ticket_mut(&mut self, id: Uuid) -> &mut TicketRecord {
        self.tickets
            .iter_mut()
            .find(|ticket| ticket.id == id)
            .expect("ticket exists")
    }

    pub fn add_score(&mut self, ticket_id: Uuid, score: f64, submitted_at: &str) {
        self.scores.push(SurveyScoreRecord {
            response_id: Uuid::new_v4(),
            ticket_id,
            submitted_at: at(submitted_at),
            satisfaction_score: score,
        });
    }

    pub fn add_answer(&mut self, category_id: Uuid, submitted_at: &str, answer: AnswerRecord) {
        self.answers.push((at(submitted_at), category_id, answer));
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn stored_snapshots(&self) -> Vec<CohortAnalysis> {
        self.snapshots.lock().expect("snapshot lock").clone()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AnalyticsError::StoreUnavailable(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn ticket(&self, id: Uuid) -> Option<&TicketRecord> {
        self.tickets.iter().find(|ticket| ticket.id == id)
    }
}

#[async_trait]
impl AnalyticsStore for MemoryStore {
    async fn list_categories(&self) -> Result<Vec<ServiceCategory>> {
        self.check_available()?;
        let mut categories = self.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn fetch_tickets(&self, filter: &TicketFilter) -> Result<Vec<TicketRecord>> {
        self.check_available()?;
        Ok(self
            .tickets
            .iter()
            .filter(|ticket| filter.created.map_or(true, |range| range.contains(ticket.created_at)))
            .filter(|ticket| filter.category_id.map_or(true, |id| ticket.category_id == id))
            .cloned()
            .collect())
    }

    async fn fetch_survey_scores(&self, filter: &ScoreFilter) -> Result<Vec<SurveyScoreRecord>> {
        self.check_available()?;
        Ok(self
            .scores
            .iter()
            .filter(|score| match filter.category_id {
                None => true,
                Some(id) => self
                    .ticket(score.ticket_id)
                    .map_or(false, |ticket| ticket.category_id == id),
            })
            .filter(|score| {
                filter
                    .submitted
                    .map_or(true, |range| range.contains(score.submitted_at))
            })
            .filter(|score| match filter.ticket_created {
                None => true,
                Some(range) => self
                    .ticket(score.ticket_id)
                    .map_or(false, |ticket| range.contains(ticket.created_at)),
            })
            .cloned()
            .collect())
    }

    async fn fetch_survey_answers(&self, filter: &ScoreFilter) -> Result<Vec<AnswerRecord>> {
        self.check_available()?;
        Ok(self
            .answers
            .iter()
            .filter(|(_, category_id, _)| filter.category_id.map_or(true, |id| *category_id == id))
            .filter(|(submitted_at, _, _)| {
                filter
                    .submitted
                    .map_or(true, |range| range.contains(*submitted_at))
            })
            .map(|(_, _, answer)| answer.clone())
            .collect())
    }

    async fn replace_cohort_snapshots(
        &self,
        period: Period,
        category_id: Option<Uuid>,
        rows: &[CohortResult],
    ) -> Result<Vec<CohortAnalysis>> {
        self.check_available()?;
        let now = Utc::now();
        let mut snapshots = self.snapshots.lock().expect("snapshot lock");

        for row in rows {
            let existing = snapshots.iter_mut().find(|stored| {
                stored.period == row.period
                    && stored.category_id == row.category_id
                    && stored.user_type == row.user_type
            });

            match existing {
                Some(stored) => {
                    let changed = stored.usage_count != row.usage_count
                        || stored.response_count != row.response_count
                        || stored.average_satisfaction != row.average_satisfaction;
                    if changed {
                        stored.usage_count = row.usage_count;
                        stored.response_count = row.response_count;
                        stored.average_satisfaction = row.average_satisfaction;
                        stored.updated_at = now;
                    }
                }
                None => snapshots.push(CohortAnalysis {
                    id: Uuid::new_v4(),
                    period: row.period,
                    category_id: row.category_id,
                    category_name: row.category_name.clone(),
                    user_type: row.user_type.clone(),
                    usage_count: row.usage_count,
                    response_count: row.response_count,
                    average_satisfaction: row.average_satisfaction,
                    created_at: now,
                    updated_at: now,
                }),
            }
        }

        let in_scope = |stored: &CohortAnalysis| {
            stored.period == period && category_id.map_or(true, |id| stored.category_id == id)
        };
        snapshots.retain(|stored| {
            !in_scope(stored)
                || rows.iter().any(|row| {
                    row.category_id == stored.category_id && row.user_type == stored.user_type
                })
        });

        let mut written: Vec<CohortAnalysis> =
            snapshots.iter().filter(|stored| in_scope(stored)).cloned().collect();
        written.sort_by(|a, b| {
            (&a.category_name, &a.user_type).cmp(&(&b.category_name, &b.user_type))
        });
        Ok(written)
    }

    async fn fetch_cohort_snapshots(&self, filter: &SnapshotFilter) -> Result<Vec<CohortAnalysis>> {
        self.check_available()?;
        let snapshots = self.snapshots.lock().expect("snapshot lock");
        Ok(snapshots
            .iter()
            .filter(|stored| filter.category_id.map_or(true, |id| stored.category_id == id))
            .filter(|stored| filter.from.map_or(true, |from| stored.period >= from))
            .filter(|stored| filter.to.map_or(true, |to| stored.period <= to))
            .cloned()
            .collect())
    }
}
