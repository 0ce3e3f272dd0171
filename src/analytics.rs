//! Read-only analytics views.
//!
//! Each view is a pure function over flat records plus a thin async wrapper
//! that loads those records from an [`AnalyticsStore`] for an optional window.

use std::collections::{BTreeMap, HashMap};

use chrono::FixedOffset;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    is_terminal_status, mean_score, AnswerRecord, DashboardSummary, EntityCount, OptionTally,
    QuestionBreakdown, ResolutionTimeStats, SatisfactionPoint, ServiceTrendPoint, StatusCount,
    SurveyScoreRecord, TicketRecord, TopIssue,
};
use crate::period::{Period, TimeRange};
use crate::store::{AnalyticsStore, CategoryScope, ScoreFilter, TicketFilter};

pub const DEFAULT_TOP_ISSUES: usize = 5;

pub fn ticket_status_stats(tickets: &[TicketRecord]) -> Vec<StatusCount> {
    let mut counts: HashMap<String, i64> = HashMap::new();

    for ticket in tickets {
        *counts.entry(ticket.status.trim().to_lowercase()).or_insert(0) += 1;
    }

    let mut stats: Vec<StatusCount> = counts
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect();
    stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.status.cmp(&b.status)));
    stats
}

pub fn user_entity_stats(tickets: &[TicketRecord]) -> Vec<EntityCount> {
    let mut counts: HashMap<&str, (i64, i64)> = HashMap::new();

    for ticket in tickets {
        let entry = counts.entry(ticket.user_type.as_str()).or_insert((0, 0));
        if ticket.is_guest {
            entry.1 += 1;
        } else {
            entry.0 += 1;
        }
    }

    let mut stats: Vec<EntityCount> = counts
        .into_iter()
        .map(|(user_type, (registered, guest))| EntityCount {
            user_type: user_type.to_string(),
            registered,
            guest,
            total: registered + guest,
        })
        .collect();
    stats.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.user_type.cmp(&b.user_type)));
    stats
}

/// Mean satisfaction per month of submission. Months without responses are
/// left out.
pub fn satisfaction_trend(
    scores: &[SurveyScoreRecord],
    offset: FixedOffset,
) -> Vec<SatisfactionPoint> {
    let mut months: BTreeMap<Period, Vec<f64>> = BTreeMap::new();

    for score in scores {
        months
            .entry(Period::containing(score.submitted_at, offset))
            .or_default()
            .push(score.satisfaction_score);
    }

    months
        .into_iter()
        .filter_map(|(period, values)| {
            let response_count = values.len() as i64;
            mean_score(values).map(|average_satisfaction| SatisfactionPoint {
                period,
                response_count,
                average_satisfaction,
            })
        })
        .collect()
}

/// Categories by ticket volume, ties broken alphabetically.
pub fn top_issues(tickets: &[TicketRecord], limit: Option<usize>) -> Vec<TopIssue> {
    let mut counts: HashMap<Uuid, TopIssue> = HashMap::new();

    for ticket in tickets {
        counts
            .entry(ticket.category_id)
            .or_insert_with(|| TopIssue {
                category_id: ticket.category_id,
                category_name: ticket.category_name.clone(),
                ticket_count: 0,
            })
            .ticket_count += 1;
    }

    let mut issues: Vec<TopIssue> = counts.into_values().collect();
    issues.sort_by(|a, b| {
        b.ticket_count
            .cmp(&a.ticket_count)
            .then_with(|| a.category_name.cmp(&b.category_name))
            .then_with(|| a.category_id.cmp(&b.category_id))
    });

    if let Some(limit) = limit {
        issues.truncate(limit);
    }
    issues
}

/// Hours from creation to resolution for tickets in a terminal status.
/// Open tickets and terminal tickets without a resolution timestamp are
/// excluded.
pub fn resolution_time_stats(tickets: &[TicketRecord]) -> ResolutionTimeStats {
    let mut hours: Vec<f64> = Vec::new();

    for ticket in tickets {
        if !is_terminal_status(&ticket.status) {
            continue;
        }
        let Some(resolved_at) = ticket.resolved_at else {
            continue;
        };
        let elapsed = resolved_at - ticket.created_at;
        if elapsed < chrono::Duration::zero() {
            debug!(ticket = %ticket.ticket_number, "resolved before creation, skipping");
            continue;
        }
        hours.push(elapsed.num_seconds() as f64 / 3600.0);
    }

    if hours.is_empty() {
        return ResolutionTimeStats {
            resolved_count: 0,
            min_hours: None,
            max_hours: None,
            mean_hours: None,
            median_hours: None,
        };
    }

    hours.sort_by(|a, b| a.total_cmp(b));
    let count = hours.len();
    let median = if count % 2 == 0 {
        (hours[count / 2 - 1] + hours[count / 2]) / 2.0
    } else {
        hours[count / 2]
    };

    ResolutionTimeStats {
        resolved_count: count as i64,
        min_hours: hours.first().copied(),
        max_hours: hours.last().copied(),
        mean_hours: Some(hours.iter().sum::<f64>() / count as f64),
        median_hours: Some(median),
    }
}

pub fn service_trends(tickets: &[TicketRecord], offset: FixedOffset) -> Vec<ServiceTrendPoint> {
    let mut counts: BTreeMap<(Period, &str), i64> = BTreeMap::new();

    for ticket in tickets {
        let period = Period::containing(ticket.created_at, offset);
        *counts
            .entry((period, ticket.category_name.as_str()))
            .or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|((period, category_name), ticket_count)| ServiceTrendPoint {
            period,
            category_name: category_name.to_string(),
            ticket_count,
        })
        .collect()
}

pub fn question_breakdown(answers: &[AnswerRecord]) -> Vec<QuestionBreakdown> {
    let mut questions: HashMap<Uuid, (QuestionBreakdown, HashMap<String, i64>)> = HashMap::new();

    for answer in answers {
        let (breakdown, tallies) = questions.entry(answer.question_id).or_insert_with(|| {
            (
                QuestionBreakdown {
                    questionnaire_title: answer.questionnaire_title.clone(),
                    question_id: answer.question_id,
                    question_text: answer.question_text.clone(),
                    question_type: answer.question_type.clone(),
                    order_number: answer.order_number,
                    answer_count: 0,
                    options: Vec::new(),
                },
                HashMap::new(),
            )
        });

        breakdown.answer_count += 1;
        let value = answer.answer_value.trim();
        if !value.is_empty() {
            *tallies.entry(value.to_string()).or_insert(0) += 1;
        }
    }

    let mut breakdowns: Vec<QuestionBreakdown> = questions
        .into_values()
        .map(|(mut breakdown, tallies)| {
            let mut options: Vec<OptionTally> = tallies
                .into_iter()
                .map(|(value, count)| OptionTally { value, count })
                .collect();
            options.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
            breakdown.options = options;
            breakdown
        })
        .collect();

    breakdowns.sort_by(|a, b| {
        (&a.questionnaire_title, a.order_number, a.question_id).cmp(&(
            &b.questionnaire_title,
            b.order_number,
            b.question_id,
        ))
    });
    breakdowns
}

/// Composes the dashboard from already computed views. The overall mean
/// is taken over the raw scores, not rebuilt from the monthly averages.
pub fn dashboard_summary(
    ticket_status: Vec<StatusCount>,
    user_entities: Vec<EntityCount>,
    satisfaction_trend: Vec<SatisfactionPoint>,
    top_issues: Vec<TopIssue>,
    resolution_time: ResolutionTimeStats,
    overall_satisfaction: Option<f64>,
) -> DashboardSummary {
    let total_tickets = ticket_status.iter().map(|status| status.count).sum();

    DashboardSummary {
        total_tickets,
        overall_satisfaction,
        ticket_status,
        user_entities,
        satisfaction_trend,
        top_issues,
        resolution_time,
    }
}

async fn load_tickets(
    store: &dyn AnalyticsStore,
    window: Option<TimeRange>,
) -> Result<Vec<TicketRecord>> {
    store
        .fetch_tickets(&TicketFilter {
            created: window,
            category_id: None,
        })
        .await
}

async fn load_scores(
    store: &dyn AnalyticsStore,
    window: Option<TimeRange>,
) -> Result<Vec<SurveyScoreRecord>> {
    store
        .fetch_survey_scores(&ScoreFilter {
            ticket_created: None,
            submitted: window,
            category_id: None,
        })
        .await
}

#[instrument(skip(store))]
pub async fn load_ticket_status(
    store: &dyn AnalyticsStore,
    window: Option<TimeRange>,
) -> Result<Vec<StatusCount>> {
    Ok(ticket_status_stats(&load_tickets(store, window).await?))
}

#[instrument(skip(store))]
pub async fn load_user_entities(
    store: &dyn AnalyticsStore,
    window: Option<TimeRange>,
) -> Result<Vec<EntityCount>> {
    Ok(user_entity_stats(&load_tickets(store, window).await?))
}

#[instrument(skip(store))]
pub async fn load_satisfaction_trend(
    store: &dyn AnalyticsStore,
    window: Option<TimeRange>,
    offset: FixedOffset,
) -> Result<Vec<SatisfactionPoint>> {
    Ok(satisfaction_trend(&load_scores(store, window).await?, offset))
}

#[instrument(skip(store))]
pub async fn load_top_issues(
    store: &dyn AnalyticsStore,
    window: Option<TimeRange>,
    limit: Option<usize>,
) -> Result<Vec<TopIssue>> {
    Ok(top_issues(&load_tickets(store, window).await?, limit))
}

#[instrument(skip(store))]
pub async fn load_resolution_time(
    store: &dyn AnalyticsStore,
    window: Option<TimeRange>,
) -> Result<ResolutionTimeStats> {
    Ok(resolution_time_stats(&load_tickets(store, window).await?))
}

#[instrument(skip(store))]
pub async fn load_service_trends(
    store: &dyn AnalyticsStore,
    window: Option<TimeRange>,
    offset: FixedOffset,
) -> Result<Vec<ServiceTrendPoint>> {
    Ok(service_trends(&load_tickets(store, window).await?, offset))
}

#[instrument(skip(store))]
pub async fn load_question_breakdown(
    store: &dyn AnalyticsStore,
    window: Option<TimeRange>,
    category: Option<&str>,
) -> Result<Vec<QuestionBreakdown>> {
    let category_id = match CategoryScope::resolve(store, category).await? {
        CategoryScope::All => None,
        CategoryScope::Only(id) => Some(id),
        CategoryScope::Missing => return Ok(Vec::new()),
    };

    let answers = store
        .fetch_survey_answers(&ScoreFilter {
            ticket_created: None,
            submitted: window,
            category_id,
        })
        .await?;
    Ok(question_breakdown(&answers))
}

/// Loads tickets and scores once and derives every dashboard view from them.
#[instrument(skip(store))]
pub async fn load_dashboard(
    store: &dyn AnalyticsStore,
    window: Option<TimeRange>,
    offset: FixedOffset,
    top_limit: usize,
) -> Result<DashboardSummary> {
    let tickets = load_tickets(store, window).await?;
    let scores = load_scores(store, window).await?;
    let overall = mean_score(scores.iter().map(|score| score.satisfaction_score).collect());

    Ok(dashboard_summary(
        ticket_status_stats(&tickets),
        user_entity_stats(&tickets),
        satisfaction_trend(&scores, offset),
        top_issues(&tickets, Some(top_limit)),
        resolution_time_stats(&tickets),
        overall,
    ))
}
