use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::period::Period;

pub const UNKNOWN_USER_TYPE: &str = "unknown";
pub const TERMINAL_STATUSES: [&str; 2] = ["resolved", "closed"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceCategory {
    pub id: Uuid,
    pub name: String,
    pub requires_login: bool,
}

/// Flat ticket row with the user type already resolved.
#[derive(Debug, Clone)]
pub struct TicketRecord {
    pub id: Uuid,
    pub ticket_number: String,
    pub status: String,
    pub category_id: Uuid,
    pub category_name: String,
    pub user_type: String,
    pub is_guest: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct SurveyScoreRecord {
    pub response_id: Uuid,
    pub ticket_id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub satisfaction_score: f64,
}

#[derive(Debug, Clone)]
pub struct AnswerRecord {
    pub questionnaire_title: String,
    pub question_id: Uuid,
    pub question_text: String,
    pub question_type: String,
    pub order_number: i32,
    pub answer_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortResult {
    pub period: Period,
    pub category_id: Uuid,
    pub category_name: String,
    pub user_type: String,
    pub usage_count: i64,
    pub response_count: i64,
    pub average_satisfaction: Option<f64>,
}

/// Stored cohort snapshot row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortAnalysis {
    pub id: Uuid,
    pub period: Period,
    pub category_id: Uuid,
    pub category_name: String,
    pub user_type: String,
    pub usage_count: i64,
    pub response_count: i64,
    pub average_satisfaction: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityCount {
    pub user_type: String,
    pub registered: i64,
    pub guest: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SatisfactionPoint {
    pub period: Period,
    pub response_count: i64,
    pub average_satisfaction: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopIssue {
    pub category_id: Uuid,
    pub category_name: String,
    pub ticket_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionTimeStats {
    pub resolved_count: i64,
    pub min_hours: Option<f64>,
    pub max_hours: Option<f64>,
    pub mean_hours: Option<f64>,
    pub median_hours: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_tickets: i64,
    pub overall_satisfaction: Option<f64>,
    pub ticket_status: Vec<StatusCount>,
    pub user_entities: Vec<EntityCount>,
    pub satisfaction_trend: Vec<SatisfactionPoint>,
    pub top_issues: Vec<TopIssue>,
    pub resolution_time: ResolutionTimeStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceTrendPoint {
    pub period: Period,
    pub category_name: String,
    pub ticket_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionTally {
    pub value: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionBreakdown {
    pub questionnaire_title: String,
    pub question_id: Uuid,
    pub question_text: String,
    pub question_type: String,
    pub order_number: i32,
    pub answer_count: i64,
    pub options: Vec<OptionTally>,
}

/// Registered tickets carry the user's entity type, guest tickets the
/// self-declared guest type; both land in the same bucket space.
pub fn resolve_user_type(is_registered: bool, entity_type: &str, guest_user_type: &str) -> String {
    let raw = if is_registered {
        entity_type
    } else {
        guest_user_type
    };
    let normalized = raw.trim().to_lowercase();

    if normalized.is_empty() {
        UNKNOWN_USER_TYPE.to_string()
    } else {
        normalized
    }
}

pub fn is_terminal_status(status: &str) -> bool {
    let status = status.trim();
    TERMINAL_STATUSES
        .iter()
        .any(|terminal| terminal.eq_ignore_ascii_case(status))
}

/// Mean of the given scores, or `None` when there are none.
///
/// Scores are summed in ascending order so the result depends only on the
/// values, not on the order the store returned them in.
pub fn mean_score(mut scores: Vec<f64>) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    scores.sort_by(|a, b| a.total_cmp(b));
    Some(scores.iter().sum::<f64>() / scores.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_type_follows_registration() {
        assert_eq!(resolve_user_type(true, "Student", "staff"), "student");
        assert_eq!(resolve_user_type(false, "", " Lecturer "), "lecturer");
        assert_eq!(resolve_user_type(false, "staff", ""), UNKNOWN_USER_TYPE);
    }

    #[test]
    fn terminal_statuses_are_case_insensitive() {
        assert!(is_terminal_status("Resolved"));
        assert!(is_terminal_status("closed"));
        assert!(!is_terminal_status("in_progress"));
        assert!(!is_terminal_status("pending"));
    }

    #[test]
    fn mean_score_ignores_input_order() {
        let forward = mean_score(vec![0.1, 0.2, 0.3]);
        let reversed = mean_score(vec![0.3, 0.2, 0.1]);

        assert_eq!(forward, reversed);
        assert_eq!(forward, Some((0.1 + 0.2 + 0.3) / 3.0));
        assert_eq!(mean_score(Vec::new()), None);
    }
}
