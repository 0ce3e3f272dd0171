use std::fmt::Write;

use crate::models::{
    CohortAnalysis, CohortResult, DashboardSummary, EntityCount, QuestionBreakdown,
    ResolutionTimeStats, SatisfactionPoint, ServiceTrendPoint, StatusCount, TopIssue,
};

fn satisfaction_label(average: Option<f64>) -> String {
    match average {
        Some(value) => format!("{value:.2}"),
        None => "n/a".to_string(),
    }
}

fn hours_label(hours: Option<f64>) -> String {
    match hours {
        Some(value) => format!("{value:.1}h"),
        None => "n/a".to_string(),
    }
}

pub fn render_cohort(results: &[CohortResult]) -> String {
    let mut output = String::new();

    if results.is_empty() {
        let _ = writeln!(output, "No tickets found for this period.");
        return output;
    }

    for result in results {
        let _ = writeln!(
            output,
            "- {} {} / {}: {} tickets, {} responses, satisfaction {}",
            result.period,
            result.category_name,
            result.user_type,
            result.usage_count,
            result.response_count,
            satisfaction_label(result.average_satisfaction)
        );
    }
    output
}

pub fn render_snapshots(rows: &[CohortAnalysis]) -> String {
    let mut output = String::new();

    if rows.is_empty() {
        let _ = writeln!(output, "No cohort snapshots stored.");
        return output;
    }

    for row in rows {
        let _ = writeln!(
            output,
            "- {} {} / {}: {} tickets, {} responses, satisfaction {} (updated {})",
            row.period,
            row.category_name,
            row.user_type,
            row.usage_count,
            row.response_count,
            satisfaction_label(row.average_satisfaction),
            row.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    output
}

pub fn render_status(stats: &[StatusCount]) -> String {
    let mut output = String::new();
    if stats.is_empty() {
        let _ = writeln!(output, "No tickets recorded for this window.");
    }
    for stat in stats {
        let _ = writeln!(output, "- {}: {}", stat.status, stat.count);
    }
    output
}

pub fn render_entities(stats: &[EntityCount]) -> String {
    let mut output = String::new();
    if stats.is_empty() {
        let _ = writeln!(output, "No tickets recorded for this window.");
    }
    for stat in stats {
        let _ = writeln!(
            output,
            "- {}: {} tickets ({} registered, {} guest)",
            stat.user_type, stat.total, stat.registered, stat.guest
        );
    }
    output
}

pub fn render_trend(points: &[SatisfactionPoint]) -> String {
    let mut output = String::new();
    if points.is_empty() {
        let _ = writeln!(output, "No survey responses recorded for this window.");
    }
    for point in points {
        let _ = writeln!(
            output,
            "- {}: {:.2} across {} responses",
            point.period, point.average_satisfaction, point.response_count
        );
    }
    output
}

pub fn render_top_issues(issues: &[TopIssue]) -> String {
    let mut output = String::new();
    if issues.is_empty() {
        let _ = writeln!(output, "No tickets recorded for this window.");
    }
    for (rank, issue) in issues.iter().enumerate() {
        let _ = writeln!(
            output,
            "{}. {} ({} tickets)",
            rank + 1,
            issue.category_name,
            issue.ticket_count
        );
    }
    output
}

pub fn render_resolution(stats: &ResolutionTimeStats) -> String {
    let mut output = String::new();
    if stats.resolved_count == 0 {
        let _ = writeln!(output, "No resolved tickets in this window.");
        return output;
    }
    let _ = writeln!(
        output,
        "{} resolved tickets: min {}, median {}, mean {}, max {}",
        stats.resolved_count,
        hours_label(stats.min_hours),
        hours_label(stats.median_hours),
        hours_label(stats.mean_hours),
        hours_label(stats.max_hours)
    );
    output
}

pub fn render_service_trends(points: &[ServiceTrendPoint]) -> String {
    let mut output = String::new();
    if points.is_empty() {
        let _ = writeln!(output, "No tickets recorded for this window.");
    }
    for point in points {
        let _ = writeln!(
            output,
            "- {} {}: {} tickets",
            point.period, point.category_name, point.ticket_count
        );
    }
    output
}

pub fn render_questions(breakdown: &[QuestionBreakdown]) -> String {
    let mut output = String::new();
    if breakdown.is_empty() {
        let _ = writeln!(output, "No survey answers recorded for this window.");
    }
    for question in breakdown {
        let _ = writeln!(
            output,
            "- [{}] {}. {} ({} answers)",
            question.questionnaire_title,
            question.order_number,
            question.question_text,
            question.answer_count
        );
        for option in &question.options {
            let _ = writeln!(output, "    {}: {}", option.value, option.count);
        }
    }
    output
}

pub fn render_dashboard(summary: &DashboardSummary) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Tickets: {} | Overall satisfaction: {}",
        summary.total_tickets,
        satisfaction_label(summary.overall_satisfaction)
    );
    let _ = writeln!(output, "\nStatus");
    output.push_str(&render_status(&summary.ticket_status));
    let _ = writeln!(output, "\nRequesters");
    output.push_str(&render_entities(&summary.user_entities));
    let _ = writeln!(output, "\nSatisfaction trend");
    output.push_str(&render_trend(&summary.satisfaction_trend));
    let _ = writeln!(output, "\nTop issues");
    output.push_str(&render_top_issues(&summary.top_issues));
    let _ = writeln!(output, "\nResolution time");
    output.push_str(&render_resolution(&summary.resolution_time));
    output
}

pub fn build_report(
    window_label: &str,
    summary: &DashboardSummary,
    trends: &[ServiceTrendPoint],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Helpdesk Analytics Report");
    let _ = writeln!(output, "Generated for {window_label}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Tickets: {}", summary.total_tickets);
    let _ = writeln!(
        output,
        "- Overall satisfaction: {}",
        satisfaction_label(summary.overall_satisfaction)
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Ticket Status");
    if summary.ticket_status.is_empty() {
        let _ = writeln!(output, "No tickets recorded for this window.");
    } else {
        let _ = writeln!(output, "| Status | Tickets |");
        let _ = writeln!(output, "|---|---|");
        for stat in &summary.ticket_status {
            let _ = writeln!(output, "| {} | {} |", stat.status, stat.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Requesters");
    if summary.user_entities.is_empty() {
        let _ = writeln!(output, "No tickets recorded for this window.");
    } else {
        let _ = writeln!(output, "| Type | Registered | Guest | Total |");
        let _ = writeln!(output, "|---|---|---|---|");
        for stat in &summary.user_entities {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} |",
                stat.user_type, stat.registered, stat.guest, stat.total
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Issues");
    if summary.top_issues.is_empty() {
        let _ = writeln!(output, "No tickets recorded for this window.");
    } else {
        output.push_str(&render_top_issues(&summary.top_issues));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Satisfaction Trend");
    output.push_str(&render_trend(&summary.satisfaction_trend));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Resolution Time");
    output.push_str(&render_resolution(&summary.resolution_time));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Service Trends");
    output.push_str(&render_service_trends(trends));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn summary() -> DashboardSummary {
        DashboardSummary {
            total_tickets: 3,
            overall_satisfaction: Some(4.5),
            ticket_status: vec![
                StatusCount {
                    status: "resolved".into(),
                    count: 2,
                },
                StatusCount {
                    status: "pending".into(),
                    count: 1,
                },
            ],
            user_entities: vec![EntityCount {
                user_type: "student".into(),
                registered: 2,
                guest: 1,
                total: 3,
            }],
            satisfaction_trend: vec![SatisfactionPoint {
                period: "2024-05".parse().unwrap(),
                response_count: 2,
                average_satisfaction: 4.5,
            }],
            top_issues: vec![TopIssue {
                category_id: Uuid::new_v4(),
                category_name: "Jaringan Internet".into(),
                ticket_count: 3,
            }],
            resolution_time: ResolutionTimeStats {
                resolved_count: 2,
                min_hours: Some(6.0),
                max_hours: Some(30.0),
                mean_hours: Some(18.0),
                median_hours: Some(18.0),
            },
        }
    }

    #[test]
    fn report_includes_every_section() {
        let report = build_report("2024-05", &summary(), &[]);

        assert!(report.starts_with("# Helpdesk Analytics Report"));
        assert!(report.contains("- Overall satisfaction: 4.50"));
        assert!(report.contains("| resolved | 2 |"));
        assert!(report.contains("| student | 2 | 1 | 3 |"));
        assert!(report.contains("1. Jaringan Internet (3 tickets)"));
        assert!(report.contains("- 2024-05: 4.50 across 2 responses"));
        assert!(report.contains("min 6.0h, median 18.0h, mean 18.0h, max 30.0h"));
        assert!(report.contains("## Service Trends\nNo tickets recorded for this window."));
    }

    #[test]
    fn cohort_rendering_marks_missing_satisfaction() {
        let results = vec![CohortResult {
            period: "2024-05".parse().unwrap(),
            category_id: Uuid::new_v4(),
            category_name: "Website".into(),
            user_type: "staff".into(),
            usage_count: 1,
            response_count: 0,
            average_satisfaction: None,
        }];

        assert_eq!(
            render_cohort(&results),
            "- 2024-05 Website / staff: 1 tickets, 0 responses, satisfaction n/a\n"
        );
        assert_eq!(render_cohort(&[]), "No tickets found for this period.\n");
    }
}
