use std::collections::HashMap;

use chrono::FixedOffset;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{mean_score, CohortResult, SurveyScoreRecord, TicketRecord};
use crate::period::Period;
use crate::store::{AnalyticsStore, CategoryScope, ScoreFilter, TicketFilter};

#[derive(Default)]
struct Bucket {
    category_name: String,
    usage_count: i64,
    scores: Vec<f64>,
}

/// Groups tickets by (category, user type) and attaches survey scores
/// through their ticket. Scores for tickets outside `tickets` are ignored.
pub fn aggregate_cohort(
    period: Period,
    tickets: &[TicketRecord],
    scores: &[SurveyScoreRecord],
) -> Vec<CohortResult> {
    let mut buckets: HashMap<(Uuid, String), Bucket> = HashMap::new();
    let mut ticket_keys: HashMap<Uuid, (Uuid, String)> = HashMap::new();

    for ticket in tickets {
        let key = (ticket.category_id, ticket.user_type.clone());
        let entry = buckets.entry(key.clone()).or_insert_with(|| Bucket {
            category_name: ticket.category_name.clone(),
            ..Bucket::default()
        });
        entry.usage_count += 1;
        ticket_keys.insert(ticket.id, key);
    }

    for score in scores {
        let Some(key) = ticket_keys.get(&score.ticket_id) else {
            debug!(response_id = %score.response_id, "score without ticket in scope, skipping");
            continue;
        };
        if let Some(entry) = buckets.get_mut(key) {
            entry.scores.push(score.satisfaction_score);
        }
    }

    let mut results: Vec<CohortResult> = buckets
        .into_iter()
        .map(|((category_id, user_type), bucket)| CohortResult {
            period,
            category_id,
            category_name: bucket.category_name,
            user_type,
            usage_count: bucket.usage_count,
            response_count: bucket.scores.len() as i64,
            average_satisfaction: mean_score(bucket.scores),
        })
        .collect();

    results.sort_by(|a, b| {
        (&a.category_name, a.category_id, &a.user_type).cmp(&(
            &b.category_name,
            b.category_id,
            &b.user_type,
        ))
    });
    results
}

#[instrument(skip(store, period), fields(period = %period))]
pub async fn compute_cohort(
    store: &dyn AnalyticsStore,
    period: Period,
    offset: FixedOffset,
    category: Option<&str>,
) -> Result<Vec<CohortResult>> {
    match CategoryScope::resolve(store, category).await? {
        CategoryScope::All => compute_scoped(store, period, offset, None).await,
        CategoryScope::Only(id) => compute_scoped(store, period, offset, Some(id)).await,
        CategoryScope::Missing => Ok(Vec::new()),
    }
}

pub(crate) async fn compute_scoped(
    store: &dyn AnalyticsStore,
    period: Period,
    offset: FixedOffset,
    category_id: Option<Uuid>,
) -> Result<Vec<CohortResult>> {
    let range = period.range(offset);
    let tickets = store
        .fetch_tickets(&TicketFilter {
            created: Some(range),
            category_id,
        })
        .await?;

    if tickets.is_empty() {
        info!("no tickets in period");
        return Ok(Vec::new());
    }

    let scores = store
        .fetch_survey_scores(&ScoreFilter {
            ticket_created: Some(range),
            submitted: None,
            category_id,
        })
        .await?;

    let results = aggregate_cohort(period, &tickets, &scores);
    info!(
        tickets = tickets.len(),
        responses = scores.len(),
        buckets = results.len(),
        "cohort computed"
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalyticsError;
    use crate::period::DEFAULT_UTC_OFFSET;
    use crate::store::memory::MemoryStore;

    fn period(raw: &str) -> Period {
        raw.parse().unwrap()
    }

    fn wib() -> FixedOffset {
        DEFAULT_UTC_OFFSET.parse().unwrap()
    }

    #[tokio::test]
    async fn usage_counts_tickets_and_averages_scores() {
        let mut store = MemoryStore::new();
        let network = store.add_category("Jaringan Internet");
        let first = store.add_ticket(&network, "student", "resolved", "2024-05-02T08:00:00Z");
        let second = store.add_ticket(&network, "student", "resolved", "2024-05-10T08:00:00Z");
        store.add_ticket(&network, "student", "pending", "2024-05-20T08:00:00Z");
        store.add_score(first, 4.0, "2024-05-03T08:00:00Z");
        store.add_score(second, 5.0, "2024-06-01T08:00:00Z");

        let results = compute_cohort(&store, period("2024-05"), wib(), None).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].category_name, "Jaringan Internet");
        assert_eq!(results[0].user_type, "student");
        assert_eq!(results[0].usage_count, 3);
        assert_eq!(results[0].response_count, 2);
        assert_eq!(results[0].average_satisfaction, Some(4.5));
    }

    #[tokio::test]
    async fn buckets_without_responses_have_no_average() {
        let mut store = MemoryStore::new();
        let website = store.add_category("Website");
        store.add_ticket(&website, "staff", "pending", "2024-05-02T08:00:00Z");

        let results = compute_cohort(&store, period("2024-05"), wib(), None).await.unwrap();

        assert_eq!(results[0].usage_count, 1);
        assert_eq!(results[0].response_count, 0);
        assert_eq!(results[0].average_satisfaction, None);
    }

    #[tokio::test]
    async fn empty_period_is_not_an_error() {
        let mut store = MemoryStore::new();
        let website = store.add_category("Website");
        store.add_ticket(&website, "staff", "pending", "2024-04-30T12:00:00Z");

        let results = compute_cohort(&store, period("2024-05"), wib(), Some("Website"))
            .await
            .unwrap();
        assert!(results.is_empty());

        let unknown = compute_cohort(&store, period("2024-04"), wib(), Some("Siakadu"))
            .await
            .unwrap();
        assert!(unknown.is_empty());
    }

    #[tokio::test]
    async fn category_filter_matches_name_or_id() {
        let mut store = MemoryStore::new();
        let website = store.add_category("Website");
        let siakadu = store.add_category("Siakadu");
        store.add_ticket(&website, "staff", "pending", "2024-05-02T08:00:00Z");
        store.add_ticket(&siakadu, "student", "pending", "2024-05-02T08:00:00Z");

        let by_name = compute_cohort(&store, period("2024-05"), wib(), Some("siakadu"))
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].category_id, siakadu.id);

        let id = website.id.to_string();
        let by_id = compute_cohort(&store, period("2024-05"), wib(), Some(&id)).await.unwrap();
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].category_name, "Website");
    }

    #[tokio::test]
    async fn output_is_sorted_by_category_then_user_type() {
        let mut store = MemoryStore::new();
        let website = store.add_category("Website");
        let email = store.add_category("Buat Email unila.ac.id");
        store.add_ticket(&website, "student", "pending", "2024-05-02T08:00:00Z");
        store.add_ticket(&website, "lecturer", "pending", "2024-05-02T08:00:00Z");
        store.add_ticket(&email, "staff", "pending", "2024-05-02T08:00:00Z");

        let results = compute_cohort(&store, period("2024-05"), wib(), None).await.unwrap();
        let keys: Vec<(&str, &str)> = results
            .iter()
            .map(|r| (r.category_name.as_str(), r.user_type.as_str()))
            .collect();

        assert_eq!(
            keys,
            vec![
                ("Buat Email unila.ac.id", "staff"),
                ("Website", "lecturer"),
                ("Website", "student"),
            ]
        );
    }

    #[test]
    fn multiple_responses_for_one_ticket_all_count() {
        let mut store = MemoryStore::new();
        let website = store.add_category("Website");
        let ticket = store.add_ticket(&website, "student", "resolved", "2024-05-02T08:00:00Z");
        store.add_score(ticket, 2.0, "2024-05-03T08:00:00Z");
        store.add_score(ticket, 3.0, "2024-05-04T08:00:00Z");

        let results = aggregate_cohort(period("2024-05"), &store.tickets, &store.scores);

        assert_eq!(results[0].usage_count, 1);
        assert_eq!(results[0].response_count, 2);
        assert_eq!(results[0].average_satisfaction, Some(2.5));
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let mut store = MemoryStore::new();
        store.add_category("Website");
        store.set_unavailable(true);

        let err = compute_cohort(&store, period("2024-05"), wib(), None).await.unwrap_err();
        assert!(matches!(err, AnalyticsError::StoreUnavailable(_)));
    }

    #[test]
    fn average_does_not_depend_on_score_order() {
        let mut store = MemoryStore::new();
        let website = store.add_category("Website");
        for score in [0.1, 0.2, 0.3] {
            let ticket = store.add_ticket(&website, "student", "resolved", "2024-05-02T08:00:00Z");
            store.add_score(ticket, score, "2024-05-03T08:00:00Z");
        }
        let reversed: Vec<SurveyScoreRecord> = store.scores.iter().rev().cloned().collect();

        let forward = aggregate_cohort(period("2024-05"), &store.tickets, &store.scores);
        let backward = aggregate_cohort(period("2024-05"), &store.tickets, &reversed);

        assert_eq!(forward, backward);
    }

    #[tokio::test]
    async fn month_boundary_follows_local_time() {
        let mut store = MemoryStore::new();
        let network = store.add_category("Jaringan Internet");
        // 2024-06-01 00:00 WIB
        store.add_ticket(&network, "student", "pending", "2024-05-31T17:00:00Z");
        store.add_ticket(&network, "student", "pending", "2024-05-31T16:59:59Z");

        let may = compute_cohort(&store, period("2024-05"), wib(), None).await.unwrap();
        let june = compute_cohort(&store, period("2024-06"), wib(), None).await.unwrap();

        assert_eq!(may[0].usage_count, 1);
        assert_eq!(june[0].usage_count, 1);
    }
}
