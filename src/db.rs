use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    resolve_user_type, AnswerRecord, CohortAnalysis, CohortResult, ServiceCategory,
    SurveyScoreRecord, TicketRecord,
};
use crate::period::Period;
use crate::store::{AnalyticsStore, ScoreFilter, SnapshotFilter, TicketFilter};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn snapshot_from_row(row: &PgRow) -> std::result::Result<CohortAnalysis, sqlx::Error> {
    let period: String = row.try_get("period")?;
    let period: Period = period
        .parse()
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

    Ok(CohortAnalysis {
        id: row.try_get("id")?,
        period,
        category_id: row.try_get("service_category_id")?,
        category_name: row.try_get("category_name")?,
        user_type: row.try_get("user_type")?,
        usage_count: row.try_get("usage_count")?,
        response_count: row.try_get("response_count")?,
        average_satisfaction: row.try_get("average_satisfaction")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const SNAPSHOT_COLUMNS: &str = "ca.id, ca.period, ca.service_category_id, c.name AS category_name, \
     ca.user_type, ca.usage_count, ca.response_count, ca.average_satisfaction, \
     ca.created_at, ca.updated_at";

#[async_trait]
impl AnalyticsStore for PgStore {
    #[instrument(skip(self))]
    async fn list_categories(&self) -> Result<Vec<ServiceCategory>> {
        let rows = sqlx::query(
            "SELECT id, name, requires_login FROM helpdesk.service_categories \
             WHERE deleted_at IS NULL ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut categories = Vec::with_capacity(rows.len());
        for row in rows {
            categories.push(ServiceCategory {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                requires_login: row.try_get("requires_login")?,
            });
        }
        Ok(categories)
    }

    #[instrument(skip(self))]
    async fn fetch_tickets(&self, filter: &TicketFilter) -> Result<Vec<TicketRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.ticket_number, t.status, t.service_category_id,
                   c.name AS category_name, t.user_id IS NOT NULL AS is_registered,
                   t.entity_type, t.guest_user_type, t.created_at, t.resolved_at
            FROM helpdesk.tickets t
            JOIN helpdesk.service_categories c ON c.id = t.service_category_id
            WHERE t.deleted_at IS NULL
              AND ($1::timestamptz IS NULL OR t.created_at >= $1)
              AND ($2::timestamptz IS NULL OR t.created_at < $2)
              AND ($3::uuid IS NULL OR t.service_category_id = $3)
            "#,
        )
        .bind(filter.created.map(|range| range.start))
        .bind(filter.created.map(|range| range.end))
        .bind(filter.category_id)
        .fetch_all(&self.pool)
        .await?;

        let mut tickets = Vec::with_capacity(rows.len());
        for row in rows {
            let is_registered: bool = row.try_get("is_registered")?;
            let entity_type: String = row.try_get("entity_type")?;
            let guest_user_type: String = row.try_get("guest_user_type")?;

            tickets.push(TicketRecord {
                id: row.try_get("id")?,
                ticket_number: row.try_get("ticket_number")?,
                status: row.try_get("status")?,
                category_id: row.try_get("service_category_id")?,
                category_name: row.try_get("category_name")?,
                user_type: resolve_user_type(is_registered, &entity_type, &guest_user_type),
                is_guest: !is_registered,
                created_at: row.try_get("created_at")?,
                resolved_at: row.try_get("resolved_at")?,
            });
        }

        debug!(count = tickets.len(), "tickets fetched");
        Ok(tickets)
    }

    #[instrument(skip(self))]
    async fn fetch_survey_scores(&self, filter: &ScoreFilter) -> Result<Vec<SurveyScoreRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.ticket_id, r.created_at, r.satisfaction_score
            FROM helpdesk.survey_responses r
            JOIN helpdesk.tickets t ON t.id = r.ticket_id
            WHERE r.deleted_at IS NULL
              AND t.deleted_at IS NULL
              AND ($1::timestamptz IS NULL OR t.created_at >= $1)
              AND ($2::timestamptz IS NULL OR t.created_at < $2)
              AND ($3::timestamptz IS NULL OR r.created_at >= $3)
              AND ($4::timestamptz IS NULL OR r.created_at < $4)
              AND ($5::uuid IS NULL OR t.service_category_id = $5)
            ORDER BY r.id
            "#,
        )
        .bind(filter.ticket_created.map(|range| range.start))
        .bind(filter.ticket_created.map(|range| range.end))
        .bind(filter.submitted.map(|range| range.start))
        .bind(filter.submitted.map(|range| range.end))
        .bind(filter.category_id)
        .fetch_all(&self.pool)
        .await?;

        let mut scores = Vec::with_capacity(rows.len());
        for row in rows {
            scores.push(SurveyScoreRecord {
                response_id: row.try_get("id")?,
                ticket_id: row.try_get("ticket_id")?,
                submitted_at: row.try_get("created_at")?,
                satisfaction_score: row.try_get("satisfaction_score")?,
            });
        }
        Ok(scores)
    }

    #[instrument(skip(self))]
    async fn fetch_survey_answers(&self, filter: &ScoreFilter) -> Result<Vec<AnswerRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT qn.title, q.id AS question_id, q.question_text, q.question_type,
                   q.order_number,
                   COALESCE(NULLIF(a.answer_value, ''), o.option_value, '') AS answer_value
            FROM helpdesk.survey_answers a
            JOIN helpdesk.survey_responses r ON r.id = a.survey_response_id
            JOIN helpdesk.tickets t ON t.id = r.ticket_id
            JOIN helpdesk.questions q ON q.id = a.question_id
            JOIN helpdesk.questionnaires qn ON qn.id = q.questionnaire_id
            LEFT JOIN helpdesk.question_options o ON o.id = a.question_option_id
            WHERE a.deleted_at IS NULL
              AND r.deleted_at IS NULL
              AND t.deleted_at IS NULL
              AND ($1::timestamptz IS NULL OR r.created_at >= $1)
              AND ($2::timestamptz IS NULL OR r.created_at < $2)
              AND ($3::uuid IS NULL OR t.service_category_id = $3)
            "#,
        )
        .bind(filter.submitted.map(|range| range.start))
        .bind(filter.submitted.map(|range| range.end))
        .bind(filter.category_id)
        .fetch_all(&self.pool)
        .await?;

        let mut answers = Vec::with_capacity(rows.len());
        for row in rows {
            answers.push(AnswerRecord {
                questionnaire_title: row.try_get("title")?,
                question_id: row.try_get("question_id")?,
                question_text: row.try_get("question_text")?,
                question_type: row.try_get("question_type")?,
                order_number: row.try_get("order_number")?,
                answer_value: row.try_get("answer_value")?,
            });
        }
        Ok(answers)
    }

    #[instrument(skip(self, period, rows), fields(period = %period, rows = rows.len()))]
    async fn replace_cohort_snapshots(
        &self,
        period: Period,
        category_id: Option<Uuid>,
        rows: &[CohortResult],
    ) -> Result<Vec<CohortAnalysis>> {
        let period_key = period.to_string();
        let mut tx = self.pool.begin().await?;

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO helpdesk.cohort_analyses AS ca
                (id, period, service_category_id, user_type, usage_count, response_count,
                 average_satisfaction)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (period, service_category_id, user_type) DO UPDATE
                SET usage_count = EXCLUDED.usage_count,
                    response_count = EXCLUDED.response_count,
                    average_satisfaction = EXCLUDED.average_satisfaction,
                    updated_at = NOW()
                WHERE (ca.usage_count, ca.response_count, ca.average_satisfaction)
                      IS DISTINCT FROM
                      (EXCLUDED.usage_count, EXCLUDED.response_count, EXCLUDED.average_satisfaction)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&period_key)
            .bind(row.category_id)
            .bind(&row.user_type)
            .bind(row.usage_count)
            .bind(row.response_count)
            .bind(row.average_satisfaction)
            .execute(&mut *tx)
            .await?;
        }

        let kept_categories: Vec<Uuid> = rows.iter().map(|row| row.category_id).collect();
        let kept_user_types: Vec<String> = rows.iter().map(|row| row.user_type.clone()).collect();
        let removed = sqlx::query(
            r#"
            DELETE FROM helpdesk.cohort_analyses ca
            WHERE ca.period = $1
              AND ($2::uuid IS NULL OR ca.service_category_id = $2)
              AND NOT EXISTS (
                  SELECT 1
                  FROM UNNEST($3::uuid[], $4::text[]) AS kept(category_id, user_type)
                  WHERE kept.category_id = ca.service_category_id
                    AND kept.user_type = ca.user_type
              )
            "#,
        )
        .bind(&period_key)
        .bind(category_id)
        .bind(&kept_categories)
        .bind(&kept_user_types)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "SELECT {SNAPSHOT_COLUMNS} \
             FROM helpdesk.cohort_analyses ca \
             JOIN helpdesk.service_categories c ON c.id = ca.service_category_id \
             WHERE ca.period = $1 AND ($2::uuid IS NULL OR ca.service_category_id = $2) \
             ORDER BY c.name, ca.user_type"
        );
        let stored = sqlx::query(&query)
            .bind(&period_key)
            .bind(category_id)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(removed = removed.rows_affected(), "stale snapshot rows removed");

        let mut snapshots = Vec::with_capacity(stored.len());
        for row in &stored {
            snapshots.push(snapshot_from_row(row)?);
        }
        Ok(snapshots)
    }

    #[instrument(skip(self))]
    async fn fetch_cohort_snapshots(&self, filter: &SnapshotFilter) -> Result<Vec<CohortAnalysis>> {
        let query = format!(
            "SELECT {SNAPSHOT_COLUMNS} \
             FROM helpdesk.cohort_analyses ca \
             JOIN helpdesk.service_categories c ON c.id = ca.service_category_id \
             WHERE ($1::uuid IS NULL OR ca.service_category_id = $1) \
               AND ($2::text IS NULL OR ca.period >= $2) \
               AND ($3::text IS NULL OR ca.period <= $3) \
             ORDER BY ca.period, c.name, ca.user_type"
        );
        let rows = sqlx::query(&query)
            .bind(filter.category_id)
            .bind(filter.from.map(|period| period.to_string()))
            .bind(filter.to.map(|period| period.to_string()))
            .fetch_all(&self.pool)
            .await?;

        let mut snapshots = Vec::with_capacity(rows.len());
        for row in &rows {
            snapshots.push(snapshot_from_row(row)?);
        }
        Ok(snapshots)
    }
}

pub const SERVICE_CATEGORIES: [(&str, bool); 8] = [
    ("Website", true),
    ("Jaringan Internet", true),
    ("Siakadu", true),
    ("Sistem Informasi", true),
    ("Lainnya", true),
    ("Lupa Password", false),
    ("Buat Email unila.ac.id", false),
    ("Buat SSO Unila", false),
];

const RATING_QUESTION: &str = "Seberapa puas Anda dengan penyelesaian tiket ini?";
const COMMENT_QUESTION: &str = "Saran untuk peningkatan layanan";

enum Requester<'a> {
    Registered(&'a str),
    Guest(&'a str, &'a str, &'a str),
}

struct NewTicket<'a> {
    ticket_number: &'a str,
    title: &'a str,
    status: &'a str,
    priority: &'a str,
    category_id: Uuid,
    user_id: Option<Uuid>,
    entity_type: &'a str,
    guest_name: &'a str,
    guest_email: &'a str,
    guest_user_type: &'a str,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

async fn upsert_category(pool: &PgPool, name: &str, requires_login: bool) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO helpdesk.service_categories (id, name, requires_login)
        VALUES ($1, $2, $3)
        ON CONFLICT (name) DO UPDATE SET requires_login = EXCLUDED.requires_login
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(requires_login)
    .fetch_one(pool)
    .await?
    .try_get("id")?;
    Ok(id)
}

async fn upsert_user(
    pool: &PgPool,
    name: &str,
    email: &str,
    entity_type: &str,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO helpdesk.users (id, username, email, name, entity_type, is_registered)
        VALUES ($1, $2, $2, $3, $4, TRUE)
        ON CONFLICT (email) DO UPDATE
        SET name = EXCLUDED.name, entity_type = EXCLUDED.entity_type
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(name)
    .bind(entity_type)
    .fetch_one(pool)
    .await?
    .try_get("id")?;
    Ok(id)
}

/// Returns the active questionnaire for a category, creating the default
/// rating questionnaire when none exists yet.
async fn ensure_questionnaire(
    pool: &PgPool,
    category_id: Uuid,
    category_name: &str,
) -> anyhow::Result<Uuid> {
    let existing = sqlx::query(
        r#"
        SELECT id FROM helpdesk.questionnaires
        WHERE service_category_id = $1 AND is_active AND deleted_at IS NULL
        ORDER BY created_at
        LIMIT 1
        "#,
    )
    .bind(category_id)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = existing {
        return Ok(row.try_get("id")?);
    }

    let mut tx = pool.begin().await?;
    let questionnaire_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO helpdesk.questionnaires (id, service_category_id, title, description)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(questionnaire_id)
    .bind(category_id)
    .bind(format!("Survei Kepuasan {category_name}"))
    .bind("Kuesioner kepuasan setelah tiket diselesaikan")
    .execute(&mut *tx)
    .await?;

    let rating_id = Uuid::new_v4();
    for (id, text, question_type, is_required, order) in [
        (rating_id, RATING_QUESTION, "single_choice", true, 1),
        (Uuid::new_v4(), COMMENT_QUESTION, "text", false, 2),
    ] {
        sqlx::query(
            r#"
            INSERT INTO helpdesk.questions
            (id, questionnaire_id, question_text, question_type, is_required, order_number)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(questionnaire_id)
        .bind(text)
        .bind(question_type)
        .bind(is_required)
        .bind(order)
        .execute(&mut *tx)
        .await?;
    }

    let labels = ["Sangat tidak puas", "Tidak puas", "Cukup", "Puas", "Sangat puas"];
    for (index, label) in labels.iter().enumerate() {
        let value = index + 1;
        sqlx::query(
            r#"
            INSERT INTO helpdesk.question_options
            (id, question_id, option_text, option_value, order_number)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(rating_id)
        .bind(*label)
        .bind(value.to_string())
        .bind(value as i32)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!(category = category_name, "default questionnaire created");
    Ok(questionnaire_id)
}

/// Inserts a ticket unless its number is already taken.
async fn insert_ticket(
    tx: &mut Transaction<'_, Postgres>,
    ticket: &NewTicket<'_>,
) -> anyhow::Result<Option<Uuid>> {
    let row = sqlx::query(
        r#"
        INSERT INTO helpdesk.tickets
        (id, ticket_number, title, status, priority, service_category_id, user_id,
         entity_type, guest_name, guest_email, guest_user_type, created_at, updated_at,
         resolved_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12, $13)
        ON CONFLICT (ticket_number) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(ticket.ticket_number)
    .bind(ticket.title)
    .bind(ticket.status)
    .bind(ticket.priority)
    .bind(ticket.category_id)
    .bind(ticket.user_id)
    .bind(ticket.entity_type)
    .bind(ticket.guest_name)
    .bind(ticket.guest_email)
    .bind(ticket.guest_user_type)
    .bind(ticket.created_at)
    .bind(ticket.resolved_at)
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some(row) => Ok(Some(row.try_get("id")?)),
        None => Ok(None),
    }
}

/// Stores a survey response with its rating answer and optional comment.
async fn record_survey(
    tx: &mut Transaction<'_, Postgres>,
    ticket_id: Uuid,
    user_id: Option<Uuid>,
    questionnaire_id: Uuid,
    score: f64,
    submitted_at: DateTime<Utc>,
    comment: Option<&str>,
) -> anyhow::Result<()> {
    let response = sqlx::query(
        r#"
        INSERT INTO helpdesk.survey_responses
        (id, ticket_id, user_id, questionnaire_id, satisfaction_score, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        ON CONFLICT (ticket_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(ticket_id)
    .bind(user_id)
    .bind(questionnaire_id)
    .bind(score)
    .bind(submitted_at)
    .fetch_optional(&mut **tx)
    .await?;

    let Some(response) = response else {
        debug!(%ticket_id, "ticket already has a survey response");
        return Ok(());
    };
    let response_id: Uuid = response.try_get("id")?;

    let rating_value = (score.round() as i64).clamp(1, 5).to_string();
    let rating = sqlx::query(
        r#"
        SELECT q.id AS question_id, o.id AS option_id
        FROM helpdesk.questions q
        LEFT JOIN helpdesk.question_options o
          ON o.question_id = q.id AND o.option_value = $2 AND o.deleted_at IS NULL
        WHERE q.questionnaire_id = $1 AND q.question_type = 'single_choice'
          AND q.deleted_at IS NULL
        ORDER BY q.order_number
        LIMIT 1
        "#,
    )
    .bind(questionnaire_id)
    .bind(&rating_value)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(rating) = rating {
        let question_id: Uuid = rating.try_get("question_id")?;
        let option_id: Option<Uuid> = rating.try_get("option_id")?;
        insert_answer(tx, response_id, question_id, option_id, "", &rating_value, submitted_at)
            .await?;
    }

    if let Some(comment) = comment.filter(|text| !text.trim().is_empty()) {
        let question = sqlx::query(
            r#"
            SELECT id FROM helpdesk.questions
            WHERE questionnaire_id = $1 AND question_type = 'text' AND deleted_at IS NULL
            ORDER BY order_number
            LIMIT 1
            "#,
        )
        .bind(questionnaire_id)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(question) = question {
            let question_id: Uuid = question.try_get("id")?;
            insert_answer(tx, response_id, question_id, None, comment, "", submitted_at).await?;
        }
    }

    Ok(())
}

async fn insert_answer(
    tx: &mut Transaction<'_, Postgres>,
    response_id: Uuid,
    question_id: Uuid,
    option_id: Option<Uuid>,
    answer_text: &str,
    answer_value: &str,
    submitted_at: DateTime<Utc>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO helpdesk.survey_answers
        (id, survey_response_id, question_id, question_option_id, answer_text, answer_value,
         created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
        ON CONFLICT (survey_response_id, question_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(response_id)
    .bind(question_id)
    .bind(option_id)
    .bind(answer_text)
    .bind(answer_value)
    .bind(submitted_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn seed_time(year: i32, month: u32, day: u32, hour: u32) -> anyhow::Result<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .context("invalid seed timestamp")
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let mut categories = Vec::new();
    for (name, requires_login) in SERVICE_CATEGORIES {
        let id = upsert_category(pool, name, requires_login).await?;
        let questionnaire_id = ensure_questionnaire(pool, id, name).await?;
        categories.push((name, id, questionnaire_id));
    }
    let category = |name: &str| {
        categories
            .iter()
            .find(|(category, _, _)| *category == name)
            .map(|(_, id, questionnaire_id)| (*id, *questionnaire_id))
            .with_context(|| format!("seed category {name} missing"))
    };

    let users = vec![
        ("Rani Putri", "rani.putri@students.unila.ac.id", "student"),
        ("Dimas Saputra", "dimas.saputra@students.unila.ac.id", "student"),
        ("Dr. Hendra Wijaya", "hendra.wijaya@unila.ac.id", "lecturer"),
        ("Sari Lestari", "sari.lestari@unila.ac.id", "staff"),
    ];
    let mut user_ids = Vec::new();
    for (name, email, entity_type) in users {
        let id = upsert_user(pool, name, email, entity_type).await?;
        user_ids.push((email, id, entity_type));
    }
    let user = |email: &str| {
        user_ids
            .iter()
            .find(|(candidate, _, _)| *candidate == email)
            .map(|(_, id, entity_type)| (*id, *entity_type))
            .with_context(|| format!("seed user {email} missing"))
    };

    // (number, title, category, requester, status, created, hours to resolve, score)
    let tickets = vec![
        (
            "TKT-202405-0001",
            "Wi-Fi gedung A tidak terhubung",
            "Jaringan Internet",
            Requester::Registered("rani.putri@students.unila.ac.id"),
            "resolved",
            seed_time(2024, 5, 2, 8)?,
            Some(6),
            Some(4.0),
        ),
        (
            "TKT-202405-0002",
            "Koneksi lambat di laboratorium",
            "Jaringan Internet",
            Requester::Registered("dimas.saputra@students.unila.ac.id"),
            "closed",
            seed_time(2024, 5, 9, 10)?,
            Some(30),
            Some(5.0),
        ),
        (
            "TKT-202405-0003",
            "Tidak bisa akses hotspot asrama",
            "Jaringan Internet",
            Requester::Guest("Budi Santoso", "budi.santoso@gmail.com", "student"),
            "in_progress",
            seed_time(2024, 5, 20, 14)?,
            None,
            None,
        ),
        (
            "TKT-202405-0004",
            "Nilai tidak muncul di Siakadu",
            "Siakadu",
            Requester::Registered("hendra.wijaya@unila.ac.id"),
            "resolved",
            seed_time(2024, 5, 14, 9)?,
            Some(48),
            Some(3.0),
        ),
        (
            "TKT-202406-0001",
            "Lupa password akun SSO",
            "Lupa Password",
            Requester::Guest("Ayu Kartika", "ayu.kartika@yahoo.com", "staff"),
            "resolved",
            seed_time(2024, 6, 3, 7)?,
            Some(2),
            Some(5.0),
        ),
        (
            "TKT-202406-0002",
            "Halaman fakultas menampilkan error 500",
            "Website",
            Requester::Registered("sari.lestari@unila.ac.id"),
            "pending",
            seed_time(2024, 6, 11, 13)?,
            None,
            None,
        ),
    ];

    for (number, title, category_name, requester, status, created_at, hours, score) in tickets {
        let (category_id, questionnaire_id) = category(category_name)?;
        let (user_id, entity_type, guest) = match requester {
            Requester::Registered(email) => {
                let (id, entity_type) = user(email)?;
                (Some(id), entity_type, ("", "", ""))
            }
            Requester::Guest(name, email, user_type) => (None, "", (name, email, user_type)),
        };
        let resolved_at = hours.map(|hours| created_at + Duration::hours(hours));

        let mut tx = pool.begin().await?;
        let Some(ticket_id) = insert_ticket(
            &mut tx,
            &NewTicket {
                ticket_number: number,
                title,
                status,
                priority: "medium",
                category_id,
                user_id,
                entity_type,
                guest_name: guest.0,
                guest_email: guest.1,
                guest_user_type: guest.2,
                created_at,
                resolved_at,
            },
        )
        .await?
        else {
            continue;
        };

        if let (Some(score), Some(resolved_at)) = (score, resolved_at) {
            record_survey(
                &mut tx,
                ticket_id,
                user_id,
                questionnaire_id,
                score,
                resolved_at + Duration::hours(1),
                Some("Respons cepat, terima kasih"),
            )
            .await?;
        }
        tx.commit().await?;
    }

    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        ticket_number: String,
        title: String,
        category: String,
        status: String,
        priority: String,
        user_email: Option<String>,
        guest_name: Option<String>,
        guest_email: Option<String>,
        guest_user_type: Option<String>,
        created_at: DateTime<Utc>,
        resolved_at: Option<DateTime<Utc>>,
        satisfaction_score: Option<f64>,
        comment: Option<String>,
    }

    let categories = PgStore::new(pool.clone()).list_categories().await?;
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("malformed CSV row {}", line + 1))?;
        let category = categories
            .iter()
            .find(|category| category.name.eq_ignore_ascii_case(row.category.trim()))
            .with_context(|| format!("unknown service category '{}'", row.category))?;
        let questionnaire_id = ensure_questionnaire(pool, category.id, &category.name).await?;

        let registered = match row.user_email.as_deref().filter(|email| !email.is_empty()) {
            Some(email) => {
                let user = sqlx::query(
                    "SELECT id, entity_type FROM helpdesk.users \
                     WHERE email = $1 AND deleted_at IS NULL",
                )
                .bind(email)
                .fetch_optional(pool)
                .await?
                .with_context(|| {
                    format!("unknown user '{email}' on ticket {}", row.ticket_number)
                })?;
                let id: Uuid = user.try_get("id")?;
                let entity_type: String = user.try_get("entity_type")?;
                Some((id, entity_type))
            }
            None => None,
        };

        let ticket = NewTicket {
            ticket_number: &row.ticket_number,
            title: &row.title,
            status: &row.status,
            priority: &row.priority,
            category_id: category.id,
            user_id: registered.as_ref().map(|(id, _)| *id),
            entity_type: registered.as_ref().map_or("", |(_, entity_type)| entity_type.as_str()),
            guest_name: row.guest_name.as_deref().unwrap_or_default(),
            guest_email: row.guest_email.as_deref().unwrap_or_default(),
            guest_user_type: row.guest_user_type.as_deref().unwrap_or_default(),
            created_at: row.created_at,
            resolved_at: row.resolved_at,
        };

        // ticket and survey commit together
        let mut tx = pool.begin().await?;
        let Some(ticket_id) = insert_ticket(&mut tx, &ticket).await? else {
            debug!(ticket = %row.ticket_number, "ticket already imported");
            continue;
        };

        if let Some(score) = row.satisfaction_score {
            let submitted_at = row.resolved_at.unwrap_or(row.created_at);
            record_survey(
                &mut tx,
                ticket_id,
                ticket.user_id,
                questionnaire_id,
                score,
                submitted_at,
                row.comment.as_deref(),
            )
            .await
            .with_context(|| format!("failed to record survey for ticket {}", row.ticket_number))?;
        }
        tx.commit().await?;
        inserted += 1;
    }

    Ok(inserted)
}
