//! PostgreSQL-based delivery record store.
//!
//! Records live in the `email_logs` table. Each transition is a single
//! conditional `UPDATE ... WHERE status = <source>`, so concurrent claimants
//! race inside PostgreSQL and only one of them sees a returned row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::notification::NotificationType;

use super::backend::{stats_windows, EmailLogStore, EmailStoreError, EmailStoreResult, FailureOutcome};
use super::models::{
    EmailLog, EmailLogFilter, EmailLogPage, EmailLogStats, EmailStatus, NewEmailLog,
};

const COLUMNS: &str = "id, template_id, recipient_id, recipient_email, recipient_name, subject, \
                       notification_type, entity_type, entity_id, html_body, metadata, status, \
                       retry_count, error_message, sent_at, failed_at, created_at, updated_at";

/// PostgreSQL-based delivery record store.
pub struct PostgresEmailLogStore {
    pool: PgPool,
}

impl PostgresEmailLogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &EmailLogFilter) {
        builder.push(" WHERE TRUE");
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(notification_type) = filter.notification_type {
            builder
                .push(" AND notification_type = ")
                .push_bind(notification_type.as_str());
        }
        if let Some(recipient) = filter.recipient.as_deref().filter(|r| !r.is_empty()) {
            builder
                .push(" AND recipient_email ILIKE ")
                .push_bind(format!("%{}%", escape_like(recipient)));
        }
        if let Some(from) = filter.from {
            builder.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            builder.push(" AND created_at <= ").push_bind(to);
        }
    }
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[derive(sqlx::FromRow)]
struct EmailLogRow {
    id: Uuid,
    template_id: Option<Uuid>,
    recipient_id: Option<Uuid>,
    recipient_email: String,
    recipient_name: Option<String>,
    subject: String,
    notification_type: String,
    entity_type: Option<String>,
    entity_id: Option<String>,
    html_body: Option<String>,
    metadata: serde_json::Value,
    status: String,
    retry_count: i32,
    error_message: Option<String>,
    sent_at: Option<DateTime<Utc>>,
    failed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EmailLogRow> for EmailLog {
    type Error = EmailStoreError;

    fn try_from(row: EmailLogRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<EmailStatus>()
            .map_err(|reason| EmailStoreError::Corrupt { id: row.id, reason })?;
        let metadata = match row.metadata {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => Default::default(),
            other => {
                return Err(EmailStoreError::Corrupt {
                    id: row.id,
                    reason: format!("metadata is not an object: {}", other),
                })
            }
        };

        Ok(EmailLog {
            id: row.id,
            template_id: row.template_id,
            recipient_id: row.recipient_id,
            recipient_email: row.recipient_email,
            recipient_name: row.recipient_name,
            subject: row.subject,
            notification_type: NotificationType::from_stored(&row.notification_type),
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            html_body: row.html_body,
            metadata,
            status,
            retry_count: row.retry_count.max(0) as u32,
            error_message: row.error_message,
            sent_at: row.sent_at,
            failed_at: row.failed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl EmailLogStore for PostgresEmailLogStore {
    fn backend_type(&self) -> &'static str {
        "postgres"
    }

    async fn insert(&self, new: NewEmailLog) -> EmailStoreResult<EmailLog> {
        let log = EmailLog::queued(new);

        sqlx::query(
            r#"
            INSERT INTO email_logs (
                id, template_id, recipient_id, recipient_email, recipient_name, subject,
                notification_type, entity_type, entity_id, html_body, metadata, status,
                retry_count, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'QUEUED', 0, $12, $12)
            "#,
        )
        .bind(log.id)
        .bind(log.template_id)
        .bind(log.recipient_id)
        .bind(&log.recipient_email)
        .bind(&log.recipient_name)
        .bind(&log.subject)
        .bind(log.notification_type.as_str())
        .bind(&log.entity_type)
        .bind(&log.entity_id)
        .bind(&log.html_body)
        .bind(serde_json::Value::Object(log.metadata.clone()))
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;

        Ok(log)
    }

    async fn get(&self, id: Uuid) -> EmailStoreResult<Option<EmailLog>> {
        let sql = format!("SELECT {COLUMNS} FROM email_logs WHERE id = $1");
        let row: Option<EmailLogRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(EmailLog::try_from).transpose()
    }

    async fn eligible(&self, max_retries: u32, limit: usize) -> EmailStoreResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id
            FROM email_logs
            WHERE status = 'QUEUED' AND retry_count < $1
            ORDER BY created_at ASC, id ASC
            LIMIT $2
            "#,
        )
        .bind(max_retries as i32)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn claim(&self, id: Uuid) -> EmailStoreResult<Option<EmailLog>> {
        let sql = format!(
            "UPDATE email_logs SET status = 'SENDING', updated_at = NOW() \
             WHERE id = $1 AND status = 'QUEUED' \
             RETURNING {COLUMNS}"
        );
        let row: Option<EmailLogRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(EmailLog::try_from).transpose()
    }

    async fn mark_sent(&self, id: Uuid) -> EmailStoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE email_logs
            SET status = 'SENT', sent_at = NOW(), error_message = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'SENDING'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_failure(
        &self,
        id: Uuid,
        error: &str,
        max_retries: u32,
    ) -> EmailStoreResult<FailureOutcome> {
        let row: Option<(String, i32)> = sqlx::query_as(
            r#"
            UPDATE email_logs
            SET retry_count = retry_count + 1,
                error_message = $2,
                status = CASE WHEN retry_count + 1 >= $3 THEN 'FAILED' ELSE 'QUEUED' END,
                failed_at = CASE WHEN retry_count + 1 >= $3 THEN NOW() ELSE failed_at END,
                updated_at = NOW()
            WHERE id = $1 AND status = 'SENDING'
            RETURNING status, retry_count
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(max_retries as i32)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            None => FailureOutcome::Lost,
            Some((status, retry_count)) => {
                let retry_count = retry_count.max(0) as u32;
                if status == EmailStatus::Failed.as_str() {
                    FailureOutcome::Exhausted { retry_count }
                } else {
                    FailureOutcome::Requeued { retry_count }
                }
            }
        })
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> EmailStoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE email_logs
            SET status = 'FAILED', failed_at = NOW(), error_message = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'SENDING'
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn reset_failed(&self, id: Uuid) -> EmailStoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE email_logs
            SET status = 'QUEUED', retry_count = 0, error_message = NULL, failed_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'FAILED'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn requeue_stale(&self, cutoff: DateTime<Utc>) -> EmailStoreResult<usize> {
        let result = sqlx::query(
            r#"
            UPDATE email_logs
            SET status = 'QUEUED', updated_at = NOW()
            WHERE status = 'SENDING' AND updated_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() as usize)
    }

    async fn list(&self, filter: &EmailLogFilter) -> EmailStoreResult<EmailLogPage> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM email_logs");
        Self::push_filters(&mut count, filter);
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM email_logs"));
        Self::push_filters(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(filter.limit()))
            .push(" OFFSET ")
            .push_bind(filter.offset() as i64);

        let rows: Vec<EmailLogRow> = select.build_query_as().fetch_all(&self.pool).await?;
        let items = rows
            .into_iter()
            .map(EmailLog::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(EmailLogPage::new(items, total.max(0) as u64, filter))
    }

    async fn stats(&self, now: DateTime<Utc>) -> EmailStoreResult<EmailLogStats> {
        let (today, week) = stats_windows(now);

        let (total, queued, sending, sent, failed, sent_today, failed_today, sent_week, failed_week): (
            i64,
            i64,
            i64,
            i64,
            i64,
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE status = 'QUEUED'),
                COUNT(*) FILTER (WHERE status = 'SENDING'),
                COUNT(*) FILTER (WHERE status = 'SENT'),
                COUNT(*) FILTER (WHERE status = 'FAILED'),
                COUNT(*) FILTER (WHERE status = 'SENT' AND sent_at >= $1),
                COUNT(*) FILTER (WHERE status = 'FAILED' AND failed_at >= $1),
                COUNT(*) FILTER (WHERE status = 'SENT' AND sent_at >= $2),
                COUNT(*) FILTER (WHERE status = 'FAILED' AND failed_at >= $2)
            FROM email_logs
            "#,
        )
        .bind(today)
        .bind(week)
        .fetch_one(&self.pool)
        .await?;

        let n = |v: i64| v.max(0) as u64;
        Ok(EmailLogStats {
            total: n(total),
            queued: n(queued),
            sending: n(sending),
            sent: n(sent),
            failed: n(failed),
            sent_today: n(sent_today),
            failed_today: n(failed_today),
            sent_this_week: n(sent_week),
            failed_this_week: n(failed_week),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a_b%c"), "a\\_b\\%c");
        assert_eq!(escape_like("plain"), "plain");
    }
}
