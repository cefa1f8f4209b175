use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mercato_core::notify::{Channel, Notification, NotificationPreferences};
use mercato_core::repository::{NotificationRepository, RepoResult};
use sqlx::PgPool;
use uuid::Uuid;

pub struct StoreNotificationRepository {
    pool: PgPool,
}

impl StoreNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    message: String,
    channels: Vec<String>,
    category: String,
    action_url: Option<String>,
    is_read: bool,
    is_sent: bool,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            message: row.message,
            channels: row.channels.iter().filter_map(|c| Channel::parse(c)).collect(),
            category: row.category,
            action_url: row.action_url,
            is_read: row.is_read,
            is_sent: row.is_sent,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl NotificationRepository for StoreNotificationRepository {
    async fn get_preferences(&self, user_id: Uuid) -> RepoResult<Option<NotificationPreferences>> {
        let row: Option<(Uuid, bool, bool, bool, bool)> = sqlx::query_as(
            r#"
            SELECT user_id, email_enabled, push_enabled, sms_enabled, in_app_enabled
            FROM notification_preferences
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(user_id, email_enabled, push_enabled, sms_enabled, in_app_enabled)| {
            NotificationPreferences { user_id, email_enabled, push_enabled, sms_enabled, in_app_enabled }
        }))
    }

    async fn upsert_preferences(&self, preferences: &NotificationPreferences) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_preferences (user_id, email_enabled, push_enabled, sms_enabled, in_app_enabled)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE
            SET email_enabled = EXCLUDED.email_enabled,
                push_enabled = EXCLUDED.push_enabled,
                sms_enabled = EXCLUDED.sms_enabled,
                in_app_enabled = EXCLUDED.in_app_enabled
            "#,
        )
        .bind(preferences.user_id)
        .bind(preferences.email_enabled)
        .bind(preferences.push_enabled)
        .bind(preferences.sms_enabled)
        .bind(preferences.in_app_enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_notification(&self, notification: &Notification) -> RepoResult<()> {
        let channels: Vec<&str> = notification.channels.iter().map(Channel::as_str).collect();
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, title, message, channels, category, action_url, is_read, is_sent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&channels)
        .bind(&notification.category)
        .bind(&notification.action_url)
        .bind(notification.is_read)
        .bind(notification.is_sent)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_sent(&self, id: Uuid) -> RepoResult<()> {
        sqlx::query("UPDATE notifications SET is_sent = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_notifications(&self, user_id: Uuid, unread_only: bool) -> RepoResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, user_id, title, message, channels, category, action_url, is_read, is_sent, created_at
            FROM notifications
            WHERE user_id = $1 AND ($2 = FALSE OR is_read = FALSE)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn mark_read(&self, user_id: Uuid, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
