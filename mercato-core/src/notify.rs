use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mercato_shared::events::{MarketplaceEvent, NotificationEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::repository::NotificationRepository;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Push,
    Sms,
    InApp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Push => "push",
            Channel::Sms => "sms",
            Channel::InApp => "in_app",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(Channel::Email),
            "push" => Some(Channel::Push),
            "sms" => Some(Channel::Sms),
            "in_app" => Some(Channel::InApp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationPreferences {
    pub user_id: Uuid,
    pub email_enabled: bool,
    pub push_enabled: bool,
    pub sms_enabled: bool,
    pub in_app_enabled: bool,
}

impl NotificationPreferences {
    /// Everything on except SMS.
    pub fn defaults(user_id: Uuid) -> Self {
        Self {
            user_id,
            email_enabled: true,
            push_enabled: true,
            sms_enabled: false,
            in_app_enabled: true,
        }
    }

    pub fn allows(&self, channel: Channel) -> bool {
        match channel {
            Channel::Email => self.email_enabled,
            Channel::Push => self.push_enabled,
            Channel::Sms => self.sms_enabled,
            Channel::InApp => self.in_app_enabled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub channels: Vec<Channel>,
    pub category: String,
    pub action_url: Option<String>,
    pub is_read: bool,
    pub is_sent: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PreferencesUpdate {
    pub email_enabled: Option<bool>,
    pub push_enabled: Option<bool>,
    pub sms_enabled: Option<bool>,
    pub in_app_enabled: Option<bool>,
}

/// What a caller wants delivered to a user.
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub category: String,
    pub channels: Vec<Channel>,
    pub action_url: Option<String>,
}

impl NotificationRequest {
    pub fn new(user_id: Uuid, title: impl Into<String>, message: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            user_id,
            title: title.into(),
            message: message.into(),
            category: category.into(),
            channels: vec![Channel::Email, Channel::Push, Channel::InApp],
            action_url: None,
        }
    }

    pub fn with_action_url(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }
}

/// Outbound transport for marketplace events (notifications, order events).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, event: &MarketplaceEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Writes events to the tracing log. Used when no broker is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn publish(&self, event: &MarketplaceEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let payload = serde_json::to_string(event)?;
        tracing::info!(key = %event.key(), "Marketplace event: {}", payload);
        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
    sink: Arc<dyn NotificationSink>,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepository>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { repo, sink }
    }

    /// Record and forward a notification on the channels the user allows.
    /// Returns `None` when every requested channel is disabled.
    pub async fn notify(&self, request: NotificationRequest) -> CoreResult<Option<Notification>> {
        let preferences = self
            .repo
            .get_preferences(request.user_id)
            .await?
            .unwrap_or_else(|| NotificationPreferences::defaults(request.user_id));

        let channels: Vec<Channel> = request
            .channels
            .iter()
            .copied()
            .filter(|c| preferences.allows(*c))
            .collect();
        if channels.is_empty() {
            tracing::warn!(user_id = %request.user_id, category = %request.category, "No enabled channels, notification skipped");
            return Ok(None);
        }

        let mut notification = Notification {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            title: request.title,
            message: request.message,
            channels,
            category: request.category,
            action_url: request.action_url,
            is_read: false,
            is_sent: false,
            created_at: Utc::now(),
        };
        self.repo.insert_notification(&notification).await?;

        let event = MarketplaceEvent::Notification(NotificationEvent {
            notification_id: notification.id,
            user_id: notification.user_id,
            title: notification.title.clone(),
            message: notification.message.clone(),
            channels: notification.channels.iter().map(|c| c.as_str().to_string()).collect(),
            category: Some(notification.category.clone()),
            action_url: notification.action_url.clone(),
            created_at: notification.created_at,
        });

        match self.sink.publish(&event).await {
            Ok(()) => {
                if let Err(e) = self.repo.mark_sent(notification.id).await {
                    tracing::warn!(notification_id = %notification.id, "Failed to mark notification sent: {}", e);
                } else {
                    notification.is_sent = true;
                }
            }
            Err(e) => {
                tracing::warn!(notification_id = %notification.id, "Notification sink rejected event: {}", e);
            }
        }

        Ok(Some(notification))
    }

    /// Fire-and-forget: failures are logged and swallowed.
    pub async fn notify_quietly(&self, request: NotificationRequest) {
        let user_id = request.user_id;
        if let Err(e) = self.notify(request).await {
            tracing::error!(%user_id, "Notification failed: {}", e);
        }
    }

    /// Forward a domain event to the sink without recording anything.
    pub async fn publish(&self, event: MarketplaceEvent) {
        if let Err(e) = self.sink.publish(&event).await {
            tracing::warn!(key = %event.key(), "Failed to publish event: {}", e);
        }
    }

    pub async fn list(&self, user_id: Uuid, unread_only: bool) -> CoreResult<Vec<Notification>> {
        Ok(self.repo.list_notifications(user_id, unread_only).await?)
    }

    pub async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> CoreResult<()> {
        if !self.repo.mark_read(user_id, notification_id).await? {
            return Err(CoreError::NotFound(format!("Notification {}", notification_id)));
        }
        Ok(())
    }

    pub async fn preferences(&self, user_id: Uuid) -> CoreResult<NotificationPreferences> {
        Ok(self
            .repo
            .get_preferences(user_id)
            .await?
            .unwrap_or_else(|| NotificationPreferences::defaults(user_id)))
    }

    pub async fn update_preferences(&self, user_id: Uuid, update: PreferencesUpdate) -> CoreResult<NotificationPreferences> {
        let mut preferences = self.preferences(user_id).await?;
        if let Some(enabled) = update.email_enabled {
            preferences.email_enabled = enabled;
        }
        if let Some(enabled) = update.push_enabled {
            preferences.push_enabled = enabled;
        }
        if let Some(enabled) = update.sms_enabled {
            preferences.sms_enabled = enabled;
        }
        if let Some(enabled) = update.in_app_enabled {
            preferences.in_app_enabled = enabled;
        }
        self.repo.upsert_preferences(&preferences).await?;
        Ok(preferences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<MarketplaceEvent>>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn publish(&self, event: &MarketplaceEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            if self.fail {
                return Err("broker unavailable".into());
            }
            self.events.lock().await.push(event.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_notify_records_and_publishes() {
        let store = Arc::new(InMemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let service = NotificationService::new(store.clone(), sink.clone());
        let user_id = Uuid::new_v4();

        let sent = service
            .notify(NotificationRequest::new(user_id, "Order Confirmed", "Thanks!", "order"))
            .await
            .unwrap()
            .unwrap();

        assert!(sent.is_sent);
        assert_eq!(sent.channels, vec![Channel::Email, Channel::Push, Channel::InApp]);
        assert_eq!(sink.events.lock().await.len(), 1);
        assert_eq!(service.list(user_id, true).await.unwrap().len(), 1);

        service.mark_read(user_id, sent.id).await.unwrap();
        assert!(service.list(user_id, true).await.unwrap().is_empty());
        assert!(service.mark_read(Uuid::new_v4(), sent.id).await.is_err());
    }

    #[tokio::test]
    async fn test_disabled_channels_skip_notification() {
        let store = Arc::new(InMemoryStore::new());
        let service = NotificationService::new(store.clone(), Arc::new(LogNotificationSink));
        let user_id = Uuid::new_v4();

        let mut request = NotificationRequest::new(user_id, "Flash sale", "50% off", "promotion");
        request.channels = vec![Channel::Sms];

        assert!(service.notify(request).await.unwrap().is_none());
        assert!(service.list(user_id, false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_preferences_filter_channels() {
        let store = Arc::new(InMemoryStore::new());
        let service = NotificationService::new(store.clone(), Arc::new(LogNotificationSink));
        let user_id = Uuid::new_v4();

        assert_eq!(service.preferences(user_id).await.unwrap(), NotificationPreferences::defaults(user_id));
        service
            .update_preferences(user_id, PreferencesUpdate { email_enabled: Some(false), ..Default::default() })
            .await
            .unwrap();

        let sent = service
            .notify(NotificationRequest::new(user_id, "Order Shipped", "On its way", "order"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sent.channels, vec![Channel::Push, Channel::InApp]);
    }

    #[tokio::test]
    async fn test_sink_failure_is_not_propagated() {
        let store = Arc::new(InMemoryStore::new());
        let sink = Arc::new(RecordingSink { fail: true, ..Default::default() });
        let service = NotificationService::new(store.clone(), sink);
        let user_id = Uuid::new_v4();

        let notification = service
            .notify(NotificationRequest::new(user_id, "Shipped", "On its way", "order"))
            .await
            .unwrap()
            .unwrap();
        assert!(!notification.is_sent);
        assert_eq!(service.list(user_id, false).await.unwrap().len(), 1);
    }
}
