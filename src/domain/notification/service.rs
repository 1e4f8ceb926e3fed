//! Notification orchestration.
//!
//! Ties the pipeline together: resolve recipients, render once per
//! recipient, enqueue one delivery record each. Sending happens later in
//! the delivery engine's batch run.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::delivery::{DeliveryEngine, DeliveryError, EmailMetadata, EmailStatus, NewEmailLog};
use crate::metrics::NotificationMetrics;
use crate::recipient::{DirectoryError, RecipientResolver};
use crate::template::TemplateEngine;

use super::events::{AssetDetails, LeaveRequestDetails, LeaveStatus};
use super::types::{NotificationContext, NotificationType, Priority, TemplateVariables};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Email transport is not configured")]
    TransportNotConfigured,

    #[error("Recipient resolution failed: {0}")]
    Resolution(#[from] DirectoryError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Outcome of a synchronous notification, counted over its own records only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifySyncResult {
    pub success: bool,
    pub sent_count: usize,
    pub failed_count: usize,
}

/// Entry point for business code that wants to notify people by email.
#[derive(Clone)]
pub struct NotificationService {
    resolver: RecipientResolver,
    templates: Arc<TemplateEngine>,
    delivery: DeliveryEngine,
}

impl NotificationService {
    pub fn new(
        resolver: RecipientResolver,
        templates: Arc<TemplateEngine>,
        delivery: DeliveryEngine,
    ) -> Self {
        Self {
            resolver,
            templates,
            delivery,
        }
    }

    pub fn delivery(&self) -> &DeliveryEngine {
        &self.delivery
    }

    pub fn templates(&self) -> &TemplateEngine {
        &self.templates
    }

    /// Fire-and-forget dispatch.
    ///
    /// Returns immediately. The handle yields the number of records enqueued;
    /// every failure is logged and reported as 0, never raised to the caller.
    pub fn notify(
        &self,
        notification_type: NotificationType,
        context: NotificationContext,
    ) -> JoinHandle<usize> {
        let service = self.clone();
        tokio::spawn(async move {
            match service.dispatch(notification_type, &context, true).await {
                Ok(ids) => ids.len(),
                Err(e) => {
                    NotificationMetrics::record_dropped();
                    tracing::error!(
                        notification_type = %notification_type,
                        entity_type = ?context.entity_type,
                        entity_id = ?context.entity_id,
                        error = %e,
                        "Notification dropped"
                    );
                    0
                }
            }
        })
    }

    /// Enqueue, run one batch now, and report what happened to this
    /// notification's records.
    ///
    /// Only an unconfigured transport is an error; anything else is reported
    /// through the counts.
    #[tracing::instrument(skip(self, context))]
    pub async fn notify_sync(
        &self,
        notification_type: NotificationType,
        context: NotificationContext,
    ) -> Result<NotifySyncResult, NotificationError> {
        if !self.delivery.is_transport_configured() {
            return Err(NotificationError::TransportNotConfigured);
        }

        let ids = match self.dispatch(notification_type, &context, false).await {
            Ok(ids) => ids,
            Err(e) => {
                NotificationMetrics::record_dropped();
                tracing::warn!(error = %e, "Synchronous notification failed before delivery");
                return Ok(NotifySyncResult::default());
            }
        };

        if ids.is_empty() {
            return Ok(NotifySyncResult::default());
        }

        let limit = self.delivery.config().batch_size.max(ids.len());
        if let Err(e) = self.delivery.process_batch(limit).await {
            tracing::warn!(error = %e, "Batch run failed during synchronous notification");
        }

        let mut result = NotifySyncResult::default();
        for id in &ids {
            match self.delivery.get(*id).await {
                Ok(Some(log)) if log.status == EmailStatus::Sent => result.sent_count += 1,
                Ok(Some(log))
                    if log.status == EmailStatus::Failed
                        || (log.status == EmailStatus::Queued && log.retry_count > 0) =>
                {
                    result.failed_count += 1
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(log_id = %id, error = %e, "Failed to read back email log"),
            }
        }
        result.success = result.sent_count == ids.len();

        Ok(result)
    }

    /// Resolve, render and enqueue. Returns the ids of the stored records.
    async fn dispatch(
        &self,
        notification_type: NotificationType,
        context: &NotificationContext,
        expedite: bool,
    ) -> Result<Vec<Uuid>, NotificationError> {
        NotificationMetrics::record_accepted(notification_type.as_str());

        let recipients = self.resolver.resolve(notification_type, context).await?;
        if recipients.is_empty() {
            tracing::debug!(
                notification_type = %notification_type,
                "No recipients resolved, nothing to send"
            );
            return Ok(Vec::new());
        }

        // Loaded once; every recipient renders against the same version
        let template = self.templates.get_active_template(notification_type).await;
        let metadata = build_metadata(context);

        let mut ids = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let mut variables = context.variables.clone();
            variables.insert("recipientName".into(), json!(recipient.name));
            variables.insert("recipientEmail".into(), json!(recipient.email));

            let rendered = self
                .templates
                .render_with(notification_type, template.as_ref(), &variables);

            let id = self
                .delivery
                .enqueue(NewEmailLog {
                    template_id: rendered.template_id,
                    recipient_id: recipient.user_id,
                    recipient_email: recipient.email,
                    recipient_name: Some(recipient.name),
                    subject: rendered.subject,
                    notification_type,
                    entity_type: context.entity_type.clone(),
                    entity_id: context.entity_id.clone(),
                    html_body: Some(rendered.html),
                    metadata: metadata.clone(),
                })
                .await?;
            ids.push(id);
        }

        tracing::info!(
            notification_type = %notification_type,
            recipients = ids.len(),
            priority = %context.priority.as_str(),
            "Notification enqueued"
        );

        if expedite && context.priority.is_expedited() {
            let delivery = self.delivery.clone();
            let limit = delivery.config().batch_size;
            tokio::spawn(async move {
                if let Err(e) = delivery.process_batch(limit).await {
                    tracing::warn!(error = %e, "Expedited batch run failed");
                }
            });
        }

        Ok(ids)
    }

    // ========================================================================
    // Typed wrappers
    // ========================================================================

    /// Greet a new employee with their initial credentials.
    pub fn send_welcome_email(
        &self,
        user_id: Uuid,
        employee_name: &str,
        company_name: &str,
        temporary_password: &str,
        login_url: &str,
    ) -> JoinHandle<usize> {
        let context = NotificationContext::builder()
            .subject(user_id)
            .entity("User", user_id.to_string())
            .variable("employeeName", employee_name)
            .variable("companyName", company_name)
            .variable("temporaryPassword", temporary_password)
            .variable("loginUrl", login_url)
            .recipient_ids(vec![user_id])
            .priority(Priority::High)
            .build();
        self.notify(NotificationType::WelcomeEmail, context)
    }

    pub fn send_password_reset(
        &self,
        user_id: Uuid,
        reset_url: &str,
        expires_in: &str,
    ) -> JoinHandle<usize> {
        let context = NotificationContext::builder()
            .subject(user_id)
            .entity("User", user_id.to_string())
            .variable("resetUrl", reset_url)
            .variable("expiresIn", expires_in)
            .recipient_ids(vec![user_id])
            .priority(Priority::Urgent)
            .build();
        self.notify(NotificationType::PasswordReset, context)
    }

    /// A leave request was submitted, approved, rejected or cancelled.
    pub fn send_leave_status(
        &self,
        status: LeaveStatus,
        leave: &LeaveRequestDetails,
        actor_id: Option<Uuid>,
    ) -> JoinHandle<usize> {
        let mut builder = NotificationContext::builder()
            .subject(leave.employee_id)
            .entity("LeaveRequest", leave.request_id.to_string())
            .variables(leave.to_variables());
        if let Some(actor_id) = actor_id {
            builder = builder.actor(actor_id);
        }
        self.notify(status.notification_type(), builder.build())
    }

    pub fn send_asset_assigned(
        &self,
        asset: &AssetDetails,
        actor_id: Option<Uuid>,
    ) -> JoinHandle<usize> {
        self.notify(
            NotificationType::AssetAssigned,
            asset_context(asset, asset.to_assigned_variables(), actor_id),
        )
    }

    pub fn send_asset_returned(
        &self,
        asset: &AssetDetails,
        actor_id: Option<Uuid>,
    ) -> JoinHandle<usize> {
        self.notify(
            NotificationType::AssetReturned,
            asset_context(asset, asset.to_returned_variables(), actor_id),
        )
    }

    pub fn send_appreciation(
        &self,
        sender_id: Uuid,
        sender_name: &str,
        recipient_id: Uuid,
        category: &str,
        message: &str,
    ) -> JoinHandle<usize> {
        let context = NotificationContext::builder()
            .actor(sender_id)
            .subject(recipient_id)
            .entity("Appreciation", recipient_id.to_string())
            .variable("senderName", sender_name)
            .variable("category", category)
            .variable("message", message)
            .build();
        self.notify(NotificationType::Appreciation, context)
    }

    /// Company announcement. With no explicit recipients the announcement
    /// rule decides who receives it.
    pub fn send_announcement(
        &self,
        author_id: Uuid,
        author_name: &str,
        title: &str,
        content: &str,
        recipient_ids: Vec<Uuid>,
    ) -> JoinHandle<usize> {
        let context = NotificationContext::builder()
            .actor(author_id)
            .entity("Announcement", title)
            .variable("authorName", author_name)
            .variable("title", title)
            .variable("content", content)
            .recipient_ids(recipient_ids)
            .build();
        self.notify(NotificationType::Announcement, context)
    }
}

fn asset_context(
    asset: &AssetDetails,
    variables: TemplateVariables,
    actor_id: Option<Uuid>,
) -> NotificationContext {
    let mut builder = NotificationContext::builder()
        .subject(asset.employee_id)
        .entity("Asset", asset.asset_id.to_string())
        .variables(variables);
    if let Some(actor_id) = actor_id {
        builder = builder.actor(actor_id);
    }
    builder.build()
}

fn build_metadata(context: &NotificationContext) -> EmailMetadata {
    let mut metadata = EmailMetadata::new();
    metadata.insert("priority".into(), json!(context.priority.as_str()));
    if let Some(actor_id) = context.actor_id {
        metadata.insert("actorId".into(), json!(actor_id));
    }
    if let Some(subject_id) = context.subject_user_id {
        metadata.insert("subjectUserId".into(), json!(subject_id));
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{
        DeliveryConfig, DisabledTransport, EmailLogFilter, MailTransport, MemoryEmailLogStore,
        TransportError,
    };
    use crate::recipient::{
        DirectoryUser, MemoryDirectory, OrganizationDirectory, RecipientConfig, Role,
    };
    use crate::template::{LayoutConfig, TemplateStore};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingTransport {
        reject: Option<String>,
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingTransport {
        fn rejecting(address: &str) -> Self {
            Self {
                reject: Some(address.to_string()),
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn send_mail(&self, to: &str, subject: &str, _html: &str) -> Result<(), TransportError> {
            if self.reject.as_deref() == Some(to) {
                return Err(TransportError::Smtp("mailbox unavailable".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string()));
            Ok(())
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn verify(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn user(first: &str, email: &str, role: Role) -> DirectoryUser {
        DirectoryUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            first_name: first.to_string(),
            last_name: "Test".to_string(),
            role,
            is_active: true,
            manager_id: None,
            team_id: None,
            department_id: None,
        }
    }

    fn config() -> DeliveryConfig {
        DeliveryConfig {
            send_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    fn service_with(
        directory: Arc<MemoryDirectory>,
        transport: Arc<dyn MailTransport>,
    ) -> NotificationService {
        let directory: Arc<dyn OrganizationDirectory> = directory;
        let templates = TemplateEngine::new(Arc::new(TemplateStore::new()), LayoutConfig::default());
        let delivery = DeliveryEngine::new(Arc::new(MemoryEmailLogStore::new()), transport, config());
        NotificationService::new(RecipientResolver::new(directory), Arc::new(templates), delivery)
    }

    #[tokio::test]
    async fn test_notify_enqueues_one_record_per_recipient() {
        let directory = Arc::new(MemoryDirectory::new());
        let employee = user("Ana", "ana@corp.test", Role::Employee);
        let hr = user("Hana", "hana@corp.test", Role::Hr);
        directory.upsert_user(employee.clone());
        directory.upsert_user(hr);
        directory.set_rule(
            NotificationType::LeaveRequestApproved,
            true,
            RecipientConfig {
                notify_requester: true,
                notify_hr: true,
                ..Default::default()
            },
        );
        let transport = Arc::new(RecordingTransport::default());
        let service = service_with(directory, transport.clone());

        let context = NotificationContext::builder()
            .subject(employee.id)
            .entity("LeaveRequest", "lr-1")
            .variable("leaveType", "Annual Leave")
            .build();
        let enqueued = service
            .notify(NotificationType::LeaveRequestApproved, context)
            .await
            .unwrap();
        assert_eq!(enqueued, 2);

        let page = service
            .delivery()
            .list(&EmailLogFilter::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        for log in &page.items {
            assert_eq!(log.subject, "Leave Request Approved - Annual Leave");
            assert_eq!(log.entity_id.as_deref(), Some("lr-1"));
            assert_eq!(log.status, EmailStatus::Queued);
            assert_eq!(log.metadata["priority"], "NORMAL");
        }
        // Normal priority waits for the scheduled run
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_recipient_variables_are_per_recipient() {
        let directory = Arc::new(MemoryDirectory::new());
        let service = service_with(directory, Arc::new(RecordingTransport::default()));

        let context = NotificationContext::builder()
            .variable("subject", "Quarterly update")
            .variable("message", "Numbers are in.")
            .recipient_emails(vec!["a@corp.test".into(), "b@corp.test".into()])
            .build();
        service
            .notify(NotificationType::Custom, context)
            .await
            .unwrap();

        let page = service
            .delivery()
            .list(&EmailLogFilter::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);

        for log in &page.items {
            let stored = service.delivery().get(log.id).await.unwrap().unwrap();
            let html = stored.html_body.unwrap();
            assert!(html.contains(&format!("Hello {},", stored.recipient_email)));
            assert_eq!(stored.subject, "Quarterly update");
        }
    }

    #[tokio::test]
    async fn test_notify_with_no_recipients_enqueues_nothing() {
        let directory = Arc::new(MemoryDirectory::new());
        let service = service_with(directory, Arc::new(RecordingTransport::default()));

        let enqueued = service
            .notify(NotificationType::Announcement, NotificationContext::default())
            .await
            .unwrap();
        assert_eq!(enqueued, 0);
    }

    #[tokio::test]
    async fn test_urgent_priority_sends_without_scheduler() {
        let directory = Arc::new(MemoryDirectory::new());
        let employee = user("Ana", "ana@corp.test", Role::Employee);
        directory.upsert_user(employee.clone());
        let transport = Arc::new(RecordingTransport::default());
        let service = service_with(directory, transport.clone());

        let enqueued = service
            .send_password_reset(employee.id, "https://hr.test/reset/abc", "1 hour")
            .await
            .unwrap();
        assert_eq!(enqueued, 1);

        for _ in 0..50 {
            if !transport.sent().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            transport.sent(),
            vec![("ana@corp.test".to_string(), "Password Reset Request".to_string())]
        );
    }

    #[tokio::test]
    async fn test_notify_sync_reports_counts() {
        let directory = Arc::new(MemoryDirectory::new());
        let transport = Arc::new(RecordingTransport::rejecting("bad@corp.test"));
        let service = service_with(directory, transport.clone());

        let context = NotificationContext::builder()
            .variable("subject", "Test")
            .recipient_emails(vec!["good@corp.test".into(), "bad@corp.test".into()])
            .build();
        let result = service
            .notify_sync(NotificationType::Custom, context)
            .await
            .unwrap();

        assert_eq!(result.sent_count, 1);
        assert_eq!(result.failed_count, 1);
        assert!(!result.success);
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_notify_sync_success() {
        let directory = Arc::new(MemoryDirectory::new());
        let service = service_with(directory, Arc::new(RecordingTransport::default()));

        let context = NotificationContext::builder()
            .variable("subject", "Test")
            .recipient_emails(vec!["ops@corp.test".into()])
            .build();
        let result = service
            .notify_sync(NotificationType::Custom, context)
            .await
            .unwrap();

        assert_eq!(
            result,
            NotifySyncResult {
                success: true,
                sent_count: 1,
                failed_count: 0
            }
        );
    }

    #[tokio::test]
    async fn test_notify_sync_requires_configured_transport() {
        let directory = Arc::new(MemoryDirectory::new());
        let service = service_with(directory, Arc::new(DisabledTransport));

        let context = NotificationContext::builder()
            .recipient_emails(vec!["ops@corp.test".into()])
            .build();
        let result = service.notify_sync(NotificationType::Custom, context).await;
        assert!(matches!(result, Err(NotificationError::TransportNotConfigured)));
    }

    #[tokio::test]
    async fn test_leave_wrapper_uses_subject_as_requester() {
        let directory = Arc::new(MemoryDirectory::new());
        let employee = user("Ana", "ana@corp.test", Role::Employee);
        directory.upsert_user(employee.clone());
        let service = service_with(directory, Arc::new(RecordingTransport::default()));

        let leave = LeaveRequestDetails {
            request_id: Uuid::new_v4(),
            employee_id: employee.id,
            employee_name: "Ana Test".to_string(),
            leave_type: "Sick Leave".to_string(),
            start_date: chrono::NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            end_date: chrono::NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            total_days: 2.0,
            reason: None,
            approver_name: None,
            comments: Some("Not enough cover".to_string()),
            action_url: None,
        };
        let enqueued = service
            .send_leave_status(LeaveStatus::Rejected, &leave, None)
            .await
            .unwrap();
        assert_eq!(enqueued, 1);

        let page = service
            .delivery()
            .list(&EmailLogFilter::default())
            .await
            .unwrap();
        assert_eq!(page.items[0].recipient_email, "ana@corp.test");
        assert_eq!(page.items[0].subject, "Leave Request Rejected - Sick Leave");
        assert_eq!(page.items[0].entity_type.as_deref(), Some("LeaveRequest"));
    }
}
