use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::sync::Arc;

use crate::config::SmtpConfig;
use crate::shared::utils::format_due_date;
use crate::tasks::types::{Assignee, TaskCreationRequest};

/// Best-effort error channel: delivery failures are logged by the caller,
/// never surfaced to the HTTP caller (the response is already sent).
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("invalid address: {0}")]
    Address(String),
    #[error("failed to build email: {0}")]
    Build(String),
    #[error("smtp transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError>;
}

pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        let email = Message::builder()
            .from(
                message
                    .from
                    .parse()
                    .map_err(|err| DeliveryError::Address(format!("{}", err)))?,
            )
            .to(message
                .to
                .parse()
                .map_err(|err| DeliveryError::Address(format!("{}", err)))?)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(message.text.clone())
            .map_err(|err| DeliveryError::Build(err.to_string()))?;

        let config = self.config.clone();
        tokio::task::spawn_blocking(move || {
            let creds = Credentials::new(config.username.clone(), config.password.clone());
            let mailer = SmtpTransport::relay(&config.server)
                .map_err(|err| DeliveryError::Transport(err.to_string()))?
                .port(config.port)
                .credentials(creds)
                .timeout(Some(config.timeout))
                .build();
            mailer
                .send(&email)
                .map_err(|err| DeliveryError::Transport(err.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|err| DeliveryError::Transport(format!("send task aborted: {}", err)))?
    }
}

/// Resolves who the new-task alert goes to. The default resolves to a
/// single configured address; a per-assignee lookup can be slotted in
/// without touching the orchestrator.
pub trait RecipientResolver: Send + Sync {
    fn recipient(&self, assignees: &[Assignee]) -> String;
}

pub struct FixedRecipient(pub String);

impl RecipientResolver for FixedRecipient {
    fn recipient(&self, _assignees: &[Assignee]) -> String {
        self.0.clone()
    }
}

/// Formats and sends the best-effort email describing a newly created
/// task.
#[derive(Clone)]
pub struct NotificationDispatcher {
    transport: Arc<dyn MailTransport>,
    recipients: Arc<dyn RecipientResolver>,
    from: String,
    frontend_url: String,
}

impl NotificationDispatcher {
    pub fn new(
        transport: Arc<dyn MailTransport>,
        recipients: Arc<dyn RecipientResolver>,
        from: String,
        frontend_url: String,
    ) -> Self {
        Self {
            transport,
            recipients,
            from,
            frontend_url,
        }
    }

    pub fn recipient_for(&self, assignees: &[Assignee]) -> String {
        self.recipients.recipient(assignees)
    }

    pub fn new_task_alert(&self, request: &TaskCreationRequest, task_id: i64) -> EmailMessage {
        let usernames: Vec<&str> = request
            .assigned_to
            .iter()
            .map(|a| a.assignee_username.as_str())
            .collect();
        let assignee_lines: Vec<String> =
            usernames.iter().map(|name| format!("- {}", name)).collect();
        let task_url = format!("{}/task/{}", self.frontend_url, task_id);
        let text = format!(
            "Hello {}!\n\n\
             A new task has been created:\n\
             Task Name: {}\n\
             Description: {}\n\
             Due On: {}\n\
             Assignees:\n{}\n\n\
             You can login to view the task details here: {}\n\n\
             Best regards,\n\
             TaskMaster",
            usernames.join(", "),
            request.task_name,
            request.task_desc,
            format_due_date(&request.due_date_time),
            assignee_lines.join("\n"),
            task_url
        );
        EmailMessage {
            from: self.from.clone(),
            to: self.recipient_for(&request.assigned_to),
            subject: "[TaskMaster] New Task Alert".to_string(),
            text,
        }
    }

    pub async fn send_new_task_alert(
        &self,
        request: &TaskCreationRequest,
        task_id: i64,
    ) -> Result<(), DeliveryError> {
        let message = self.new_task_alert(request, task_id);
        self.transport.send(&message).await
    }
}
