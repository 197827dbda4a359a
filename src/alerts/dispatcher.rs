use crate::alerts::payload::{GatewayAction, GatewayPayload, LogIntakePayload, API_KEY_HEADER};
use crate::alerts::transport::{OutboundRequest, Transport};
use crate::config::Config;
use crate::error::DeliveryError;
use crate::events::Notification;
use crate::sink::Sink;
use log::debug;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Delivery channels in fan-out order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Text,
    Call,
    Webhook,
    LogIntake,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Text => "text",
            Channel::Call => "call",
            Channel::Webhook => "webhook",
            Channel::LogIntake => "log_intake",
        };
        f.write_str(name)
    }
}

/// Result of one channel attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ChannelOutcome {
    Delivered,
    /// Channel not attempted; carries the reason
    Skipped(String),
    /// Attempted and failed; carries the failure detail
    Failed(String),
}

/// Per-channel results for one notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchReport {
    pub notification_id: String,
    pub outcomes: Vec<(Channel, ChannelOutcome)>,
}

impl DispatchReport {
    pub fn outcome(&self, channel: Channel) -> Option<&ChannelOutcome> {
        self.outcomes
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, o)| o)
    }

    pub fn delivered_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == ChannelOutcome::Delivered)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, ChannelOutcome::Failed(_)))
            .count()
    }
}

const NOT_CONFIGURED: &str = "not configured";

/// Fans an admitted notification out to every eligible channel
///
/// Channels are attempted concurrently and independently. A failure on one
/// channel is written to the diagnostics sink and never stops the others.
/// Admission control happens before a notification gets here.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    /// Original, non-intercepted sink used for configuration-gap and failure lines
    diagnostics: Arc<dyn Sink>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, diagnostics: Arc<dyn Sink>) -> Self {
        Self {
            transport,
            diagnostics,
        }
    }

    /// Attempt every channel and wait for all attempts to finish
    ///
    /// `config` is the configuration captured when the notification was
    /// admitted, so runtime updates never change a dispatch mid-flight.
    pub async fn dispatch(&self, notification: &Notification, config: &Config) -> DispatchReport {
        debug!(
            "Dispatching {} notification {}",
            notification.kind, notification.id
        );

        let (text, call, webhook, log_intake) = tokio::join!(
            self.send_text(notification, config),
            self.make_call(notification, config),
            self.send_webhook(notification, config),
            self.send_log_intake(notification, config),
        );

        DispatchReport {
            notification_id: notification.id.clone(),
            outcomes: vec![
                (Channel::Text, text),
                (Channel::Call, call),
                (Channel::Webhook, webhook),
                (Channel::LogIntake, log_intake),
            ],
        }
    }

    async fn send_text(&self, notification: &Notification, config: &Config) -> ChannelOutcome {
        let phone = match (&config.phone_number, config.enable_text) {
            (Some(phone), true) => phone.as_str(),
            _ => return ChannelOutcome::Skipped(NOT_CONFIGURED.to_string()),
        };
        let Some(url) = config.webhook_url.as_deref() else {
            self.diagnostics
                .warn("Console.ext: No webhook URL configured for text notifications");
            return ChannelOutcome::Skipped("no webhook URL".to_string());
        };

        let payload = GatewayPayload::new(notification, GatewayAction::SendText, Some(phone));
        match self.post(url, &payload, Vec::new()).await {
            Ok(()) => ChannelOutcome::Delivered,
            Err(e) => self.report_failure("Failed to send text notification", e),
        }
    }

    async fn make_call(&self, notification: &Notification, config: &Config) -> ChannelOutcome {
        if !config.enable_call || !notification.kind.warrants_call() {
            return ChannelOutcome::Skipped(NOT_CONFIGURED.to_string());
        }
        let Some(url) = config.webhook_url.as_deref() else {
            self.diagnostics
                .warn("Console.ext: No webhook URL configured for call notifications");
            return ChannelOutcome::Skipped("no webhook URL".to_string());
        };

        let payload = GatewayPayload::new(
            notification,
            GatewayAction::MakeCall,
            config.phone_number.as_deref(),
        );
        match self.post(url, &payload, Vec::new()).await {
            Ok(()) => ChannelOutcome::Delivered,
            Err(e) => self.report_failure("Failed to make call notification", e),
        }
    }

    async fn send_webhook(&self, notification: &Notification, config: &Config) -> ChannelOutcome {
        let Some(url) = config.webhook_url.as_deref() else {
            return ChannelOutcome::Skipped(NOT_CONFIGURED.to_string());
        };

        match self.post(url, notification, Vec::new()).await {
            Ok(()) => ChannelOutcome::Delivered,
            Err(e) => self.report_failure("Failed to send webhook", e),
        }
    }

    async fn send_log_intake(&self, notification: &Notification, config: &Config) -> ChannelOutcome {
        let Some(api_key) = config.datadog_api_key.as_deref() else {
            return ChannelOutcome::Skipped(NOT_CONFIGURED.to_string());
        };

        let payload = LogIntakePayload::from(notification);
        let headers = vec![(API_KEY_HEADER.to_string(), api_key.to_string())];
        match self.post(&config.datadog_url, &payload, headers).await {
            Ok(()) => ChannelOutcome::Delivered,
            Err(DeliveryError::Status { status }) => self.report_failure(
                "Failed to send to DataDog",
                format!("DataDog API error: {}", status),
            ),
            Err(e) => self.report_failure("Failed to send to DataDog", e),
        }
    }

    /// POST `body` and treat any non-2xx status as a failure
    async fn post<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        headers: Vec<(String, String)>,
    ) -> Result<(), DeliveryError> {
        let mut request = OutboundRequest::new(url, serde_json::to_value(body)?);
        request.headers = headers;

        let status = self.transport.post(request).await?;
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(DeliveryError::Status { status })
        }
    }

    fn report_failure(&self, context: &str, detail: impl fmt::Display) -> ChannelOutcome {
        let detail = detail.to_string();
        self.diagnostics
            .error(&format!("Console.ext: {}: {}", context, detail));
        ChannelOutcome::Failed(detail)
    }
}
