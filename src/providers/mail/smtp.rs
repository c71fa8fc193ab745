//! SMTP sink implementation.
//!
//! Implements [`ReportSink`] over an authenticated SMTP relay via `lettre`,
//! with direct TLS or STARTTLS per configuration.

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials as SmtpCredentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::render::{render_report, RenderOptions};
use super::{ReportSink, Result, SinkError};
use crate::config::SmtpSettings;
use crate::domain::OwnerReport;

/// SMTP relay report sink.
pub struct SmtpSink {
    /// Relay configuration.
    config: SmtpSettings,
    /// Relay password, read from `SMTP_PASSWORD`.
    password: String,
    /// From address for outgoing reports.
    sender: String,
    /// Per-run presentation inputs.
    options: RenderOptions,
}

impl SmtpSink {
    /// Creates a sink from settings, reading the relay password from the
    /// environment.
    pub fn from_env(config: SmtpSettings, sender: String, options: RenderOptions) -> Result<Self> {
        let password = std::env::var("SMTP_PASSWORD")
            .map_err(|_| SinkError::Authentication("SMTP_PASSWORD is not set".to_string()))?;
        Ok(Self {
            config,
            password,
            sender,
            options,
        })
    }

    fn parse_mailbox(address: &str) -> Result<Mailbox> {
        address
            .parse()
            .map_err(|e| SinkError::Rejected(format!("invalid address {address:?}: {e}")))
    }

    fn build_message(&self, report: &OwnerReport, cc: &[String]) -> Result<Message> {
        let rendered = render_report(report, &self.options);

        let mut builder = Message::builder()
            .from(Self::parse_mailbox(&self.sender)?)
            .to(Self::parse_mailbox(&report.owner_email)?)
            .subject(rendered.subject);
        for address in cc {
            builder = builder.cc(Self::parse_mailbox(address)?);
        }

        builder
            .multipart(MultiPart::alternative_plain_html(
                rendered.text,
                rendered.html,
            ))
            .map_err(|e| SinkError::Internal(format!("build message: {e}")))
    }
}

#[async_trait]
impl ReportSink for SmtpSink {
    async fn deliver(&self, report: &OwnerReport, cc: &[String]) -> Result<String> {
        let message = self.build_message(report, cc)?;

        let credentials =
            SmtpCredentials::new(self.config.username.clone(), self.password.clone());

        let mailer: AsyncSmtpTransport<Tokio1Executor> = if self.config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)
                .map_err(|e| SinkError::Connection(format!("SMTP relay error: {e}")))?
                .credentials(credentials)
                .port(self.config.port)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
                .map_err(|e| SinkError::Connection(format!("SMTP relay error: {e}")))?
                .credentials(credentials)
                .port(self.config.port)
                .build()
        };

        let response = mailer
            .send(message)
            .await
            .map_err(|e| SinkError::Connection(format!("SMTP send failed: {e}")))?;

        let message_id = response
            .message()
            .next()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("<sent-to-{}>", report.owner_email));

        tracing::info!(message_id = %message_id, to = %report.owner_email, "Report sent via SMTP");
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClassifiedDeal, Deal, DealId, Owner, Tier};
    use chrono::{TimeZone, Utc};

    fn sink() -> SmtpSink {
        SmtpSink {
            config: SmtpSettings {
                host: "smtp.example.com".to_string(),
                port: 465,
                use_tls: true,
                username: "reports@example.com".to_string(),
            },
            password: "hunter2".to_string(),
            sender: "reports@example.com".to_string(),
            options: RenderOptions {
                report_date: "August 06, 2026".to_string(),
                instance_url: None,
                staleness_window_days: 60,
            },
        }
    }

    fn report() -> OwnerReport {
        OwnerReport {
            owner_email: "alice@example.com".to_string(),
            owner_name: Some("Alice Smith".to_string()),
            high_priority: Vec::new(),
            active: vec![ClassifiedDeal {
                deal: Deal {
                    id: DealId::from("006X1"),
                    name: "Beta Upsell".to_string(),
                    stage: None,
                    amount: None,
                    owner: Owner::with_name("005X1", "alice@example.com", "Alice Smith"),
                    account_name: None,
                    account_email: None,
                    created_at: Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap(),
                    segment: None,
                },
                touch_count: 2,
                last_touch: Utc.with_ymd_and_hms(2026, 7, 20, 0, 0, 0).unwrap(),
                tier: Tier::Normal,
            }],
        }
    }

    #[test]
    fn builds_multipart_message_with_cc() {
        let s = sink();
        let message = s
            .build_message(&report(), &["manager@example.com".to_string()])
            .unwrap();

        let headers = format!("{:?}", message.headers());
        assert!(headers.contains("alice@example.com"));
        assert!(headers.contains("manager@example.com"));
        assert!(headers.contains("Weekly Deal Activity Report"));
    }

    #[test]
    fn invalid_owner_address_is_rejected() {
        let s = sink();
        let mut bad = report();
        bad.owner_email = "not an address".to_string();
        assert!(matches!(
            s.build_message(&bad, &[]),
            Err(SinkError::Rejected(_))
        ));
    }
}
