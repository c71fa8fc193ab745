//! Gmail API sink implementation.
//!
//! Implements [`ReportSink`] over the Gmail REST API with OAuth 2.0
//! refresh-token authentication. The message is built as a raw RFC 2822
//! `multipart/alternative` (plain + HTML) and base64url-encoded into the
//! `messages/send` endpoint.

use async_trait::async_trait;
use base64::prelude::*;
use serde::{Deserialize, Serialize};

use super::render::{render_report, RenderOptions};
use super::{ReportSink, Result, SinkError};
use crate::domain::OwnerReport;

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GMAIL_SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

/// OAuth token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// OAuth credentials for the Gmail sender account.
#[derive(Debug, Clone)]
pub struct GmailCredentials {
    /// OAuth refresh token.
    pub refresh_token: String,
    /// OAuth client ID.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
}

impl GmailCredentials {
    /// Reads credentials from `GMAIL_CLIENT_ID`, `GMAIL_CLIENT_SECRET`, and
    /// `GMAIL_REFRESH_TOKEN`.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            refresh_token: require_env("GMAIL_REFRESH_TOKEN")?,
            client_id: require_env("GMAIL_CLIENT_ID")?,
            client_secret: require_env("GMAIL_CLIENT_SECRET")?,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| SinkError::Authentication(format!("{name} is not set")))
}

/// Gmail API report sink.
pub struct GmailSink {
    /// HTTP client for API requests.
    client: reqwest::Client,
    /// OAuth credentials.
    credentials: GmailCredentials,
    /// From address for outgoing reports.
    sender: String,
    /// Per-run presentation inputs.
    options: RenderOptions,
    /// Current OAuth access token.
    access_token: Option<String>,
    /// Whether the sink is authenticated.
    authenticated: bool,
}

impl GmailSink {
    /// Creates a new sink. Not authenticated until
    /// [`authenticate`](Self::authenticate) is called.
    pub fn new(credentials: GmailCredentials, sender: String, options: RenderOptions) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
            sender,
            options,
            access_token: None,
            authenticated: false,
        }
    }

    /// Refreshes the OAuth access token using the refresh token.
    pub async fn authenticate(&mut self) -> Result<()> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| SinkError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Authentication(format!(
                "token refresh failed ({status}): {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SinkError::Internal(format!("parse token response: {e}")))?;

        self.access_token = Some(token.access_token);
        self.authenticated = true;

        tracing::info!(sender = %self.sender, "Gmail sink authenticated");
        Ok(())
    }

    /// Builds the raw RFC 2822 message with plain and HTML alternatives.
    fn build_raw_message(
        &self,
        to: &str,
        cc: &[String],
        subject: &str,
        text: &str,
        html: &str,
    ) -> String {
        let boundary = format!("=_pulse_{}", uuid::Uuid::new_v4().simple());
        let mut message = String::new();

        message.push_str(&format!("From: {}\r\n", self.sender));
        message.push_str(&format!("To: {to}\r\n"));
        if !cc.is_empty() {
            message.push_str(&format!("Cc: {}\r\n", cc.join(", ")));
        }
        message.push_str(&format!("Subject: {subject}\r\n"));
        message.push_str("MIME-Version: 1.0\r\n");
        message.push_str(&format!(
            "Content-Type: multipart/alternative; boundary=\"{boundary}\"\r\n"
        ));
        message.push_str("\r\n");

        message.push_str(&format!("--{boundary}\r\n"));
        message.push_str("Content-Type: text/plain; charset=utf-8\r\n\r\n");
        message.push_str(text);
        message.push_str("\r\n");

        message.push_str(&format!("--{boundary}\r\n"));
        message.push_str("Content-Type: text/html; charset=utf-8\r\n\r\n");
        message.push_str(html);
        message.push_str("\r\n");

        message.push_str(&format!("--{boundary}--\r\n"));
        message
    }
}

#[async_trait]
impl ReportSink for GmailSink {
    async fn deliver(&self, report: &OwnerReport, cc: &[String]) -> Result<String> {
        if !self.authenticated {
            return Err(SinkError::Authentication("not authenticated".to_string()));
        }
        let token = self
            .access_token
            .as_ref()
            .ok_or_else(|| SinkError::Authentication("not authenticated".to_string()))?;

        let rendered = render_report(report, &self.options);
        let raw = self.build_raw_message(
            &report.owner_email,
            cc,
            &rendered.subject,
            &rendered.text,
            &rendered.html,
        );
        let encoded = BASE64_URL_SAFE_NO_PAD.encode(raw.as_bytes());

        #[derive(Serialize)]
        struct SendRequest {
            raw: String,
        }

        #[derive(Deserialize)]
        struct SendResponse {
            id: String,
        }

        let response = self
            .client
            .post(GMAIL_SEND_URL)
            .bearer_auth(token)
            .json(&SendRequest { raw: encoded })
            .send()
            .await
            .map_err(|e| SinkError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 => SinkError::Authentication(format!("unauthorized: {body}")),
                400 => SinkError::Rejected(body),
                _ => SinkError::Internal(format!("API error ({status}): {body}")),
            });
        }

        let sent: SendResponse = response
            .json()
            .await
            .map_err(|e| SinkError::Internal(format!("parse send response: {e}")))?;

        tracing::info!(message_id = %sent.id, to = %report.owner_email, "Report sent via Gmail API");
        Ok(sent.id)
    }
}
