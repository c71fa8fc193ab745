//! pulse - Entry point for the weekly deal report run

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;

use pulse::config::{MailTransport, Settings};
use pulse::providers::crm::{SalesforceCredentials, SalesforceProvider};
use pulse::providers::mail::{
    GmailCredentials, GmailSink, RenderOptions, ReportSink, SmtpSink,
};
use pulse::services::{ReportService, StandardLicenseTable, TriagePolicy};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting pulse");

    if let Err(e) = run().await {
        tracing::error!("Run error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let path = Settings::default_path().context("no config directory available")?;
    let settings = Settings::load(&path)?;

    let credentials =
        SalesforceCredentials::from_env(&settings.crm.domain, settings.crm.instance_url.clone())?;
    let mut crm = SalesforceProvider::new(credentials);
    crm.authenticate().await.context("CRM authentication")?;

    let options = RenderOptions {
        report_date: Utc::now().format("%B %d, %Y").to_string(),
        instance_url: crm.instance_url().map(|s| s.to_string()),
        staleness_window_days: settings.report.staleness_window_days,
    };

    let sink: Arc<dyn ReportSink> = match settings.mail.transport {
        MailTransport::Gmail => {
            let mut sink = GmailSink::new(
                GmailCredentials::from_env()?,
                settings.mail.sender.clone(),
                options,
            );
            sink.authenticate().await.context("mail authentication")?;
            Arc::new(sink)
        }
        MailTransport::Smtp => Arc::new(SmtpSink::from_env(
            settings.mail.smtp.clone(),
            settings.mail.sender.clone(),
            options,
        )?),
    };

    let service = ReportService::new(
        crm,
        sink,
        Arc::new(StandardLicenseTable::default()),
        TriagePolicy::from_settings(&settings.report),
        settings.delivery.clone(),
    );

    let summary = service.run(Utc::now()).await?;

    if !summary.failures.is_empty() {
        anyhow::bail!(
            "{} of {} deliveries failed",
            summary.failures.len(),
            summary.reports_built
        );
    }
    Ok(())
}
