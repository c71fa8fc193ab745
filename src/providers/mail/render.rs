//! HTML rendering for owner reports.
//!
//! Produces the subject line, an HTML body with a high-priority section and
//! an active section, and a plain-text alternative part. Kept deliberately
//! simple: inline styles, no templating engine.

use crate::domain::{ClassifiedDeal, OwnerReport};

/// Presentation inputs that are fixed for the duration of one run.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Human-readable report date, e.g. "August 06, 2026".
    pub report_date: String,
    /// CRM instance base URL for deal deep links. Without it, deal names
    /// render as plain text.
    pub instance_url: Option<String>,
    /// Staleness window in days, shown in the high-priority section title.
    pub staleness_window_days: i64,
}

/// A fully rendered report email.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html: String,
    /// Plain-text alternative body.
    pub text: String,
}

/// Renders one owner report.
pub fn render_report(report: &OwnerReport, options: &RenderOptions) -> RenderedReport {
    let total = report.total();
    let noun = if total == 1 { "deal" } else { "deals" };
    let subject = format!(
        "Weekly Deal Activity Report - {} ({} {})",
        options.report_date, total, noun
    );

    let owner_name = report.owner_name.as_deref().unwrap_or("there");
    let mut html = String::new();
    html.push_str("<div style=\"font-family: Arial, sans-serif; max-width: 900px; margin: 0 auto;\">\n");
    html.push_str("  <h2 style=\"color: #333;\">Weekly Deal Activity Report</h2>\n");
    html.push_str(&format!(
        "  <p style=\"color: #666;\">Generated: {}</p>\n",
        escape(&options.report_date)
    ));
    html.push_str(&format!(
        "  <p style=\"color: #555;\">Hi {},</p>\n",
        escape(owner_name)
    ));
    html.push_str(
        "  <p style=\"color: #888; font-size: 13px; font-style: italic;\">\
         Touch counts reflect human interactions only; automated system \
         activity is excluded.</p>\n",
    );

    let needs_attention = report.high_priority.len();
    html.push_str(&format!(
        "  <p style=\"color: #555; font-size: 14px;\">You have <strong>{total}</strong> open \
         {noun} with human activity.{}</p>\n",
        if needs_attention > 0 {
            format!(
                " <span style=\"color: #c0392b; font-weight: bold;\">{needs_attention} need{} attention.</span>",
                if needs_attention == 1 { "s" } else { "" }
            )
        } else {
            String::new()
        }
    ));

    if !report.high_priority.is_empty() {
        render_section(
            &mut html,
            &report.high_priority,
            &format!(
                "Needs Attention &mdash; no activity in {}+ days",
                options.staleness_window_days
            ),
            "#c0392b",
            options,
        );
    }
    if !report.active.is_empty() {
        render_section(&mut html, &report.active, "Active Deals", "#34495e", options);
    }

    html.push_str(
        "  <p style=\"color: #999; font-size: 12px; margin-top: 24px; border-top: 1px solid #eee; \
         padding-top: 12px;\">You received this report because you own the listed deals. \
         Contact your administrator to unsubscribe.</p>\n",
    );
    html.push_str("</div>\n");

    RenderedReport {
        subject,
        html,
        text: "This report is best viewed in an HTML-capable email client.".to_string(),
    }
}

fn render_section(
    html: &mut String,
    deals: &[ClassifiedDeal],
    title: &str,
    header_color: &str,
    options: &RenderOptions,
) {
    html.push_str(&format!(
        "  <h3 style=\"color: {header_color}; margin-top: 24px;\">{title} ({})</h3>\n",
        deals.len()
    ));
    html.push_str(
        "  <table style=\"width: 100%; border-collapse: collapse; font-size: 14px;\">\n",
    );
    html.push_str(&format!(
        "    <tr style=\"background: {header_color}; color: #fff;\">\
         <th style=\"padding: 8px 12px; text-align: left;\">Deal</th>\
         <th style=\"padding: 8px 12px; text-align: left;\">Account</th>\
         <th style=\"padding: 8px 12px; text-align: left;\">Stage</th>\
         <th style=\"padding: 8px 12px; text-align: right;\">Amount</th>\
         <th style=\"padding: 8px 12px; text-align: left;\">Last Touched</th>\
         <th style=\"padding: 8px 12px; text-align: center;\">Touches</th></tr>\n"
    ));

    for (i, classified) in deals.iter().enumerate() {
        let bg = if i % 2 == 0 { "#f9f9f9" } else { "#ffffff" };
        let name = escape(&classified.deal.name);
        let deal_cell = match &options.instance_url {
            Some(base) => format!(
                "<a href=\"{}/lightning/r/Opportunity/{}/view\" style=\"color: #2a6496; \
                 text-decoration: none;\">{name}</a>",
                escape(base),
                escape(&classified.deal.id.0)
            ),
            None => name,
        };
        html.push_str(&format!(
            "    <tr style=\"background: {bg};\">\
             <td style=\"padding: 8px 12px;\">{deal_cell}</td>\
             <td style=\"padding: 8px 12px;\">{}</td>\
             <td style=\"padding: 8px 12px;\">{}</td>\
             <td style=\"padding: 8px 12px; text-align: right;\">{}</td>\
             <td style=\"padding: 8px 12px;\">{}</td>\
             <td style=\"padding: 8px 12px; text-align: center;\">{}</td></tr>\n",
            escape(classified.deal.account_name.as_deref().unwrap_or("\u{2014}")),
            escape(classified.deal.stage.as_deref().unwrap_or("\u{2014}")),
            format_amount(classified.deal.amount),
            classified.last_touch.format("%Y-%m-%d"),
            classified.touch_count,
        ));
    }
    html.push_str("  </table>\n");
}

fn format_amount(amount: Option<f64>) -> String {
    match amount {
        Some(value) => format!("${}", group_thousands(value.round() as i64)),
        None => "N/A".to_string(),
    }
}

/// Groups an integer amount with comma separators: 1234567 -> "1,234,567".
fn group_thousands(value: i64) -> String {
    let digits = value.abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if value < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Escapes text for inclusion in HTML.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
