//! CRM and mail provider implementations.
//!
//! This module contains provider traits and implementations for external services:
//!
//! - [`crm`] - Deal and activity record sources (Salesforce)
//! - [`mail`] - Report delivery sinks (Gmail API, SMTP)

pub mod crm;
pub mod mail;
