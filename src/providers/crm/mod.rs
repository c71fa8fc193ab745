//! CRM provider implementations.
//!
//! The reporting core reads deals and activity records through the
//! [`CrmProvider`] trait; this module ships the Salesforce implementation.

mod salesforce;
mod traits;

pub use salesforce::{SalesforceCredentials, SalesforceProvider};
pub use traits::{CrmProvider, ProviderError, Result};
