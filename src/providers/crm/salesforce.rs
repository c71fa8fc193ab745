//! Salesforce REST provider implementation.
//!
//! This module provides a [`CrmProvider`] implementation over the
//! Salesforce REST query endpoint with OAuth 2.0 refresh-token
//! authentication.
//!
//! # Authentication
//!
//! Credentials come from the environment (`SF_CLIENT_ID`, `SF_CLIENT_SECRET`,
//! `SF_REFRESH_TOKEN`, optional `SF_INSTANCE_URL` and `SF_DOMAIN`). The
//! access token is refreshed once per run; there is no on-disk token cache.
//!
//! # Protocol Details
//!
//! - SOQL over `GET /services/data/vXX.X/query`, following `nextRecordsUrl`
//!   until the result set is exhausted
//! - `IN`-clause queries batched at 200 ids
//! - Activity creators resolved to license names through a batched `User`
//!   query, so every record reaches the core tagged with its account class

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use url::Url;

use super::{CrmProvider, ProviderError, Result};
use crate::domain::{ActivityId, ActivityRecord, Deal, DealId, Owner, UserId};

/// Salesforce REST API version used for all queries.
const API_VERSION: &str = "v62.0";

/// Maximum number of ids per SOQL `IN` clause.
const BATCH_SIZE: usize = 200;

/// Usernames that mark automated users regardless of their license.
const AUTOMATED_USERNAMES: &[&str] = &["Automated Process"];

/// OAuth token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    instance_url: Option<String>,
}

/// OAuth credentials for the refresh-token grant.
#[derive(Debug, Clone)]
pub struct SalesforceCredentials {
    /// Connected-app client id.
    pub client_id: String,
    /// Connected-app client secret.
    pub client_secret: String,
    /// Long-lived refresh token.
    pub refresh_token: String,
    /// Login domain prefix, e.g. "login" or "test".
    pub domain: String,
    /// Instance base URL, used when the token response does not echo one.
    pub instance_url: Option<String>,
}

impl SalesforceCredentials {
    /// Reads credentials from the environment.
    pub fn from_env(domain: &str, instance_url: Option<String>) -> Result<Self> {
        Ok(Self {
            client_id: require_env("SF_CLIENT_ID")?,
            client_secret: require_env("SF_CLIENT_SECRET")?,
            refresh_token: require_env("SF_REFRESH_TOKEN")?,
            domain: std::env::var("SF_DOMAIN").unwrap_or_else(|_| domain.to_string()),
            instance_url: std::env::var("SF_INSTANCE_URL").ok().or(instance_url),
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| ProviderError::Authentication(format!("{name} is not set")))
}

/// One page of a SOQL query result.
#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    done: bool,
    #[serde(rename = "nextRecordsUrl")]
    next_records_url: Option<String>,
    records: Vec<T>,
}

/// Wire shape of an `Opportunity` row.
#[derive(Debug, Deserialize)]
struct OpportunityRecord {
    #[serde(rename = "Id")]
    id: Option<String>,
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "StageName")]
    stage_name: Option<String>,
    #[serde(rename = "Amount")]
    amount: Option<f64>,
    #[serde(rename = "CreatedDate")]
    created_date: Option<String>,
    #[serde(rename = "OwnerId")]
    owner_id: Option<String>,
    #[serde(rename = "Owner")]
    owner: Option<OwnerRecord>,
    #[serde(rename = "Account")]
    account: Option<AccountRecord>,
    #[serde(rename = "Segment__c")]
    segment: Option<String>,
}

/// Wire shape of the `Owner` relationship on an opportunity.
#[derive(Debug, Deserialize)]
struct OwnerRecord {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Email")]
    email: Option<String>,
}

/// Wire shape of the `Account` relationship on an opportunity.
#[derive(Debug, Deserialize)]
struct AccountRecord {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "PersonEmail")]
    person_email: Option<String>,
}

/// Wire shape of a `Task` row.
#[derive(Debug, Deserialize)]
struct TaskRecord {
    #[serde(rename = "Id")]
    id: Option<String>,
    #[serde(rename = "WhatId")]
    what_id: Option<String>,
    #[serde(rename = "CreatedById")]
    created_by_id: Option<String>,
    #[serde(rename = "CreatedDate")]
    created_date: Option<String>,
    #[serde(rename = "Status")]
    status: Option<String>,
}

/// Wire shape of a `User` row with its license relationship.
#[derive(Debug, Deserialize)]
struct UserRecord {
    #[serde(rename = "Id")]
    id: Option<String>,
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Profile")]
    profile: Option<ProfileRecord>,
}

#[derive(Debug, Deserialize)]
struct ProfileRecord {
    #[serde(rename = "UserLicense")]
    user_license: Option<LicenseRecord>,
}

#[derive(Debug, Deserialize)]
struct LicenseRecord {
    #[serde(rename = "Name")]
    name: Option<String>,
}

/// Salesforce CRM provider.
///
/// Implements [`CrmProvider`] against the REST query endpoint.
///
/// # Example
///
/// ```ignore
/// use pulse::providers::crm::{SalesforceCredentials, SalesforceProvider};
///
/// let credentials = SalesforceCredentials::from_env("login", None)?;
/// let mut provider = SalesforceProvider::new(credentials);
/// provider.authenticate().await?;
///
/// let deals = provider.fetch_open_deals(created_after, Some("TVG")).await?;
/// ```
pub struct SalesforceProvider {
    /// HTTP client for API requests.
    client: reqwest::Client,
    /// OAuth credentials.
    credentials: SalesforceCredentials,
    /// Instance base URL, resolved during authentication.
    instance_url: Option<String>,
    /// Current OAuth access token.
    access_token: Option<String>,
    /// Whether the provider is authenticated.
    authenticated: bool,
}

impl SalesforceProvider {
    /// Creates a new provider. Not authenticated until
    /// [`authenticate`](Self::authenticate) is called.
    pub fn new(credentials: SalesforceCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
            instance_url: None,
            access_token: None,
            authenticated: false,
        }
    }

    /// Returns whether the provider is currently authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Instance base URL, available after authentication. Used for deep
    /// links in rendered reports.
    pub fn instance_url(&self) -> Option<&str> {
        self.instance_url.as_deref()
    }

    /// Exchanges the refresh token for an access token and resolves the
    /// instance URL.
    pub async fn authenticate(&mut self) -> Result<()> {
        let token_url = format!(
            "https://{}.salesforce.com/services/oauth2/token",
            self.credentials.domain
        );
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
        ];

        let response = self
            .client
            .post(&token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Authentication(format!(
                "token refresh failed ({status}): {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Authentication(format!("parse token response: {e}")))?;

        let instance_url = token
            .instance_url
            .or_else(|| self.credentials.instance_url.clone())
            .ok_or_else(|| {
                ProviderError::Authentication("no instance URL in token response".to_string())
            })?;
        let instance_url = Url::parse(&instance_url)
            .map_err(|e| ProviderError::Authentication(format!("invalid instance URL: {e}")))?;

        self.instance_url = Some(instance_url.as_str().trim_end_matches('/').to_string());
        self.access_token = Some(token.access_token);
        self.authenticated = true;

        tracing::info!(instance_url = %self.instance_url.as_deref().unwrap_or_default(),
            "Salesforce provider authenticated");
        Ok(())
    }

    /// Builds authorization headers for API requests.
    fn auth_headers(&self) -> Result<HeaderMap> {
        let token = self
            .access_token
            .as_ref()
            .ok_or_else(|| ProviderError::Authentication("not authenticated".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ProviderError::Api(format!("invalid header: {e}")))?,
        );
        Ok(headers)
    }

    fn base_url(&self) -> Result<&str> {
        self.instance_url
            .as_deref()
            .ok_or_else(|| ProviderError::Authentication("not authenticated".to_string()))
    }

    /// Runs one SOQL query, following pagination until done.
    async fn query<T: DeserializeOwned>(&self, soql: &str) -> Result<Vec<T>> {
        let base = self.base_url()?.to_string();
        let mut records = Vec::new();

        let mut page: QueryResponse<T> = {
            let url = format!("{base}/services/data/{API_VERSION}/query");
            let response = self
                .client
                .get(&url)
                .headers(self.auth_headers()?)
                .query(&[("q", soql)])
                .send()
                .await
                .map_err(|e| ProviderError::Connection(e.to_string()))?;
            self.handle_response(response).await?
        };

        loop {
            records.append(&mut page.records);
            if page.done {
                break;
            }
            let next = page.next_records_url.ok_or_else(|| {
                ProviderError::Api("paged response without nextRecordsUrl".to_string())
            })?;
            let url = format!("{base}{next}");
            let response = self
                .client
                .get(&url)
                .headers(self.auth_headers()?)
                .send()
                .await
                .map_err(|e| ProviderError::Connection(e.to_string()))?;
            page = self.handle_response(response).await?;
        }

        Ok(records)
    }

    /// Runs a SOQL `IN`-clause query template over ids in batches.
    async fn query_batched<T: DeserializeOwned>(
        &self,
        template: impl Fn(&str) -> String,
        ids: &[String],
    ) -> Result<Vec<T>> {
        let mut records = Vec::new();
        for batch in ids.chunks(BATCH_SIZE) {
            let soql = template(&ids_csv(batch));
            records.extend(self.query(&soql).await?);
        }
        Ok(records)
    }

    /// Handles an API response, checking for errors.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 => ProviderError::Authentication(format!("unauthorized: {body}")),
                _ => ProviderError::Api(format!("query failed ({status}): {body}")),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Api(format!("parse response: {e}")))
    }

    /// Resolves the license name for every user id, applying the automated
    /// username override.
    async fn resolve_licenses(
        &self,
        user_ids: &HashSet<String>,
    ) -> Result<HashMap<String, String>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut ids: Vec<String> = user_ids.iter().cloned().collect();
        ids.sort();

        let users: Vec<UserRecord> = self
            .query_batched(
                |csv| {
                    format!(
                        "SELECT Id, Name, Profile.UserLicense.Name FROM User WHERE Id IN ({csv})"
                    )
                },
                &ids,
            )
            .await?;

        let mut licenses = HashMap::new();
        for user in users {
            let id = user
                .id
                .ok_or_else(|| ProviderError::InvalidRecord("user without Id".to_string()))?;
            if let Some(token) = license_token(user.name.as_deref(), &user.profile) {
                licenses.insert(id, token);
            }
        }
        Ok(licenses)
    }
}

#[async_trait]
impl CrmProvider for SalesforceProvider {
    async fn fetch_open_deals(
        &self,
        created_after: DateTime<Utc>,
        excluded_segment: Option<&str>,
    ) -> Result<Vec<Deal>> {
        if !self.authenticated {
            return Err(ProviderError::Authentication(
                "not authenticated".to_string(),
            ));
        }

        let soql = open_deals_soql(created_after, excluded_segment);
        let records: Vec<OpportunityRecord> = self.query(&soql).await?;

        let mut deals = Vec::with_capacity(records.len());
        for record in records {
            deals.push(map_opportunity(record)?);
        }

        tracing::debug!(count = deals.len(), "fetched open deals");
        Ok(deals)
    }

    async fn fetch_activities(&self, deal_ids: &[DealId]) -> Result<Vec<ActivityRecord>> {
        if !self.authenticated {
            return Err(ProviderError::Authentication(
                "not authenticated".to_string(),
            ));
        }
        if deal_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = deal_ids.iter().map(|id| id.0.clone()).collect();
        let tasks: Vec<TaskRecord> = self
            .query_batched(
                |csv| {
                    format!(
                        "SELECT Id, WhatId, CreatedById, CreatedDate, Status \
                         FROM Task WHERE WhatId IN ({csv})"
                    )
                },
                &ids,
            )
            .await?;

        let creator_ids: HashSet<String> = tasks
            .iter()
            .filter_map(|t| t.created_by_id.clone())
            .collect();
        let licenses = self.resolve_licenses(&creator_ids).await?;

        let mut activities = Vec::with_capacity(tasks.len());
        for task in tasks {
            activities.push(map_task(task, &licenses)?);
        }

        tracing::debug!(count = activities.len(), "fetched activity records");
        Ok(activities)
    }
}

/// Builds the open-deals SOQL query.
fn open_deals_soql(created_after: DateTime<Utc>, excluded_segment: Option<&str>) -> String {
    let mut soql = format!(
        "SELECT Id, Name, StageName, Amount, CreatedDate, OwnerId, Owner.Name, Owner.Email, \
         Account.Name, Account.PersonEmail, Segment__c \
         FROM Opportunity WHERE IsClosed = false AND CreatedDate >= {}",
        created_after.format("%Y-%m-%dT%H:%M:%SZ")
    );
    if let Some(segment) = excluded_segment {
        soql.push_str(&format!(
            " AND (Segment__c = null OR Segment__c != '{}')",
            escape_soql(segment)
        ));
    }
    soql.push_str(" ORDER BY CreatedDate DESC");
    soql
}

/// Formats ids for a SOQL `IN` clause: `'id1','id2','id3'`.
fn ids_csv(ids: &[String]) -> String {
    ids.iter()
        .map(|id| format!("'{}'", escape_soql(id)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Escapes a string literal for SOQL.
fn escape_soql(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Parses a Salesforce datetime, accepting both the REST `+0000` form and
/// RFC 3339.
fn parse_sf_datetime(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.3f%z"))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ProviderError::InvalidRecord(format!("bad datetime {raw:?}: {e}")))
}

/// Resolves the account-class token for a user: automated usernames override
/// whatever license the profile carries.
fn license_token(name: Option<&str>, profile: &Option<ProfileRecord>) -> Option<String> {
    if let Some(name) = name {
        if AUTOMATED_USERNAMES.contains(&name) {
            return Some("Automated Process".to_string());
        }
    }
    profile
        .as_ref()
        .and_then(|p| p.user_license.as_ref())
        .and_then(|l| l.name.clone())
}

/// Validates and maps one opportunity row into a domain [`Deal`].
fn map_opportunity(record: OpportunityRecord) -> Result<Deal> {
    let id = record
        .id
        .ok_or_else(|| ProviderError::InvalidRecord("opportunity without Id".to_string()))?;
    let name = record.name.ok_or_else(|| {
        ProviderError::InvalidRecord(format!("opportunity {id} without Name"))
    })?;
    let created_raw = record.created_date.ok_or_else(|| {
        ProviderError::InvalidRecord(format!("opportunity {id} without CreatedDate"))
    })?;
    let owner_id = record.owner_id.ok_or_else(|| {
        ProviderError::InvalidRecord(format!("opportunity {id} without OwnerId"))
    })?;
    let owner = record.owner.ok_or_else(|| {
        ProviderError::InvalidRecord(format!("opportunity {id} without Owner"))
    })?;
    let owner_email = owner.email.ok_or_else(|| {
        ProviderError::InvalidRecord(format!("opportunity {id} owner without Email"))
    })?;

    Ok(Deal {
        id: DealId(id),
        name,
        stage: record.stage_name,
        amount: record.amount,
        owner: Owner {
            id: UserId(owner_id),
            name: owner.name,
            email: owner_email,
        },
        account_name: record.account.as_ref().and_then(|a| a.name.clone()),
        account_email: record.account.as_ref().and_then(|a| a.person_email.clone()),
        created_at: parse_sf_datetime(&created_raw)?,
        segment: record.segment,
    })
}

/// Validates and maps one task row into a domain [`ActivityRecord`].
fn map_task(record: TaskRecord, licenses: &HashMap<String, String>) -> Result<ActivityRecord> {
    let id = record
        .id
        .ok_or_else(|| ProviderError::InvalidRecord("task without Id".to_string()))?;
    let what_id = record
        .what_id
        .ok_or_else(|| ProviderError::InvalidRecord(format!("task {id} without WhatId")))?;
    let created_by = record.created_by_id.ok_or_else(|| {
        ProviderError::InvalidRecord(format!("task {id} without CreatedById"))
    })?;
    let created_raw = record.created_date.ok_or_else(|| {
        ProviderError::InvalidRecord(format!("task {id} without CreatedDate"))
    })?;

    Ok(ActivityRecord {
        id: ActivityId(id),
        deal_id: DealId(what_id),
        creator_license: licenses.get(&created_by).cloned(),
        created_by: UserId(created_by),
        created_at: parse_sf_datetime(&created_raw)?,
        completed: record.status.as_deref() == Some("Completed"),
    })
}
