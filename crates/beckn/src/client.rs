use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use homie_core::config::ProtocolConfig;
use homie_core::{Domain, ProtocolClient, RemoteCallError};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::payload::{self, BecknContext, Customer, Envelope};
use crate::profile::DomainProfile;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BapSettings {
    pub base_url: String,
    pub bap_id: String,
    pub bap_uri: String,
    pub bpp_id: String,
    pub bpp_uri: String,
    pub country_code: String,
    pub city_code: String,
    pub version: String,
    pub timeout_secs: u64,
}

impl From<&ProtocolConfig> for BapSettings {
    fn from(config: &ProtocolConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            bap_id: config.bap_id.clone(),
            bap_uri: config.bap_uri.clone(),
            bpp_id: config.bpp_id.clone(),
            bpp_uri: config.bpp_uri.clone(),
            country_code: config.country_code.clone(),
            city_code: config.city_code.clone(),
            version: config.version.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum BecknError {
    #[error("could not build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// BAP client for one workflow domain. Each call is a single POST; nothing is retried.
#[derive(Clone, Debug)]
pub struct BapClient {
    http: Client,
    settings: Arc<BapSettings>,
    domain: Domain,
    profile: DomainProfile,
}

impl BapClient {
    pub fn new(domain: Domain, settings: Arc<BapSettings>) -> Result<Self, BecknError> {
        let http = Client::builder().timeout(Duration::from_secs(settings.timeout_secs)).build()?;
        Ok(Self::with_http(domain, settings, http))
    }

    pub fn with_http(domain: Domain, settings: Arc<BapSettings>, http: Client) -> Self {
        Self { http, settings, domain, profile: DomainProfile::for_domain(domain) }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn profile(&self) -> DomainProfile {
        self.profile
    }

    pub fn endpoint(&self, action: &str) -> String {
        format!("{}/{action}", self.settings.base_url.trim_end_matches('/'))
    }

    pub fn envelope(&self, action: &str, message: Value) -> Envelope {
        Envelope { context: BecknContext::new(&self.settings, self.profile, action), message }
    }

    async fn post(&self, action: &str, message: Value) -> Result<Value, RemoteCallError> {
        let url = self.endpoint(action);
        let envelope = self.envelope(action, message);
        debug!(
            event_name = "beckn.request.sent",
            domain = %self.domain,
            action,
            transaction_id = %envelope.context.transaction_id,
            url = %url,
            "sending beckn request"
        );

        let response = self.http.post(&url).json(&envelope).send().await.map_err(|error| {
            warn!(
                event_name = "beckn.request.failed",
                domain = %self.domain,
                action,
                error = %error,
                "beckn request failed"
            );
            if error.is_timeout() {
                RemoteCallError::Timeout {
                    action: action.to_string(),
                    timeout_secs: self.settings.timeout_secs,
                }
            } else {
                RemoteCallError::Transport { action: action.to_string(), message: error.to_string() }
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| RemoteCallError::Transport {
            action: action.to_string(),
            message: error.to_string(),
        })?;

        if !status.is_success() {
            warn!(
                event_name = "beckn.response.rejected",
                domain = %self.domain,
                action,
                status = status.as_u16(),
                "beckn endpoint returned an error status"
            );
            return Err(RemoteCallError::Status {
                action: action.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|error| RemoteCallError::Decode {
            action: action.to_string(),
            message: error.to_string(),
        })
    }
}

#[async_trait]
impl ProtocolClient for BapClient {
    async fn search(&self) -> Result<Value, RemoteCallError> {
        self.post("search", payload::search_message(self.profile)).await
    }

    async fn select(&self, provider_id: &str, item_id: &str) -> Result<Value, RemoteCallError> {
        self.post("select", payload::order_message(provider_id, item_id)).await
    }

    async fn init(&self, provider_id: &str, item_id: &str) -> Result<Value, RemoteCallError> {
        self.post("init", payload::order_message(provider_id, item_id)).await
    }

    async fn confirm(
        &self,
        provider_id: &str,
        item_id: &str,
        fulfillment_id: &str,
        customer_name: &str,
        customer_phone: &str,
        customer_email: &str,
    ) -> Result<Value, RemoteCallError> {
        let customer = Customer { name: customer_name, phone: customer_phone, email: customer_email };
        self.post("confirm", payload::confirm_message(provider_id, item_id, fulfillment_id, customer))
            .await
    }

    async fn status(&self, order_id: &str) -> Result<Value, RemoteCallError> {
        self.post("status", payload::status_message(order_id)).await
    }
}

/// One client per domain, sharing a single connection pool.
pub fn clients_for(
    settings: BapSettings,
) -> Result<BTreeMap<Domain, Arc<dyn ProtocolClient>>, BecknError> {
    let settings = Arc::new(settings);
    let http = Client::builder().timeout(Duration::from_secs(settings.timeout_secs)).build()?;
    Ok(Domain::ALL
        .into_iter()
        .map(|domain| {
            let client: Arc<dyn ProtocolClient> =
                Arc::new(BapClient::with_http(domain, Arc::clone(&settings), http.clone()));
            (domain, client)
        })
        .collect())
}
