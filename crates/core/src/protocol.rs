use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::StepRequest;

/// Transport-level failure reported by a protocol client. Never retried by the core.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RemoteCallError {
    #[error("{action} request failed: {message}")]
    Transport { action: String, message: String },
    #[error("{action} timed out after {timeout_secs}s")]
    Timeout { action: String, timeout_secs: u64 },
    #[error("{action} returned HTTP {status}: {body}")]
    Status { action: String, status: u16, body: String },
    #[error("{action} response could not be decoded: {message}")]
    Decode { action: String, message: String },
}

/// Network client for one domain's protocol endpoints.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    async fn search(&self) -> Result<Value, RemoteCallError>;

    async fn select(&self, provider_id: &str, item_id: &str) -> Result<Value, RemoteCallError>;

    async fn init(&self, provider_id: &str, item_id: &str) -> Result<Value, RemoteCallError>;

    async fn confirm(
        &self,
        provider_id: &str,
        item_id: &str,
        fulfillment_id: &str,
        customer_name: &str,
        customer_phone: &str,
        customer_email: &str,
    ) -> Result<Value, RemoteCallError>;

    async fn status(&self, order_id: &str) -> Result<Value, RemoteCallError>;
}

pub async fn dispatch<C>(client: &C, request: &StepRequest) -> Result<Value, RemoteCallError>
where
    C: ProtocolClient + ?Sized,
{
    match request {
        StepRequest::Search => client.search().await,
        StepRequest::Select { provider_id, item_id } => client.select(provider_id, item_id).await,
        StepRequest::Init { provider_id, item_id } => client.init(provider_id, item_id).await,
        StepRequest::Confirm {
            provider_id,
            item_id,
            fulfillment_id,
            customer_name,
            customer_phone,
            customer_email,
        } => {
            client
                .confirm(
                    provider_id,
                    item_id,
                    fulfillment_id,
                    customer_name,
                    customer_phone,
                    customer_email,
                )
                .await
        }
        StepRequest::Status { order_id } => client.status(order_id).await,
    }
}
