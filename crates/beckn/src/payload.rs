use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::client::BapSettings;
use crate::profile::DomainProfile;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Code {
    pub code: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Location {
    pub country: Code,
    pub city: Code,
}

/// The `context` block every request carries. Transaction and message ids are fresh per request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BecknContext {
    pub domain: String,
    pub action: String,
    pub location: Location,
    pub version: String,
    pub bap_id: String,
    pub bap_uri: String,
    pub bpp_id: String,
    pub bpp_uri: String,
    pub transaction_id: String,
    pub message_id: String,
    pub timestamp: String,
}

impl BecknContext {
    pub fn new(settings: &BapSettings, profile: DomainProfile, action: &str) -> Self {
        Self {
            domain: profile.network_domain.to_string(),
            action: action.to_string(),
            location: Location {
                country: Code { code: settings.country_code.clone() },
                city: Code { code: settings.city_code.clone() },
            },
            version: settings.version.clone(),
            bap_id: settings.bap_id.clone(),
            bap_uri: settings.bap_uri.clone(),
            bpp_id: settings.bpp_id.clone(),
            bpp_uri: settings.bpp_uri.clone(),
            transaction_id: Uuid::new_v4().to_string(),
            message_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().timestamp().to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Envelope {
    pub context: BecknContext,
    pub message: Value,
}

pub fn search_message(profile: DomainProfile) -> Value {
    json!({
        "intent": {
            "item": { "descriptor": { "name": profile.search_intent } }
        }
    })
}

/// Shared by `select` and `init`.
pub fn order_message(provider_id: &str, item_id: &str) -> Value {
    json!({
        "order": {
            "provider": { "id": provider_id },
            "items": [{ "id": item_id }]
        }
    })
}

#[derive(Clone, Copy, Debug)]
pub struct Customer<'a> {
    pub name: &'a str,
    pub phone: &'a str,
    pub email: &'a str,
}

pub fn confirm_message(
    provider_id: &str,
    item_id: &str,
    fulfillment_id: &str,
    customer: Customer<'_>,
) -> Value {
    json!({
        "order": {
            "provider": { "id": provider_id },
            "items": [{ "id": item_id }],
            "fulfillments": [{
                "id": fulfillment_id,
                "customer": {
                    "person": { "name": customer.name },
                    "contact": { "phone": customer.phone, "email": customer.email }
                }
            }]
        }
    })
}

pub fn status_message(order_id: &str) -> Value {
    json!({ "order_id": order_id })
}
