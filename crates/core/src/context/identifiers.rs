use serde_json::Value;

use crate::domain::{DomainDetailsPatch, Step};

// Gateway responses wrap each BPP reply in `responses[]`; direct BPP replies do not.
const RESPONSE_ROOTS: [&str; 2] = ["/responses/0", ""];

const TRANSACTION_ID: &str = "/context/transaction_id";
const FULFILLMENT_ID: &str = "/message/order/fulfillments/0/id";
const ORDER_ID: &str = "/message/order/id";
const STATUS_CODES: [&str; 3] = [
    "/message/order/fulfillments/0/state/descriptor/code",
    "/message/order/status",
    "/message/order/state",
];

fn lookup(response: &Value, path: &str) -> Option<String> {
    RESPONSE_ROOTS.iter().find_map(|root| {
        match response.pointer(&format!("{root}{path}"))? {
            Value::String(value) if !value.trim().is_empty() => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            _ => None,
        }
    })
}

pub fn transaction_id(response: &Value) -> Option<String> {
    lookup(response, TRANSACTION_ID)
}

pub fn fulfillment_id(response: &Value) -> Option<String> {
    lookup(response, FULFILLMENT_ID)
}

pub fn order_id(response: &Value) -> Option<String> {
    lookup(response, ORDER_ID)
}

pub fn status_code(response: &Value) -> Option<String> {
    STATUS_CODES.iter().find_map(|path| lookup(response, path))
}

/// Identifiers a step's response produces for later steps.
pub fn captured(step: Step, response: &Value) -> DomainDetailsPatch {
    match step {
        Step::Init => DomainDetailsPatch {
            fulfillment_id: fulfillment_id(response),
            transaction_id: transaction_id(response),
            ..DomainDetailsPatch::default()
        },
        Step::Confirm => {
            DomainDetailsPatch { order_id: order_id(response), ..DomainDetailsPatch::default() }
        }
        Step::Search | Step::Select | Step::Status => DomainDetailsPatch::default(),
    }
}
