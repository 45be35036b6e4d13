use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    pub name: Option<String>,
    pub location: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Partial update for [`UserDetails`]; `None` fields leave the stored value untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetailsPatch {
    pub name: Option<String>,
    pub location: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl UserDetails {
    pub fn merge(&mut self, patch: UserDetailsPatch) {
        merge_field(&mut self.name, patch.name);
        merge_field(&mut self.location, patch.location);
        merge_field(&mut self.address, patch.address);
        merge_field(&mut self.phone, patch.phone);
        merge_field(&mut self.email, patch.email);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainDetails {
    pub provider_id: Option<String>,
    pub item_id: Option<String>,
    pub selection_id: Option<String>,
    pub fulfillment_id: Option<String>,
    pub transaction_id: Option<String>,
    pub order_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub connection_type: Option<String>,
    pub system_size: Option<String>,
    pub installation_date: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainDetailsPatch {
    pub provider_id: Option<String>,
    pub item_id: Option<String>,
    pub selection_id: Option<String>,
    pub fulfillment_id: Option<String>,
    pub transaction_id: Option<String>,
    pub order_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub connection_type: Option<String>,
    pub system_size: Option<String>,
    pub installation_date: Option<String>,
}

impl DomainDetails {
    pub fn merge(&mut self, patch: DomainDetailsPatch) {
        merge_field(&mut self.provider_id, patch.provider_id);
        merge_field(&mut self.item_id, patch.item_id);
        merge_field(&mut self.selection_id, patch.selection_id);
        merge_field(&mut self.fulfillment_id, patch.fulfillment_id);
        merge_field(&mut self.transaction_id, patch.transaction_id);
        merge_field(&mut self.order_id, patch.order_id);
        merge_field(&mut self.customer_name, patch.customer_name);
        merge_field(&mut self.customer_phone, patch.customer_phone);
        merge_field(&mut self.customer_email, patch.customer_email);
        merge_field(&mut self.connection_type, patch.connection_type);
        merge_field(&mut self.system_size, patch.system_size);
        merge_field(&mut self.installation_date, patch.installation_date);
    }

    /// Order identifier used by `status`: the confirmed order id, else the transaction id.
    pub fn order_identifier(&self) -> Option<&str> {
        self.order_id.as_deref().or(self.transaction_id.as_deref())
    }
}

fn merge_field(slot: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value {
        *slot = Some(value);
    }
}
