use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of `orders.created` events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderCreatedV1 {
    pub order_id: String,

    /// Warehouse the order ships from
    pub seller_warehouse_id: String,

    /// Pickup point the customer chose
    pub pickup_point_id: String,

    pub created_at: DateTime<Utc>,

    /// Contact snapshot carried into the formed batch
    #[serde(default)]
    pub customer_phone: String,

    #[serde(default)]
    pub customer_email: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_with_contacts() {
        let payload: OrderCreatedV1 = serde_json::from_value(json!({
            "order_id": "order-1",
            "seller_warehouse_id": "wh-1",
            "pickup_point_id": "pvp-1",
            "created_at": "2024-03-01T10:00:00Z",
            "customer_phone": "+375291234567",
            "customer_email": "a@example.com"
        }))
        .unwrap();

        assert_eq!(payload.order_id, "order-1");
        assert_eq!(payload.customer_phone, "+375291234567");
    }

    #[test]
    fn test_decode_without_contacts() {
        let payload: OrderCreatedV1 = serde_json::from_value(json!({
            "order_id": "order-2",
            "seller_warehouse_id": "wh-1",
            "pickup_point_id": "pvp-1",
            "created_at": "2024-03-01T10:00:00Z"
        }))
        .unwrap();

        assert!(payload.customer_phone.is_empty());
        assert!(payload.customer_email.is_empty());
    }
}
