use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

// ============================================================================
// Order Aggregate
// ============================================================================
//
// An order arrives from the feed as one JSON document and is stored across
// the deliveries / payments / orders / items / order_items tables. The shape
// below is the feed shape; the repository takes care of the normalization.
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Validate)]
pub struct Order {
    #[validate(length(min = 1))]
    pub order_uid: String,
    #[validate(length(min = 1))]
    pub track_number: String,
    #[validate(length(min = 1))]
    pub entry: String,
    #[validate(nested)]
    pub delivery: Delivery,
    #[validate(nested)]
    pub payment: Payment,
    #[validate(length(min = 1), nested)]
    pub items: Vec<Item>,
    #[validate(length(min = 1))]
    pub locale: String,
    #[validate(length(min = 1))]
    pub internal_signature: String,
    #[validate(length(min = 1))]
    pub customer_id: String,
    #[validate(length(min = 1))]
    pub delivery_service: String,
    #[validate(length(min = 1))]
    pub shardkey: String,
    #[validate(range(min = 1))]
    pub sm_id: i32,
    pub date_created: DateTime<Utc>,
    #[validate(length(min = 1))]
    pub oof_shard: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Validate)]
pub struct Delivery {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub phone: String,
    #[validate(length(min = 1))]
    pub zip: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub address: String,
    #[validate(length(min = 1))]
    pub region: String,
    #[validate(email)]
    pub email: String,
}

/// Payment details. `transaction` doubles as the order's payment reference.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Validate)]
pub struct Payment {
    #[validate(length(min = 1))]
    pub transaction: String,
    #[serde(default)]
    pub request_id: String,
    #[validate(length(min = 1))]
    pub currency: String,
    #[validate(length(min = 1))]
    pub provider: String,
    #[validate(range(min = 1))]
    pub amount: i32,
    #[validate(range(min = 1))]
    pub payment_dt: i64,
    #[validate(length(min = 1))]
    pub bank: String,
    #[validate(range(min = 0))]
    pub delivery_cost: i32,
    #[validate(range(min = 0))]
    pub goods_total: i32,
    #[validate(range(min = 0))]
    pub custom_fee: i32,
}

/// Catalog item. Stored once per `chrt_id`; orders reference it through
/// the `order_items` association.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Validate)]
pub struct Item {
    #[validate(range(min = 1))]
    pub chrt_id: i64,
    #[validate(length(min = 1))]
    pub track_number: String,
    #[validate(range(min = 1))]
    pub price: i32,
    #[validate(length(min = 1))]
    pub rid: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(range(min = 0, max = 100))]
    pub sale: i32,
    #[validate(length(min = 1))]
    pub size: String,
    #[validate(range(min = 0))]
    pub total_price: i32,
    #[validate(range(min = 1))]
    pub nm_id: i64,
    #[validate(length(min = 1))]
    pub brand: String,
    #[validate(range(min = 0))]
    pub status: i32,
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::sample_order;

    const FEED_PAYLOAD: &str = r#"{
        "order_uid": "b563feb7b2b84b6test",
        "track_number": "WBILMTESTTRACK",
        "entry": "WBIL",
        "delivery": {
            "name": "Test Testov",
            "phone": "+9720000000",
            "zip": "2639809",
            "city": "Kiryat Mozkin",
            "address": "Ploshad Mira 15",
            "region": "Kraiot",
            "email": "test@gmail.com"
        },
        "payment": {
            "transaction": "b563feb7b2b84b6test",
            "request_id": "",
            "currency": "USD",
            "provider": "wbpay",
            "amount": 1817,
            "payment_dt": 1637907727,
            "bank": "alpha",
            "delivery_cost": 1500,
            "goods_total": 317,
            "custom_fee": 0
        },
        "items": [
            {
                "chrt_id": 9934930,
                "track_number": "WBILMTESTTRACK",
                "price": 453,
                "rid": "ab4219087a764ae0btest",
                "name": "Mascaras",
                "sale": 30,
                "size": "0",
                "total_price": 317,
                "nm_id": 2389212,
                "brand": "Vivienne Sabo",
                "status": 202
            }
        ],
        "locale": "en",
        "internal_signature": "sig",
        "customer_id": "test",
        "delivery_service": "meest",
        "shardkey": "9",
        "sm_id": 99,
        "date_created": "2021-11-26T06:22:19Z",
        "oof_shard": "1"
    }"#;

    #[test]
    fn test_decode_feed_payload() {
        let order: Order = serde_json::from_str(FEED_PAYLOAD).unwrap();

        assert_eq!(order.order_uid, "b563feb7b2b84b6test");
        assert_eq!(order.payment.transaction, order.order_uid);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].chrt_id, 9934930);
        assert!(order.validate().is_ok());
    }

    #[test]
    fn test_missing_delivery_fails_decoding() {
        let mut value: serde_json::Value = serde_json::from_str(FEED_PAYLOAD).unwrap();
        value.as_object_mut().unwrap().remove("delivery");

        assert!(serde_json::from_value::<Order>(value).is_err());
    }

    #[test]
    fn test_validation_rejects_empty_items() {
        let mut order = sample_order("no-items");
        order.items.clear();

        assert!(order.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_sale_above_hundred() {
        let mut order = sample_order("bad-sale");
        order.items[0].sale = 101;

        let errors = order.validate().unwrap_err();
        assert!(errors.errors().contains_key("items"));
    }

    #[test]
    fn test_validation_rejects_zero_amount_and_bad_email() {
        let mut order = sample_order("bad-payment");
        order.payment.amount = 0;
        assert!(order.validate().is_err());

        let mut order = sample_order("bad-email");
        order.delivery.email = "not-an-email".to_string();
        assert!(order.validate().is_err());
    }
}
