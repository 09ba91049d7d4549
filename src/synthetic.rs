use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::distributions::{Alphanumeric, Uniform};
use rand::Rng;

use crate::models::{Delivery, Item, Order, Payment};

// ============================================================================
// Synthetic Orders
// ============================================================================
//
// Generates valid orders for the publisher binary and for tests. Everything
// produced here passes `Order::validate()`.
//
// ============================================================================

const CITIES: &[&str] = &["Kiryat Mozkin", "Haifa", "Tel Aviv", "Moscow", "Kazan"];
const BRANDS: &[&str] = &["Vivienne Sabo", "Lamoda", "Nivea", "Acme", "Globex"];
const PROVIDERS: &[&str] = &["wbpay", "stripe", "paypal"];
const CURRENCIES: &[&str] = &["USD", "EUR", "RUB"];

fn upper(rng: &mut impl Rng, len: usize) -> String {
    (0..len).map(|_| rng.gen_range(b'A'..=b'Z') as char).collect()
}

fn token(rng: &mut impl Rng, len: usize) -> String {
    rng.sample_iter(Alphanumeric)
        .take(len)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

fn pick<'a>(rng: &mut impl Rng, options: &[&'a str]) -> &'a str {
    options[rng.gen_range(0..options.len())]
}

/// Build a random, valid order with one to three items.
pub fn random_order(rng: &mut impl Rng) -> Order {
    let order_uid = uuid::Uuid::now_v7().simple().to_string();
    let track_number = upper(rng, 14);
    let item_count = rng.gen_range(1..=3);
    let price_range = Uniform::new_inclusive(100, 1000);

    let items: Vec<Item> = (0..item_count)
        .map(|_| {
            let price = rng.sample(price_range);
            let sale = rng.gen_range(0..=100);
            Item {
                chrt_id: rng.gen_range(1_000_000..=9_999_999),
                track_number: track_number.clone(),
                price,
                rid: token(rng, 19),
                name: format!("Product {}", upper(rng, 4)),
                sale,
                size: rng.gen_range(10..100).to_string(),
                total_price: price * (100 - sale) / 100,
                nm_id: rng.gen_range(1_000_000..=9_999_999),
                brand: pick(rng, BRANDS).to_string(),
                status: rng.gen_range(100..300),
            }
        })
        .collect();

    let goods_total: i32 = items.iter().map(|i| i.total_price).sum();
    let delivery_cost = rng.gen_range(100..=1000);

    Order {
        order_uid: order_uid.clone(),
        track_number,
        entry: upper(rng, 4),
        delivery: Delivery {
            name: format!("Customer {}", upper(rng, 6)),
            phone: format!("+972{:07}", rng.gen_range(0..10_000_000)),
            zip: format!("{:07}", rng.gen_range(0..10_000_000)),
            city: pick(rng, CITIES).to_string(),
            address: format!("Street {} {}", upper(rng, 5), rng.gen_range(1..200)),
            region: upper(rng, 6),
            email: format!("{}@example.com", token(rng, 8)),
        },
        payment: Payment {
            transaction: order_uid,
            request_id: token(rng, 9),
            currency: pick(rng, CURRENCIES).to_string(),
            provider: pick(rng, PROVIDERS).to_string(),
            amount: goods_total + delivery_cost,
            payment_dt: Utc::now().timestamp(),
            bank: upper(rng, 5),
            delivery_cost,
            goods_total,
            custom_fee: rng.gen_range(0..=50),
        },
        items,
        locale: pick(rng, &["en", "ru"]).to_string(),
        internal_signature: token(rng, 10),
        customer_id: token(rng, 8),
        delivery_service: pick(rng, &["meest", "dhl", "cdek"]).to_string(),
        shardkey: rng.gen_range(0..10).to_string(),
        sm_id: rng.gen_range(1..=100),
        date_created: Utc::now() - Duration::seconds(rng.gen_range(0..86_400)),
        oof_shard: rng.gen_range(0..10).to_string(),
    }
}

/// Deterministic order fixture keyed by `order_uid`.
pub fn sample_order(order_uid: &str) -> Order {
    let date_created = Utc
        .with_ymd_and_hms(2021, 11, 26, 6, 22, 19)
        .single()
        .unwrap_or_default();
    sample_order_at(order_uid, date_created)
}

/// Deterministic order fixture with an explicit creation time.
pub fn sample_order_at(order_uid: &str, date_created: DateTime<Utc>) -> Order {
    Order {
        order_uid: order_uid.to_string(),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: order_uid.to_string(),
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1817,
            payment_dt: 1_637_907_727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: 0,
        },
        items: vec![Item {
            chrt_id: 9_934_930,
            track_number: "WBILMTESTTRACK".to_string(),
            price: 453,
            rid: "ab4219087a764ae0btest".to_string(),
            name: "Mascaras".to_string(),
            sale: 30,
            size: "0".to_string(),
            total_price: 317,
            nm_id: 2_389_212,
            brand: "Vivienne Sabo".to_string(),
            status: 202,
        }],
        locale: "en".to_string(),
        internal_signature: "sig".to_string(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shardkey: "9".to_string(),
        sm_id: 99,
        date_created,
        oof_shard: "1".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_random_orders_are_valid() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let order = random_order(&mut rng);
            assert!(order.validate().is_ok(), "invalid order: {:?}", order);
            assert_eq!(order.payment.transaction, order.order_uid);
        }
    }

    #[test]
    fn test_sample_order_is_valid() {
        assert!(sample_order("fixture").validate().is_ok());
    }
}
