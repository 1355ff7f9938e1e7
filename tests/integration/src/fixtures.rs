//! Request bodies and response shapes shared by the API tests

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

pub const BUYER: i64 = 100_000_001;
pub const SELLER: i64 = 100_000_002;
pub const OTHER_SELLER: i64 = 100_000_003;
pub const STRANGER: i64 = 100_000_004;

pub fn part_request(phone: &str) -> Value {
    json!({
        "car_make": "Toyota",
        "car_model": "Camry",
        "car_year": 2018,
        "part_needed": "Brake pads",
        "description": "Front set",
        "phone": phone,
        "location": "Lagos"
    })
}

pub fn offer(price: i64, fee: i64) -> Value {
    json!({
        "price": price,
        "message": "In stock",
        "contact_unlock_fee": fee
    })
}

#[derive(Debug, Deserialize)]
pub struct RequestBody {
    pub id: String,
    pub buyer_id: String,
    pub status: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModerationBody {
    pub verdict: String,
    pub reason: Option<String>,
    pub requires_review: bool,
}

#[derive(Debug, Deserialize)]
pub struct SubmissionBody {
    pub request: RequestBody,
    pub moderation: ModerationBody,
}

#[derive(Debug, Deserialize)]
pub struct OfferBody {
    pub id: String,
    pub request_id: String,
    pub supplier_id: String,
    pub price: i64,
    pub contact_unlock_fee: i64,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct AcceptanceBody {
    pub offer: OfferBody,
    pub rejected_offer_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RatingBody {
    pub offer_id: String,
    pub rating: i16,
}

#[derive(Debug, Deserialize)]
pub struct PaymentBody {
    pub reference: String,
    pub amount: i64,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub part_id: Option<String>,
    pub unread_count: i32,
    pub last_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub id: String,
    pub sender_id: String,
    pub content: String,
    pub is_read: bool,
}

#[derive(Debug, Deserialize)]
pub struct SentBody {
    pub chat: ChatBody,
    pub message: MessageBody,
    pub duplicate: bool,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadBody {
    pub marked: u64,
}

#[derive(Debug, Deserialize)]
pub struct ResolutionBody {
    pub outcome: String,
    pub request: RequestBody,
}

#[derive(Debug, Deserialize)]
pub struct StatsBody {
    pub requests_by_status: BTreeMap<String, i64>,
    pub offers_by_status: BTreeMap<String, i64>,
    pub unread_messages: i64,
    pub stale: bool,
}
