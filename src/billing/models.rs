use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: String,
    pub active: bool,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Price {
    pub id: String,
    pub product_id: Option<String>,
    pub active: bool,
    pub description: Option<String>,
    pub unit_amount: Option<i64>,
    pub currency: Option<String>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub price_type: Option<String>,
    pub interval: Option<String>,
    pub interval_count: Option<i64>,
    pub trial_period_days: Option<i64>,
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductWithPrices {
    #[serde(flatten)]
    pub product: Product,
    pub prices: Vec<Price>,
}

/// Timestamps are milliseconds since the epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub metadata: Option<String>,
    pub price_id: Option<String>,
    pub quantity: Option<i64>,
    pub cancel_at_period_end: bool,
    pub created: Option<i64>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub ended_at: Option<i64>,
    pub cancel_at: Option<i64>,
    pub canceled_at: Option<i64>,
    pub trial_start: Option<i64>,
    pub trial_end: Option<i64>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        matches!(self.status.as_str(), "active" | "trialing")
    }
}
