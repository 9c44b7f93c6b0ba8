pub mod models;
pub mod webhook;

use sqlx::{Pool, Sqlite};
use std::collections::HashMap;

use crate::errors::AppError;
use models::{Price, Product, ProductWithPrices, Subscription};
pub use webhook::{
    signature_header, verify_signature, CheckoutSession, RelevantEvent, StripePrice,
    StripeProduct, StripeSubscription, WebhookError, WebhookEvent, DEFAULT_TOLERANCE_SECS,
};

/// Outcome of processing one verified webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    Handled(RelevantEvent),
    Ignored,
}

fn metadata_json(metadata: &HashMap<String, String>) -> Result<Option<String>, AppError> {
    if metadata.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(metadata)?))
}

fn seconds_to_millis(ts: Option<i64>) -> Option<i64> {
    ts.map(|s| s * 1000)
}

/// Local mirror of Stripe products, prices, customers and subscriptions.
pub struct BillingManager {
    pool: Pool<Sqlite>,
}

impl BillingManager {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Routes a verified event to its handler. Types outside the allow-list
    /// are ignored; a failing handler for a listed type is an error.
    pub async fn handle_event(&self, event: &WebhookEvent) -> Result<EventDisposition, AppError> {
        let Some(kind) = RelevantEvent::parse(&event.event_type) else {
            log::debug!("Ignoring webhook event {} ({})", event.id, event.event_type);
            return Ok(EventDisposition::Ignored);
        };

        let result = match kind {
            RelevantEvent::ProductCreated | RelevantEvent::ProductUpdated => {
                self.upsert_product(&event.object()?).await
            }
            RelevantEvent::ProductDeleted => {
                let product: StripeProduct = event.object()?;
                self.delete_product(&product.id).await
            }
            RelevantEvent::PriceCreated | RelevantEvent::PriceUpdated => {
                self.upsert_price(&event.object()?).await
            }
            RelevantEvent::PriceDeleted => {
                let price: StripePrice = event.object()?;
                self.delete_price(&price.id).await
            }
            RelevantEvent::CheckoutSessionCompleted => {
                self.complete_checkout(&event.object()?).await
            }
            RelevantEvent::SubscriptionCreated
            | RelevantEvent::SubscriptionUpdated
            | RelevantEvent::SubscriptionDeleted => {
                self.upsert_subscription(&event.object()?).await
            }
        };

        match result {
            Ok(()) => {
                log::info!("Handled webhook event {} ({})", event.id, kind.as_str());
                Ok(EventDisposition::Handled(kind))
            }
            Err(e) => Err(WebhookError::HandlerFailed {
                event: kind.as_str().to_string(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    pub async fn upsert_product(&self, product: &StripeProduct) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, active, name, description, image, metadata)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                active = excluded.active,
                name = excluded.name,
                description = excluded.description,
                image = excluded.image,
                metadata = excluded.metadata
            "#,
        )
        .bind(&product.id)
        .bind(product.active)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.images.first())
        .bind(metadata_json(&product.metadata)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_product(&self, product_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn upsert_price(&self, price: &StripePrice) -> Result<(), AppError> {
        let recurring = price.recurring.as_ref();
        sqlx::query(
            r#"
            INSERT INTO prices (
                id, product_id, active, description, unit_amount, currency, type,
                interval, interval_count, trial_period_days, metadata
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                product_id = excluded.product_id,
                active = excluded.active,
                description = excluded.description,
                unit_amount = excluded.unit_amount,
                currency = excluded.currency,
                type = excluded.type,
                interval = excluded.interval,
                interval_count = excluded.interval_count,
                trial_period_days = excluded.trial_period_days,
                metadata = excluded.metadata
            "#,
        )
        .bind(&price.id)
        .bind(&price.product)
        .bind(price.active)
        .bind(&price.nickname)
        .bind(price.unit_amount)
        .bind(&price.currency)
        .bind(&price.price_type)
        .bind(recurring.and_then(|r| r.interval.clone()))
        .bind(recurring.and_then(|r| r.interval_count))
        .bind(recurring.and_then(|r| r.trial_period_days))
        .bind(metadata_json(&price.metadata)?)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.message().contains("FOREIGN KEY") => {
                AppError::NotFound(format!("Product {} for price {}", price.product, price.id))
            }
            other => other.into(),
        })?;
        Ok(())
    }

    pub async fn delete_price(&self, price_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM prices WHERE id = ?")
            .bind(price_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Associates a Stripe customer with a user. A customer already linked to
    /// a different user is an integrity error.
    pub async fn link_customer(&self, user_id: &str, stripe_customer_id: &str) -> Result<(), AppError> {
        if let Some(owner) = self.customer_user(stripe_customer_id).await? {
            if owner != user_id {
                return Err(AppError::Integrity(format!(
                    "Customer {} already belongs to another user",
                    stripe_customer_id
                )));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO customers (id, stripe_customer_id) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET stripe_customer_id = excluded.stripe_customer_id
            "#,
        )
        .bind(user_id)
        .bind(stripe_customer_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn customer_user(&self, stripe_customer_id: &str) -> Result<Option<String>, AppError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT id FROM customers WHERE stripe_customer_id = ?")
                .bind(stripe_customer_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id,)| id))
    }

    async fn complete_checkout(&self, session: &CheckoutSession) -> Result<(), AppError> {
        if session.mode.as_deref() != Some("subscription") {
            log::debug!("Checkout session {} is not a subscription", session.id);
            return Ok(());
        }
        let customer = session.customer.as_deref().ok_or_else(|| {
            AppError::Validation(format!("Checkout session {} has no customer", session.id))
        })?;

        match &session.client_reference_id {
            Some(user_id) => self.link_customer(user_id, customer).await,
            None => self
                .customer_user(customer)
                .await?
                .map(|_| ())
                .ok_or_else(|| AppError::NotFound(format!("Customer {}", customer))),
        }
    }

    /// Mirrors a subscription; the owning user is resolved through the
    /// `customers` table.
    pub async fn upsert_subscription(&self, sub: &StripeSubscription) -> Result<(), AppError> {
        let user_id = self
            .customer_user(&sub.customer)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Customer {}", sub.customer)))?;
        let item = sub.items.data.first();

        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, user_id, status, metadata, price_id, quantity, cancel_at_period_end,
                created, current_period_start, current_period_end, ended_at,
                cancel_at, canceled_at, trial_start, trial_end
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                status = excluded.status,
                metadata = excluded.metadata,
                price_id = excluded.price_id,
                quantity = excluded.quantity,
                cancel_at_period_end = excluded.cancel_at_period_end,
                created = excluded.created,
                current_period_start = excluded.current_period_start,
                current_period_end = excluded.current_period_end,
                ended_at = excluded.ended_at,
                cancel_at = excluded.cancel_at,
                canceled_at = excluded.canceled_at,
                trial_start = excluded.trial_start,
                trial_end = excluded.trial_end
            "#,
        )
        .bind(&sub.id)
        .bind(&user_id)
        .bind(&sub.status)
        .bind(metadata_json(&sub.metadata)?)
        .bind(item.map(|i| i.price.id.clone()))
        .bind(item.and_then(|i| i.quantity))
        .bind(sub.cancel_at_period_end)
        .bind(seconds_to_millis(sub.created))
        .bind(seconds_to_millis(sub.current_period_start))
        .bind(seconds_to_millis(sub.current_period_end))
        .bind(seconds_to_millis(sub.ended_at))
        .bind(seconds_to_millis(sub.cancel_at))
        .bind(seconds_to_millis(sub.canceled_at))
        .bind(seconds_to_millis(sub.trial_start))
        .bind(seconds_to_millis(sub.trial_end))
        .execute(&self.pool)
        .await?;

        log::info!("Subscription {} for user {} is {}", sub.id, user_id, sub.status);
        Ok(())
    }

    pub async fn get_active_products_with_prices(&self) -> Vec<ProductWithPrices> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool);
        let prices = sqlx::query_as::<_, Price>(
            "SELECT * FROM prices WHERE active = 1 ORDER BY unit_amount",
        )
        .fetch_all(&self.pool);

        let (products, prices) = tokio::join!(products, prices);
        let products = products.unwrap_or_else(|e| {
            log::error!("Failed to load products: {}", e);
            Vec::new()
        });
        let prices = prices.unwrap_or_else(|e| {
            log::error!("Failed to load prices: {}", e);
            Vec::new()
        });

        let mut by_product: HashMap<String, Vec<Price>> = HashMap::new();
        for price in prices {
            if let Some(product_id) = price.product_id.clone() {
                by_product.entry(product_id).or_default().push(price);
            }
        }

        products
            .into_iter()
            .map(|product| {
                let prices = by_product.remove(&product.id).unwrap_or_default();
                ProductWithPrices { product, prices }
            })
            .collect()
    }

    pub async fn get_active_subscription(&self, user_id: &str) -> Option<Subscription> {
        sqlx::query_as::<_, Subscription>(
            r#"
            SELECT * FROM subscriptions
            WHERE user_id = ? AND status IN ('trialing', 'active')
            ORDER BY created DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            log::error!("Failed to load subscription for {}: {}", user_id, e);
            None
        })
    }
}
