use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(client: Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach health check")?;

        if !response.status().is_success() {
            anyhow::bail!("Health check failed: {}", response.status());
        }

        Ok(())
    }

    pub async fn list_products(&self) -> Result<Vec<Value>> {
        self.get_array(&format!("{}/api/products", self.base_url))
            .await
    }

    pub async fn list_orders(&self) -> Result<Vec<Value>> {
        self.get_array(&format!("{}/api/orders", self.base_url)).await
    }

    /// Returns the HTTP status alongside the body so callers can assert on
    /// rejected filters as well as successful ones.
    pub async fn list_sales(&self, product_id: &str) -> Result<(StatusCode, Value)> {
        let url = format!("{}/api/sales", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("product_id", product_id)])
            .send()
            .await
            .context("Failed to list sales")?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let value = serde_json::from_str(&body).unwrap_or(Value::String(body));

        Ok((status, value))
    }

    pub async fn create_order(&self, product_id: i64, quantity: i64) -> Result<i64> {
        let url = format!("{}/api/orders", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "product_id": product_id,
                "quantity": quantity,
            }))
            .send()
            .await
            .context("Failed to create order")?;

        if response.status() != StatusCode::CREATED {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            anyhow::bail!("Failed to create order: {} - Response: {}", status, body);
        }

        let created: Value = response.json().await.context("Failed to parse response")?;

        created["id"].as_i64().context("No order ID in response")
    }

    pub async fn delete_order(&self, order_id: i64) -> Result<StatusCode> {
        let url = format!("{}/api/orders/{}", self.base_url, order_id);

        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .context("Failed to delete order")?;

        Ok(response.status())
    }

    async fn get_array(&self, url: &str) -> Result<Vec<Value>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to GET {url}"))?;

        if !response.status().is_success() {
            anyhow::bail!("GET {} failed: {}", url, response.status());
        }

        let body: Value = response.json().await.context("Failed to parse response")?;

        match body {
            Value::Array(items) => Ok(items),
            other => anyhow::bail!("Expected a JSON array from {url}, got {other}"),
        }
    }
}
