//! Kit stock, purchase, waitlist and feedback endpoints.

use crate::error::ClientError;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

/// Stock level of a kit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockStatus {
    pub in_stock: bool,
    #[serde(default)]
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
struct PurchaseCheck {
    purchased: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WaitlistEntry<'a> {
    email: &'a str,
    product_id: &'a str,
}

/// Viewer feedback on a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub email: String,
    pub course_name: String,
    pub video_index: usize,
    /// 1 to 5.
    pub rating: u8,
    pub message: String,
}

/// Client for the kit store endpoints under one base URL.
#[derive(Debug, Clone)]
pub struct Storefront {
    client: Client,
    base_url: String,
}

impl Storefront {
    /// Create a new store client rooted at `base_url`.
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn check(&self, res: Response) -> Result<Response, ClientError> {
        if res.status().is_success() {
            Ok(res)
        } else {
            Err(ClientError::Status {
                status: res.status().as_u16(),
                url: res.url().to_string(),
            })
        }
    }

    /// Get the stock level of `product_id`.
    pub async fn stock(&self, product_id: &str) -> Result<StockStatus, ClientError> {
        let res = self
            .client
            .get(self.url("stock"))
            .query(&[("productId", product_id)])
            .send()
            .await?;
        Ok(self.check(res)?.json().await?)
    }

    /// Whether `email` bought access to `course_name`.
    pub async fn has_purchased(&self, email: &str, course_name: &str) -> Result<bool, ClientError> {
        if email.trim().is_empty() {
            return Err(ClientError::MissingIdentity("purchase check"));
        }
        let res = self
            .client
            .get(self.url("purchases/check"))
            .query(&[("email", email), ("courseName", course_name)])
            .send()
            .await?;
        let body: PurchaseCheck = self.check(res)?.json().await?;
        Ok(body.purchased)
    }

    /// Add `email` to the restock waitlist of `product_id`.
    pub async fn join_waitlist(&self, email: &str, product_id: &str) -> Result<(), ClientError> {
        if !email.contains('@') {
            return Err(ClientError::InvalidRequest(
                "Please enter a valid email address.".into(),
            ));
        }
        let res = self
            .client
            .post(self.url("waitlist"))
            .json(&WaitlistEntry { email, product_id })
            .send()
            .await?;
        self.check(res)?;
        tracing::info!("Added {} to the waitlist for {}", email, product_id);
        Ok(())
    }

    /// Send lesson feedback. The rating must be 1 to 5.
    pub async fn submit_feedback(&self, feedback: &Feedback) -> Result<(), ClientError> {
        if !(1..=5).contains(&feedback.rating) {
            return Err(ClientError::InvalidRequest(
                "Rating must be between 1 and 5.".into(),
            ));
        }
        let res = self
            .client
            .post(self.url("feedback"))
            .json(feedback)
            .send()
            .await?;
        self.check(res)?;
        Ok(())
    }
}
