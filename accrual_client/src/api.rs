use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{Client, StatusCode};

use crate::{
    data_objects::{AccrualInfo, AccrualResponse},
    AccrualApiError,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_RATE_LIMIT_RETRIES: u32 = 2;
const DEFAULT_RATE_LIMIT_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AccrualApi {
    base_url: String,
    client: Arc<Client>,
    rate_limit_retries: u32,
    rate_limit_interval: Duration,
}

impl AccrualApi {
    pub fn new(base_url: &str) -> Result<Self, AccrualApiError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AccrualApiError::Initialization(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Arc::new(client),
            rate_limit_retries: DEFAULT_RATE_LIMIT_RETRIES,
            rate_limit_interval: DEFAULT_RATE_LIMIT_INTERVAL,
        })
    }

    /// Override the rate-limit retry policy. Mostly useful in tests, where waiting a minute between retries is
    /// not an option.
    pub fn with_rate_limit_policy(mut self, retries: u32, interval: Duration) -> Self {
        self.rate_limit_retries = retries;
        self.rate_limit_interval = interval;
        self
    }

    pub fn url(&self, number: &str) -> String {
        format!("{}/api/orders/{number}", self.base_url)
    }

    /// Looks up the current accrual status for the given order number.
    ///
    /// A `429` response is retried up to `rate_limit_retries` times at a fixed interval. A `204` response means
    /// the order is unknown to the service and maps to [`AccrualInfo::unregistered`]. Any other non-2xx
    /// response is a hard error for this call.
    pub async fn order_accrual(&self, number: &str) -> Result<AccrualInfo, AccrualApiError> {
        let url = self.url(number);
        let mut attempt = 0u32;
        loop {
            trace!("📡️ Fetching accrual status: {url}");
            let response =
                self.client.get(&url).send().await.map_err(|e| AccrualApiError::RequestError(e.to_string()))?;
            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS && attempt < self.rate_limit_retries {
                attempt += 1;
                debug!(
                    "📡️ Accrual service rate-limited the lookup for order {number}. Retry {attempt} of {} in {:?}",
                    self.rate_limit_retries, self.rate_limit_interval
                );
                tokio::time::sleep(self.rate_limit_interval).await;
                continue;
            }
            if status == StatusCode::NO_CONTENT {
                debug!("📡️ Order {number} is not registered with the accrual service");
                return Ok(AccrualInfo::unregistered());
            }
            if status.is_success() {
                let body = response
                    .json::<AccrualResponse>()
                    .await
                    .map_err(|e| AccrualApiError::JsonError(e.to_string()))?;
                trace!("📡️ Order {number} is {:?} at the accrual service", body.status);
                return Ok(AccrualInfo::from(body));
            }
            let message = response.text().await.unwrap_or_else(|e| format!("unreadable response body: {e}"));
            return Err(AccrualApiError::QueryError { status: status.as_u16(), message });
        }
    }
}
