//! Request executor: runs one request to completion or failure.
//!
//! [`RequestHandler`] is the seam the dispatcher drives. [`RequestExecutor`] is
//! the production implementation: provider driver + HTTP transport + retry
//! policy. Its `handle` never fails; every [`RequestError`] is folded into the
//! returned [`ResultRecord`].

mod retry;

pub use retry::RetryPolicy;

use async_trait::async_trait;
use std::borrow::Cow;
use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::drivers::{DriverResponse, ProviderDriver};
use crate::error::RequestError;
use crate::transport::HttpTransport;
use crate::types::{Attachment, AttachmentSource, RequestRecord, ResultRecord};

/// Executes one request. Implementations must return exactly one result for
/// the record, preserving its `index` and `passthrough`.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, record: &RequestRecord) -> ResultRecord;
}

pub struct RequestExecutor {
    driver: Box<dyn ProviderDriver>,
    transport: HttpTransport,
    generation: GenerationConfig,
    retry: RetryPolicy,
}

impl RequestExecutor {
    pub fn new(
        driver: Box<dyn ProviderDriver>,
        transport: HttpTransport,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            driver,
            transport,
            generation,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn driver(&self) -> &dyn ProviderDriver {
        self.driver.as_ref()
    }

    /// Run the request, surfacing the failure cause.
    pub async fn execute(&self, record: &RequestRecord) -> Result<DriverResponse, RequestError> {
        // Read once; attachment failures are never retried.
        let attachment: Option<Cow<'_, Attachment>> = match &record.attachment {
            None => None,
            Some(AttachmentSource::Inline(att)) => Some(Cow::Borrowed(att)),
            Some(AttachmentSource::File(path)) => Some(Cow::Owned(Attachment::from_file(path).await?)),
        };

        let request =
            self.driver
                .build_request(&record.prompt, attachment.as_deref(), &self.generation);
        drop(attachment);

        let mut attempt = 0u32;
        loop {
            let outcome = match self.transport.post_json(&request).await {
                Ok(body) => self.driver.parse_response(&body),
                Err(e) => Err(e),
            };
            match outcome {
                Ok(resp) => return Ok(resp),
                Err(err) => match self.retry.next_delay(attempt, &err) {
                    Some(delay) => {
                        debug!(
                            index = record.index,
                            attempt,
                            kind = err.kind(),
                            delay_ms = delay.as_millis() as u64,
                            "retrying request"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(err),
                },
            }
        }
    }
}

#[async_trait]
impl RequestHandler for RequestExecutor {
    async fn handle(&self, record: &RequestRecord) -> ResultRecord {
        match self.execute(record).await {
            Ok(resp) => {
                ResultRecord::success(record, resp.content, resp.reasoning, resp.finish_reason)
            }
            Err(err) => {
                warn!(index = record.index, kind = err.kind(), error = %err, "request failed");
                ResultRecord::failure(record, err.to_string())
            }
        }
    }
}
