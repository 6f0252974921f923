use futures::future::BoxFuture;
use std::time::Duration;

use crate::core::error::NetworkError;
use crate::core::ports::answer::{AnswerPort, AnswerRequest, AnswerResponse};

/// Client for the question-answering endpoint.
///
/// One POST per question, no retries. The timeout covers the whole round trip.
pub struct HttpAnswerClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAnswerClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim().to_string(),
        })
    }

    async fn post(&self, request: &AnswerRequest) -> Result<AnswerResponse, NetworkError> {
        log::debug!("asking {} about {}", self.endpoint, request.article);
        let response = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(NetworkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_answer(&body)
    }
}

impl AnswerPort for HttpAnswerClient {
    fn ask<'a>(
        &'a self,
        request: &'a AnswerRequest,
    ) -> BoxFuture<'a, Result<AnswerResponse, NetworkError>> {
        Box::pin(self.post(request))
    }
}

pub(crate) fn parse_answer(body: &str) -> Result<AnswerResponse, NetworkError> {
    serde_json::from_str::<AnswerResponse>(body.trim())
        .map_err(|e| NetworkError::Decode(format!("{e}: {}", preview(body))))
}

fn preview(body: &str) -> String {
    const MAX_CHARS: usize = 120;
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
