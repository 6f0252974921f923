use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::core::error::NetworkError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerRequest {
    /// URL of the article the chat is anchored to.
    pub article: String,
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerResponse {
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

pub trait AnswerPort: Send + Sync {
    fn ask<'a>(
        &'a self,
        request: &'a AnswerRequest,
    ) -> BoxFuture<'a, Result<AnswerResponse, NetworkError>>;
}
