use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::core::error::NetworkError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
}

pub trait SearchPort: Send + Sync {
    fn search<'a>(&'a self, term: &'a str) -> BoxFuture<'a, Result<Vec<SearchResult>, NetworkError>>;
}
