use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::core::error::NetworkError;
use crate::core::ports::search::{SearchPort, SearchResult};

pub const DEFAULT_BASE_URL: &str = "https://en.wikipedia.org";

/// Title search against the MediaWiki `opensearch` API.
pub struct WikipediaSearch {
    client: reqwest::Client,
    base_url: String,
    limit: u32,
}

impl WikipediaSearch {
    pub fn new(base_url: &str, limit: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            limit,
        }
    }

    pub fn search_url(&self, term: &str) -> String {
        format!(
            "{}/w/api.php?action=opensearch&format=json&limit={}&search={}",
            self.base_url,
            self.limit,
            urlencoding::encode(term)
        )
    }

    async fn fetch(&self, term: &str) -> Result<Vec<SearchResult>, NetworkError> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let response = self.client.get(self.search_url(term)).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(NetworkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value =
            serde_json::from_str(&body).map_err(|e| NetworkError::Decode(e.to_string()))?;
        parse_opensearch(&value)
    }
}

impl SearchPort for WikipediaSearch {
    fn search<'a>(&'a self, term: &'a str) -> BoxFuture<'a, Result<Vec<SearchResult>, NetworkError>> {
        Box::pin(self.fetch(term))
    }
}

/// `[term, [titles], [descriptions], [urls]]` into title/url pairs.
pub(crate) fn parse_opensearch(value: &Value) -> Result<Vec<SearchResult>, NetworkError> {
    let titles = value
        .get(1)
        .and_then(|v| v.as_array())
        .ok_or_else(|| NetworkError::Decode("opensearch response has no titles".to_string()))?;
    let urls = value
        .get(3)
        .and_then(|v| v.as_array())
        .ok_or_else(|| NetworkError::Decode("opensearch response has no urls".to_string()))?;

    Ok(titles
        .iter()
        .zip(urls.iter())
        .filter_map(|(title, url)| {
            Some(SearchResult {
                title: title.as_str()?.to_string(),
                url: url.as_str()?.to_string(),
            })
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchBatch {
    pub term: String,
    pub results: Vec<SearchResult>,
}

/// Issues a search only once input has been quiet for `delay`, always for
/// the latest term. Failed searches are logged and leave the last batch in place.
pub struct SearchDebouncer {
    input: watch::Sender<String>,
    results: watch::Receiver<Option<SearchBatch>>,
    task: tokio::task::JoinHandle<()>,
}

impl SearchDebouncer {
    pub fn spawn(search: Arc<dyn SearchPort>, delay: Duration) -> Self {
        let (input, mut input_rx) = watch::channel(String::new());
        let (results_tx, results) = watch::channel(None);

        let task = tokio::spawn(async move {
            while input_rx.changed().await.is_ok() {
                // Restart the quiet period on every keystroke.
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => break,
                        changed = input_rx.changed() => {
                            if changed.is_err() {
                                return;
                            }
                        }
                    }
                }

                let term = input_rx.borrow_and_update().trim().to_string();
                if term.is_empty() {
                    continue;
                }
                match search.search(&term).await {
                    Ok(found) => {
                        let _ = results_tx.send(Some(SearchBatch {
                            term,
                            results: found,
                        }));
                    }
                    Err(error) => log::warn!("search for '{}' failed: {}", term, error),
                }
            }
        });

        Self {
            input,
            results,
            task,
        }
    }

    pub fn push(&self, term: &str) {
        self.input.send_replace(term.to_string());
    }

    pub fn latest(&self) -> Option<SearchBatch> {
        self.results.borrow().clone()
    }

    /// Waits for the next batch of results.
    pub async fn next_batch(&mut self) -> Option<SearchBatch> {
        self.results.changed().await.ok()?;
        self.results.borrow_and_update().clone()
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::{parse_opensearch, SearchDebouncer, WikipediaSearch};
    use crate::core::error::NetworkError;
    use crate::core::ports::search::{SearchPort, SearchResult};

    #[derive(Default)]
    struct RecordingSearch {
        terms: Mutex<Vec<String>>,
    }

    impl SearchPort for RecordingSearch {
        fn search<'a>(
            &'a self,
            term: &'a str,
        ) -> BoxFuture<'a, Result<Vec<SearchResult>, NetworkError>> {
            Box::pin(async move {
                self.terms.lock().expect("terms").push(term.to_string());
                Ok(vec![SearchResult {
                    title: term.to_string(),
                    url: format!("https://en.wikipedia.org/wiki/{term}"),
                }])
            })
        }
    }

    #[test]
    fn parses_opensearch_arrays() {
        let value = json!([
            "quasi",
            ["Quasi-War", "Quasicrystal"],
            ["", ""],
            [
                "https://en.wikipedia.org/wiki/Quasi-War",
                "https://en.wikipedia.org/wiki/Quasicrystal"
            ]
        ]);

        let results = parse_opensearch(&value).expect("parse");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Quasi-War");
        assert_eq!(results[1].url, "https://en.wikipedia.org/wiki/Quasicrystal");
    }

    #[test]
    fn rejects_non_opensearch_payload() {
        let error = parse_opensearch(&json!({"error": "bad"})).expect_err("not an array");
        assert!(matches!(error, NetworkError::Decode(_)));
    }

    #[test]
    fn search_url_encodes_the_term() {
        let search = WikipediaSearch::new("https://en.wikipedia.org/", 5);
        assert_eq!(
            search.search_url("Harry Potter (film series)"),
            "https://en.wikipedia.org/w/api.php?action=opensearch&format=json&limit=5&search=Harry%20Potter%20%28film%20series%29"
        );
    }

    #[tokio::test]
    async fn fetches_results_from_opensearch() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/w/api.php")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("action".into(), "opensearch".into()),
                mockito::Matcher::UrlEncoded("search".into(), "Quasi War".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"["Quasi War",["Quasi-War"],[""],["https://en.wikipedia.org/wiki/Quasi-War"]]"#,
            )
            .create_async()
            .await;

        let search = WikipediaSearch::new(&server.url(), 10);
        let results = search.search("Quasi War").await.expect("search");

        assert_eq!(
            results,
            vec![SearchResult {
                title: "Quasi-War".to_string(),
                url: "https://en.wikipedia.org/wiki/Quasi-War".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn blank_term_is_never_sent() {
        let search = WikipediaSearch::new("http://127.0.0.1:9", 10);
        assert!(search.search("   ").await.expect("no request").is_empty());
    }

    #[tokio::test]
    async fn debouncer_searches_only_the_last_term() {
        let backend = Arc::new(RecordingSearch::default());
        let mut debouncer = SearchDebouncer::spawn(backend.clone(), Duration::from_millis(50));

        for term in ["q", "qu", "qua", "quasi"] {
            debouncer.push(term);
        }

        let batch = tokio::time::timeout(Duration::from_secs(5), debouncer.next_batch())
            .await
            .expect("debounced search finished")
            .expect("batch");

        assert_eq!(batch.term, "quasi");
        assert_eq!(*backend.terms.lock().expect("terms"), vec!["quasi".to_string()]);
        assert_eq!(debouncer.latest(), Some(batch));
    }
}
