use crate::adapters::config::Settings;
use crate::adapters::wikipedia::WikipediaSearch;
use crate::core::ports::search::{SearchPort, SearchResult};

use super::super::CliError;

pub fn client(settings: &Settings) -> WikipediaSearch {
    WikipediaSearch::new(&settings.search_base_url, settings.search_limit())
}

pub fn print_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("no articles found");
        return;
    }
    for (index, result) in results.iter().enumerate() {
        println!("{:>3}. {}  {}", index + 1, result.title, result.url);
    }
}

pub async fn search(settings: &Settings, term: &str) -> Result<(), CliError> {
    if term.trim().is_empty() {
        return Err(CliError::Usage("search term is empty".to_string()));
    }
    let results = client(settings).search(term).await?;
    print_results(&results);
    Ok(())
}
