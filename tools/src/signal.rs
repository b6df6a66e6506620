//! Web-search ranking signal: how often each option appears in the results
//! page for the question text.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use scraper::{Html, Node};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Ranking signal future type alias.
pub type SignalFut<'a> = Pin<Box<dyn Future<Output = Result<Vec<u32>, SignalError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("invalid search URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("search request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("search returned HTTP {status}")]
    Status { status: u16 },
    #[error("signal returned {got} scores for {expected} candidates")]
    ScoreCount { expected: usize, got: usize },
}

/// Relevance of candidate answers to a query.
pub trait RankingSignal: Send + Sync {
    /// One non-negative score per candidate, in candidate order.
    fn score_occurrences<'a>(&'a self, query: &'a str, candidates: &'a [String]) -> SignalFut<'a>;
}

#[derive(Debug, Clone)]
pub struct WebSearchConfig {
    /// Results page URL without the query parameter.
    pub base_url: String,
    pub query_param: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.baidu.com/s".to_string(),
            query_param: "wd".to_string(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_13_2) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/63.0.3239.132 Safari/537.36"
                .to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

pub struct WebSearchSignal {
    client: reqwest::Client,
    config: WebSearchConfig,
}

impl WebSearchSignal {
    pub fn new(config: WebSearchConfig) -> Result<Self, SignalError> {
        Url::parse(&config.base_url)?;
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn search_url(&self, query: &str) -> Result<Url, SignalError> {
        Ok(Url::parse_with_params(
            &self.config.base_url,
            &[(self.config.query_param.as_str(), query)],
        )?)
    }

    async fn fetch(&self, query: &str) -> Result<String, SignalError> {
        let url = self.search_url(query)?;
        debug!(%url, "Searching");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SignalError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

impl RankingSignal for WebSearchSignal {
    fn score_occurrences<'a>(&'a self, query: &'a str, candidates: &'a [String]) -> SignalFut<'a> {
        Box::pin(async move {
            let body = self.fetch(query).await?;
            let text = page_text(&body);
            let scores: Vec<u32> = candidates
                .iter()
                .map(|c| count_occurrences(&text, c))
                .collect();
            debug!(query, ?scores, "Scored candidates");
            Ok(scores)
        })
    }
}

/// Visible text of an HTML page, without scripts and styles.
#[must_use]
pub fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();
    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            matches!(a.value(), Node::Element(e) if matches!(e.name(), "script" | "style"))
        });
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    out
}

/// Non-overlapping occurrences of `candidate` in `haystack`; blank candidates score 0.
#[must_use]
pub fn count_occurrences(haystack: &str, candidate: &str) -> u32 {
    let needle = candidate.trim();
    if needle.is_empty() {
        return 0;
    }
    u32::try_from(haystack.matches(needle).count()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_trimmed_candidates() {
        assert_eq!(count_occurrences("长江 长江 黄河", " 长江 "), 2);
        assert_eq!(count_occurrences("长江", "珠江"), 0);
        assert_eq!(count_occurrences("anything", "   "), 0);
    }

    #[test]
    fn page_text_skips_scripts() {
        let html = r"<html><head><style>.长江{}</style></head>
            <body><p>长江是最长的河流</p><script>var a = '长江';</script></body></html>";
        let text = page_text(html);
        assert_eq!(count_occurrences(&text, "长江"), 1);
    }

    #[test]
    fn query_is_url_encoded() {
        let signal = WebSearchSignal::new(WebSearchConfig::default()).expect("signal");
        let url = signal.search_url("a b&c").expect("url");
        assert_eq!(url.query(), Some("wd=a+b%26c"));
    }

    #[test]
    fn rejects_bad_base_url() {
        let config = WebSearchConfig {
            base_url: "not a url".to_string(),
            ..WebSearchConfig::default()
        };
        assert!(matches!(
            WebSearchSignal::new(config),
            Err(SignalError::Url(_))
        ));
    }
}
