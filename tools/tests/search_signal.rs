//! Integration tests for the web-search ranking signal.
//!
//! A local wiremock server stands in for the search engine results page.

use std::time::Duration;

use quizbot_tools::{RankingSignal, SignalError, WebSearchConfig, WebSearchSignal};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RESULTS_PAGE: &str = r"<!DOCTYPE html>
<html>
<head><title>搜索结果</title><script>var hint = '黄河 黄河 黄河';</script></head>
<body>
  <div class='result'>长江是中国最长的河流，长江全长约6300公里。</div>
  <div class='result'>黄河是中国第二长河。</div>
  <div class='result'>关于长江的更多资料。</div>
</body>
</html>";

fn config_for(server: &MockServer) -> WebSearchConfig {
    WebSearchConfig {
        base_url: format!("{}/s", server.uri()),
        query_param: "wd".to_string(),
        user_agent: "quizbot-test/1.0".to_string(),
        timeout: Duration::from_secs(5),
    }
}

fn candidates(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn scores_follow_visible_occurrences() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/s"))
        .and(query_param("wd", "中国最长的河流是？"))
        .and(header("user-agent", "quizbot-test/1.0"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(RESULTS_PAGE),
        )
        .expect(1)
        .mount(&server)
        .await;

    let signal = WebSearchSignal::new(config_for(&server)).expect("signal");
    let scores = signal
        .score_occurrences(
            "中国最长的河流是？",
            &candidates(&["长江", "黄河", "珠江", " "]),
        )
        .await
        .expect("scores");

    assert_eq!(scores, vec![3, 1, 0, 0]);
}

#[tokio::test]
async fn http_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/s"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let signal = WebSearchSignal::new(config_for(&server)).expect("signal");
    let err = signal
        .score_occurrences("问题", &candidates(&["甲", "乙"]))
        .await
        .unwrap_err();

    assert!(matches!(err, SignalError::Status { status: 503 }));
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/s"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let config = WebSearchConfig {
        timeout: Duration::from_millis(200),
        ..config_for(&server)
    };
    let signal = WebSearchSignal::new(config).expect("signal");
    let err = signal
        .score_occurrences("问题", &candidates(&["甲", "乙"]))
        .await
        .unwrap_err();

    assert!(matches!(err, SignalError::Request(_)));
}
