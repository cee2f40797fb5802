//! Polymarket 호가 클라이언트 통합 테스트 (mockito HTTP 서버)

use std::time::Duration;

use mockito::Matcher;
use rust_decimal_macros::dec;
use sniper_core::{BookLevel, BookSource, ProviderError};
use sniper_exchange::PolymarketClient;

fn client(url: &str) -> PolymarketClient {
    PolymarketClient::new(url, Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_fetch_book_parses_levels() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/book")
        .match_query(Matcher::UrlEncoded("token_id".into(), "9004".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "market": "0xabc",
                "asset_id": "9004",
                "bids": [{"price": "0.48", "size": "120"}, {"price": "0.47", "size": "oops"}],
                "asks": [{"price": "0.52", "size": "80"}, {"price": 0.55, "size": 10}]
            }"#,
        )
        .create_async()
        .await;

    let book = client(&server.url()).fetch_book("9004").await.unwrap();

    mock.assert_async().await;
    assert_eq!(book.asset_id, "9004");
    assert_eq!(book.bids, vec![BookLevel::new(dec!(0.48), dec!(120))]);
    assert_eq!(book.asks.len(), 2);
    assert_eq!(book.best_ask().map(|l| l.price), Some(dec!(0.52)));
}

#[tokio::test]
async fn test_non_success_status_is_api_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/book")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"error": "No orderbook exists for the requested token id"}"#)
        .create_async()
        .await;

    let result = client(&server.url()).fetch_book("missing").await;

    match result {
        Err(ProviderError::Api(message)) => assert!(message.contains("404")),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_body_is_parse_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/book")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>maintenance</html>")
        .create_async()
        .await;

    let result = client(&server.url()).fetch_book("9004").await;
    assert!(matches!(result, Err(ProviderError::Parse(_))));
}

#[tokio::test]
async fn test_non_object_body_is_parse_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/book")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let result = client(&server.url()).fetch_book("9004").await;
    assert!(matches!(result, Err(ProviderError::Parse(_))));
}

#[tokio::test]
async fn test_connection_failure_is_network_error() {
    let result = client("http://127.0.0.1:1").fetch_book("9004").await;
    assert!(matches!(result, Err(ProviderError::Network(_))));
}

#[tokio::test]
async fn test_empty_book_is_not_an_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/book")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"bids": [], "asks": []}"#)
        .create_async()
        .await;

    let book = client(&server.url()).fetch_book("9004").await.unwrap();
    assert!(book.is_empty());
}
