use super::*;

fn test_client(base_url: &str) -> AdzerkReportClient {
    AdzerkReportClient::with_base_url("test-key", 30, base_url)
        .expect("client construction should not fail")
}

#[test]
fn endpoint_joins_onto_base_path() {
    let client = test_client("https://api.adzerk.net");
    let url = client.endpoint("v1/report/queue").unwrap();
    assert_eq!(url.as_str(), "https://api.adzerk.net/v1/report/queue");
}

#[test]
fn endpoint_keeps_base_path_prefix() {
    let client = test_client("http://localhost:8080/adzerk/");
    let url = client.endpoint("v1/report/queue/abc").unwrap();
    assert_eq!(url.as_str(), "http://localhost:8080/adzerk/v1/report/queue/abc");
}

#[test]
fn invalid_base_url_is_rejected() {
    let result = AdzerkReportClient::with_base_url("k", 30, "not a url");
    assert!(matches!(result, Err(AdzerkError::InvalidBaseUrl { .. })));
}
