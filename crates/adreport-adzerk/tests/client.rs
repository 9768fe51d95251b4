//! Integration tests for `AdzerkReportClient` using wiremock HTTP mocks.

use adreport_adzerk::{
    AdzerkError, AdzerkReportClient, ReportGroup, ReportHandle, ReportParameter, ReportRequest,
    ReportSource, ReportStatus,
};
use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> AdzerkReportClient {
    AdzerkReportClient::with_base_url("test-key", 30, base_url)
        .expect("client construction should not fail")
}

fn daily_request() -> ReportRequest {
    ReportRequest {
        start: Utc.with_ymd_and_hms(2020, 1, 5, 0, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2020, 1, 7, 0, 0, 0).unwrap(),
        groups: vec![ReportGroup::OptionId, ReportGroup::Day],
        parameters: vec![ReportParameter::CampaignId(1234)],
    }
}

#[tokio::test]
async fn queue_report_posts_criteria_and_returns_handle() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/report/queue"))
        .and(header("X-Adzerk-ApiKey", "test-key"))
        .and(body_string_contains("criteria="))
        .and(body_string_contains("campaignId"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"Id": "abc-123"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let handle = client
        .queue_report(&daily_request())
        .await
        .expect("should queue report");

    assert_eq!(handle, ReportHandle("abc-123".to_string()));
}

#[tokio::test]
async fn queue_report_surfaces_api_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/report/queue"))
        .respond_with(ResponseTemplate::new(403).set_body_string("bad key"))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.queue_report(&daily_request()).await.unwrap_err();

    assert!(
        matches!(err, AdzerkError::Api { status: 403, ref body } if body == "bad key"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn fetch_report_pending() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/report/queue/abc-123"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"Id": "abc-123", "Status": 1})),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let status = client
        .fetch_report(&ReportHandle("abc-123".into()))
        .await
        .expect("should parse poll");

    assert_eq!(status, ReportStatus::Pending);
}

#[tokio::test]
async fn fetch_report_ready_parses_records() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "Id": "abc-123",
        "Status": 2,
        "Result": {
            "Records": [{
                "Date": "2020-01-06T00:00:00",
                "TotalImpressions": 150,
                "Details": [
                    {
                        "Grouping": {"OptionId": 77, "CampaignId": 1234},
                        "Title": "t8_1",
                        "Impressions": 100,
                        "UniqueBucketClicks": 4,
                        "TrueRevenue": 1.25
                    },
                    {
                        "Grouping": {"OptionId": 78},
                        "Title": "t8_2",
                        "Impressions": 50
                    }
                ]
            }]
        }
    });

    Mock::given(method("GET"))
        .and(path("/v1/report/queue/abc-123"))
        .and(header("X-Adzerk-ApiKey", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let status = client
        .fetch_report(&ReportHandle("abc-123".into()))
        .await
        .expect("should parse report");

    let ReportStatus::Ready(result) = status else {
        panic!("expected ready report, got {status:?}");
    };
    assert_eq!(result.records.len(), 1);
    let record = &result.records[0];
    assert_eq!(record.day(), NaiveDate::from_ymd_opt(2020, 1, 6));
    assert_eq!(record.total_impressions, 150);
    assert_eq!(record.details.len(), 2);
    assert_eq!(record.details[0].grouping.option_id, Some(77));
    assert_eq!(record.details[0].title, "t8_1");
    assert_eq!(record.details[0].unique_bucket_clicks, 4);
    assert_eq!(record.details[0].true_revenue, "1.25".parse::<Decimal>().unwrap());
    assert_eq!(record.details[1].unique_bucket_clicks, 0);
}

#[tokio::test]
async fn fetch_report_failed_carries_message() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/report/queue/abc-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Id": "abc-123",
            "Status": 3,
            "Message": "report too large"
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let status = client
        .fetch_report(&ReportHandle("abc-123".into()))
        .await
        .unwrap();

    assert_eq!(status, ReportStatus::Failed("report too large".to_string()));
}

#[tokio::test]
async fn fetch_report_rejects_unknown_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/report/queue/abc-123"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"Status": 9})),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .fetch_report(&ReportHandle("abc-123".into()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AdzerkError::UnexpectedReportStatus { status: 9, .. }
    ));
}

#[tokio::test]
async fn fetch_report_malformed_body_is_deserialize_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/report/queue/abc-123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .fetch_report(&ReportHandle("abc-123".into()))
        .await
        .unwrap_err();

    assert!(matches!(err, AdzerkError::Deserialize { .. }), "got {err:?}");
}
