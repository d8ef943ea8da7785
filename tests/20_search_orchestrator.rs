mod common;

use anyhow::Result;
use serde_json::json;

use common::{orchestrator, records, MockDiscovery, Reply, SERVICE_TOKEN};
use foxden_frontend::filter::{EntitlementContext, FilterExpression};
use foxden_frontend::services::{SearchError, SearchOutcome, SearchQuery, SortOrder};

fn scoped_query() -> SearchQuery {
    let spec = FilterExpression::from_value(&json!({"btr": {"$in": ["B1"]}})).unwrap();
    SearchQuery::from_spec(spec)
}

#[tokio::test]
async fn found_results_carry_total_and_page() -> Result<()> {
    let mock = MockDiscovery::start(Reply::Records(records(25, &["B1"]))).await?;
    let query = scoped_query().page(20, 10).sorted(vec!["run".to_string()], SortOrder::Ascending);

    let outcome = orchestrator(&mock.url).execute(&query, &EntitlementContext::new(["B1"], false)).await?;

    match outcome {
        SearchOutcome::Found(result) => {
            assert_eq!(result.total_count, 25);
            assert_eq!(result.records.len(), 5);
            assert_eq!(result.records[0]["run"], json!(20));
            assert_eq!(result.http_status, 200);
        }
        SearchOutcome::NoResults => panic!("expected results"),
    }
    Ok(())
}

#[tokio::test]
async fn request_envelope_and_bearer_token() -> Result<()> {
    let mock = MockDiscovery::start(Reply::Records(records(3, &["B1"]))).await?;
    let query = scoped_query().page(0, 10).sorted(vec!["date".to_string()], SortOrder::Descending);

    orchestrator(&mock.url).execute(&query, &EntitlementContext::new(["B1"], false)).await?;

    let hits = mock.hits();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].endpoint, "search");
    assert_eq!(hits[0].authorization.as_deref(), Some(format!("Bearer {}", SERVICE_TOKEN).as_str()));
    assert_eq!(hits[0].body["client"], json!("frontend"));
    assert_eq!(
        hits[0].service_query(),
        &json!({
            "query": "{\"btr\":{\"$in\":[\"B1\"]}}",
            "spec": {"btr": {"$in": ["B1"]}},
            "sort_keys": ["date"],
            "sort_order": -1,
            "idx": 0,
            "limit": 10
        })
    );
    Ok(())
}

#[tokio::test]
async fn zero_matches_is_no_results_not_an_error() -> Result<()> {
    let mock = MockDiscovery::start(Reply::Records(vec![])).await?;

    let outcome = orchestrator(&mock.url)
        .execute(&scoped_query().page(0, 10), &EntitlementContext::new(["B1"], false))
        .await?;

    assert_eq!(outcome, SearchOutcome::NoResults);
    Ok(())
}

#[tokio::test]
async fn malformed_query_never_reaches_the_backend() -> Result<()> {
    let mock = MockDiscovery::start(Reply::Records(records(3, &["B1"]))).await?;

    let err = orchestrator(&mock.url)
        .execute(&SearchQuery::new("{\"btr\": \"B1\"\n"), &EntitlementContext::denied())
        .await
        .unwrap_err();

    match err {
        SearchError::MalformedQuery { query, .. } => assert_eq!(query, "{\"btr\": \"B1\""),
        other => panic!("unexpected error: {other}"),
    }
    assert!(mock.hits().is_empty());
    Ok(())
}

#[tokio::test]
async fn http_failure_is_upstream_unavailable() -> Result<()> {
    let mock = MockDiscovery::start(Reply::Status(503)).await?;

    let err = orchestrator(&mock.url)
        .execute(&scoped_query().page(0, 10), &EntitlementContext::denied())
        .await
        .unwrap_err();

    assert!(matches!(err, SearchError::UpstreamUnavailable(_)));
    Ok(())
}

#[tokio::test]
async fn envelope_failure_code_is_upstream_unavailable() -> Result<()> {
    let mock = MockDiscovery::start(Reply::EnvelopeCode(500)).await?;

    let err = orchestrator(&mock.url)
        .execute(&scoped_query().page(0, 10), &EntitlementContext::denied())
        .await
        .unwrap_err();

    match err {
        SearchError::UpstreamUnavailable(msg) => assert!(msg.contains("database unavailable")),
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn unreachable_backend_is_upstream_unavailable() -> Result<()> {
    let port = portpicker::pick_unused_port().expect("free port");
    let url = format!("http://127.0.0.1:{}", port);

    let err = orchestrator(&url).count(&scoped_query()).await.unwrap_err();

    assert!(matches!(err, SearchError::UpstreamUnavailable(_)));
    Ok(())
}

#[tokio::test]
async fn count_uses_nrecords_endpoint() -> Result<()> {
    // Half the records are outside the queried BTR
    let mock = MockDiscovery::start(Reply::Records(records(42, &["B1", "B2"]))).await?;

    let total = orchestrator(&mock.url).count(&scoped_query()).await?;

    assert_eq!(total, 21);
    let hits = mock.hits();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].endpoint, "nrecords");
    Ok(())
}
