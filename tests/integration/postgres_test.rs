//! Pipeline tests against a real PostgreSQL server.
//!
//! Set DATABASE_URL to run them; they skip otherwise.

use std::sync::Arc;
use std::time::Duration;

use db_gateway::access::AccessPolicy;
use db_gateway::config::{ConnectionConfig, Limits};
use db_gateway::db::{PostgresClient, Value};
use db_gateway::error::GatewayError;
use db_gateway::format::format_results;
use db_gateway::gateway::Gateway;

fn get_test_gateway() -> Option<Gateway> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let config = ConnectionConfig::from_connection_string(&url).ok()?;
    let client = PostgresClient::new(&config, Duration::from_secs(10));
    Some(Gateway::new(
        Arc::new(client),
        AccessPolicy::default(),
        Limits::default(),
    ))
}

#[tokio::test]
async fn test_select_one() {
    let Some(gateway) = get_test_gateway() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = gateway.query("SELECT 1").await.unwrap();

    assert_eq!(result.column_names(), vec!["?column?"]);
    assert_eq!(result.rows, vec![vec![Value::Int(1)]]);
}

#[tokio::test]
async fn test_mixed_types_format() {
    let Some(gateway) = get_test_gateway() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = gateway
        .query("SELECT 1 AS id, 'a|b' AS name, NULL::text AS note, true AS ok")
        .await
        .unwrap();

    assert_eq!(
        format_results(&result, 200),
        "id | name | note | ok\n---------------------\n1 | a|b | NULL | true"
    );
}

#[tokio::test]
async fn test_table_lookup_binds_limit() {
    let Some(gateway) = get_test_gateway() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let lookup = gateway.table("pg_class", Some("3")).await.unwrap();

    assert_eq!(lookup.limit, 3);
    assert!(lookup.result.row_count() <= 3);
    assert!(lookup.result.column_names().contains(&"relname".to_string()));
}

#[tokio::test]
async fn test_missing_table_is_execution_failure() {
    let Some(gateway) = get_test_gateway() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let err = gateway
        .table("no_such_table_for_gateway_tests", None)
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Query(_)));
    assert!(err.to_string().contains("no_such_table_for_gateway_tests"));
}

#[tokio::test]
async fn test_empty_result_keeps_columns() {
    let Some(gateway) = get_test_gateway() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = gateway
        .query("SELECT 1 AS one WHERE false")
        .await
        .unwrap();

    assert_eq!(result.column_names(), vec!["one"]);
    assert!(result.is_empty());
    assert_eq!(format_results(&result, 200), "one\n---");
}
