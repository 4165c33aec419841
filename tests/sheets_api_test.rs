// ABOUTME: Integration tests against a real Google spreadsheet
// ABOUTME: Require TEST_SHEET_ID, TEST_SHEET_NAME and service account credentials

use sheet_replicator::sheets::{RemoteSheet, ServiceAccountKey, SheetsClient};
use sheet_replicator::source::CellValue;
use std::env;

/// Helper to build a client from environment variables
///
/// The sheet named by TEST_SHEET_NAME is cleared by these tests.
fn get_test_client() -> Option<SheetsClient> {
    let sheet_id = env::var("TEST_SHEET_ID").ok()?;
    let sheet_name = env::var("TEST_SHEET_NAME").unwrap_or_else(|_| "replicator_test".to_string());
    let email = env::var("GOOGLE_SERVICE_ACCOUNT_EMAIL").ok()?;
    let private_key = env::var("GOOGLE_PRIVATE_KEY").ok()?;

    let key = ServiceAccountKey::new(email, &private_key);
    Some(
        SheetsClient::new(sheet_id, sheet_name, key)
            .expect("Failed to build Sheets client")
            .with_append_batch_size(2),
    )
}

fn row(key: &str, amount: i64) -> Vec<CellValue> {
    vec![CellValue::Text(key.to_string()), CellValue::Integer(amount)]
}

#[tokio::test]
#[ignore]
async fn test_header_roundtrip_and_clear() {
    let client = get_test_client()
        .expect("TEST_SHEET_ID, GOOGLE_SERVICE_ACCOUNT_EMAIL and GOOGLE_PRIVATE_KEY must be set");

    client.clear_all().await.expect("Failed to clear sheet");
    assert!(client.read_header().await.unwrap().is_empty());

    let header = vec!["booking_id".to_string(), "amount".to_string()];
    client.write_header(&header).await.expect("Failed to write header");
    assert_eq!(client.read_header().await.unwrap(), header);

    println!("✓ Header written and read back from '{}'", client.sheet_name());
}

#[tokio::test]
#[ignore]
async fn test_append_read_and_delete_rows() {
    let client = get_test_client()
        .expect("TEST_SHEET_ID, GOOGLE_SERVICE_ACCOUNT_EMAIL and GOOGLE_PRIVATE_KEY must be set");

    client.clear_all().await.unwrap();
    client
        .write_header(&["booking_id".to_string(), "amount".to_string()])
        .await
        .unwrap();

    // Batch size 2 forces three append requests
    let appended = client
        .append_rows(&[row("A", 1), row("B", 2), row("C", 3), row("D", 4), row("E", 5)])
        .await
        .expect("Failed to append rows");
    assert_eq!(appended, 5);

    let keys = client.read_column(0).await.unwrap();
    let names: Vec<&str> = keys.iter().map(|(_, k)| k.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C", "D", "E"]);
    assert_eq!(keys[0].0, 2);

    let amounts = client.read_column(1).await.unwrap();
    assert_eq!(amounts[4], (6, "5".to_string()));

    // Rows 3, 4 and 6 hold B, C and E
    let deleted = client.delete_rows(&[6, 3, 4]).await.expect("Failed to delete rows");
    assert_eq!(deleted, 3);

    let keys = client.read_column(0).await.unwrap();
    let names: Vec<&str> = keys.iter().map(|(_, k)| k.as_str()).collect();
    assert_eq!(names, vec!["A", "D"]);

    println!("✓ Appended, read and pruned rows in '{}'", client.sheet_name());
}

#[tokio::test]
#[ignore]
async fn test_resolve_sheet_id_is_cached() {
    let client = get_test_client()
        .expect("TEST_SHEET_ID, GOOGLE_SERVICE_ACCOUNT_EMAIL and GOOGLE_PRIVATE_KEY must be set");

    let first = client.resolve_sheet_id().await.expect("Failed to resolve sheet id");
    let second = client.resolve_sheet_id().await.unwrap();
    assert_eq!(first, second);
}
