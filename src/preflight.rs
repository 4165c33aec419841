// ABOUTME: Pre-flight checks run by the `check` command
// ABOUTME: Verifies source access, key column choice and sheet header without writing anything

use anyhow::Result;

use crate::config::SyncConfig;
use crate::sheets::RemoteSheet;
use crate::source::{SourceTable, TableSchema};
use crate::sync::header::describe_drift;
use crate::sync::{resolve_dedup_column, SyncSettings};

/// Individual check result
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: message.into(),
            details: None,
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Issue with suggested fixes
#[derive(Debug, Clone)]
pub struct PreflightIssue {
    pub title: String,
    pub explanation: String,
    pub fixes: Vec<String>,
}

/// Complete pre-flight results
#[derive(Debug, Default)]
pub struct PreflightResult {
    pub source: Vec<CheckResult>,
    pub sheet: Vec<CheckResult>,
    pub issues: Vec<PreflightIssue>,
}

impl PreflightResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all_passed(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.issues.len()
    }

    fn check_passed(&self, name: &str) -> bool {
        self.source
            .iter()
            .chain(self.sheet.iter())
            .any(|c| c.name == name && c.passed)
    }

    /// Print formatted output
    pub fn print(&self) {
        println!();
        println!("Pre-flight Checks");
        println!("{}", "═".repeat(61));
        println!();

        print_section("Source Table:", &self.source);
        print_section("Remote Sheet:", &self.sheet);

        println!("{}", "═".repeat(61));
        if self.all_passed() {
            println!("PASSED: All pre-flight checks successful");
        } else {
            println!("FAILED: {} issue(s) must be resolved", self.failed_count());
            println!();
            for (i, issue) in self.issues.iter().enumerate() {
                println!("Issue {}: {}", i + 1, issue.title);
                println!("  {}", issue.explanation);
                println!();
                println!("  Fix options:");
                for fix in &issue.fixes {
                    println!("    • {}", fix);
                }
                println!();
            }
        }
    }
}

fn print_section(title: &str, checks: &[CheckResult]) {
    if checks.is_empty() {
        return;
    }
    println!("{}", title);
    for check in checks {
        let icon = if check.passed { "✓" } else { "✗" };
        println!("  {} {}", icon, check.message);
        if let Some(ref details) = check.details {
            println!("      {}", details);
        }
    }
    println!();
}

/// Run all pre-flight checks against the configured source and sheet.
///
/// Nothing is written to either side.
pub async fn run_preflight_checks(config: &SyncConfig) -> Result<PreflightResult> {
    let mut result = PreflightResult::new();

    check_source_access(&mut result, config).await;

    let schema = if result.check_passed("select") {
        let source = config.build_source();
        check_source_table(&mut result, &source, &config.settings()).await
    } else {
        None
    };

    match config.build_sheet() {
        Ok(sheet) => {
            let columns = schema.as_ref().map(TableSchema::names);
            check_sheet(&mut result, &sheet, columns.as_deref()).await;
        }
        Err(e) => {
            result.sheet.push(CheckResult::fail("sheet", "Could not create sheet client").with_details(e.to_string()));
            result.issues.push(PreflightIssue {
                title: "Sheet client".to_string(),
                explanation: e.to_string(),
                fixes: vec!["Check GOOGLE_SERVICE_ACCOUNT_EMAIL and GOOGLE_PRIVATE_KEY".to_string()],
            });
        }
    }

    Ok(result)
}

async fn check_source_access(result: &mut PreflightResult, config: &SyncConfig) {
    let client = match crate::postgres::connect(&config.source_url).await {
        Ok(client) => {
            result
                .source
                .push(CheckResult::pass("connect", "Connected to source database"));
            client
        }
        Err(e) => {
            result.source.push(
                CheckResult::fail("connect", "Cannot connect to source database")
                    .with_details(format!("{:#}", e)),
            );
            result.issues.push(PreflightIssue {
                title: "Source Database Unreachable".to_string(),
                explanation: format!("{:#}", e),
                fixes: vec![
                    "Verify SOURCE_DATABASE_URL (host, port, database, credentials)".to_string(),
                    "Use --allow-self-signed-certs for servers with self-signed TLS".to_string(),
                ],
            });
            return;
        }
    };

    match crate::postgres::check_table_select_permission(&client, &config.schema, &config.table).await {
        Ok(perms) if perms.readable() => {
            result
                .source
                .push(CheckResult::pass("select", format!("Can read {}", perms.table)));
        }
        Ok(perms) if !perms.exists => {
            result
                .source
                .push(CheckResult::fail("select", format!("Table {} not found", perms.table)));
            result.issues.push(PreflightIssue {
                title: "Source Table Missing".to_string(),
                explanation: format!("{} does not exist in the source database", perms.table),
                fixes: vec!["Set --schema / --table (SOURCE_SCHEMA / SOURCE_TABLE)".to_string()],
            });
        }
        Ok(perms) => {
            result
                .source
                .push(CheckResult::fail("select", format!("No SELECT on {}", perms.table)));
            result.issues.push(PreflightIssue {
                title: "Insufficient Privileges".to_string(),
                explanation: format!("The connecting user cannot read {}", perms.table),
                fixes: vec![format!("Run: GRANT SELECT ON {} TO <user>;", perms.table)],
            });
        }
        Err(e) => {
            result.source.push(
                CheckResult::fail("select", "Could not check table privileges")
                    .with_details(format!("{:#}", e)),
            );
            result.issues.push(PreflightIssue {
                title: "Privilege Check Failed".to_string(),
                explanation: format!("{:#}", e),
                fixes: vec!["Check that the user may query pg_class and pg_namespace".to_string()],
            });
        }
    }
}

/// Discover the source columns and report the dedup column that will be used.
pub async fn check_source_table(
    result: &mut PreflightResult,
    source: &dyn SourceTable,
    settings: &SyncSettings,
) -> Option<TableSchema> {
    let schema = match source.discover_columns().await {
        Ok(schema) => schema,
        Err(e) => {
            result
                .source
                .push(CheckResult::fail("columns", "Could not discover columns").with_details(e.to_string()));
            result.issues.push(PreflightIssue {
                title: "Schema Discovery Failed".to_string(),
                explanation: e.to_string(),
                fixes: vec!["Check that the table has at least one column".to_string()],
            });
            return None;
        }
    };

    result.source.push(
        CheckResult::pass("columns", format!("{} columns in {}", schema.len(), source.qualified_name()))
            .with_details(schema.names().join(", ")),
    );

    if let Some(configured) = settings.dedup_column.as_deref() {
        if schema.position(configured).is_none() {
            result.source.push(CheckResult::fail(
                "dedup",
                format!("Configured dedup column '{}' not found", configured),
            ));
            result.issues.push(PreflightIssue {
                title: "Dedup Column Missing".to_string(),
                explanation: format!(
                    "'{}' is not a column of {}; sync would fall back to the default key columns",
                    configured,
                    source.qualified_name()
                ),
                fixes: vec![
                    "Fix --dedup-column (SYNC_DEDUP_COLUMN)".to_string(),
                    "Unset it to use booking_id, booking_reference, reference or id".to_string(),
                ],
            });
            return Some(schema);
        }
    }

    match resolve_dedup_column(&schema, settings.dedup_column.as_deref()) {
        Some(column) => result.source.push(CheckResult::pass(
            "dedup",
            format!("Rows are matched on '{}'", column.name),
        )),
        None => result.source.push(
            CheckResult::pass("dedup", "No key column found; sync runs append-only")
                .with_details("Rows are never pruned and every run appends the whole table"),
        ),
    }

    Some(schema)
}

/// Resolve the sheet and compare its header with `columns`, if known.
pub async fn check_sheet(result: &mut PreflightResult, sheet: &dyn RemoteSheet, columns: Option<&[String]>) {
    match sheet.resolve_sheet_id().await {
        Ok(id) => result
            .sheet
            .push(CheckResult::pass("sheet", format!("Sheet found (id {})", id))),
        Err(e) => {
            result
                .sheet
                .push(CheckResult::fail("sheet", "Sheet not accessible").with_details(e.to_string()));
            result.issues.push(PreflightIssue {
                title: "Remote Sheet Unavailable".to_string(),
                explanation: e.to_string(),
                fixes: vec![
                    "Share the spreadsheet with the service account as an editor".to_string(),
                    "Check GOOGLE_SHEET_ID and GOOGLE_SHEET_NAME".to_string(),
                ],
            });
            return;
        }
    }

    let header = match sheet.read_header().await {
        Ok(header) => header,
        Err(e) => {
            result
                .sheet
                .push(CheckResult::fail("header", "Could not read header").with_details(e.to_string()));
            result.issues.push(PreflightIssue {
                title: "Header Unreadable".to_string(),
                explanation: e.to_string(),
                fixes: vec!["Check the service account's access to the sheet".to_string()],
            });
            return;
        }
    };

    let Some(columns) = columns else {
        result.sheet.push(
            CheckResult::pass("header", format!("Header has {} columns", header.len()))
                .with_details("Source columns unknown; drift not checked"),
        );
        return;
    };

    if header.is_empty() {
        result.sheet.push(CheckResult::pass(
            "header",
            "Sheet is empty; the first sync writes the header",
        ));
        return;
    }

    match describe_drift(&header, columns) {
        None => result
            .sheet
            .push(CheckResult::pass("header", "Header matches source columns")),
        Some(drift) => {
            result.sheet.push(
                CheckResult::fail("header", "Header differs from source columns").with_details(drift.clone()),
            );
            result.issues.push(PreflightIssue {
                title: "Schema Drift".to_string(),
                explanation: format!(
                    "The next sync will clear the sheet and re-append every row ({})",
                    drift
                ),
                fixes: vec![
                    "Run sync to rewrite the sheet from the source".to_string(),
                    "Restore the previous column layout in the source table".to_string(),
                ],
            });
        }
    }
}
