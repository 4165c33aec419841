// ABOUTME: Key-based diff between source records and remote sheet rows
// ABOUTME: Picks the dedup column and plans appends, skips and deletions

use std::collections::{HashMap, HashSet};

use crate::source::{CellValue, Record, TableSchema};

/// Columns tried, in order, when no dedup column is configured.
pub const BUSINESS_KEY_CANDIDATES: &[&str] = &["booking_id", "booking_reference", "reference"];

/// Fallback surrogate key column.
pub const SURROGATE_KEY: &str = "id";

/// Column whose value identifies a row on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupColumn {
    pub name: String,
    pub index: usize,
}

/// Choose the dedup column for `schema`, or `None` for append-only mode.
pub fn resolve_dedup_column(schema: &TableSchema, configured: Option<&str>) -> Option<DedupColumn> {
    let lookup = |name: &str| {
        schema.position(name).map(|index| DedupColumn {
            name: name.to_string(),
            index,
        })
    };

    if let Some(name) = configured.map(str::trim).filter(|n| !n.is_empty()) {
        match lookup(name) {
            Some(column) => return Some(column),
            None => tracing::warn!(
                "Configured dedup column '{}' is not in the source schema, falling back to defaults",
                name
            ),
        }
    }

    BUSINESS_KEY_CANDIDATES
        .iter()
        .chain(std::iter::once(&SURROGATE_KEY))
        .find_map(|name| lookup(*name))
}

/// Work decided for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    /// Rows to append, in source order
    pub to_append: Vec<Vec<CellValue>>,
    /// 1-based remote row numbers to delete, in any order
    pub to_delete: Vec<u32>,
    /// Source records not appended because their key is already present
    pub skipped: usize,
}

impl SyncPlan {
    /// Plan without dedup: every record is appended, nothing is deleted.
    pub fn append_only(records: Vec<Record>) -> Self {
        Self {
            to_append: records.into_iter().map(Record::into_values).collect(),
            to_delete: Vec::new(),
            skipped: 0,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.to_append.is_empty() && self.to_delete.is_empty()
    }
}

/// Diff source `records` against the keys already in the sheet.
///
/// `existing` holds `(row_number, key_text)` pairs for non-blank remote keys.
/// The first remote row for a key is kept and later repeats are deleted.
/// Source records with a blank key are always appended; a key repeated in the
/// source is appended once and counted as skipped afterwards.
pub fn diff_records(records: Vec<Record>, key_index: usize, existing: &[(u32, String)]) -> SyncPlan {
    let mut remote: HashMap<&str, u32> = HashMap::with_capacity(existing.len());
    let mut plan = SyncPlan::default();

    for (row, key) in existing {
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        if remote.contains_key(key) {
            plan.to_delete.push(*row);
        } else {
            remote.insert(key, *row);
        }
    }

    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    for record in records {
        match record.key(key_index) {
            None => plan.to_append.push(record.into_values()),
            Some(key) => {
                if !seen.insert(key.clone()) || remote.contains_key(key.as_str()) {
                    plan.skipped += 1;
                } else {
                    plan.to_append.push(record.into_values());
                }
            }
        }
    }

    plan.to_delete.extend(
        remote
            .iter()
            .filter(|(key, _)| !seen.contains(**key))
            .map(|(_, row)| *row),
    );
    plan.to_delete.sort_unstable();

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ColumnInfo;

    fn schema(cols: &[&str]) -> TableSchema {
        TableSchema::new(cols.iter().map(|c| ColumnInfo::new(*c, "text")).collect())
    }

    fn rec(key: &str, amount: i64) -> Record {
        let key = if key.is_empty() {
            CellValue::Null
        } else {
            CellValue::Text(key.to_string())
        };
        Record::new(vec![key, CellValue::Integer(amount)])
    }

    fn existing(keys: &[&str]) -> Vec<(u32, String)> {
        keys.iter()
            .enumerate()
            .map(|(i, k)| (i as u32 + 2, k.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_prefers_configured_column() {
        let schema = schema(&["id", "booking_id", "note"]);
        let column = resolve_dedup_column(&schema, Some("note")).unwrap();
        assert_eq!(column, DedupColumn { name: "note".into(), index: 2 });
    }

    #[test]
    fn test_resolve_falls_back_when_configured_missing() {
        let schema = schema(&["id", "booking_reference"]);
        let column = resolve_dedup_column(&schema, Some("nope")).unwrap();
        assert_eq!(column.name, "booking_reference");
    }

    #[test]
    fn test_resolve_business_key_before_surrogate() {
        let schema = schema(&["id", "reference", "booking_id"]);
        assert_eq!(resolve_dedup_column(&schema, None).unwrap().name, "booking_id");

        let schema = self::schema(&["id", "amount"]);
        assert_eq!(resolve_dedup_column(&schema, None).unwrap().name, "id");
    }

    #[test]
    fn test_resolve_none_without_key_columns() {
        assert_eq!(resolve_dedup_column(&schema(&["name", "amount"]), None), None);
        assert_eq!(resolve_dedup_column(&schema(&["name"]), Some("  ")), None);
    }

    #[test]
    fn test_first_sync_appends_everything() {
        let plan = diff_records(vec![rec("B1", 100), rec("B2", 200)], 0, &[]);
        assert_eq!(plan.to_append.len(), 2);
        assert!(plan.to_delete.is_empty());
        assert_eq!(plan.skipped, 0);
    }

    #[test]
    fn test_deleted_source_row_is_pruned() {
        let plan = diff_records(vec![rec("B2", 200)], 0, &existing(&["B1", "B2"]));
        assert!(plan.to_append.is_empty());
        assert_eq!(plan.skipped, 1);
        assert_eq!(plan.to_delete, vec![2]);
    }

    #[test]
    fn test_blank_keys_append_and_never_delete() {
        let plan = diff_records(
            vec![rec("", 1), rec("  ", 2), rec("B1", 3)],
            0,
            &[(2, "B1".to_string()), (3, "   ".to_string())],
        );
        assert_eq!(plan.to_append.len(), 2);
        assert_eq!(plan.skipped, 1);
        assert!(plan.to_delete.is_empty());
    }

    #[test]
    fn test_duplicate_remote_keys_keep_first() {
        let plan = diff_records(vec![rec("B1", 1)], 0, &existing(&["B1", "B2", "B1"]));
        assert_eq!(plan.to_delete, vec![3, 4]);
        assert_eq!(plan.skipped, 1);
    }

    #[test]
    fn test_duplicate_source_keys_append_once() {
        let plan = diff_records(vec![rec("B1", 1), rec("B1", 2)], 0, &[]);
        assert_eq!(plan.to_append.len(), 1);
        assert_eq!(plan.to_append[0][1], CellValue::Integer(1));
        assert_eq!(plan.skipped, 1);
    }

    #[test]
    fn test_numeric_keys_match_remote_text() {
        let records = vec![Record::new(vec![CellValue::Float(100.0)])];
        let plan = diff_records(records, 0, &[(2, "100".to_string())]);
        assert!(plan.is_noop());
        assert_eq!(plan.skipped, 1);
    }

    #[test]
    fn test_append_only_plan() {
        let plan = SyncPlan::append_only(vec![rec("B1", 1), rec("B1", 1)]);
        assert_eq!(plan.to_append.len(), 2);
        assert!(plan.to_delete.is_empty());
    }
}
