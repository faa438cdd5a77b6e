use std::cmp::Ordering;

use crate::models::Record;

/// Case-insensitive comparison, falling back to a case-sensitive one for ties
pub fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Sort a snapshot by its natural key
pub fn sort_records<R: Record>(records: &mut [R]) {
    records.sort_by(|a, b| cmp_ignore_case(a.sort_key(), b.sort_key()));
}

/// Insert or replace `record` (matched by id), keeping the snapshot ordered
pub fn upsert_record<R: Record>(records: &mut Vec<R>, record: R) {
    records.retain(|r| r.id() != record.id());
    let pos = records
        .binary_search_by(|r| cmp_ignore_case(r.sort_key(), record.sort_key()))
        .unwrap_or_else(|p| p);
    records.insert(pos, record);
}

/// Remove the record with `id`; returns whether anything was removed
pub fn remove_record<R: Record>(records: &mut Vec<R>, id: &str) -> bool {
    let before = records.len();
    records.retain(|r| r.id() != id);
    records.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row(&'static str, &'static str);

    impl Record for Row {
        fn id(&self) -> &str {
            self.0
        }
        fn sort_key(&self) -> &str {
            self.1
        }
    }

    #[test]
    fn test_cmp_ignore_case() {
        assert_eq!(cmp_ignore_case("alex", "Brook"), Ordering::Less);
        assert_eq!(cmp_ignore_case("Alex", "alex"), Ordering::Less);
        assert_eq!(cmp_ignore_case("same", "same"), Ordering::Equal);
    }

    #[test]
    fn test_upsert_inserts_in_order() {
        let mut rows = vec![Row("1", "Alex"), Row("2", "Emma")];
        upsert_record(&mut rows, Row("3", "chen"));
        assert_eq!(rows, vec![Row("1", "Alex"), Row("3", "chen"), Row("2", "Emma")]);
    }

    #[test]
    fn test_upsert_replaces_and_reorders() {
        let mut rows = vec![Row("1", "Alex"), Row("2", "Emma")];
        upsert_record(&mut rows, Row("1", "Zoe"));
        assert_eq!(rows, vec![Row("2", "Emma"), Row("1", "Zoe")]);
    }

    #[test]
    fn test_remove_record() {
        let mut rows = vec![Row("1", "Alex"), Row("2", "Emma")];
        assert!(remove_record(&mut rows, "1"));
        assert!(!remove_record(&mut rows, "1"));
        assert_eq!(rows, vec![Row("2", "Emma")]);
    }

    #[test]
    fn test_sort_records() {
        let mut rows = vec![Row("1", "emma"), Row("2", "Alex")];
        sort_records(&mut rows);
        assert_eq!(rows[0].1, "Alex");
    }
}
