//! Minimal add/remove deltas between displayed and freshly computed results.

use indexmap::IndexMap;

use crate::entry::{AnalysisEntry, ResultSet};
use crate::file::{FileId, PluginId};

/// Structural identity of a displayed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryKey<'a> {
    pub plugin: &'a PluginId,
    pub file: FileId,
    pub line: u32,
    pub message: &'a str,
}

/// Anything shown to the user that originated from an [`AnalysisEntry`].
pub trait DisplayedRecord {
    fn key(&self) -> EntryKey<'_>;
}

impl DisplayedRecord for AnalysisEntry {
    fn key(&self) -> EntryKey<'_> {
        EntryKey {
            plugin: &self.plugin,
            file: self.file,
            line: self.line,
            message: &self.message,
        }
    }
}

/// Edits turning the displayed records into the new results.
#[derive(Debug)]
pub struct Reconciliation<'a, R> {
    pub to_remove: Vec<&'a R>,
    pub to_add: Vec<AnalysisEntry>,
}

impl<R> Reconciliation<'_, R> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

/// Diff `previous` against `results`, file by file.
///
/// Only files present in `results` are touched. Matched records stay in place;
/// every new entry matches at most one previous record.
pub fn reconcile<'a, R: DisplayedRecord>(
    previous: &'a IndexMap<FileId, Vec<R>>,
    results: &ResultSet,
) -> Reconciliation<'a, R> {
    let mut to_remove = Vec::new();
    let mut to_add = Vec::new();
    for (file, entries) in results {
        let shown = previous.get(file).map_or(&[][..], Vec::as_slice);
        if entries.is_empty() {
            to_remove.extend(shown);
            continue;
        }
        let mut matched = vec![false; entries.len()];
        for record in shown {
            let key = record.key();
            let found = entries
                .iter()
                .enumerate()
                .find(|(index, entry)| !matched[*index] && entry.key() == key);
            match found {
                Some((index, _)) => matched[index] = true,
                None => to_remove.push(record),
            }
        }
        to_add.extend(
            entries
                .iter()
                .zip(&matched)
                .filter(|(_, matched)| !**matched)
                .map(|(entry, _)| entry.clone()),
        );
    }
    Reconciliation { to_remove, to_add }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Severity;

    fn entry(file: u32, line: u32, message: &str) -> AnalysisEntry {
        AnalysisEntry::new(PluginId::new("lua"), FileId(file), Severity::Error, line, message)
    }

    fn previous(entries: Vec<AnalysisEntry>) -> IndexMap<FileId, Vec<AnalysisEntry>> {
        let mut map: IndexMap<FileId, Vec<AnalysisEntry>> = IndexMap::new();
        for entry in entries {
            map.entry(entry.file).or_default().push(entry);
        }
        map
    }

    #[test]
    fn keeps_matches_and_diffs_the_rest() {
        let shown = previous(vec![entry(1, 3, "a"), entry(1, 7, "b"), entry(1, 9, "c")]);
        let mut results = ResultSet::new();
        results.insert(FileId(1), vec![entry(1, 7, "b"), entry(1, 12, "d")]);

        let delta = reconcile(&shown, &results);
        let removed: Vec<u32> = delta.to_remove.iter().map(|r| r.line).collect();
        let added: Vec<u32> = delta.to_add.iter().map(|r| r.line).collect();
        assert_eq!(removed, [3, 9]);
        assert_eq!(added, [12]);
        assert!(!delta
            .to_remove
            .iter()
            .any(|record| std::ptr::eq(*record, &shown[&FileId(1)][1])));
    }

    #[test]
    fn empty_new_list_removes_everything_for_that_file() {
        let shown = previous(vec![entry(1, 3, "a"), entry(2, 4, "b")]);
        let mut results = ResultSet::new();
        results.insert(FileId(1), Vec::new());

        let delta = reconcile(&shown, &results);
        assert_eq!(delta.to_remove.len(), 1);
        assert_eq!(delta.to_remove[0].file, FileId(1));
        assert!(delta.to_add.is_empty());
    }

    #[test]
    fn files_outside_the_pass_are_untouched() {
        let shown = previous(vec![entry(5, 1, "stale")]);
        let mut results = ResultSet::new();
        results.insert(FileId(6), vec![entry(6, 2, "fresh")]);

        let delta = reconcile(&shown, &results);
        assert!(delta.to_remove.is_empty());
        assert_eq!(delta.to_add.len(), 1);
    }

    #[test]
    fn duplicates_match_one_to_one() {
        let shown = previous(vec![entry(1, 2, "dup")]);
        let mut results = ResultSet::new();
        results.insert(FileId(1), vec![entry(1, 2, "dup"), entry(1, 2, "dup")]);

        let delta = reconcile(&shown, &results);
        assert!(delta.to_remove.is_empty());
        assert_eq!(delta.to_add.len(), 1);
    }

    #[test]
    fn severity_is_not_part_of_the_key() {
        let shown = previous(vec![entry(1, 2, "msg")]);
        let mut warning = entry(1, 2, "msg");
        warning.severity = Severity::Warning;
        let mut results = ResultSet::new();
        results.insert(FileId(1), vec![warning]);
        assert!(reconcile(&shown, &results).is_empty());
    }
}
