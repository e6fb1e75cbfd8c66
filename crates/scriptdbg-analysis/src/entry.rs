//! Diagnostic entries produced by analysis functions.

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::file::{FileHandle, FileId, PluginId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// One diagnostic reported for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisEntry {
    pub plugin: PluginId,
    pub file: FileId,
    pub severity: Severity,
    /// 1-based line, `0` when the entry is not tied to a line.
    pub line: u32,
    pub message: SmolStr,
}

impl AnalysisEntry {
    pub fn new(
        plugin: PluginId,
        file: FileId,
        severity: Severity,
        line: u32,
        message: impl Into<SmolStr>,
    ) -> Self {
        Self {
            plugin,
            file,
            severity,
            line,
            message: message.into(),
        }
    }

    pub fn error(file: &FileHandle, line: u32, message: impl Into<SmolStr>) -> Self {
        Self::new(file.plugin().clone(), file.id(), Severity::Error, line, message)
    }

    pub fn warning(file: &FileHandle, line: u32, message: impl Into<SmolStr>) -> Self {
        Self::new(file.plugin().clone(), file.id(), Severity::Warning, line, message)
    }
}

/// Analysis output grouped per file, in request order.
pub type ResultSet = IndexMap<FileId, Vec<AnalysisEntry>>;

/// Group `entries` per file. Every file in `files` gets a slot even when the
/// analysis produced nothing for it, so stale results for clean files can be
/// dropped downstream.
#[must_use]
pub fn group_by_file(files: &[FileHandle], entries: Vec<AnalysisEntry>) -> ResultSet {
    let mut grouped: ResultSet = files.iter().map(|file| (file.id(), Vec::new())).collect();
    for entry in entries {
        grouped.entry(entry.file).or_default().push(entry);
    }
    grouped
}
