use chrono::{DateTime, Local, NaiveDateTime};

use crate::error::ApiError;
use crate::state::HistoryRecord;

/// Past conversations, fetched once when the view opens
#[derive(Debug, Clone)]
pub struct HistoryView {
    pub loading: bool,
    pub records: Vec<HistoryRecord>,
    pub error: Option<String>,
    /// Cursor position in `records`
    pub selected: usize,
    expanded: Option<usize>,
}

impl Default for HistoryView {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryView {
    pub fn new() -> Self {
        Self {
            loading: true,
            records: Vec::new(),
            error: None,
            selected: 0,
            expanded: None,
        }
    }

    pub fn apply(&mut self, result: Result<Vec<HistoryRecord>, ApiError>) {
        self.loading = false;
        match result {
            Ok(records) => {
                self.records = records;
                self.error = None;
            }
            Err(e) => {
                tracing::warn!("Failed to fetch history: {}", e);
                self.error = Some(e.user_message());
            }
        }
        self.selected = self.selected.min(self.records.len().saturating_sub(1));
        if self.expanded.is_some_and(|i| i >= self.records.len()) {
            self.expanded = None;
        }
    }

    pub fn expanded(&self) -> Option<usize> {
        self.expanded
    }

    pub fn is_expanded(&self, index: usize) -> bool {
        self.expanded == Some(index)
    }

    /// Single-expansion accordion: opening one entry closes the other
    pub fn toggle(&mut self, index: usize) {
        if index >= self.records.len() {
            return;
        }
        self.expanded = if self.expanded == Some(index) {
            None
        } else {
            Some(index)
        };
    }

    pub fn toggle_selected(&mut self) {
        self.toggle(self.selected);
    }

    pub fn select_next(&mut self) {
        let len = self.records.len();
        if len > 0 {
            self.selected = (self.selected + 1).min(len - 1);
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// The record to load back into the workspace
    pub fn continue_record(&self, index: usize) -> Option<&HistoryRecord> {
        self.records.get(index)
    }

    pub fn selected_record(&self) -> Option<&HistoryRecord> {
        self.continue_record(self.selected)
    }
}

/// Render a record timestamp in local time, or the raw text if it won't parse
pub fn format_timestamp(raw: &str) -> String {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string();
    }
    // Python's isoformat() without an offset
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return naive.format("%Y-%m-%d %H:%M").to_string();
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user: &str) -> HistoryRecord {
        HistoryRecord {
            id: None,
            user: user.to_string(),
            ai: format!("re: {}", user),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn loaded(n: usize) -> HistoryView {
        let mut view = HistoryView::new();
        view.apply(Ok((0..n).map(|i| record(&i.to_string())).collect()));
        view
    }

    #[test]
    fn starts_loading_and_stops_on_result() {
        let mut view = HistoryView::new();
        assert!(view.loading);
        view.apply(Ok(Vec::new()));
        assert!(!view.loading);
        assert!(view.error.is_none());
    }

    #[test]
    fn failure_is_visible() {
        let mut view = HistoryView::new();
        view.apply(Err(ApiError::Decode("x".to_string())));
        assert!(!view.loading);
        assert!(view.error.is_some());
        assert!(view.records.is_empty());
    }

    #[test]
    fn accordion_keeps_at_most_one_open() {
        let mut view = loaded(3);
        view.toggle(0);
        assert!(view.is_expanded(0));
        view.toggle(2);
        assert!(!view.is_expanded(0));
        assert!(view.is_expanded(2));
        view.toggle(2);
        assert_eq!(view.expanded(), None);
        view.toggle(9);
        assert_eq!(view.expanded(), None);
    }

    #[test]
    fn selection_is_clamped() {
        let mut view = loaded(2);
        view.select_next();
        view.select_next();
        assert_eq!(view.selected, 1);
        view.select_prev();
        view.select_prev();
        assert_eq!(view.selected, 0);
        assert_eq!(view.selected_record().map(|r| r.user.as_str()), Some("0"));
    }

    #[test]
    fn timestamps() {
        assert_eq!(format_timestamp("2024-03-05T10:20:30.123456"), "2024-03-05 10:20");
        assert_eq!(format_timestamp("yesterday"), "yesterday");
        assert!(format_timestamp("2024-01-01T00:00:00Z").starts_with("20"));
    }
}
