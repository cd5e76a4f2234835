//! Image documents and category filtering.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::id::{DocumentId, FileId};

/// Label of the pseudo-category that selects every image.
pub const ALL_CATEGORIES: &str = "All";

/// Metadata document describing one uploaded image.
///
/// Written once by the upload flow; never updated or deleted afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDocument {
    pub id: DocumentId,
    /// Reference into blob storage.
    pub file_id: FileId,
    pub title: String,
    /// Free-text category.
    pub category: String,
    /// ISO-8601 timestamp recorded at upload time.
    pub date: String,
}

impl ImageDocument {
    /// Calendar date of the upload, if `date` is a valid RFC 3339 timestamp.
    #[must_use]
    pub fn uploaded_on(&self) -> Option<NaiveDate> {
        DateTime::parse_from_rfc3339(&self.date)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).date_naive())
    }
}

/// Category selection for the gallery grid.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    /// Parse a category selection; `None`, empty and `"All"` select everything.
    #[must_use]
    pub fn parse(selection: Option<&str>) -> Self {
        match selection.map(str::trim) {
            None | Some("" | ALL_CATEGORIES) => Self::All,
            Some(category) => Self::Only(category.to_owned()),
        }
    }

    /// Returns true if an image in `category` passes this filter.
    ///
    /// Stored categories compare trimmed, the same way selections are parsed.
    #[must_use]
    pub fn matches(&self, category: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(selected) => selected == category.trim(),
        }
    }

    /// Label shown on the filter button.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::All => ALL_CATEGORIES,
            Self::Only(category) => category,
        }
    }

    /// Keep only the items whose category passes this filter, preserving order.
    pub fn apply<'a, T, F>(&self, items: &'a [T], category_of: F) -> Vec<&'a T>
    where
        F: Fn(&T) -> &str,
    {
        items
            .iter()
            .filter(|item| self.matches(category_of(item)))
            .collect()
    }

    /// Build the filter choices: `"All"` followed by every distinct trimmed
    /// category in first-seen order. Blank categories get no choice.
    #[must_use]
    pub fn choices<'a>(categories: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut choices = vec![ALL_CATEGORIES.to_owned()];
        for category in categories.into_iter().map(str::trim) {
            if !category.is_empty() && !choices.iter().any(|c| c == category) {
                choices.push(category.to_owned());
            }
        }
        choices
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn doc(id: &str, category: &str) -> ImageDocument {
        ImageDocument {
            id: DocumentId::new(id),
            file_id: FileId::new(format!("file-{id}")),
            title: format!("{id}.jpg"),
            category: category.to_owned(),
            date: "2024-05-01T10:00:00.000Z".to_owned(),
        }
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(CategoryFilter::parse(None), CategoryFilter::All);
        assert_eq!(CategoryFilter::parse(Some("")), CategoryFilter::All);
        assert_eq!(CategoryFilter::parse(Some("All")), CategoryFilter::All);
        assert_eq!(
            CategoryFilter::parse(Some("events")),
            CategoryFilter::Only("events".to_owned())
        );
    }

    #[test]
    fn test_only_filter_keeps_matching_category() {
        let docs = vec![doc("1", "gallery"), doc("2", "events"), doc("3", "gallery")];
        let filter = CategoryFilter::parse(Some("gallery"));
        let shown = filter.apply(&docs, |d| &d.category);
        assert_eq!(shown.len(), 2);
        assert!(shown.iter().all(|d| d.category == "gallery"));
    }

    #[test]
    fn test_all_filter_keeps_everything_in_order() {
        let docs = vec![doc("1", "gallery"), doc("2", "events")];
        let shown = CategoryFilter::All.apply(&docs, |d| &d.category);
        let ids: Vec<&str> = shown.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_unknown_category_shows_nothing() {
        let docs = vec![doc("1", "gallery")];
        let shown = CategoryFilter::parse(Some("missing")).apply(&docs, |d| &d.category);
        assert!(shown.is_empty());
    }

    #[test]
    fn test_choices_are_distinct_and_first_seen() {
        let choices = CategoryFilter::choices(["events", "gallery", "events", "team"]);
        assert_eq!(choices, vec!["All", "events", "gallery", "team"]);
        assert_eq!(CategoryFilter::choices([]), vec!["All"]);
    }

    #[test]
    fn test_padded_categories_share_a_choice_that_finds_them() {
        let docs = vec![doc("a", "nature "), doc("b", " nature"), doc("c", "  ")];
        let choices = CategoryFilter::choices(docs.iter().map(|d| d.category.as_str()));
        assert_eq!(choices, vec!["All", "nature"]);

        let shown = CategoryFilter::parse(choices.get(1).map(String::as_str))
            .apply(&docs, |d| &d.category);
        let ids: Vec<&str> = shown.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_uploaded_on() {
        let d = doc("1", "gallery");
        assert_eq!(
            d.uploaded_on(),
            Some(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
        );
        let mut bad = d;
        bad.date = "yesterday".to_owned();
        assert_eq!(bad.uploaded_on(), None);
    }
}
