use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle state of a catalog entry. Transitions are one-way:
/// `Pending -> Labeled` or `Pending -> Failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    Pending,
    Labeled,
    Failed,
}

/// A single label produced by the labeling function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Label {
    pub name: String,
    pub confidence: f64,
}

/// One row of the image catalog, keyed by the source object key.
///
/// `labels` is `None` until the worker has processed the image. `Some` with
/// an empty vector is the explicit "no labels found" marker, so a `Labeled`
/// entry always carries `Some(_)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub image_key: String,
    pub state: EntryState,
    pub labels: Option<Vec<Label>>,
    pub thumbnail_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn state_round_trips_through_strings() {
        for state in [EntryState::Pending, EntryState::Labeled, EntryState::Failed] {
            let parsed = EntryState::from_str(&state.to_string()).unwrap();
            assert_eq!(parsed, state);
        }
    }

    #[test]
    fn state_strings_are_lowercase() {
        assert_eq!(EntryState::Labeled.to_string(), "labeled");
        assert!(EntryState::from_str("Shiny").is_err());
    }
}
