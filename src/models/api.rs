use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::models::catalog::CatalogEntry;

/// Operations the catalog endpoint accepts through the `action` query
/// parameter, parsed and validated before any dispatch happens.
#[derive(Debug, Clone, Copy, EnumString, Display, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum CatalogAction {
    List,
    Fetch,
    Delete,
}

/// Query parameters shared by the catalog operations.
#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    pub action: String,
    pub key: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// Object-store notification body posted by the upload trigger.
#[derive(Debug, Deserialize, Validate)]
pub struct IngestNotification {
    #[garde(length(min = 1, max = 1024))]
    pub object_key: String,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub object_key: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub entries: Vec<CatalogEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FetchResponse {
    pub entry: Option<CatalogEntry>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub image_key: String,
    pub deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parses_known_actions() {
        assert_eq!(CatalogAction::from_str("list").unwrap(), CatalogAction::List);
        assert_eq!(CatalogAction::from_str("fetch").unwrap(), CatalogAction::Fetch);
        assert_eq!(
            CatalogAction::from_str("delete").unwrap(),
            CatalogAction::Delete
        );
    }

    #[test]
    fn rejects_unknown_actions() {
        assert!(CatalogAction::from_str("purge").is_err());
        assert!(CatalogAction::from_str("").is_err());
        // Matching is exact; the HTTP layer does not case-fold.
        assert!(CatalogAction::from_str("List").is_err());
    }
}
