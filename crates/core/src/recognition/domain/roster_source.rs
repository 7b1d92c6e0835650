use serde::Deserialize;

use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

/// A registered family member as listed by the backend.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyRecord {
    #[serde(default = "unknown_name")]
    pub name: String,
    pub image_url: String,
}

/// A reference image registered under a visitor category.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRecord {
    #[serde(default = "unknown_name")]
    pub name: String,
    pub image_url: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn unknown_name() -> String {
    "Unknown".to_string()
}

/// Directory of a user's known people and their reference images.
pub trait RosterSource: Send + Sync {
    fn family(&self, user_id: &str) -> Result<Vec<FamilyRecord>, BoxError>;

    fn categories(&self, user_id: &str) -> Result<Vec<CategoryRecord>, BoxError>;

    /// Fetches and decodes a reference image.
    fn reference_image(&self, image_url: &str) -> Result<Frame, BoxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_record_from_backend_json() {
        let json = r#"[{"_id":"1","name":"Alice","imageUrl":"https://img/a.jpg","userId":"u"}]"#;
        let records: Vec<FamilyRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records[0].name, "Alice");
        assert_eq!(records[0].image_url, "https://img/a.jpg");
    }

    #[test]
    fn test_missing_name_defaults_to_unknown() {
        let json = r#"{"imageUrl":"x.jpg"}"#;
        let record: CategoryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.name, "Unknown");
        assert_eq!(record.description, None);
    }
}
