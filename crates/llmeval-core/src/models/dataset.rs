use serde::{Deserialize, Serialize};

/// Platform assumed for raw question/answer imports when none is given.
pub const DEFAULT_SOURCE_PLATFORM: &str = "stackoverflow";

/// A dataset version label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub version: String,
}

/// A standard-question tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub tag: String,
}

/// Label/value pair for pickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

impl SelectOption {
    fn same(name: &str) -> Self {
        Self {
            label: name.to_string(),
            value: name.to_string(),
        }
    }
}

impl From<&Version> for SelectOption {
    fn from(version: &Version) -> Self {
        SelectOption::same(&version.version)
    }
}

impl From<&Tag> for SelectOption {
    fn from(tag: &Tag) -> Self {
        SelectOption::same(&tag.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_ignores_unknown_fields() {
        let json = r#"[{"id": 3, "version": "2024-Q1", "createdAt": "2024-01-02T00:00:00"}, {"version": "draft"}]"#;
        let versions: Vec<Version> = serde_json::from_str(json).expect("Failed to parse versions");

        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].id, Some(3));
        assert_eq!(versions[0].version, "2024-Q1");
        assert_eq!(versions[1].id, None);
    }

    #[test]
    fn test_select_option_from_tag() {
        let tag = Tag {
            id: None,
            tag: "rust".to_string(),
        };
        let option = SelectOption::from(&tag);
        assert_eq!(option.label, "rust");
        assert_eq!(option.value, "rust");
    }
}
