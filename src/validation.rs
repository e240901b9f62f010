use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use validator::Validate;

use crate::error::ApiError;

/// Longest style entry accepted from the style editor.
pub const MAX_STYLE_LEN: u64 = 80;

static TABLE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*(\.[A-Za-z_][A-Za-z0-9_$]*){0,2}$")
        .unwrap_or_else(|e| panic!("invalid table name pattern: {e}"))
});

/// Topic and style picked on the page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectionForm {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub style: String,
}

/// A style entry added to or removed from the session's style list.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StyleForm {
    #[validate(length(min = 1, max = MAX_STYLE_LEN, message = "Style must not be empty or too long"))]
    pub style: String,
}

impl StyleForm {
    /// Trim the entry and validate it.
    pub fn into_validated(self) -> Result<String, ApiError> {
        let form = StyleForm {
            style: self.style.trim().to_string(),
        };
        form.validate()?;
        Ok(form.style)
    }
}

/// Ensure a table name is a plain, optionally qualified, SQL identifier
/// before it is interpolated into a statement.
pub fn validate_table_name(name: &str) -> Result<(), ApiError> {
    if TABLE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(ApiError::ValidationError(format!(
            "Table name '{}' is not a valid identifier",
            name
        )))
    }
}
