//! Filter expressions for PostgREST queries

/// A single `column=eq.value` condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    /// Rows where `column` equals `value`
    pub fn eq<T: ToString>(column: &str, value: T) -> Self {
        Self {
            column: column.to_string(),
            value: value.to_string(),
        }
    }

    /// The query parameter this filter becomes
    pub fn to_param(&self) -> (String, String) {
        (self.column.clone(), format!("eq.{}", self.value))
    }
}
