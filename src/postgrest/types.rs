//! Types for the PostgrestClient

/// Media type asking PostgREST for exactly one object instead of an array
pub const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// `Prefer` header value asking writes to return the written rows
pub const RETURN_REPRESENTATION: &str = "return=representation";

/// Result ordering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    /// Order by `column`, smallest first
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: true,
        }
    }

    /// Order by `column`, largest first
    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: false,
        }
    }

    /// The value of the `order` query parameter
    pub fn to_param(&self) -> String {
        let direction = if self.ascending { "asc" } else { "desc" };
        format!("{}.{}", self.column, direction)
    }
}
