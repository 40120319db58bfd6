//! Encargo list and create form

pub mod form;
pub mod list;

pub use form::{CreateEncargoForm, EncargoFormData, FormError, FormField};
pub use list::{EncargoAction, EncargoCard, EncargoList, ListKey, ListState, ListView};
