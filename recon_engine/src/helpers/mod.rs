mod document;
pub mod signature;

pub use document::{validate_pdf, DocumentError};
