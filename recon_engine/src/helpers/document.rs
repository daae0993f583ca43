use thiserror::Error;

const PDF_MAGIC: &[u8] = b"%PDF";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("The document is empty")]
    Empty,
    #[error("The document is not a PDF. It starts with {0:?}")]
    NotPdf(String),
}

/// Checks that the bytes look like a PDF, i.e. are non-empty and start with the `%PDF` magic bytes.
pub fn validate_pdf(content: &[u8]) -> Result<(), DocumentError> {
    if content.is_empty() {
        return Err(DocumentError::Empty);
    }
    if !content.starts_with(PDF_MAGIC) {
        let head = String::from_utf8_lossy(&content[..content.len().min(16)]).to_string();
        return Err(DocumentError::NotPdf(head));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pdf_magic() {
        assert!(validate_pdf(b"%PDF-1.7\n%...").is_ok());
        assert_eq!(validate_pdf(b""), Err(DocumentError::Empty));
        assert!(matches!(validate_pdf(b"<html>Error</html>"), Err(DocumentError::NotPdf(_))));
        assert!(matches!(validate_pdf(b"%PD"), Err(DocumentError::NotPdf(_))));
    }
}
