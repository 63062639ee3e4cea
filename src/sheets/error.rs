use thiserror::Error;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("WorksheetNotFound: {0}")]
    WorksheetNotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sheets API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid spreadsheet URL: {0}")]
    InvalidUrl(String),
}

impl SheetError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SheetError::WorksheetNotFound(_))
    }
}
