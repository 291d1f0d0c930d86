use thiserror::Error;

/// Failures the tracking engine can recover from at the boundary that
/// detects them. None of these are allowed to take the page down: oversized
/// files and empty exports surface as user-facing messages, the rest are
/// logged and degraded (attachment dropped, table treated as empty).
#[derive(Debug, Error)]
pub enum Error {
    #[error("File size exceeds 10MB. Please select a smaller file.")]
    OversizedFile { bytes: u64 },

    #[error("failed to read attachment: {0}")]
    Encoding(std::io::Error),

    #[error("malformed attachment payload: {0}")]
    Decoding(String),

    #[error("stored table data is corrupt: {0}")]
    CorruptStorage(#[from] serde_json::Error),

    #[error("storage slot unavailable: {0}")]
    Storage(std::io::Error),

    #[error("No data to export!")]
    EmptyTable,

    #[error("no such row: {0}")]
    NoSuchRow(usize),

    #[cfg(feature = "web")]
    #[error("export failed: {0}")]
    Export(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(feature = "web")]
impl From<rust_xlsxwriter::XlsxError> for Error {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Error::Export(err.to_string())
    }
}
