use base64::{Engine, engine::general_purpose::STANDARD};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

use crate::error::{Error, Result};
use crate::record::Attachment;

/// Maximum accepted attachment size: 10MB exactly passes, one byte more fails.
pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

lazy_static! {
    static ref DATA_URL_REGEX: Regex = Regex::new(r"^data:([^;,]*);base64,(.*)$").unwrap();
}

/// The textual form of an attachment as it lives inside a storage snapshot:
/// the original filename, the MIME type, and the content as a
/// `data:<mime>;base64,<payload>` URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedPayload {
    pub file_name: String,
    pub file_type: String,
    pub data_url: String,
}

/// Encode an in-memory attachment for storage. Deterministic, cannot fail.
pub fn encode(attachment: &Attachment) -> EncodedPayload {
    let data_url = format!(
        "data:{};base64,{}",
        attachment.mime_type,
        STANDARD.encode(&attachment.bytes)
    );
    EncodedPayload {
        file_name: attachment.file_name.clone(),
        file_type: attachment.mime_type.clone(),
        data_url,
    }
}

/// Rebuild the byte buffer from an encoded payload, reattaching filename and
/// type. A payload that does not carry the `data:<mime>;base64,` header or
/// whose base64 body does not decode is rejected; callers log, treat the
/// record's attachment as absent and keep loading the rest of the table.
pub fn decode(payload: &EncodedPayload) -> Result<Attachment> {
    let captures = DATA_URL_REGEX
        .captures(&payload.data_url)
        .ok_or_else(|| Error::Decoding("missing data URL header".to_string()))?;

    let mime = captures.get(1).unwrap().as_str();
    let body = captures.get(2).unwrap().as_str();

    let bytes = STANDARD
        .decode(body)
        .map_err(|e| Error::Decoding(e.to_string()))?;

    // The header's MIME wins over the stored fileType when they disagree;
    // the header is what the byte content was encoded under.
    Ok(Attachment {
        file_name: payload.file_name.clone(),
        mime_type: if mime.is_empty() {
            payload.file_type.clone()
        } else {
            mime.to_string()
        },
        bytes,
    })
}

/// Size gate applied before an attachment is accepted onto a record.
pub fn validate_size(bytes: u64) -> bool {
    bytes <= MAX_ATTACHMENT_BYTES
}

/// Read a file from disk into an attachment, guessing the MIME type from the
/// extension. The read failure path is the `Encoding` error of the engine:
/// the caller logs it and leaves the record's attachment untouched.
pub fn read_file(path: impl AsRef<Path>) -> Result<Attachment> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(Error::Encoding)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    Ok(Attachment {
        file_name,
        mime_type,
        bytes,
    })
}
