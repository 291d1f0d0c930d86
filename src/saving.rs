use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::codec::{self, EncodedPayload};
use crate::error::{Error, Result};
use crate::record::{Attachment, DurationState, HandleRegistry, Record};
use crate::schema::TableSchema;
use crate::table::TableSession;

/// Edits must pause this long before the debounced autosave fires.
pub const AUTOSAVE_DELAY: Duration = Duration::from_secs(1);

/// Debounced-write policy: every edit restarts the window, so only the most
/// recent trigger inside it produces a write. There is never more than one
/// pending save; a new schedule supersedes the old deadline.
#[derive(Debug, Default)]
pub struct Autosave {
    deadline: Option<Instant>,
}

impl Autosave {
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + AUTOSAVE_DELAY);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Consume the deadline if it has passed.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// The durable key-value store backing every table: one JSON document per
/// slot key, written whole on each save. Single writer by construction.
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub fn open(dir: impl AsRef<Path>) -> Result<Storage> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(Error::Storage)?;
        Ok(Storage { dir })
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.slot_path(key)) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::Storage(err)),
        }
    }

    pub fn set(&self, key: &str, text: &str) -> Result<()> {
        fs::write(self.slot_path(key), text).map_err(Error::Storage)
    }
}

/// Serialize the whole table to its storage slot: one flat JSON object per
/// record, in on-screen order, with the attachment encoded inline (or empty
/// strings when absent).
pub fn save_all(session: &TableSession, storage: &Storage) -> Result<()> {
    let snapshots: Vec<Value> = session
        .rows
        .iter()
        .map(|record| snapshot_value(record, session.schema))
        .collect();
    let text = serde_json::to_string(&snapshots)?;
    storage.set(session.schema.slot_key, &text)
}

/// Rebuild a table session from its storage slot. A missing slot or
/// corrupt JSON is not fatal: the condition is logged and the table starts
/// empty. Attachment decode failures drop that record's attachment only.
pub fn load_all(storage: &Storage, schema: &'static TableSchema) -> TableSession {
    let mut session = TableSession::new(schema);

    let text = match storage.get(schema.slot_key) {
        Ok(Some(text)) => text,
        Ok(None) => return session,
        Err(err) => {
            log::warn!("could not read slot {}: {}", schema.slot_key, err);
            return session;
        }
    };

    let parsed: Vec<Value> = match serde_json::from_str(&text) {
        Ok(parsed) => parsed,
        Err(err) => {
            log::warn!(
                "discarding stored data for {}: {}",
                schema.slot_key,
                Error::CorruptStorage(err)
            );
            return session;
        }
    };

    for value in &parsed {
        let record = rebuild_record(value, schema, &mut session.handles);
        session.rows.push(record);
    }

    finish_load(&mut session);
    session
}

/// Run the debounced save if its window has elapsed. Returns whether a
/// write happened.
pub fn flush_due(session: &mut TableSession, storage: &Storage, now: Instant) -> Result<bool> {
    if session.autosave.take_due(now) {
        save_all(session, storage)?;
        return Ok(true);
    }
    Ok(false)
}

/// The explicit "Save" action: bypasses the debounce window, drops any
/// pending deadline and writes immediately.
pub fn save_now(session: &mut TableSession, storage: &Storage) -> Result<()> {
    session.autosave.cancel();
    save_all(session, storage)
}

fn snapshot_value(record: &Record, schema: &TableSchema) -> Value {
    let mut map = serde_json::Map::new();
    for (field, value) in schema.fields.iter().zip(&record.values) {
        map.insert(field.key.to_string(), Value::String(value.clone()));
    }
    if schema.duration.is_some() {
        map.insert(
            "duration".to_string(),
            Value::String(record.duration.display()),
        );
    }

    let payload = record.attachment.as_ref().map(codec::encode);
    let part = |get: fn(&EncodedPayload) -> &str| -> Value {
        Value::String(
            payload
                .as_ref()
                .map(|p| get(p).to_string())
                .unwrap_or_default(),
        )
    };
    map.insert("fileName".to_string(), part(|p| &p.file_name));
    map.insert("fileBase64".to_string(), part(|p| &p.data_url));
    map.insert("fileType".to_string(), part(|p| &p.file_type));

    Value::Object(map)
}

fn rebuild_record(value: &Value, schema: &TableSchema, handles: &mut HandleRegistry) -> Record {
    let obj = value.as_object();
    let field_str = |key: &str| -> String {
        obj.and_then(|o| o.get(key))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };

    let values: Vec<String> = schema.fields.iter().map(|f| field_str(f.key)).collect();
    let duration = if schema.duration.is_some() {
        DurationState::parse_display(&field_str("duration"))
    } else {
        DurationState::Absent
    };

    let attachment = decode_attachment(
        field_str("fileName"),
        field_str("fileBase64"),
        field_str("fileType"),
        schema.slot_key,
    );
    let handle = attachment.as_ref().map(|_| handles.acquire());

    Record {
        values,
        duration,
        attachment,
        handle,
    }
}

fn decode_attachment(
    file_name: String,
    data_url: String,
    file_type: String,
    slot_key: &str,
) -> Option<Attachment> {
    if file_name.is_empty() || data_url.is_empty() {
        return None;
    }
    let payload = EncodedPayload {
        file_name,
        file_type,
        data_url,
    };
    match codec::decode(&payload) {
        Ok(attachment) => Some(attachment),
        Err(err) => {
            log::warn!(
                "skipping attachment {:?} while loading {}: {}",
                payload.file_name,
                slot_key,
                err
            );
            None
        }
    }
}

/// Shared tail of every load path: raise the row counter to its floor and
/// rebuild the transient warning state.
fn finish_load(session: &mut TableSession) {
    let mut floor = session.rows.len() as i64;
    for record in &session.rows {
        if let Some(n) = leading_number(record.seq(session.schema)) {
            floor = floor.max(n);
        }
    }
    session.raise_counter_floor(floor);
    session.rescan_notifications();
}

/// Numeric prefix of a sequence value ("12" and "12-A" both give 12).
fn leading_number(s: &str) -> Option<i64> {
    let digits: String = s
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[derive(Serialize, Deserialize)]
struct BackupRecord {
    fields: Vec<(String, String)>,
    file_name: String,
    file_base64: String,
    file_type: String,
}

/// A whole-table snapshot for download/transfer, compressed bincode rather
/// than the JSON slot format.
#[derive(Serialize, Deserialize)]
pub struct TableBackup {
    slot_key: String,
    records: Vec<BackupRecord>,
}

fn backup_of(session: &TableSession) -> TableBackup {
    let records = session
        .rows
        .iter()
        .map(|record| {
            let mut fields: Vec<(String, String)> = session
                .schema
                .fields
                .iter()
                .zip(&record.values)
                .map(|(f, v)| (f.key.to_string(), v.clone()))
                .collect();
            if session.schema.duration.is_some() {
                fields.push(("duration".to_string(), record.duration.display()));
            }

            let payload = record.attachment.as_ref().map(codec::encode);
            BackupRecord {
                fields,
                file_name: payload
                    .as_ref()
                    .map(|p| p.file_name.clone())
                    .unwrap_or_default(),
                file_base64: payload
                    .as_ref()
                    .map(|p| p.data_url.clone())
                    .unwrap_or_default(),
                file_type: payload.map(|p| p.file_type).unwrap_or_default(),
            }
        })
        .collect();

    TableBackup {
        slot_key: session.schema.slot_key.to_string(),
        records,
    }
}

fn restore_backup(backup: TableBackup, schema: &'static TableSchema) -> TableSession {
    let mut session = TableSession::new(schema);

    for record in backup.records {
        let lookup = |key: &str| -> String {
            record
                .fields
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap_or_default()
        };
        let values: Vec<String> = schema.fields.iter().map(|f| lookup(f.key)).collect();
        let duration = if schema.duration.is_some() {
            DurationState::parse_display(&lookup("duration"))
        } else {
            DurationState::Absent
        };
        let attachment = decode_attachment(
            record.file_name.clone(),
            record.file_base64.clone(),
            record.file_type.clone(),
            schema.slot_key,
        );
        let handle = attachment.as_ref().map(|_| session.handles.acquire());

        session.rows.push(Record {
            values,
            duration,
            attachment,
            handle,
        });
    }

    finish_load(&mut session);
    session
}

pub fn save_table(session: &TableSession, filename: &str) -> std::io::Result<()> {
    let file = File::create(filename)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut writer = std::io::BufWriter::new(encoder);

    serialize_into(&mut writer, &backup_of(session))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    Ok(())
}

pub fn load_table(filename: &str, schema: &'static TableSchema) -> std::io::Result<TableSession> {
    let file = File::open(filename)?;
    let decoder = GzDecoder::new(file);
    let mut reader = std::io::BufReader::new(decoder);

    let backup: TableBackup = deserialize_from(&mut reader)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    if backup.slot_key != schema.slot_key {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "snapshot belongs to a different table",
        ));
    }

    Ok(restore_backup(backup, schema))
}

/// Serialize a table snapshot into a memory buffer (the download endpoint).
pub fn backup_to_buffer(session: &TableSession) -> std::io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let encoder = GzEncoder::new(&mut buffer, Compression::default());
    let mut writer = std::io::BufWriter::new(encoder);

    serialize_into(&mut writer, &backup_of(session))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    drop(writer);

    Ok(buffer)
}

/// Deserialize a table snapshot from an uploaded buffer.
pub fn restore_from_buffer(
    buffer: &[u8],
    schema: &'static TableSchema,
) -> std::io::Result<TableSession> {
    let cursor = std::io::Cursor::new(buffer);
    let decoder = GzDecoder::new(cursor);
    let mut reader = std::io::BufReader::new(decoder);

    let backup: TableBackup = deserialize_from(&mut reader)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    if backup.slot_key != schema.slot_key {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "snapshot belongs to a different table",
        ));
    }

    Ok(restore_backup(backup, schema))
}
