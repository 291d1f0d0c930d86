use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::schema::{SEQ_FIELD, TableSchema};

lazy_static! {
    static ref DAYS_LEFT_REGEX: Regex = Regex::new(r"(\d+)\s*days").unwrap();
}

/// Remaining days at or below this threshold flag the row and raise a
/// notification.
pub const WARNING_THRESHOLD_DAYS: i64 = 60;

/// A binary file associated with a record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// How the link-toggle cell presents itself. Never persisted; always
/// re-derived from the current name value and attachment presence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayMode {
    InputMode,
    LinkMode,
}

/// Derived state of the days-remaining column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DurationState {
    /// One or both dates missing; displays "-".
    Absent,
    /// End on or after start; the day count.
    Remaining(i64),
    /// End before start (or an unparseable date); displays the sentinel.
    Invalid,
}

impl DurationState {
    /// The string that is shown in the cell and persisted to storage.
    pub fn display(&self) -> String {
        match self {
            DurationState::Absent => "-".to_string(),
            DurationState::Remaining(days) => format!("{} days left", days),
            DurationState::Invalid => "Invalid dates".to_string(),
        }
    }

    pub fn warning(&self) -> bool {
        match self {
            DurationState::Absent => false,
            DurationState::Remaining(days) => *days <= WARNING_THRESHOLD_DAYS,
            DurationState::Invalid => true,
        }
    }

    /// Recover the state from a persisted display string. Must round-trip
    /// `display()` exactly: "N days left" parses back to the same day
    /// count, the sentinel to Invalid, anything else to Absent.
    pub fn parse_display(text: &str) -> DurationState {
        if text == "Invalid dates" {
            return DurationState::Invalid;
        }
        if let Some(captures) = DAYS_LEFT_REGEX.captures(text) {
            if let Ok(days) = captures.get(1).unwrap().as_str().parse::<i64>() {
                return DurationState::Remaining(days);
            }
        }
        DurationState::Absent
    }
}

/// Identifier of a live attachment view handle.
pub type HandleId = u64;

/// Registry of revocable view handles, the stand-in for browser object
/// URLs. A record holds at most one live handle; every mutation that
/// invalidates the old bytes must release it here before acquiring a new
/// one, and `live_count` lets tests assert nothing leaked.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    next: HandleId,
    live: BTreeSet<HandleId>,
}

impl HandleRegistry {
    pub fn acquire(&mut self) -> HandleId {
        self.next += 1;
        self.live.insert(self.next);
        self.next
    }

    pub fn release(&mut self, id: HandleId) -> bool {
        self.live.remove(&id)
    }

    pub fn is_live(&self, id: HandleId) -> bool {
        self.live.contains(&id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

/// One row of a tracked table: the raw field values in schema order plus
/// the derived pieces (duration column, attachment, view handle).
#[derive(Clone, Debug)]
pub struct Record {
    pub values: Vec<String>,
    pub duration: DurationState,
    pub attachment: Option<Attachment>,
    pub handle: Option<HandleId>,
}

impl Record {
    /// A fresh row: every field empty except the sequence number.
    pub fn blank(schema: &TableSchema, seq: i64) -> Record {
        let mut values = vec![String::new(); schema.fields.len()];
        if let Some(idx) = schema.index_of(SEQ_FIELD) {
            values[idx] = seq.to_string();
        }
        Record {
            values,
            duration: DurationState::Absent,
            attachment: None,
            handle: None,
        }
    }

    pub fn value(&self, schema: &TableSchema, key: &str) -> &str {
        schema
            .index_of(key)
            .and_then(|idx| self.values.get(idx))
            .map(|v| v.as_str())
            .unwrap_or("")
    }

    pub fn set_value(&mut self, schema: &TableSchema, key: &str, value: &str) {
        if let Some(idx) = schema.index_of(key) {
            self.values[idx] = value.to_string();
        }
    }

    pub fn seq(&self, schema: &TableSchema) -> &str {
        self.value(schema, SEQ_FIELD)
    }

    /// LinkMode iff an attachment is present and the link field is
    /// non-empty. A pure function of current state, so switching modes can
    /// never lose the name text.
    pub fn display_mode(&self, schema: &TableSchema) -> DisplayMode {
        if self.attachment.is_some() && !self.value(schema, schema.link_field).trim().is_empty() {
            DisplayMode::LinkMode
        } else {
            DisplayMode::InputMode
        }
    }
}
