use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::notify::{NotificationCenter, NotificationEntry};
use crate::record::{
    Attachment, DisplayMode, DurationState, HandleRegistry, Record, WARNING_THRESHOLD_DAYS,
};
use crate::saving::Autosave;
use crate::schema::TableSchema;
use crate::codec;
use std::time::Instant;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Derive the days-remaining column from the two date strings. Either date
/// empty means no duration at all; a non-empty date that does not parse is
/// treated like an out-of-order range and yields the sentinel.
pub fn compute_duration(start: &str, end: &str) -> DurationState {
    let start = start.trim();
    let end = end.trim();
    if start.is_empty() || end.is_empty() {
        return DurationState::Absent;
    }

    match (
        NaiveDate::parse_from_str(start, DATE_FORMAT),
        NaiveDate::parse_from_str(end, DATE_FORMAT),
    ) {
        (Ok(start), Ok(end)) => {
            if end >= start {
                DurationState::Remaining((end - start).num_days())
            } else {
                DurationState::Invalid
            }
        }
        _ => DurationState::Invalid,
    }
}

/// Per-table session state: the row collection and everything that used to
/// be ambient page state (row counter, pending autosave deadline,
/// notification center, attachment view handles). One of these exists per
/// open table; nothing about it is global.
pub struct TableSession {
    pub schema: &'static TableSchema,
    pub rows: Vec<Record>,
    row_counter: i64,
    pub notifications: NotificationCenter,
    pub handles: HandleRegistry,
    pub autosave: Autosave,
}

impl TableSession {
    pub fn new(schema: &'static TableSchema) -> TableSession {
        TableSession {
            schema,
            rows: Vec::new(),
            row_counter: 0,
            notifications: NotificationCenter::new(),
            handles: HandleRegistry::default(),
            autosave: Autosave::default(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row_counter(&self) -> i64 {
        self.row_counter
    }

    /// Never lowers the counter; loading raises it to the highest numeric
    /// sequence value seen (and at least the row count) so newly added rows
    /// do not collide with loaded ones.
    pub fn raise_counter_floor(&mut self, candidate: i64) {
        if candidate > self.row_counter {
            self.row_counter = candidate;
        }
    }

    /// Append a blank autonumbered row; returns its index.
    pub fn add_row(&mut self) -> usize {
        self.row_counter += 1;
        self.rows.push(Record::blank(self.schema, self.row_counter));
        self.rows.len() - 1
    }

    /// Remove a row (the caller has already confirmed with the user),
    /// releasing its view handle and retracting any warning it held.
    pub fn delete_row(&mut self, idx: usize, now: Instant) -> Result<()> {
        if idx >= self.rows.len() {
            return Err(Error::NoSuchRow(idx));
        }
        let mut record = self.rows.remove(idx);
        if let Some(handle) = record.handle.take() {
            self.handles.release(handle);
        }
        self.rescan_notifications();
        self.autosave.schedule(now);
        Ok(())
    }

    /// Apply one cell edit. Date fields that feed the duration column
    /// re-derive it and rescan the notification state; every edit schedules
    /// the debounced autosave.
    pub fn set_field(&mut self, idx: usize, key: &str, value: &str, now: Instant) -> Result<()> {
        let record = self.rows.get_mut(idx).ok_or(Error::NoSuchRow(idx))?;
        record.set_value(self.schema, key, value);

        if self.schema.drives_duration(key) {
            if let Some(rule) = self.schema.duration {
                let start = self.rows[idx].value(self.schema, rule.start).to_string();
                let end = self.rows[idx].value(self.schema, rule.end).to_string();
                self.rows[idx].duration = compute_duration(&start, &end);
            }
            self.rescan_notifications();
        }

        self.autosave.schedule(now);
        Ok(())
    }

    pub fn field(&self, idx: usize, key: &str) -> Option<&str> {
        self.rows.get(idx).map(|r| r.value(self.schema, key))
    }

    pub fn display_mode(&self, idx: usize) -> Option<DisplayMode> {
        self.rows.get(idx).map(|r| r.display_mode(self.schema))
    }

    /// Attach a file to a row. The size gate runs before anything is
    /// touched, so a rejected file leaves the previous attachment (and its
    /// view handle) exactly as they were.
    pub fn set_attachment(&mut self, idx: usize, attachment: Attachment, now: Instant) -> Result<()> {
        if idx >= self.rows.len() {
            return Err(Error::NoSuchRow(idx));
        }
        if !codec::validate_size(attachment.bytes.len() as u64) {
            return Err(Error::OversizedFile {
                bytes: attachment.bytes.len() as u64,
            });
        }

        let record = &mut self.rows[idx];
        if let Some(handle) = record.handle.take() {
            self.handles.release(handle);
        }
        record.attachment = Some(attachment);
        record.handle = Some(self.handles.acquire());

        self.autosave.schedule(now);
        Ok(())
    }

    pub fn clear_attachment(&mut self, idx: usize, now: Instant) -> Result<()> {
        let record = self.rows.get_mut(idx).ok_or(Error::NoSuchRow(idx))?;
        if let Some(handle) = record.handle.take() {
            self.handles.release(handle);
        }
        record.attachment = None;
        self.autosave.schedule(now);
        Ok(())
    }

    /// Rebuild the notification state from scratch: clear everything,
    /// recompute each row in table order (the recompute is authoritative
    /// over any loaded duration string once both dates are present) and
    /// re-raise. This is the only path that retracts stale entries, and it
    /// runs after every relevant edit as well as after a full load.
    pub fn rescan_notifications(&mut self) {
        self.notifications.clear();

        for idx in 0..self.rows.len() {
            if let Some(rule) = self.schema.duration {
                let start = self.rows[idx].value(self.schema, rule.start).to_string();
                let end = self.rows[idx].value(self.schema, rule.end).to_string();
                if !start.trim().is_empty() && !end.trim().is_empty() {
                    self.rows[idx].duration = compute_duration(&start, &end);
                }
            }

            if let DurationState::Remaining(days) = self.rows[idx].duration {
                if days <= WARNING_THRESHOLD_DAYS {
                    let entry = self.notification_snapshot(idx, days);
                    self.notifications.raise(entry);
                }
            }
        }
    }

    /// Freeze the row's visible values into a notification entry.
    fn notification_snapshot(&self, idx: usize, days: i64) -> NotificationEntry {
        let record = &self.rows[idx];
        let mut details: Vec<(String, String)> = self
            .schema
            .fields
            .iter()
            .map(|f| {
                let value = record.value(self.schema, f.key);
                let shown = if value.is_empty() { "N/A" } else { value };
                (f.label.to_string(), shown.to_string())
            })
            .collect();
        details.push(("Duration".to_string(), record.duration.display()));

        NotificationEntry {
            seq: record.seq(self.schema).to_string(),
            days,
            details,
        }
    }

    /// Indices of rows matching the search query; an empty query matches
    /// everything. Every field value plus the duration display is searched,
    /// case-insensitively.
    pub fn filter_rows(&self, query: &str) -> Vec<usize> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return (0..self.rows.len()).collect();
        }

        self.rows
            .iter()
            .enumerate()
            .filter(|(_, record)| {
                let in_fields = record
                    .values
                    .iter()
                    .any(|v| v.to_lowercase().contains(&query));
                let in_duration = self.schema.duration.is_some()
                    && record.duration.display().to_lowercase().contains(&query);
                in_fields || in_duration
            })
            .map(|(idx, _)| idx)
            .collect()
    }

    /// The visible grid: header row plus one string row per record, exactly
    /// as displayed (derived duration value, attachment filename). This is
    /// the shape the export and print collaborators consume.
    pub fn export_grid(&self) -> (Vec<String>, Vec<Vec<String>>) {
        let headers = self.schema.headers();
        let rows = self
            .rows
            .iter()
            .map(|record| {
                let mut row = record.values.clone();
                if self.schema.duration.is_some() {
                    row.push(record.duration.display());
                }
                row.push(
                    record
                        .attachment
                        .as_ref()
                        .map(|a| a.file_name.clone())
                        .unwrap_or_default(),
                );
                row
            })
            .collect();
        (headers, rows)
    }
}
