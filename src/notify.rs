/// One duration warning held for display. The field snapshot is copied out
/// of the record at raise time and stays frozen until the next rescan, even
/// if the row is edited afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationEntry {
    /// Current string value of the row's sequence-number field; also the
    /// dedup key. Two rows sharing an sno collide by design.
    pub seq: String,
    pub days: i64,
    /// (label, value) pairs for every visible column plus the duration
    /// display.
    pub details: Vec<(String, String)>,
}

impl NotificationEntry {
    pub fn message(&self) -> String {
        format!("Warning: Only {} days remaining!", self.days)
    }
}

/// Collects active duration warnings and drives the badge count. Entries
/// are only ever removed by a full rescan; `raise` de-duplicates by
/// sequence number, replacing the held snapshot so the last record
/// processed in table order wins.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    entries: Vec<NotificationEntry>,
}

impl NotificationCenter {
    pub fn new() -> NotificationCenter {
        NotificationCenter::default()
    }

    pub fn raise(&mut self, entry: NotificationEntry) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.seq == entry.seq) {
            *existing = entry;
        } else {
            // Newest warning first, like the modal.
            self.entries.insert(0, entry);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Zero entries hides the badge.
    pub fn badge_active(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn entries(&self) -> &[NotificationEntry] {
        &self.entries
    }
}
