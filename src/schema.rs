/// Field key shared by every table variant: the sequence number column. It
/// doubles as the dedup key for duration notifications, so it is looked up
/// by name rather than by position.
pub const SEQ_FIELD: &str = "sno";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Date,
    Select(&'static [&'static str]),
}

/// One column of a table variant. `width` is the spreadsheet-export column
/// width in characters.
#[derive(Clone, Copy, Debug)]
pub struct FieldDef {
    pub key: &'static str,
    pub label: &'static str,
    pub placeholder: &'static str,
    pub width: u16,
    pub kind: FieldKind,
}

/// Which two date fields feed the derived days-remaining column.
#[derive(Clone, Copy, Debug)]
pub struct DurationRule {
    pub start: &'static str,
    pub end: &'static str,
}

/// Descriptor for one table variant. The three shipped tables are
/// near-identical forms; everything variant-specific lives here so a single
/// engine can drive all of them.
#[derive(Clone, Copy, Debug)]
pub struct TableSchema {
    /// Key of the durable storage slot this table persists into.
    pub slot_key: &'static str,
    /// Human title used by the print view.
    pub title: &'static str,
    /// Stem of generated export filenames (`<stem>_export_<date>.xlsx`).
    pub export_stem: &'static str,
    pub fields: &'static [FieldDef],
    /// The field whose cell flips between a plain input and a clickable
    /// link bound to the row's attachment.
    pub link_field: &'static str,
    pub duration: Option<DurationRule>,
}

impl TableSchema {
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.key == key)
    }

    pub fn is_date(&self, key: &str) -> bool {
        self.fields
            .iter()
            .any(|f| f.key == key && f.kind == FieldKind::Date)
    }

    /// True when editing `key` must re-derive the duration column.
    pub fn drives_duration(&self, key: &str) -> bool {
        match self.duration {
            Some(rule) => rule.start == key || rule.end == key,
            None => false,
        }
    }

    /// Header row for export and print: the field labels, the derived
    /// duration column when the variant has one, and the attachment column.
    pub fn headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = self.fields.iter().map(|f| f.label.to_string()).collect();
        if self.duration.is_some() {
            headers.push("Duration (Days)".to_string());
        }
        headers.push("Attachment File Name".to_string());
        headers
    }

    /// Export column widths, aligned with `headers()`.
    pub fn column_widths(&self) -> Vec<u16> {
        let mut widths: Vec<u16> = self.fields.iter().map(|f| f.width).collect();
        if self.duration.is_some() {
            widths.push(20);
        }
        widths.push(30);
        widths
    }
}

pub static CONTRACTOR_LIST: TableSchema = TableSchema {
    slot_key: "dashboardData",
    title: "Contractor List",
    export_stem: "dashboard",
    fields: &[
        FieldDef { key: "sno", label: "S.NO", placeholder: "Enter S.No", width: 10, kind: FieldKind::Text },
        FieldDef { key: "efile", label: "E-File", placeholder: "Enter E-File", width: 20, kind: FieldKind::Text },
        FieldDef { key: "contractor", label: "Contractor", placeholder: "Enter Contractor", width: 25, kind: FieldKind::Text },
        FieldDef { key: "description", label: "Description", placeholder: "Enter Description", width: 30, kind: FieldKind::Text },
        FieldDef { key: "value", label: "Value", placeholder: "Enter Value", width: 15, kind: FieldKind::Text },
        FieldDef { key: "startDate", label: "Start Date", placeholder: "", width: 15, kind: FieldKind::Date },
        FieldDef { key: "endDate", label: "End Date", placeholder: "", width: 15, kind: FieldKind::Date },
    ],
    link_field: "contractor",
    duration: Some(DurationRule { start: "startDate", end: "endDate" }),
};

pub static BILL_TRACKER: TableSchema = TableSchema {
    slot_key: "billTrackerData",
    title: "Bill Tracker",
    export_stem: "bill_tracker",
    fields: &[
        FieldDef { key: "sno", label: "S.NO", placeholder: "Enter S.No", width: 10, kind: FieldKind::Text },
        FieldDef { key: "efile", label: "E-File", placeholder: "Enter E-File", width: 20, kind: FieldKind::Text },
        FieldDef { key: "contractor", label: "Contractor", placeholder: "Enter Contractor", width: 25, kind: FieldKind::Text },
        FieldDef { key: "approvedDate", label: "Approved Date", placeholder: "", width: 15, kind: FieldKind::Date },
        FieldDef { key: "approvedAmount", label: "Approved Amount", placeholder: "Enter Amount", width: 15, kind: FieldKind::Text },
        FieldDef {
            key: "billFrequency",
            label: "Bill Frequency",
            placeholder: "Select Frequency",
            width: 15,
            kind: FieldKind::Select(&["monthly", "quarterly", "half-yearly", "annually"]),
        },
        FieldDef { key: "billDate", label: "Bill Date", placeholder: "", width: 15, kind: FieldKind::Date },
        FieldDef { key: "billDueDate", label: "Bill Due Date", placeholder: "", width: 15, kind: FieldKind::Date },
        FieldDef { key: "billPaidDate", label: "Bill Paid Date", placeholder: "", width: 15, kind: FieldKind::Date },
        FieldDef { key: "paidAmount", label: "Paid Amount", placeholder: "Enter Amount", width: 15, kind: FieldKind::Text },
    ],
    link_field: "contractor",
    duration: None,
};

pub static EPBG_REGISTER: TableSchema = TableSchema {
    slot_key: "epbgData",
    title: "EPBG Register",
    export_stem: "epbg",
    fields: &[
        FieldDef { key: "sno", label: "S.NO", placeholder: "Enter S.No", width: 10, kind: FieldKind::Text },
        FieldDef { key: "contractor", label: "Contractor", placeholder: "Enter Contractor Name", width: 25, kind: FieldKind::Text },
        FieldDef { key: "poNo", label: "P.O No", placeholder: "Enter P.O No", width: 20, kind: FieldKind::Text },
        FieldDef { key: "bgNo", label: "BG No", placeholder: "Enter BG No", width: 20, kind: FieldKind::Text },
        FieldDef { key: "bgDate", label: "BG Date", placeholder: "", width: 15, kind: FieldKind::Date },
        FieldDef { key: "bgAmount", label: "BG Amount", placeholder: "Enter BG Amount", width: 15, kind: FieldKind::Text },
        FieldDef { key: "bgValidity", label: "BG Validity", placeholder: "Enter BG Validity", width: 15, kind: FieldKind::Text },
        FieldDef { key: "gemBid", label: "GeM Bid No", placeholder: "Enter GeM Bid No", width: 20, kind: FieldKind::Text },
        FieldDef { key: "refEfile", label: "Ref Efile No", placeholder: "Enter Ref Efile No", width: 20, kind: FieldKind::Text },
    ],
    link_field: "bgNo",
    duration: None,
};

/// Every table variant the application ships.
pub fn builtin_schemas() -> [&'static TableSchema; 3] {
    [&CONTRACTOR_LIST, &BILL_TRACKER, &EPBG_REGISTER]
}

pub fn by_slot_key(key: &str) -> Option<&'static TableSchema> {
    builtin_schemas().into_iter().find(|s| s.slot_key == key)
}
