use dashboard::record::{Attachment, DisplayMode, DurationState};
use dashboard::schema::{BILL_TRACKER, CONTRACTOR_LIST, EPBG_REGISTER};
use dashboard::table::{TableSession, compute_duration};
use std::time::Instant;

fn attachment(name: &str) -> Attachment {
    Attachment {
        file_name: name.to_string(),
        mime_type: "application/pdf".to_string(),
        bytes: b"%PDF-1.4".to_vec(),
    }
}

fn test_compute_duration() {
    println!("\n====== Testing compute_duration ======");

    // Scenario: 2024-01-01 to 2024-01-10 is 9 days and inside the threshold
    let d = compute_duration("2024-01-01", "2024-01-10");
    assert_eq!(d, DurationState::Remaining(9));
    assert_eq!(d.display(), "9 days left");
    assert!(d.warning());
    println!("✓ 2024-01-01 → 2024-01-10 gives \"9 days left\" with warning");

    // Scenario: end before start is the sentinel
    let d = compute_duration("2024-06-01", "2024-05-01");
    assert_eq!(d, DurationState::Invalid);
    assert_eq!(d.display(), "Invalid dates");
    assert!(d.warning());
    println!("✓ End before start gives \"Invalid dates\" with warning");

    // A range beyond the threshold carries no warning
    let d = compute_duration("2024-01-01", "2024-12-31");
    assert_eq!(d, DurationState::Remaining(365));
    assert!(!d.warning());
    println!("✓ 365 days remaining carries no warning");

    // Same day counts as zero days left, which warns
    let d = compute_duration("2024-03-15", "2024-03-15");
    assert_eq!(d, DurationState::Remaining(0));
    assert!(d.warning());

    // Exactly at and just past the threshold
    assert!(compute_duration("2024-01-01", "2024-03-01").warning()); // 60 days
    assert!(!compute_duration("2024-01-01", "2024-03-02").warning()); // 61 days
    println!("✓ Threshold boundary at 60/61 days");

    // Missing either date displays "-" and never warns
    assert_eq!(compute_duration("", "2024-01-10"), DurationState::Absent);
    assert_eq!(compute_duration("2024-01-01", ""), DurationState::Absent);
    assert_eq!(compute_duration("", ""), DurationState::Absent);
    println!("✓ Missing dates give the \"-\" placeholder");

    // Unparseable values behave like an invalid range
    assert_eq!(
        compute_duration("2024-13-99", "2024-01-10"),
        DurationState::Invalid
    );
    assert_eq!(
        compute_duration("2024-01-01", "not a date"),
        DurationState::Invalid
    );
    println!("✓ Unparseable dates give the sentinel");
}

fn test_date_edits_drive_duration_and_notifications() {
    println!("\n====== Testing date edits ======");
    let now = Instant::now();
    let mut session = TableSession::new(&CONTRACTOR_LIST);
    let idx = session.add_row();

    session.set_field(idx, "startDate", "2024-01-01", now).unwrap();
    assert_eq!(session.rows[idx].duration, DurationState::Absent);
    assert_eq!(session.notifications.count(), 0);

    session.set_field(idx, "endDate", "2024-01-10", now).unwrap();
    assert_eq!(session.rows[idx].duration, DurationState::Remaining(9));
    assert_eq!(session.notifications.count(), 1);
    assert!(session.notifications.badge_active());
    println!("✓ Completing the date pair raises a warning entry");

    let entry = &session.notifications.entries()[0];
    assert_eq!(entry.days, 9);
    assert_eq!(entry.message(), "Warning: Only 9 days remaining!");
    assert!(entry
        .details
        .iter()
        .any(|(label, value)| label == "Duration" && value == "9 days left"));
    println!("✓ Entry snapshot carries the duration display");

    // Pushing the end date out retracts the warning on the same edit
    session.set_field(idx, "endDate", "2030-01-01", now).unwrap();
    assert_eq!(session.notifications.count(), 0);
    assert!(!session.notifications.badge_active());
    println!("✓ Warnings retract when the range leaves the threshold");

    // Invalid range flags the cell but raises no day-count notification
    session.set_field(idx, "endDate", "2020-01-01", now).unwrap();
    assert_eq!(session.rows[idx].duration, DurationState::Invalid);
    assert!(session.rows[idx].duration.warning());
    assert_eq!(session.notifications.count(), 0);
    println!("✓ Invalid dates warn in the cell only");

    // Edits schedule the debounced autosave
    assert!(session.autosave.is_pending());
}

fn test_notification_dedup_and_idempotence() {
    println!("\n====== Testing notification dedup ======");
    let now = Instant::now();
    let mut session = TableSession::new(&CONTRACTOR_LIST);

    // Two rows that share the sequence value "5", both in warning range
    let a = session.add_row();
    session.set_field(a, "sno", "5", now).unwrap();
    session.set_field(a, "efile", "EF-A", now).unwrap();
    session.set_field(a, "startDate", "2024-01-01", now).unwrap();
    session.set_field(a, "endDate", "2024-01-11", now).unwrap();

    let b = session.add_row();
    session.set_field(b, "sno", "5", now).unwrap();
    session.set_field(b, "efile", "EF-B", now).unwrap();
    session.set_field(b, "startDate", "2024-02-01", now).unwrap();
    session.set_field(b, "endDate", "2024-02-21", now).unwrap();

    session.rescan_notifications();
    assert_eq!(session.notifications.count(), 1);
    let entry = &session.notifications.entries()[0];
    assert_eq!(entry.seq, "5");
    // Last record in table order wins the collision
    assert_eq!(entry.days, 20);
    assert!(entry
        .details
        .iter()
        .any(|(label, value)| label == "E-File" && value == "EF-B"));
    println!("✓ Shared sno collapses to one entry, last row wins");

    // Rescanning again with no edits changes nothing
    session.rescan_notifications();
    assert_eq!(session.notifications.count(), 1);
    assert_eq!(session.notifications.entries()[0].days, 20);
    println!("✓ rescan is idempotent");

    // Distinct snos each get an entry, newest first
    session.set_field(b, "sno", "6", now).unwrap();
    session.rescan_notifications();
    assert_eq!(session.notifications.count(), 2);
    println!("✓ Distinct snos keep separate entries");

    // The snapshot is frozen: later edits do not rewrite held entries
    session.set_field(a, "efile", "EF-EDITED", now).unwrap();
    assert!(session
        .notifications
        .entries()
        .iter()
        .any(|e| e.details.iter().any(|(_, v)| v == "EF-A")));
    println!("✓ Entries own their snapshot independent of the record");
}

fn test_deleting_a_warning_row_retracts_it() {
    println!("\n====== Testing delete retraction ======");
    let now = Instant::now();
    let mut session = TableSession::new(&CONTRACTOR_LIST);
    let idx = session.add_row();
    session.set_field(idx, "startDate", "2024-01-01", now).unwrap();
    session.set_field(idx, "endDate", "2024-01-05", now).unwrap();
    assert_eq!(session.notifications.count(), 1);

    session.delete_row(idx, now).unwrap();
    assert_eq!(session.notifications.count(), 0);
    assert_eq!(session.row_count(), 0);
    println!("✓ Deleting the row drops its warning entry");
}

fn test_row_counter() {
    println!("\n====== Testing the row counter ======");
    let now = Instant::now();
    let mut session = TableSession::new(&CONTRACTOR_LIST);

    let first = session.add_row();
    let second = session.add_row();
    assert_eq!(session.rows[first].value(&CONTRACTOR_LIST, "sno"), "1");
    assert_eq!(session.rows[second].value(&CONTRACTOR_LIST, "sno"), "2");
    println!("✓ Fresh rows autonumber from 1");

    // Deleting does not reset the counter below its floor
    session.delete_row(second, now).unwrap();
    let third = session.add_row();
    assert_eq!(session.rows[third].value(&CONTRACTOR_LIST, "sno"), "3");
    println!("✓ Counter never reuses a sequence number after delete");

    // Loaded rows raise the floor
    session.raise_counter_floor(41);
    let next = session.add_row();
    assert_eq!(session.rows[next].value(&CONTRACTOR_LIST, "sno"), "42");
    session.raise_counter_floor(7);
    assert_eq!(session.row_counter(), 42);
    println!("✓ Floor raises are monotonic");
}

fn test_filter_rows() {
    println!("\n====== Testing search filtering ======");
    let now = Instant::now();
    let mut session = TableSession::new(&CONTRACTOR_LIST);

    let a = session.add_row();
    session.set_field(a, "contractor", "Acme Builders", now).unwrap();
    session.set_field(a, "description", "Road widening", now).unwrap();

    let b = session.add_row();
    session.set_field(b, "contractor", "Zenith Corp", now).unwrap();
    session.set_field(b, "startDate", "2024-01-01", now).unwrap();
    session.set_field(b, "endDate", "2024-01-10", now).unwrap();

    assert_eq!(session.filter_rows(""), vec![0, 1]);
    assert_eq!(session.filter_rows("   "), vec![0, 1]);
    println!("✓ Empty query shows every row");

    assert_eq!(session.filter_rows("acme"), vec![0]);
    assert_eq!(session.filter_rows("ZENITH"), vec![1]);
    println!("✓ Field matching is case-insensitive");

    // The derived duration text is searchable too
    assert_eq!(session.filter_rows("days left"), vec![1]);
    println!("✓ Duration display participates in search");

    assert!(session.filter_rows("no such contractor").is_empty());
    println!("✓ No matches yields an empty result");
}

fn test_export_grid() {
    println!("\n====== Testing the export grid ======");
    let now = Instant::now();
    let mut session = TableSession::new(&CONTRACTOR_LIST);
    let idx = session.add_row();
    session.set_field(idx, "contractor", "Acme", now).unwrap();
    session.set_field(idx, "startDate", "2024-01-01", now).unwrap();
    session.set_field(idx, "endDate", "2024-01-10", now).unwrap();
    session
        .set_attachment(idx, attachment("agreement.pdf"), now)
        .unwrap();

    let (headers, rows) = session.export_grid();
    assert_eq!(
        headers,
        vec![
            "S.NO",
            "E-File",
            "Contractor",
            "Description",
            "Value",
            "Start Date",
            "End Date",
            "Duration (Days)",
            "Attachment File Name",
        ]
    );
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].len(), headers.len());
    assert_eq!(rows[0][2], "Acme");
    assert_eq!(rows[0][7], "9 days left");
    assert_eq!(rows[0][8], "agreement.pdf");
    println!("✓ Grid supplies displayed values, not record internals");

    // Empty tables refuse to export or print
    let empty = TableSession::new(&CONTRACTOR_LIST);
    let err = dashboard::downloader::to_csv(&empty).unwrap_err();
    assert_eq!(err.to_string(), "No data to export!");
    assert!(dashboard::downloader::to_print_html(&empty).is_err());
    println!("✓ Empty table raises the no-data message");

    // CSV escapes embedded commas
    session
        .set_field(idx, "description", "Phase 1, Phase 2", now)
        .unwrap();
    let csv = dashboard::downloader::to_csv(&session).unwrap();
    assert!(csv.contains("\"Phase 1, Phase 2\""));
    println!("✓ CSV escaping matches spreadsheet conventions");

    // Print view flags the warning duration cell
    let html = dashboard::downloader::to_print_html(&session).unwrap();
    assert!(html.contains("<h1>Contractor List</h1>"));
    assert!(html.contains("<td class=\"warning\">9 days left</td>"));
    println!("✓ Print document marks warning cells");
}

fn test_other_table_variants() {
    println!("\n====== Testing the other variants ======");
    let now = Instant::now();

    // Bill tracker: no duration column anywhere
    let mut bills = TableSession::new(&BILL_TRACKER);
    let idx = bills.add_row();
    bills.set_field(idx, "approvedDate", "2024-01-01", now).unwrap();
    bills.set_field(idx, "billDueDate", "2024-01-05", now).unwrap();
    assert_eq!(bills.rows[idx].duration, DurationState::Absent);
    assert_eq!(bills.notifications.count(), 0);
    let (headers, _) = bills.export_grid();
    assert!(!headers.iter().any(|h| h.contains("Duration")));
    println!("✓ Bill tracker has no derived duration");

    // EPBG register: the link toggle rides on the BG number field
    let mut epbg = TableSession::new(&EPBG_REGISTER);
    let idx = epbg.add_row();
    epbg.set_field(idx, "bgNo", "BG/2024/001", now).unwrap();
    assert_eq!(epbg.display_mode(idx), Some(DisplayMode::InputMode));
    epbg.set_attachment(idx, attachment("guarantee.pdf"), now)
        .unwrap();
    assert_eq!(epbg.display_mode(idx), Some(DisplayMode::LinkMode));
    // The contractor field does not drive the toggle here
    epbg.set_field(idx, "contractor", "", now).unwrap();
    assert_eq!(epbg.display_mode(idx), Some(DisplayMode::LinkMode));
    println!("✓ EPBG link toggle is driven by the BG number");
}

fn main() {
    println!("=== Table Engine Test Suite ===");

    test_compute_duration();
    test_date_edits_drive_duration_and_notifications();
    test_notification_dedup_and_idempotence();
    test_deleting_a_warning_row_retracts_it();
    test_row_counter();
    test_filter_rows();
    test_export_grid();
    test_other_table_variants();

    println!("\nAll tests completed.");
}
