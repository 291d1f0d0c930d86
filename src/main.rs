use dashboard::record::DisplayMode;
use dashboard::saving::{self, Storage};
use dashboard::table::TableSession;
use dashboard::{codec, downloader, schema};

use std::env;
use std::io::{self, Write};
use std::time::Instant;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <data-dir> [table]", args[0]);
        eprintln!("Tables:");
        for table_schema in schema::builtin_schemas() {
            eprintln!("  {} ({})", table_schema.slot_key, table_schema.title);
        }
        return Ok(());
    }

    let data_dir = &args[1];
    let slot_key = args
        .get(2)
        .map(|s| s.as_str())
        .unwrap_or(schema::CONTRACTOR_LIST.slot_key);

    let Some(table_schema) = schema::by_slot_key(slot_key) else {
        eprintln!("Error: unknown table {}", slot_key);
        return Ok(());
    };

    let storage = Storage::open(data_dir)?;
    let mut session = saving::load_all(&storage, table_schema);
    println!(
        "{}: {} rows, {} warnings",
        table_schema.title,
        session.row_count(),
        session.notifications.count()
    );

    let mut status = String::from("ok");
    loop {
        // Fire the debounced autosave if its window has elapsed.
        if let Err(e) = saving::flush_due(&mut session, &storage, Instant::now()) {
            status = e.to_string();
        }

        print!("({}) > ", status);
        io::stdout().flush().unwrap();

        let mut command = String::new();
        if io::stdin().read_line(&mut command).is_err() {
            break;
        }
        let command = command.trim();

        if command.is_empty() {
            status = String::from("invalid command");
            continue;
        }

        if command == "help" {
            println!("Commands:");
            println!("  q: Save and quit");
            println!("  list: Show all rows");
            println!("  add: Append a blank row");
            println!("  set <row> <field> <value>: Edit one cell");
            println!("  attach <row> <path>: Attach a file to a row");
            println!("  clear <row>: Remove a row's attachment");
            println!("  del <row>: Delete a row");
            println!("  find <query>: Filter rows");
            println!("  notices: Show duration warnings");
            println!("  save: Save immediately");
            println!("  export <file.csv>: Export the table as CSV");
            continue;
        }

        if command == "q" {
            saving::save_now(&mut session, &storage)?;
            break;
        } else if command == "list" {
            print_rows(&session, &(0..session.row_count()).collect::<Vec<_>>());
            status = String::from("ok");
        } else if command == "add" {
            let idx = session.add_row();
            status = format!("row {} added", idx);
        } else if command == "save" {
            match saving::save_now(&mut session, &storage) {
                Ok(()) => status = String::from("Data saved successfully!"),
                Err(e) => status = e.to_string(),
            }
        } else if command == "notices" {
            for entry in session.notifications.entries() {
                println!("{}", entry.message());
                for (label, value) in &entry.details {
                    println!("  {}: {}", label, value);
                }
            }
            status = format!("{} warnings", session.notifications.count());
        } else if let Some(rest) = command.strip_prefix("set ") {
            let parts: Vec<&str> = rest.splitn(3, ' ').collect();
            if parts.len() < 3 {
                status = String::from("invalid command");
                continue;
            }
            match parts[0].parse::<usize>() {
                Ok(idx) => match session.set_field(idx, parts[1], parts[2], Instant::now()) {
                    Ok(()) => status = String::from("ok"),
                    Err(e) => status = e.to_string(),
                },
                Err(_) => status = String::from("invalid row"),
            }
        } else if let Some(rest) = command.strip_prefix("attach ") {
            let parts: Vec<&str> = rest.splitn(2, ' ').collect();
            if parts.len() < 2 {
                status = String::from("invalid command");
                continue;
            }
            match parts[0].parse::<usize>() {
                Ok(idx) => match codec::read_file(parts[1]) {
                    Ok(attachment) => {
                        match session.set_attachment(idx, attachment, Instant::now()) {
                            Ok(()) => status = String::from("ok"),
                            Err(e) => status = e.to_string(),
                        }
                    }
                    Err(e) => status = e.to_string(),
                },
                Err(_) => status = String::from("invalid row"),
            }
        } else if let Some(rest) = command.strip_prefix("clear ") {
            match rest.trim().parse::<usize>() {
                Ok(idx) => match session.clear_attachment(idx, Instant::now()) {
                    Ok(()) => status = String::from("ok"),
                    Err(e) => status = e.to_string(),
                },
                Err(_) => status = String::from("invalid row"),
            }
        } else if let Some(rest) = command.strip_prefix("del ") {
            match rest.trim().parse::<usize>() {
                Ok(idx) => match session.delete_row(idx, Instant::now()) {
                    Ok(()) => status = String::from("ok"),
                    Err(e) => status = e.to_string(),
                },
                Err(_) => status = String::from("invalid row"),
            }
        } else if let Some(query) = command.strip_prefix("find ") {
            let matches = session.filter_rows(query);
            if matches.is_empty() {
                println!("No results found");
            } else {
                print_rows(&session, &matches);
            }
            status = format!("{} matches", matches.len());
        } else if let Some(filename) = command.strip_prefix("export ") {
            match downloader::to_csv(&session) {
                Ok(csv) => match std::fs::write(filename.trim(), csv) {
                    Ok(()) => status = format!("exported to {}", filename.trim()),
                    Err(e) => status = e.to_string(),
                },
                Err(e) => status = e.to_string(),
            }
        } else {
            status = String::from("invalid command");
        }
    }

    Ok(())
}

fn print_rows(session: &TableSession, indices: &[usize]) {
    let (headers, _) = session.export_grid();
    println!("{}", headers.join(" | "));
    for &idx in indices {
        let record = &session.rows[idx];
        let mut cells = record.values.clone();
        if session.schema.duration.is_some() {
            cells.push(record.duration.display());
        }
        cells.push(
            record
                .attachment
                .as_ref()
                .map(|a| a.file_name.clone())
                .unwrap_or_default(),
        );
        let marker = if record.display_mode(session.schema) == DisplayMode::LinkMode {
            " [link]"
        } else {
            ""
        };
        println!("{}: {}{}", idx, cells.join(" | "), marker);
    }
    println!("Total: {}", indices.len());
}
