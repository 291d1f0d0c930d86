#![cfg(not(tarpaulin_include))]

use crate::error::{Error, Result};
use crate::table::TableSession;

/// Convert a table to CSV format
///
/// Exports the visible grid of a table (field values plus the derived
/// duration column and the attachment filename) to CSV. Special
/// characters (commas, quotes, newlines) are properly escaped.
///
/// # Arguments
/// * `session` - The table session to convert
///
/// # Returns
/// * `Result<String>` - CSV content as a string, or `Error::EmptyTable`
///   when there are no rows to export
pub fn to_csv(session: &TableSession) -> Result<String> {
    if session.rows.is_empty() {
        return Err(Error::EmptyTable);
    }

    let (headers, rows) = session.export_grid();
    let mut csv_content = String::new();

    push_csv_row(&mut csv_content, &headers);
    for row in &rows {
        push_csv_row(&mut csv_content, row);
    }

    Ok(csv_content)
}

fn push_csv_row(out: &mut String, row: &[String]) {
    for (i, value) in row.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if value.contains(',') || value.contains('"') || value.contains('\n') {
            let escaped = value.replace('"', "\"\"");
            out.push_str(&format!("\"{}\"", escaped));
        } else {
            out.push_str(value);
        }
    }
    out.push('\n');
}

/// Convert a table to XLSX format
///
/// Exports the same visible grid to an Excel workbook using the
/// rust_xlsxwriter library, with per-column widths from the schema.
///
/// # Arguments
/// * `session` - The table session to convert
///
/// # Returns
/// * `Result<Vec<u8>>` - XLSX file content as bytes, or `Error::EmptyTable`
///   when there are no rows to export
#[cfg(feature = "web")]
pub fn to_xlsx(session: &TableSession) -> Result<Vec<u8>> {
    use rust_xlsxwriter::{Workbook, Worksheet};

    if session.rows.is_empty() {
        return Err(Error::EmptyTable);
    }

    let (headers, rows) = session.export_grid();

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();

    for (c, header) in headers.iter().enumerate() {
        worksheet.write_string(0, c as u16, header.as_str())?;
    }
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            worksheet.write_string((r + 1) as u32, c as u16, value.as_str())?;
        }
    }
    for (c, width) in session.schema.column_widths().iter().enumerate() {
        worksheet.set_column_width(c as u16, *width as f64)?;
    }

    workbook.push_worksheet(worksheet);

    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}

/// Filename for a spreadsheet export, stamped with today's date:
/// `<table>_export_<ISO-date>.xlsx`.
pub fn export_filename(session: &TableSession) -> String {
    format!(
        "{}_export_{}.xlsx",
        session.schema.export_stem,
        chrono::Local::now().format("%Y-%m-%d")
    )
}

/// Render a standalone printable HTML document from the visible grid.
/// Duration cells in a warning state carry the `warning` class. Returns
/// `Error::EmptyTable` when there is nothing to print.
pub fn to_print_html(session: &TableSession) -> Result<String> {
    if session.rows.is_empty() {
        return Err(Error::EmptyTable);
    }

    let (headers, rows) = session.export_grid();
    let duration_col = session.schema.duration.map(|_| session.schema.fields.len());

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    html.push_str(&format!(
        "<title>{} - Print</title>\n",
        escape_html(session.schema.title)
    ));
    html.push_str(
        "<style>\n\
         body { font-family: Arial, sans-serif; padding: 20px; }\n\
         h1 { text-align: center; color: #333; }\n\
         table { width: 100%; border-collapse: collapse; margin-top: 20px; }\n\
         th, td { border: 1px solid #333; padding: 10px; text-align: left; }\n\
         th { background-color: #7b2cbf; color: white; font-weight: bold; }\n\
         tr:nth-child(even) { background-color: #f2f2f2; }\n\
         .warning { color: #ff0000; font-weight: bold; }\n\
         </style>\n</head>\n<body>\n",
    );
    html.push_str(&format!("<h1>{}</h1>\n", escape_html(session.schema.title)));
    html.push_str("<table>\n<thead>\n<tr>\n");
    for header in &headers {
        html.push_str(&format!("<th>{}</th>\n", escape_html(header)));
    }
    html.push_str("</tr>\n</thead>\n<tbody>\n");

    for (idx, row) in rows.iter().enumerate() {
        let warning = session.rows[idx].duration.warning();
        html.push_str("<tr>\n");
        for (c, value) in row.iter().enumerate() {
            if Some(c) == duration_col && warning {
                html.push_str(&format!(
                    "<td class=\"warning\">{}</td>\n",
                    escape_html(value)
                ));
            } else {
                html.push_str(&format!("<td>{}</td>\n", escape_html(value)));
            }
        }
        html.push_str("</tr>\n");
    }

    html.push_str("</tbody>\n</table>\n</body>\n</html>\n");
    Ok(html)
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
