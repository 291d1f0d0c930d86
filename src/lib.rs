/*!
# Record Tracker

A browser-based record-tracking dashboard, built in Rust.

## Overview

The application maintains several near-identical tabular registers (a
contractor list, a bill tracker and an EPBG register) with per-cell
editing, inline file attachments, search filtering, print view and
spreadsheet export. Data is persisted client-side style: every table
serializes to its own durable key-value slot as a JSON snapshot,
autosaved on a debounced timer after each edit.

Where the three tables used to be three copies of the same page script,
here a single engine is parameterized by a schema descriptor (field list,
which fields are dates, which field drives the duration column, which
field toggles between input and attachment link).

## Architecture

### Core Engine
- Schema Descriptors - Field sets and derived-field rules per table variant
- Row Model - Record state, link/input display mode, attachment handles
- Derived-Field Recalculator - Days-remaining duration with a 60-day
  warning threshold
- Notification Center - Deduplicated duration warnings and badge count
- Persistence Engine - JSON slot save/load, debounced autosave policy,
  compressed whole-table snapshots

### Web Layer (feature `web`)
- Technologies: Rust, axum
- REST API over the table sessions, attachment upload/viewing, XLSX/CSV
  download, print document, snapshot import/export
- Mock login gate with seeded accounts and cookie sessions

### Data Persistence Layer
- One JSON document per table in the storage directory
- Attachments stored inline as base64 data URLs (10MB cap)
- Gzip-compressed bincode snapshots for table transfer

## Modules

- **schema**: Table variant descriptors (fields, dates, link field, duration rule)
- **record**: Record struct, display mode, duration state, view handles
- **codec**: Attachment encoding/decoding and the size gate
- **table**: Per-table session state and edit operations
- **notify**: Duration warning aggregation
- **saving**: Storage slots, debounced autosave, snapshots
- **downloader**: Export functionality (CSV, XLSX, print HTML)
- **login**: Mock authentication and session management
- **app**: Routing and handlers

## REST API Endpoints

- `/api/tables` - List table variants with row and warning counts
- `/api/{table}/rows` - Retrieve or append rows
- `/api/{table}/cell` - Apply one cell edit
- `/api/{table}/attachment` - Upload, clear or view a row's attachment
- `/api/{table}/save` - Explicit save, bypassing the autosave window
- `/api/{table}/export` - Download the table as a spreadsheet
- `/api/{table}/print` - Printable document
- `/api/{table}/snapshot` - Compressed table snapshot download/import
*/

// Re-export all modules so they appear in the documentation
pub mod codec;
pub mod downloader;
pub mod error;
pub mod notify;
pub mod record;
pub mod saving;
pub mod schema;
pub mod table;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod login;

/// Re-export everything from these modules to make it easier to use
pub use codec::*;
pub use downloader::*;
pub use error::*;
pub use notify::*;
pub use record::*;
pub use saving::*;
pub use schema::*;
pub use table::*;
