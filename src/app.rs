use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::downloader;
use crate::error::Error;
use crate::login;
use crate::record::DisplayMode;
use crate::saving::{self, Storage};
use crate::schema;
use crate::table::TableSession;

pub struct AppState {
    storage: Storage,
    tables: HashMap<&'static str, Mutex<TableSession>>,
}

impl AppState {
    fn table(&self, key: &str) -> Option<&Mutex<TableSession>> {
        self.tables.get(key)
    }
}

#[derive(Deserialize)]
struct CellUpdate {
    row: usize,
    field: String,
    value: String,
}

#[derive(Deserialize)]
struct RowRef {
    row: usize,
}

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

#[derive(Serialize)]
struct CellResponse {
    status: String,
    duration: Option<String>,
    warning: bool,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: Option<String>,
}

impl StatusResponse {
    fn ok() -> StatusResponse {
        StatusResponse {
            status: "ok".to_string(),
            message: None,
        }
    }

    fn error(message: impl Into<String>) -> StatusResponse {
        StatusResponse {
            status: "error".to_string(),
            message: Some(message.into()),
        }
    }
}

const LANDING: &str = "<!DOCTYPE html>\n<html>\n<head><title>Record Tracker</title></head>\n<body>\n\
<h1>Record Tracker</h1>\n\
<p>Tables: <a href=\"/api/tables\">/api/tables</a></p>\n\
<p>Rows: /api/&lt;table&gt;/rows &middot; Export: /api/&lt;table&gt;/export &middot; Print: /api/&lt;table&gt;/print</p>\n\
</body>\n</html>\n";

pub async fn run(data_dir: &str) -> Result<(), Box<dyn std::error::Error>> {
    login::init_database()?;
    let storage = Storage::open(data_dir)?;

    // Rehydrate every table variant from its storage slot up front.
    let mut tables = HashMap::new();
    for table_schema in schema::builtin_schemas() {
        let session = saving::load_all(&storage, table_schema);
        tables.insert(table_schema.slot_key, Mutex::new(session));
    }

    let app_state = Arc::new(AppState { storage, tables });

    // The debounce deadline lives in each session; this task is the clock
    // that fires due saves, the way the page's setTimeout used to.
    let autosave_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(250));
        loop {
            interval.tick().await;
            for table_schema in schema::builtin_schemas() {
                if let Some(table) = autosave_state.table(table_schema.slot_key) {
                    let mut session = table.lock().unwrap();
                    if let Err(err) =
                        saving::flush_due(&mut session, &autosave_state.storage, Instant::now())
                    {
                        log::error!("autosave for {} failed: {}", table_schema.slot_key, err);
                    }
                }
            }
        }
    });

    // Build router
    let app = Router::new()
        .route("/", get(serve_landing))
        .route("/api/tables", get(list_tables))
        .route("/api/login", post(login_user))
        .route("/api/logout", post(logout_user))
        .route("/api/me", get(current_user))
        .route("/api/:table/rows", get(get_rows).post(add_row))
        .route("/api/:table/cell", post(update_cell))
        .route("/api/:table/delete", post(delete_row))
        .route("/api/:table/save", post(save_table))
        .route("/api/:table/search", get(search_rows))
        .route("/api/:table/notifications", get(get_notifications))
        .route("/api/:table/attachment", post(upload_attachment))
        .route("/api/:table/attachment/clear", post(clear_attachment))
        .route("/api/:table/attachment/:row", get(view_attachment))
        .route("/api/:table/export", get(export_xlsx))
        .route("/api/:table/csv", get(export_csv))
        .route("/api/:table/print", get(print_view))
        .route("/api/:table/snapshot", get(download_snapshot))
        .route("/api/:table/import", post(import_snapshot))
        .nest_service("/static", ServeDir::new("static"))
        .with_state(app_state);

    // Start server
    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    println!("Listening on http://127.0.0.1:3000");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_landing() -> Html<&'static str> {
    Html(LANDING)
}

async fn list_tables(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut tables = Vec::new();
    for table_schema in schema::builtin_schemas() {
        if let Some(table) = state.table(table_schema.slot_key) {
            let session = table.lock().unwrap();
            tables.push(json!({
                "slot": table_schema.slot_key,
                "title": table_schema.title,
                "rows": session.row_count(),
                "warnings": session.notifications.count(),
            }));
        }
    }
    Json(json!({ "tables": tables }))
}

fn row_json(session: &TableSession, idx: usize) -> serde_json::Value {
    let record = &session.rows[idx];
    let mut fields = serde_json::Map::new();
    for (field, value) in session.schema.fields.iter().zip(&record.values) {
        fields.insert(field.key.to_string(), json!(value));
    }
    json!({
        "index": idx,
        "fields": fields,
        "duration": record.duration.display(),
        "warning": record.duration.warning(),
        "linkMode": record.display_mode(session.schema) == DisplayMode::LinkMode,
        "fileName": record
            .attachment
            .as_ref()
            .map(|a| a.file_name.clone())
            .unwrap_or_default(),
    })
}

async fn get_rows(
    Path(table): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let Some(table) = state.table(&table) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let session = table.lock().unwrap();

    let rows: Vec<_> = (0..session.row_count())
        .map(|idx| row_json(&session, idx))
        .collect();
    Json(json!({
        "rows": rows,
        "total": session.row_count(),
        "badge": session.notifications.count(),
    }))
    .into_response()
}

async fn add_row(
    Path(table): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let Some(table) = state.table(&table) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let mut session = table.lock().unwrap();
    let idx = session.add_row();
    Json(row_json(&session, idx)).into_response()
}

async fn update_cell(
    Path(table): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CellUpdate>,
) -> impl IntoResponse {
    let Some(table) = state.table(&table) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let mut session = table.lock().unwrap();

    match session.set_field(payload.row, &payload.field, &payload.value, Instant::now()) {
        Ok(()) => {
            let record = &session.rows[payload.row];
            Json(CellResponse {
                status: "ok".to_string(),
                duration: Some(record.duration.display()),
                warning: record.duration.warning(),
            })
            .into_response()
        }
        Err(err) => Json(CellResponse {
            status: err.to_string(),
            duration: None,
            warning: false,
        })
        .into_response(),
    }
}

async fn delete_row(
    Path(table): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RowRef>,
) -> impl IntoResponse {
    let Some(table) = state.table(&table) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let mut session = table.lock().unwrap();

    if let Err(err) = session.delete_row(payload.row, Instant::now()) {
        return Json(StatusResponse::error(err.to_string())).into_response();
    }
    // Deletion is persisted immediately rather than waiting out the window.
    match saving::save_now(&mut session, &state.storage) {
        Ok(()) => Json(StatusResponse::ok()).into_response(),
        Err(err) => Json(StatusResponse::error(err.to_string())).into_response(),
    }
}

async fn save_table(
    Path(table): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let Some(table) = state.table(&table) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let mut session = table.lock().unwrap();

    match saving::save_now(&mut session, &state.storage) {
        Ok(()) => Json(StatusResponse {
            status: "ok".to_string(),
            message: Some("Data saved successfully!".to_string()),
        })
        .into_response(),
        Err(err) => Json(StatusResponse::error(err.to_string())).into_response(),
    }
}

async fn search_rows(
    Path(table): Path<String>,
    Query(params): Query<SearchQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let Some(table) = state.table(&table) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let session = table.lock().unwrap();

    let query = params.q.unwrap_or_default();
    let matches = session.filter_rows(&query);
    let rows: Vec<_> = matches.iter().map(|&idx| row_json(&session, idx)).collect();
    Json(json!({ "rows": rows, "total": rows.len() })).into_response()
}

async fn get_notifications(
    Path(table): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let Some(table) = state.table(&table) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let session = table.lock().unwrap();

    let entries: Vec<_> = session
        .notifications
        .entries()
        .iter()
        .map(|entry| {
            json!({
                "sno": entry.seq,
                "days": entry.days,
                "message": entry.message(),
                "details": entry
                    .details
                    .iter()
                    .map(|(label, value)| json!({ "label": label, "value": value }))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();
    Json(json!({
        "count": session.notifications.count(),
        "entries": entries,
    }))
    .into_response()
}

async fn upload_attachment(
    Path(table): Path<String>,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let Some(table) = state.table(&table) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let mut row: Option<usize> = None;
    let mut attachment = None;

    while let Some(field) = multipart.next_field().await.unwrap_or(None) {
        match field.name().unwrap_or("") {
            "row" => {
                let text = field.text().await.unwrap_or_default();
                row = text.trim().parse().ok();
            }
            "file" => {
                let file_name = field.file_name().unwrap_or("attachment").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.unwrap_or_default().to_vec();
                attachment = Some(crate::record::Attachment {
                    file_name,
                    mime_type,
                    bytes,
                });
            }
            _ => {}
        }
    }

    let (Some(row), Some(attachment)) = (row, attachment) else {
        return Json(StatusResponse::error("No file data received")).into_response();
    };

    let mut session = table.lock().unwrap();
    match session.set_attachment(row, attachment, Instant::now()) {
        Ok(()) => Json(StatusResponse::ok()).into_response(),
        // The oversize rejection carries the user-facing alert text.
        Err(err @ Error::OversizedFile { .. }) => {
            Json(StatusResponse::error(err.to_string())).into_response()
        }
        Err(err) => Json(StatusResponse::error(err.to_string())).into_response(),
    }
}

async fn clear_attachment(
    Path(table): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RowRef>,
) -> impl IntoResponse {
    let Some(table) = state.table(&table) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let mut session = table.lock().unwrap();

    match session.clear_attachment(payload.row, Instant::now()) {
        Ok(()) => Json(StatusResponse::ok()).into_response(),
        Err(err) => Json(StatusResponse::error(err.to_string())).into_response(),
    }
}

/// Stream the attachment bytes for in-browser viewing; this is what the
/// link-mode cell points at.
async fn view_attachment(
    Path((table, row)): Path<(String, usize)>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let Some(table) = state.table(&table) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let session = table.lock().unwrap();

    match session.rows.get(row).and_then(|r| r.attachment.as_ref()) {
        Some(attachment) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, attachment.mime_type.clone())
            .header(
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", attachment.file_name),
            )
            .body(axum::body::Body::from(attachment.bytes.clone()))
            .unwrap(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn export_xlsx(
    Path(table): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let Some(table) = state.table(&table) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let session = table.lock().unwrap();

    match downloader::to_xlsx(&session) {
        Ok(buffer) => Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            )
            .header(
                header::CONTENT_DISPOSITION,
                format!(
                    "attachment; filename=\"{}\"",
                    downloader::export_filename(&session)
                ),
            )
            .body(axum::body::Body::from(buffer))
            .unwrap(),
        Err(err) => (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::error(err.to_string())),
        )
            .into_response(),
    }
}

async fn export_csv(
    Path(table): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let Some(table) = state.table(&table) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let session = table.lock().unwrap();

    match downloader::to_csv(&session) {
        Ok(csv) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/csv")
            .body(axum::body::Body::from(csv))
            .unwrap(),
        Err(err) => (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::error(err.to_string())),
        )
            .into_response(),
    }
}

async fn print_view(
    Path(table): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let Some(table) = state.table(&table) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let session = table.lock().unwrap();

    match downloader::to_print_html(&session) {
        Ok(html) => Html(html).into_response(),
        Err(err) => (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::error(err.to_string())),
        )
            .into_response(),
    }
}

async fn download_snapshot(
    Path(table): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let Some(table) = state.table(&table) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let session = table.lock().unwrap();

    match saving::backup_to_buffer(&session) {
        Ok(buffer) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/gzip")
            .body(axum::body::Body::from(buffer))
            .unwrap(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StatusResponse::error(err.to_string())),
        )
            .into_response(),
    }
}

async fn import_snapshot(
    Path(table): Path<String>,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let Some(table_schema) = schema::by_slot_key(&table) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(table) = state.table(&table) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let mut file_data = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap_or(None) {
        if field.name().unwrap_or("") == "snapshot" {
            file_data = field.bytes().await.unwrap_or_default().to_vec();
        }
    }

    if file_data.is_empty() {
        return Json(StatusResponse::error("No file data received")).into_response();
    }

    match saving::restore_from_buffer(&file_data, table_schema) {
        Ok(restored) => {
            let mut session = table.lock().unwrap();
            *session = restored;
            match saving::save_now(&mut session, &state.storage) {
                Ok(()) => Json(StatusResponse::ok()).into_response(),
                Err(err) => Json(StatusResponse::error(err.to_string())).into_response(),
            }
        }
        Err(err) => Json(StatusResponse::error(format!(
            "Failed to load snapshot: {}",
            err
        )))
        .into_response(),
    }
}

async fn login_user(
    jar: CookieJar,
    Json(credentials): Json<login::UserCredentials>,
) -> impl IntoResponse {
    match login::login(&credentials.username, &credentials.password) {
        Ok((token, user)) => {
            let cookie = Cookie::build(("session_token", token))
                .path("/")
                .http_only(true)
                .max_age(time::Duration::hours(24))
                .build();
            (
                jar.add(cookie),
                Json(json!({
                    "status": "ok",
                    "name": user.display_name,
                    "role": user.role_label(),
                })),
            )
                .into_response()
        }
        Err(message) => (
            StatusCode::UNAUTHORIZED,
            Json(StatusResponse::error(message)),
        )
            .into_response(),
    }
}

async fn logout_user(jar: CookieJar) -> impl IntoResponse {
    if let Some(cookie) = jar.get("session_token") {
        login::destroy_session(cookie.value());
    }
    (
        jar.remove(Cookie::from("session_token")),
        Json(StatusResponse::ok()),
    )
}

async fn current_user(jar: CookieJar) -> impl IntoResponse {
    let name = jar
        .get("session_token")
        .and_then(|cookie| login::display_name(cookie.value()));

    match name {
        Some(name) => Json(json!({ "authenticated": true, "name": name })).into_response(),
        None => Json(json!({ "authenticated": false })).into_response(),
    }
}
