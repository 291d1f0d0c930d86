#![cfg(not(tarpaulin_include))]

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, create_dir_all};
use std::io::{Read, Write};
use std::sync::RwLock;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// A registered application user.
///
/// The login gate is a mock: accounts are seeded locally on first run and
/// exist only so the header can show who is "signed in". The tracking core
/// never depends on identity.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    /// Username (unique identifier for the user)
    pub username: String,

    /// Name shown in the page header
    pub display_name: String,

    /// Either "admin" or "user"
    pub role: String,

    /// Argon2 hash of the user's password
    pub password_hash: String,
}

impl User {
    /// Cosmetic role label for the profile widget.
    pub fn role_label(&self) -> &'static str {
        if self.role == "admin" { "Administrator" } else { "User" }
    }
}

/// Credential data received from the login form.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserCredentials {
    pub username: String,
    pub password: String,
}

/// An authenticated user session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Username of the authenticated user
    pub user_id: String,

    /// Time when the session expires
    pub expires_at: SystemTime,
}

lazy_static! {
    static ref SESSIONS: RwLock<HashMap<String, Session>> = RwLock::new(HashMap::new());
}

// Constants
const USERS_FILE: &str = "database/users.json";
const DATABASE_DIR: &str = "database";
const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds

/// Initialize the user store, seeding the default mock accounts
/// (admin/admin123 and viewer/viewer123) when no users file exists yet.
pub fn init_database() -> std::io::Result<()> {
    if !std::path::Path::new(DATABASE_DIR).exists() {
        create_dir_all(DATABASE_DIR)?;
    }

    let users_path = std::path::Path::new(USERS_FILE);
    if !users_path.exists() {
        let users = seed_users().map_err(std::io::Error::other)?;
        let json = serde_json::to_string_pretty(&users).map_err(std::io::Error::other)?;
        let mut file = File::create(users_path)?;
        file.write_all(json.as_bytes())?;
    }

    Ok(())
}

fn seed_users() -> Result<HashMap<String, User>, String> {
    let mut users = HashMap::new();
    for (username, display_name, role, password) in [
        ("admin", "Administrator", "admin", "admin123"),
        ("viewer", "Viewer", "user", "viewer123"),
    ] {
        users.insert(
            username.to_string(),
            User {
                username: username.to_string(),
                display_name: display_name.to_string(),
                role: role.to_string(),
                password_hash: hash_password(password)?,
            },
        );
    }
    Ok(users)
}

/// Read the users file into a map of all registered users.
pub fn get_users() -> Result<HashMap<String, User>, String> {
    let mut file = match File::open(USERS_FILE) {
        Ok(file) => file,
        Err(_) => return Err("Failed to open users file".to_string()),
    };

    let mut contents = String::new();
    if file.read_to_string(&mut contents).is_err() {
        return Err("Failed to read users file".to_string());
    }

    match serde_json::from_str(&contents) {
        Ok(users) => Ok(users),
        Err(_) => Err("Failed to parse users data".to_string()),
    }
}

fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    match Argon2::default().hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(_) => Err("Failed to hash password".to_string()),
    }
}

fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Check credentials against the user store.
pub fn verify_user(username: &str, password: &str) -> Result<User, String> {
    let users = get_users()?;
    match users.get(username) {
        Some(user) if verify_password(&user.password_hash, password) => Ok(user.clone()),
        _ => Err("Invalid username or password".to_string()),
    }
}

/// Create a session for a verified user and return its token.
pub fn create_session(username: &str) -> String {
    let token = Uuid::new_v4().to_string();
    let session = Session {
        user_id: username.to_string(),
        expires_at: SystemTime::now() + Duration::from_secs(SESSION_DURATION),
    };
    SESSIONS.write().unwrap().insert(token.clone(), session);
    token
}

/// Resolve a session token to its username, expiring stale sessions.
pub fn validate_session(token: &str) -> Option<String> {
    let mut sessions = SESSIONS.write().unwrap();
    match sessions.get(token) {
        Some(session) if session.expires_at > SystemTime::now() => Some(session.user_id.clone()),
        Some(_) => {
            sessions.remove(token);
            None
        }
        None => None,
    }
}

pub fn destroy_session(token: &str) {
    SESSIONS.write().unwrap().remove(token);
}

/// The display name the page header reads; this is the only thing the rest
/// of the application ever asks the login collaborator for.
pub fn display_name(token: &str) -> Option<String> {
    let username = validate_session(token)?;
    let users = get_users().ok()?;
    users.get(&username).map(|u| u.display_name.clone())
}

/// Verify credentials and open a session in one step.
pub fn login(username: &str, password: &str) -> Result<(String, User), String> {
    let user = verify_user(username, password)?;
    let token = create_session(&user.username);
    Ok((token, user))
}
