//! Database row types. These map directly to SQLite rows and are kept
//! distinct from the pledge-types domain models.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use uuid::Uuid;

use pledge_types::models::{AuditFields, Promise, RefreshToken, User};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct RefreshTokenRow {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub expires_at: String,
}

pub struct PromiseRow {
    pub id: String,
    pub user_id: String,
    pub parent_id: Option<String>,
    pub title: String,
    pub description: String,
    pub deadline: String,
    pub status: String,
    pub is_private: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub(crate) const USER_COLUMNS: &str = "id, username, email, password, role, created_at, updated_at";

pub(crate) const REFRESH_TOKEN_COLUMNS: &str = "id, user_id, token, expires_at";

pub(crate) const PROMISE_COLUMNS: &str =
    "id, user_id, parent_id, title, description, deadline, status, is_private, created_at, updated_at";

impl UserRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password: row.get(3)?,
            role: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    pub fn into_model(self) -> Result<User> {
        Ok(User {
            id: parse_uuid(&self.id)?,
            role: self
                .role
                .parse()
                .with_context(|| format!("user {}", self.id))?,
            audit: AuditFields {
                created_at: parse_timestamp(&self.created_at)?,
                updated_at: parse_timestamp(&self.updated_at)?,
            },
            username: self.username,
            email: self.email,
            password_hash: self.password,
        })
    }
}

impl RefreshTokenRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            token: row.get(2)?,
            expires_at: row.get(3)?,
        })
    }

    pub fn into_model(self) -> Result<RefreshToken> {
        Ok(RefreshToken {
            id: parse_uuid(&self.id)?,
            user_id: parse_uuid(&self.user_id)?,
            expires_at: parse_timestamp(&self.expires_at)?,
            token: self.token,
        })
    }
}

impl PromiseRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            parent_id: row.get(2)?,
            title: row.get(3)?,
            description: row.get(4)?,
            deadline: row.get(5)?,
            status: row.get(6)?,
            is_private: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    pub fn into_model(self) -> Result<Promise> {
        Ok(Promise {
            id: parse_uuid(&self.id)?,
            user_id: parse_uuid(&self.user_id)?,
            parent_id: self.parent_id.as_deref().map(parse_uuid).transpose()?,
            deadline: parse_timestamp(&self.deadline)?,
            status: self
                .status
                .parse()
                .with_context(|| format!("promise {}", self.id))?,
            is_private: self.is_private,
            audit: AuditFields {
                created_at: parse_timestamp(&self.created_at)?,
                updated_at: parse_timestamp(&self.updated_at)?,
            },
            title: self.title,
            description: self.description,
        })
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    raw.parse()
        .with_context(|| format!("corrupt uuid '{}'", raw))
}

/// Timestamps are written as RFC 3339. Rows written by SQLite's own
/// `datetime('now')` default come back as "YYYY-MM-DD HH:MM:SS" without a zone.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("corrupt timestamp '{}'", raw))
}

/// Fixed-width UTC form so text ordering matches time ordering. Full
/// nanosecond precision, so a record reads back exactly as it was written.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
