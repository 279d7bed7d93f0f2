use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use pledge_types::models::{Promise, RefreshToken, User};
use pledge_types::store::{
    PromiseStore, RefreshTokenStore, StoreError, StoreResult, UserStore,
};

use crate::Database;
use crate::models::{
    PROMISE_COLUMNS, PromiseRow, REFRESH_TOKEN_COLUMNS, RefreshTokenRow, USER_COLUMNS, UserRow,
    format_timestamp,
};

// -- Users --

impl UserStore for Database {
    fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user.id.to_string(),
                    user.username,
                    user.email,
                    user.password_hash,
                    user.role.as_str(),
                    format_timestamp(&user.audit.created_at),
                    format_timestamp(&user.audit.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = self.with_conn(|conn| query_user(conn, "id", &id.to_string()))?;
        row.map(UserRow::into_model).transpose().map_err(StoreError::from)
    }

    fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = self.with_conn(|conn| query_user(conn, "email", email))?;
        row.map(UserRow::into_model).transpose().map_err(StoreError::from)
    }

    fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row = self.with_conn(|conn| query_user(conn, "username", username))?;
        row.map(UserRow::into_model).transpose().map_err(StoreError::from)
    }

    fn email_exists(&self, email: &str) -> StoreResult<bool> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                [email],
                |r| r.get(0),
            )
        })
    }

    fn username_exists(&self, username: &str) -> StoreResult<bool> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                [username],
                |r| r.get(0),
            )
        })
    }

    fn list_users(&self) -> StoreResult<Vec<User>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at"
            ))?;
            let rows = stmt
                .query_map([], UserRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        rows.into_iter()
            .map(UserRow::into_model)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(StoreError::from)
    }

    fn update_user(&self, user: &User) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET username = ?2, role = ?3, updated_at = ?4 WHERE id = ?1",
                params![
                    user.id.to_string(),
                    user.username,
                    user.role.as_str(),
                    format_timestamp(&user.audit.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }
}

// -- Refresh tokens --

impl RefreshTokenStore for Database {
    fn insert_refresh_token(&self, token: &RefreshToken) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO refresh_tokens (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    token.id.to_string(),
                    token.user_id.to_string(),
                    token.token,
                    format_timestamp(&token.expires_at),
                ],
            )?;
            Ok(())
        })
    }

    fn refresh_token(&self, token: &str) -> StoreResult<Option<RefreshToken>> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {REFRESH_TOKEN_COLUMNS} FROM refresh_tokens WHERE token = ?1"),
                [token],
                RefreshTokenRow::from_row,
            )
            .optional()
        })?;
        row.map(RefreshTokenRow::into_model)
            .transpose()
            .map_err(StoreError::from)
    }

    fn delete_refresh_token(&self, token: &str) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM refresh_tokens WHERE token = ?1", [token])?;
            Ok(n > 0)
        })
    }
}

// -- Promises --

impl PromiseStore for Database {
    fn insert_promise(&self, promise: &Promise) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!("INSERT INTO promises ({PROMISE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
                params![
                    promise.id.to_string(),
                    promise.user_id.to_string(),
                    promise.parent_id.map(|p| p.to_string()),
                    promise.title,
                    promise.description,
                    format_timestamp(&promise.deadline),
                    promise.status.as_str(),
                    promise.is_private,
                    format_timestamp(&promise.audit.created_at),
                    format_timestamp(&promise.audit.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    fn promise_by_id(&self, id: Uuid) -> StoreResult<Option<Promise>> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {PROMISE_COLUMNS} FROM promises WHERE id = ?1"),
                [id.to_string()],
                PromiseRow::from_row,
            )
            .optional()
        })?;
        row.map(PromiseRow::into_model)
            .transpose()
            .map_err(StoreError::from)
    }

    fn promises_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Promise>> {
        let user_id = user_id.to_string();
        self.query_promises("WHERE user_id = ?1", &[&user_id])
    }

    fn promises_by_parent(&self, parent_id: Uuid) -> StoreResult<Vec<Promise>> {
        let parent_id = parent_id.to_string();
        self.query_promises("WHERE parent_id = ?1", &[&parent_id])
    }

    fn all_promises(&self) -> StoreResult<Vec<Promise>> {
        self.query_promises("", &[])
    }

    fn public_promises(&self) -> StoreResult<Vec<Promise>> {
        self.query_promises("WHERE is_private = 0", &[])
    }

    fn update_promise(&self, promise: &Promise) -> StoreResult<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "UPDATE promises
                 SET title = ?2, description = ?3, deadline = ?4, status = ?5,
                     is_private = ?6, updated_at = ?7
                 WHERE id = ?1",
                params![
                    promise.id.to_string(),
                    promise.title,
                    promise.description,
                    format_timestamp(&promise.deadline),
                    promise.status.as_str(),
                    promise.is_private,
                    format_timestamp(&promise.audit.updated_at),
                ],
            )?;
            if promise.is_root() {
                // Progress entries always share their root's visibility
                tx.execute(
                    "UPDATE promises SET is_private = ?2 WHERE parent_id = ?1",
                    params![promise.id.to_string(), promise.is_private],
                )?;
            }
            tx.commit()
        })
    }

    fn delete_promise(&self, id: Uuid) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM promises WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }
}

impl Database {
    fn query_promises(
        &self,
        filter: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> StoreResult<Vec<Promise>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PROMISE_COLUMNS} FROM promises {filter} ORDER BY created_at"
            ))?;
            let rows = stmt
                .query_map(args, PromiseRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        rows.into_iter()
            .map(PromiseRow::into_model)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(StoreError::from)
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> rusqlite::Result<Option<UserRow>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"),
        [value],
        UserRow::from_row,
    )
    .optional()
}
