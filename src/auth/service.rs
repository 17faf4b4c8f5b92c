//! Account registration and credential checks.
//!
//! Every account, the administrator included, lives in `users` and is
//! authenticated the same way; the role column decides what it may do.

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use crate::config::AdminConfig;
use crate::db::models::{Role, User};
use crate::error::{AppError, AppResult};

/// Create an account. Returns the new user id.
pub fn register(
    conn: &Connection,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
    hash_cost: u32,
) -> AppResult<i64> {
    let name = name.trim();
    let email = email.trim();
    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "Name, email and password are required.".into(),
        ));
    }

    let password_hash = bcrypt::hash(password, hash_cost)?;

    let inserted = conn.execute(
        "INSERT INTO users (name, email, password_hash, role) VALUES (?1, ?2, ?3, ?4)",
        params![name, email, password_hash, role],
    );

    match inserted {
        Ok(_) => {
            let id = conn.last_insert_rowid();
            tracing::info!(user_id = id, role = %role, "Account created");
            Ok(id)
        }
        Err(e) if is_unique_violation(&e) => Err(AppError::DuplicateEmail),
        Err(e) => Err(e.into()),
    }
}

/// Check an email/password pair. Unknown email and wrong password are
/// indistinguishable to the caller.
pub fn authenticate(conn: &Connection, email: &str, password: &str) -> AppResult<User> {
    let user = find_by_email(conn, email.trim())?.ok_or(AppError::InvalidCredentials)?;

    if bcrypt::verify(password, &user.password_hash).unwrap_or(false) {
        Ok(user)
    } else {
        Err(AppError::InvalidCredentials)
    }
}

/// Make sure the configured administrator exists, holds the admin role and
/// logs in with the configured password.
pub fn seed_admin(conn: &Connection, admin: &AdminConfig, hash_cost: u32) -> AppResult<()> {
    match register(
        conn,
        &admin.name,
        &admin.email,
        &admin.password,
        Role::Admin,
        hash_cost,
    ) {
        Ok(_) => {
            tracing::info!(email = %admin.email, "Seeded administrator account");
            Ok(())
        }
        Err(AppError::DuplicateEmail) => {
            // Configured password replaces the existing one
            let password_hash = bcrypt::hash(&admin.password, hash_cost)?;
            let previous: Option<Role> = conn
                .query_row(
                    "SELECT role FROM users WHERE email = ?1",
                    params![admin.email.trim()],
                    |row| row.get(0),
                )
                .optional()?;
            conn.execute(
                "UPDATE users SET role = ?1, password_hash = ?2 WHERE email = ?3",
                params![Role::Admin, password_hash, admin.email.trim()],
            )?;
            if previous == Some(Role::User) {
                tracing::warn!(email = %admin.email, "Existing account promoted to admin");
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn find_by_email(conn: &Connection, email: &str) -> AppResult<Option<User>> {
    Ok(conn
        .query_row(
            "SELECT id, name, email, password_hash, role, created_at FROM users WHERE email = ?1",
            params![email],
            map_user,
        )
        .optional()?)
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
