use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

use crate::extractors::CurrentUser;

/// Create a new session for a user. Returns the session token.
/// Expired sessions are pruned first.
pub fn create_session(conn: &Connection, user_id: i64, hours: u64) -> rusqlite::Result<String> {
    let pruned = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= datetime('now')",
        [],
    )?;
    if pruned > 0 {
        tracing::debug!(pruned, "Removed expired sessions");
    }

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Resolve an unexpired session token to its user.
pub fn lookup(conn: &Connection, token: &str) -> rusqlite::Result<Option<CurrentUser>> {
    conn.query_row(
        "SELECT u.id, u.name, u.email, u.role FROM sessions s \
         JOIN users u ON u.id = s.user_id \
         WHERE s.token = ?1 AND s.expires_at > datetime('now')",
        params![token],
        |row| {
            Ok(CurrentUser {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                role: row.get(3)?,
            })
        },
    )
    .optional()
}

/// Delete a session by token.
pub fn delete_session(conn: &Connection, token: &str) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;
    use crate::db::test_connection;

    fn insert_user(conn: &Connection) -> i64 {
        conn.execute(
            "INSERT INTO users (name, email, password_hash, role) VALUES ('Ada', 'ada@example.com', 'h', 'admin')",
            [],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn created_session_resolves_to_user() {
        let conn = test_connection();
        let user_id = insert_user(&conn);
        let token = create_session(&conn, user_id, 1).unwrap();

        let user = lookup(&conn, &token).unwrap().unwrap();
        assert_eq!(user.id, user_id);
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.role, Role::Admin);
    }

    #[test]
    fn expired_session_is_ignored() {
        let conn = test_connection();
        let user_id = insert_user(&conn);
        conn.execute(
            "INSERT INTO sessions (id, user_id, token, expires_at) VALUES ('s1', ?1, 'old', datetime('now', '-1 hours'))",
            params![user_id],
        )
        .unwrap();
        assert!(lookup(&conn, "old").unwrap().is_none());
    }

    #[test]
    fn deleted_session_no_longer_resolves() {
        let conn = test_connection();
        let user_id = insert_user(&conn);
        let token = create_session(&conn, user_id, 1).unwrap();
        delete_session(&conn, &token).unwrap();
        assert!(lookup(&conn, &token).unwrap().is_none());
    }

    #[test]
    fn creating_a_session_prunes_expired_ones() {
        let conn = test_connection();
        let user_id = insert_user(&conn);
        conn.execute(
            "INSERT INTO sessions (id, user_id, token, expires_at) VALUES ('s1', ?1, 'old', datetime('now', '-1 hours'))",
            params![user_id],
        )
        .unwrap();

        let token = create_session(&conn, user_id, 1).unwrap();
        let tokens: Vec<String> = conn
            .prepare("SELECT token FROM sessions")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(tokens, vec![token]);
    }
}
