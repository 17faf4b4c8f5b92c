use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::{Issue, IssueDetail, IssueSummary, StatusLogEntry};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::issues::uploads::{ImageStore, UploadedImage, MAX_IMAGES_PER_ISSUE};

pub const INITIAL_STATUS: &str = "Reported";

pub const SPAM_REASON: &str = "Spam";

/// Statuses offered on the admin dashboard.
pub const STATUS_CHOICES: &[&str] = &["Reported", "In Progress", "Resolved"];

#[derive(Debug, Clone)]
pub struct NewIssue {
    pub title: String,
    pub description: String,
    pub category: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl NewIssue {
    fn validate(&self) -> AppResult<()> {
        if self.title.trim().is_empty()
            || self.description.trim().is_empty()
            || self.category.trim().is_empty()
        {
            return Err(AppError::Validation(
                "Please fill all required fields.".into(),
            ));
        }
        validate_coordinates(self.latitude, self.longitude)
    }
}

pub fn validate_coordinates(latitude: f64, longitude: f64) -> AppResult<()> {
    let valid = latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude);
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(
            "Latitude and longitude must be valid coordinates.".into(),
        ))
    }
}

/// What happened to a report and its attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOutcome {
    pub issue_id: i64,
    pub images_accepted: usize,
    pub images_submitted: usize,
}

impl ReportOutcome {
    pub fn summary(&self) -> String {
        if self.images_accepted < self.images_submitted {
            format!(
                "Issue reported successfully! {} of {} images accepted (up to {} png, jpg, jpeg, gif or webp files).",
                self.images_accepted, self.images_submitted, MAX_IMAGES_PER_ISSUE
            )
        } else {
            "Issue reported successfully!".to_string()
        }
    }
}

/// Store a new issue with its images and the initial status entry.
///
/// Only the first three uploads are considered; of those, files without an
/// allowed extension or without content are skipped. Rows are written in a
/// single transaction and image files are removed again if it fails.
pub fn create_issue(
    conn: &mut Connection,
    store: &ImageStore,
    actor: &CurrentUser,
    new: NewIssue,
    images: Vec<UploadedImage>,
) -> AppResult<ReportOutcome> {
    new.validate()?;

    let images_submitted = images.len();
    let mut stored = Vec::new();
    for image in images.iter().take(MAX_IMAGES_PER_ISSUE) {
        let Some(ext) = image.accepted_extension() else {
            tracing::debug!(file = %image.file_name, "Skipping upload");
            continue;
        };
        match store.save(&ext, &image.bytes) {
            Ok(name) => stored.push(name),
            Err(e) => {
                discard(store, &stored);
                return Err(e.into());
            }
        }
    }

    let issue_id = match insert_report(conn, actor.id, &new, &stored) {
        Ok(id) => id,
        Err(e) => {
            discard(store, &stored);
            return Err(e.into());
        }
    };

    tracing::info!(
        issue_id,
        user_id = actor.id,
        images = stored.len(),
        "Issue reported"
    );

    Ok(ReportOutcome {
        issue_id,
        images_accepted: stored.len(),
        images_submitted,
    })
}

fn insert_report(
    conn: &mut Connection,
    user_id: i64,
    new: &NewIssue,
    image_paths: &[String],
) -> rusqlite::Result<i64> {
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO issues (user_id, title, description, category, latitude, longitude, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user_id,
            new.title.trim(),
            new.description.trim(),
            new.category.trim(),
            new.latitude,
            new.longitude,
            INITIAL_STATUS
        ],
    )?;
    let issue_id = tx.last_insert_rowid();

    for path in image_paths {
        tx.execute(
            "INSERT INTO images (issue_id, image_path) VALUES (?1, ?2)",
            params![issue_id, path],
        )?;
    }

    tx.execute(
        "INSERT INTO status_logs (issue_id, status) VALUES (?1, ?2)",
        params![issue_id, INITIAL_STATUS],
    )?;
    tx.commit()?;

    Ok(issue_id)
}

fn discard(store: &ImageStore, names: &[String]) {
    for name in names {
        store.remove(name);
    }
}

pub fn list_issues(conn: &Connection) -> AppResult<Vec<IssueSummary>> {
    query_summaries(
        conn,
        "SELECT id, title, category, status FROM issues ORDER BY id",
        [],
    )
}

pub fn list_issues_for_user(conn: &Connection, user_id: i64) -> AppResult<Vec<IssueSummary>> {
    query_summaries(
        conn,
        "SELECT id, title, category, status FROM issues WHERE user_id = ?1 ORDER BY id",
        params![user_id],
    )
}

fn query_summaries<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> AppResult<Vec<IssueSummary>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| {
            Ok(IssueSummary {
                id: row.get(0)?,
                title: row.get(1)?,
                category: row.get(2)?,
                status: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_issue_detail(conn: &Connection, issue_id: i64) -> AppResult<IssueDetail> {
    let issue = conn
        .query_row(
            "SELECT id, user_id, title, description, category, latitude, longitude, status, created_at
             FROM issues WHERE id = ?1",
            params![issue_id],
            |row| {
                Ok(Issue {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    title: row.get(2)?,
                    description: row.get(3)?,
                    category: row.get(4)?,
                    latitude: row.get(5)?,
                    longitude: row.get(6)?,
                    status: row.get(7)?,
                    created_at: row.get(8)?,
                })
            },
        )
        .optional()?
        .ok_or(AppError::NotFound)?;

    let image_paths = conn
        .prepare("SELECT image_path FROM images WHERE issue_id = ?1 ORDER BY id")?
        .query_map(params![issue_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    let status_history = conn
        .prepare(
            "SELECT id, issue_id, status, timestamp FROM status_logs
             WHERE issue_id = ?1 ORDER BY timestamp DESC, id DESC",
        )?
        .query_map(params![issue_id], |row| {
            Ok(StatusLogEntry {
                id: row.get(0)?,
                issue_id: row.get(1)?,
                status: row.get(2)?,
                timestamp: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(IssueDetail {
        issue,
        image_paths,
        status_history,
    })
}

/// Record a spam flag. The issue is not required to exist.
pub fn flag_issue(conn: &Connection, issue_id: i64) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO flags (issue_id, reason) VALUES (?1, ?2)",
        params![issue_id, SPAM_REASON],
    )?;
    tracing::info!(issue_id, "Issue flagged");
    Ok(conn.last_insert_rowid())
}

/// Admin-only: set the current status and append it to the history.
pub fn update_status(
    conn: &mut Connection,
    actor: &CurrentUser,
    issue_id: i64,
    new_status: &str,
) -> AppResult<()> {
    actor.require_admin()?;

    let new_status = new_status.trim();
    if new_status.is_empty() {
        return Err(AppError::Validation("Status cannot be empty.".into()));
    }

    let tx = conn.transaction()?;
    let updated = tx.execute(
        "UPDATE issues SET status = ?1 WHERE id = ?2",
        params![new_status, issue_id],
    )?;
    if updated == 0 {
        return Err(AppError::NotFound);
    }
    tx.execute(
        "INSERT INTO status_logs (issue_id, status) VALUES (?1, ?2)",
        params![issue_id, new_status],
    )?;
    tx.commit()?;

    tracing::info!(issue_id, status = new_status, by = actor.id, "Issue status updated");
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::models::Role;
    use crate::db::test_connection;

    pub(crate) fn actor(conn: &Connection, role: Role) -> CurrentUser {
        let email = format!("{}@example.com", role);
        conn.execute(
            "INSERT INTO users (name, email, password_hash, role) VALUES ('Tester', ?1, 'h', ?2)",
            params![email, role],
        )
        .unwrap();
        CurrentUser {
            id: conn.last_insert_rowid(),
            name: "Tester".into(),
            email,
            role,
        }
    }

    pub(crate) fn pothole() -> NewIssue {
        NewIssue {
            title: "Pothole on Main St".into(),
            description: "Deep enough to lose a wheel".into(),
            category: "Pothole".into(),
            latitude: 12.9716,
            longitude: 77.5946,
        }
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .unwrap()
    }

    fn store() -> (tempfile::TempDir, ImageStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = ImageStore::new(tmp.path().join("uploads"));
        (tmp, store)
    }

    #[test]
    fn create_issue_writes_initial_status_entry() {
        let mut conn = test_connection();
        let (_tmp, store) = store();
        let user = actor(&conn, Role::User);

        let outcome = create_issue(&mut conn, &store, &user, pothole(), Vec::new()).unwrap();

        let detail = get_issue_detail(&conn, outcome.issue_id).unwrap();
        assert_eq!(detail.issue.status, INITIAL_STATUS);
        assert_eq!(detail.issue.user_id, user.id);
        assert_eq!(detail.status_history.len(), 1);
        assert_eq!(detail.status_history[0].status, "Reported");
        assert!(detail.image_paths.is_empty());
    }

    #[test]
    fn create_issue_with_empty_title_fails_without_rows() {
        let mut conn = test_connection();
        let (_tmp, store) = store();
        let user = actor(&conn, Role::User);
        let new = NewIssue {
            title: "".into(),
            description: "x".into(),
            category: "Pothole".into(),
            ..pothole()
        };

        let err = create_issue(&mut conn, &store, &user, new, Vec::new()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(count(&conn, "issues"), 0);
        assert_eq!(count(&conn, "status_logs"), 0);
    }

    #[test]
    fn create_issue_rejects_out_of_range_coordinates() {
        let mut conn = test_connection();
        let (_tmp, store) = store();
        let user = actor(&conn, Role::User);
        for (lat, lon) in [(91.0, 0.0), (0.0, -180.5), (f64::NAN, 0.0)] {
            let new = NewIssue {
                latitude: lat,
                longitude: lon,
                ..pothole()
            };
            let err = create_issue(&mut conn, &store, &user, new, Vec::new()).unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        assert_eq!(count(&conn, "issues"), 0);
    }

    #[test]
    fn only_first_three_images_are_kept_in_order() {
        let mut conn = test_connection();
        let (_tmp, store) = store();
        let user = actor(&conn, Role::User);
        let images = vec![
            UploadedImage::new("a.png", b"a".to_vec()),
            UploadedImage::new("b.jpg", b"b".to_vec()),
            UploadedImage::new("c.gif", b"c".to_vec()),
            UploadedImage::new("d.webp", b"d".to_vec()),
        ];

        let outcome = create_issue(&mut conn, &store, &user, pothole(), images).unwrap();
        assert_eq!(outcome.images_accepted, 3);
        assert_eq!(outcome.images_submitted, 4);

        let detail = get_issue_detail(&conn, outcome.issue_id).unwrap();
        let contents: Vec<Vec<u8>> = detail
            .image_paths
            .iter()
            .map(|p| std::fs::read(store.resolve(p).unwrap()).unwrap())
            .collect();
        assert_eq!(contents, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        assert!(detail.image_paths[1].ends_with(".jpg"));
    }

    #[test]
    fn disallowed_extension_is_dropped_and_reported() {
        let mut conn = test_connection();
        let (_tmp, store) = store();
        let user = actor(&conn, Role::User);
        let images = vec![
            UploadedImage::new("photo.PNG", b"png".to_vec()),
            UploadedImage::new("virus.exe", b"MZ".to_vec()),
            UploadedImage::new("empty.jpg", Vec::new()),
            UploadedImage::new("other.jpeg", b"jpeg".to_vec()),
        ];

        let outcome = create_issue(&mut conn, &store, &user, pothole(), images).unwrap();
        // Only the first three are considered, and two of those are unusable
        assert_eq!(outcome.images_accepted, 1);
        assert_eq!(outcome.images_submitted, 4);
        assert!(outcome.summary().contains("1 of 4 images accepted"));

        let detail = get_issue_detail(&conn, outcome.issue_id).unwrap();
        assert_eq!(detail.image_paths.len(), 1);
        assert!(detail.image_paths[0].ends_with(".png"));
    }

    #[test]
    fn summary_is_plain_when_everything_was_kept() {
        let outcome = ReportOutcome {
            issue_id: 1,
            images_accepted: 2,
            images_submitted: 2,
        };
        assert_eq!(outcome.summary(), "Issue reported successfully!");
    }

    #[test]
    fn failed_insert_rolls_back_and_removes_files() {
        let mut conn = test_connection();
        let (_tmp, store) = store();
        // No such user row, so the issue insert violates its foreign key
        let ghost = CurrentUser {
            id: 999,
            name: "Ghost".into(),
            email: "ghost@example.com".into(),
            role: Role::User,
        };
        let images = vec![UploadedImage::new("a.png", b"a".to_vec())];

        let err = create_issue(&mut conn, &store, &ghost, pothole(), images).unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(count(&conn, "issues"), 0);
        assert_eq!(count(&conn, "images"), 0);
        let leftover = std::fs::read_dir(store.root()).unwrap().count();
        assert_eq!(leftover, 0);
    }

    #[test]
    fn list_issues_returns_all_and_profile_filters_by_owner() {
        let mut conn = test_connection();
        let (_tmp, store) = store();
        let alice = actor(&conn, Role::User);
        let admin = actor(&conn, Role::Admin);
        create_issue(&mut conn, &store, &alice, pothole(), Vec::new()).unwrap();
        let mine = NewIssue {
            title: "Broken streetlight".into(),
            category: "Lighting".into(),
            ..pothole()
        };
        create_issue(&mut conn, &store, &admin, mine, Vec::new()).unwrap();

        let all = list_issues(&conn).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "Pothole on Main St");
        assert_eq!(all[1].category, "Lighting");

        let own = list_issues_for_user(&conn, admin.id).unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].title, "Broken streetlight");
    }

    #[test]
    fn missing_issue_detail_is_not_found() {
        let conn = test_connection();
        assert!(matches!(
            get_issue_detail(&conn, 41),
            Err(AppError::NotFound)
        ));
    }

    #[test]
    fn non_admin_cannot_update_status() {
        let mut conn = test_connection();
        let (_tmp, store) = store();
        let user = actor(&conn, Role::User);
        let id = create_issue(&mut conn, &store, &user, pothole(), Vec::new())
            .unwrap()
            .issue_id;

        let err = update_status(&mut conn, &user, id, "Resolved").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));

        let detail = get_issue_detail(&conn, id).unwrap();
        assert_eq!(detail.issue.status, "Reported");
        assert_eq!(detail.status_history.len(), 1);
    }

    #[test]
    fn admin_update_overwrites_status_and_appends_one_entry() {
        let mut conn = test_connection();
        let (_tmp, store) = store();
        let user = actor(&conn, Role::User);
        let admin = actor(&conn, Role::Admin);
        let id = create_issue(&mut conn, &store, &user, pothole(), Vec::new())
            .unwrap()
            .issue_id;

        update_status(&mut conn, &admin, id, "In Progress").unwrap();
        let detail = get_issue_detail(&conn, id).unwrap();
        assert_eq!(detail.issue.status, "In Progress");
        assert_eq!(detail.status_history.len(), 2);

        update_status(&mut conn, &admin, id, "Resolved").unwrap();
        let detail = get_issue_detail(&conn, id).unwrap();
        assert_eq!(detail.issue.status, "Resolved");
        let history: Vec<&str> = detail
            .status_history
            .iter()
            .map(|e| e.status.as_str())
            .collect();
        // Newest first
        assert_eq!(history, vec!["Resolved", "In Progress", "Reported"]);
    }

    #[test]
    fn update_status_on_missing_issue_leaves_no_log() {
        let mut conn = test_connection();
        let admin = actor(&conn, Role::Admin);
        let err = update_status(&mut conn, &admin, 404, "Resolved").unwrap_err();
        assert!(matches!(err, AppError::NotFound));
        assert_eq!(count(&conn, "status_logs"), 0);
    }

    #[test]
    fn update_status_requires_a_value() {
        let mut conn = test_connection();
        let admin = actor(&conn, Role::Admin);
        let err = update_status(&mut conn, &admin, 1, "   ").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn flags_accumulate_without_dedup() {
        let mut conn = test_connection();
        let (_tmp, store) = store();
        let user = actor(&conn, Role::User);
        let id = create_issue(&mut conn, &store, &user, pothole(), Vec::new())
            .unwrap()
            .issue_id;

        flag_issue(&conn, id).unwrap();
        flag_issue(&conn, id).unwrap();
        let reasons: Vec<String> = conn
            .prepare("SELECT reason FROM flags WHERE issue_id = ?1")
            .unwrap()
            .query_map([id], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(reasons, vec!["Spam", "Spam"]);
    }

    #[test]
    fn flagging_a_nonexistent_issue_is_accepted() {
        // Orphan flags are tolerated: no existence check before insert
        let conn = test_connection();
        flag_issue(&conn, 123_456).unwrap();
        assert_eq!(count(&conn, "flags"), 1);
    }
}
