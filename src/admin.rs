use rusqlite::{Connection, OptionalExtension};

use crate::db::models::FlaggedIssue;
use crate::error::AppResult;
use crate::extractors::CurrentUser;

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueStatusRow {
    pub id: i64,
    pub title: String,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct DashboardStats {
    pub total_issues: i64,
    pub top_category: Option<CategoryCount>,
    pub flagged_issues: Vec<FlaggedIssue>,
    pub all_issues: Vec<IssueStatusRow>,
}

/// Aggregates for the admin dashboard. Admin only.
pub fn dashboard_stats(conn: &Connection, actor: &CurrentUser) -> AppResult<DashboardStats> {
    actor.require_admin()?;

    let total_issues: i64 = conn.query_row("SELECT COUNT(*) FROM issues", [], |r| r.get(0))?;

    // Ties go to whichever group SQLite yields first
    let top_category = conn
        .query_row(
            "SELECT category, COUNT(*) AS n FROM issues GROUP BY category ORDER BY n DESC LIMIT 1",
            [],
            |row| {
                Ok(CategoryCount {
                    category: row.get(0)?,
                    count: row.get(1)?,
                })
            },
        )
        .optional()?;

    // Inner join: flags on missing issues are not listed
    let flagged_issues = conn
        .prepare(
            "SELECT i.id, i.title, COUNT(f.id) AS flag_count
             FROM issues i
             JOIN flags f ON f.issue_id = i.id
             GROUP BY i.id
             HAVING flag_count >= 1
             ORDER BY flag_count DESC, i.id",
        )?
        .query_map([], |row| {
            Ok(FlaggedIssue {
                id: row.get(0)?,
                title: row.get(1)?,
                flag_count: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let all_issues = conn
        .prepare("SELECT id, title, status FROM issues ORDER BY id")?
        .query_map([], |row| {
            Ok(IssueStatusRow {
                id: row.get(0)?,
                title: row.get(1)?,
                status: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DashboardStats {
        total_issues,
        top_category,
        flagged_issues,
        all_issues,
    })
}
