use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;

use crate::level::MembershipLevel;
use crate::normalize::MemberRecord;
use crate::search;
use crate::update::MemberPatch;

const MEMBER_COLUMNS: &str = "id, firstname, lastname, phone, email, board_contact, \
     membership_level, attendance_notes, outreach_notes, tickets_feb_2026, tickets_apr, active";

/// A stored member row, serialized under its column names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Member {
    pub id: i64,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub board_contact: Option<String>,
    pub membership_level: Option<String>,
    pub attendance_notes: Option<String>,
    pub outreach_notes: Option<String>,
    pub tickets_feb_2026: Option<i64>,
    pub tickets_apr: Option<i64>,
    pub active: bool,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).with_context(|| {
                    format!("failed to create database directory {}", dir.display())
                })?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;

        let mut db = Self { conn };
        db.setup()?;
        Ok(db)
    }

    fn setup(&mut self) -> Result<()> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "synchronous", "FULL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;

        // member.id is a plain rowid alias (no AUTOINCREMENT) so ids restart
        // at 1 after a full replace.
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS membership (
              id    INTEGER PRIMARY KEY,
              level TEXT UNIQUE NOT NULL
            );

            CREATE TABLE IF NOT EXISTS member (
              id               INTEGER PRIMARY KEY,
              firstname        TEXT,
              lastname         TEXT,
              phone            TEXT,
              email            TEXT,
              board_contact    TEXT,
              membership_level TEXT REFERENCES membership(level),
              attendance_notes TEXT,
              outreach_notes   TEXT,
              tickets_feb_2026 INTEGER,
              tickets_apr      INTEGER,
              active           INTEGER NOT NULL DEFAULT 1,
              search_text      TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_member_name ON member(lastname, firstname);
        "#,
        )?;

        self.ensure_search_column()?;
        self.seed_levels()?;
        Ok(())
    }

    fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", table))?;
        let rows = stmt.query_map([], |row: &Row| -> rusqlite::Result<String> { row.get(1) })?;
        for r in rows {
            if r? == column {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Add and backfill `member.search_text` in stores created without it.
    fn ensure_search_column(&mut self) -> Result<()> {
        if self.column_exists("member", "search_text")? {
            return Ok(());
        }
        self.conn.execute_batch(
            "ALTER TABLE member ADD COLUMN search_text TEXT NOT NULL DEFAULT '';",
        )?;

        let members = self.list_members(None)?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut stmt = tx.prepare("UPDATE member SET search_text = ?1 WHERE id = ?2")?;
            for member in &members {
                stmt.execute(params![member_search_text(member), member.id])?;
            }
        }
        tx.commit()?;
        log::info!("backfilled search text for {} members", members.len());
        Ok(())
    }

    fn seed_levels(&mut self) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO membership (id, level) VALUES (?1, ?2)")?;
            for (index, level) in MembershipLevel::ALL.iter().enumerate() {
                stmt.execute(params![index as i64 + 1, level.as_str()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Replace the whole member table with `records`.
    ///
    /// Runs in one transaction: if any insert fails the previous rows stay.
    pub fn replace_members(&mut self, records: &[MemberRecord]) -> Result<usize> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute("DELETE FROM member", [])
            .context("failed to clear member table")?;

        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO member (
                     firstname, lastname, phone, email, board_contact,
                     membership_level, attendance_notes, outreach_notes,
                     tickets_feb_2026, tickets_apr, active, search_text
                   ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"#,
            )?;

            for (index, record) in records.iter().enumerate() {
                stmt.execute(params![
                    record.first_name,
                    record.last_name,
                    record.phone,
                    record.email,
                    record.board_contact,
                    record.membership_level.map(|l| l.as_str()),
                    record.attendance_notes,
                    record.outreach_notes,
                    record.tickets_feb,
                    record.tickets_apr,
                    record.active,
                    search::search_text([
                        record.first_name.as_deref(),
                        record.last_name.as_deref(),
                        record.email.as_deref(),
                        record.phone.as_deref(),
                        record.board_contact.as_deref(),
                    ]),
                ])
                .with_context(|| format!("failed to insert member #{}", index + 1))?;
            }
        }

        tx.commit()?;
        Ok(records.len())
    }

    /// All members ordered by last then first name (missing names last),
    /// optionally filtered by a case-insensitive substring of name, email,
    /// phone or board contact.
    pub fn list_members(&self, filter: Option<&str>) -> Result<Vec<Member>> {
        let mut sql = format!("SELECT {} FROM member", MEMBER_COLUMNS);

        let pattern = filter.and_then(search::normalize_query).map(|q| search::like_pattern(&q));
        if pattern.is_some() {
            sql.push_str(r#" WHERE search_text LIKE ?1 ESCAPE '\'"#);
        }
        sql.push_str(
            " ORDER BY lastname IS NULL, lastname COLLATE NOCASE, \
             firstname IS NULL, firstname COLLATE NOCASE, id",
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = match pattern {
            Some(ref p) => stmt.query_map([p.as_str()], row_to_member)?,
            None => stmt.query_map([], row_to_member)?,
        };

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn get_member(&self, id: i64) -> Result<Option<Member>> {
        let sql = format!("SELECT {} FROM member WHERE id = ?1", MEMBER_COLUMNS);
        let member = self
            .conn
            .query_row(&sql, [id], row_to_member)
            .optional()?;
        Ok(member)
    }

    /// Apply `patch` to one member. Returns `None` when no such member
    /// exists; any store error rolls the update back.
    pub fn update_member(&mut self, id: i64, patch: &MemberPatch) -> Result<Option<Member>> {
        let assignments = patch.assignments();
        let set_clause = assignments
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{} = ?{}", column.as_str(), i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE member SET {} WHERE id = ?{}",
            set_clause,
            assignments.len() + 1
        );

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut values: Vec<rusqlite::types::Value> =
            assignments.into_iter().map(|(_, value)| value).collect();
        values.push(rusqlite::types::Value::Integer(id));

        let changed = tx
            .execute(&sql, params_from_iter(values))
            .with_context(|| format!("failed to update member {}", id))?;
        if changed == 0 {
            return Ok(None);
        }

        let select = format!("SELECT {} FROM member WHERE id = ?1", MEMBER_COLUMNS);
        let member = tx.query_row(&select, [id], row_to_member)?;
        tx.execute(
            "UPDATE member SET search_text = ?1 WHERE id = ?2",
            params![member_search_text(&member), id],
        )?;
        tx.commit()?;
        Ok(Some(member))
    }

    pub fn membership_levels(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT level FROM membership ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn member_search_text(member: &Member) -> String {
    search::search_text([
        member.firstname.as_deref(),
        member.lastname.as_deref(),
        member.email.as_deref(),
        member.phone.as_deref(),
        member.board_contact.as_deref(),
    ])
}

fn row_to_member(row: &Row<'_>) -> rusqlite::Result<Member> {
    Ok(Member {
        id: row.get(0)?,
        firstname: row.get(1)?,
        lastname: row.get(2)?,
        phone: row.get(3)?,
        email: row.get(4)?,
        board_contact: row.get(5)?,
        membership_level: row.get(6)?,
        attendance_notes: row.get(7)?,
        outreach_notes: row.get(8)?,
        tickets_feb_2026: row.get(9)?,
        tickets_apr: row.get(10)?,
        active: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn open_temp() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(&dir.path().join("nested").join("roster.db")).unwrap();
        (dir, db)
    }

    fn record(first: Option<&str>, last: Option<&str>) -> MemberRecord {
        MemberRecord {
            first_name: first.map(str::to_string),
            last_name: last.map(str::to_string),
            phone: None,
            email: None,
            board_contact: None,
            outreach_notes: None,
            membership_level: None,
            attendance_notes: None,
            tickets_feb: None,
            tickets_apr: None,
            active: true,
        }
    }

    fn sample() -> Vec<MemberRecord> {
        vec![
            MemberRecord {
                phone: Some("5103348246".into()),
                email: Some("ada@example.org".into()),
                membership_level: Some(MembershipLevel::Bush),
                tickets_feb: Some(2),
                ..record(Some("Ada"), Some("Lovelace"))
            },
            MemberRecord {
                board_contact: Some("Ada".into()),
                membership_level: Some(MembershipLevel::Student),
                active: false,
                ..record(Some("Grace"), Some("hopper"))
            },
            record(None, Some("Babbage")),
        ]
    }

    #[test]
    fn test_levels_seeded_in_vocabulary_order() {
        let (_dir, db) = open_temp();
        assert_eq!(
            db.membership_levels().unwrap(),
            vec![
                "Bush",
                "Eisenhower",
                "Lincoln",
                "Reagan",
                "Roosevelt",
                "family",
                "individual",
                "student"
            ]
        );
    }

    #[test]
    fn test_reopen_does_not_duplicate_levels() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.db");
        drop(Database::open(&path).unwrap());
        let db = Database::open(&path).unwrap();
        assert_eq!(db.membership_levels().unwrap().len(), 8);
    }

    #[test]
    fn test_replace_and_list_ordering() {
        let (_dir, mut db) = open_temp();
        assert_eq!(db.replace_members(&sample()).unwrap(), 3);

        let names: Vec<_> = db
            .list_members(None)
            .unwrap()
            .into_iter()
            .map(|m| m.lastname.unwrap())
            .collect();
        assert_eq!(names, vec!["Babbage", "hopper", "Lovelace"]);
    }

    #[test]
    fn test_replace_is_idempotent() {
        let (_dir, mut db) = open_temp();
        db.replace_members(&sample()).unwrap();
        let first = db.list_members(None).unwrap();
        db.replace_members(&sample()).unwrap();
        let second = db.list_members(None).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.iter().map(|m| m.id).min(), Some(1));
    }

    #[test]
    fn test_failed_replace_keeps_previous_rows() {
        let (_dir, mut db) = open_temp();
        db.replace_members(&sample()).unwrap();

        // Sabotage the insert so the second batch fails partway.
        db.conn
            .execute_batch(
                "CREATE TRIGGER reject_babbage BEFORE INSERT ON member
                 WHEN NEW.lastname = 'Babbage'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let err = db.replace_members(&sample()).unwrap_err();
        assert!(format!("{:#}", err).contains("rejected"));
        assert_eq!(db.list_members(None).unwrap().len(), 3);
    }

    #[test]
    fn test_search_matches_name_email_phone_board_contact() {
        let (_dir, mut db) = open_temp();
        db.replace_members(&sample()).unwrap();

        let hits = |q: &str| -> Vec<String> {
            db.list_members(Some(q))
                .unwrap()
                .into_iter()
                .filter_map(|m| m.lastname)
                .collect()
        };

        assert_eq!(hits("LOVE"), vec!["Lovelace"]);
        assert_eq!(hits("example.org"), vec!["Lovelace"]);
        assert_eq!(hits("334"), vec!["Lovelace"]);
        assert_eq!(hits("ada"), vec!["hopper", "Lovelace"]);
        assert_eq!(hits("   ").len(), 3);
        assert!(hits("100%").is_empty());
    }

    #[test]
    fn test_search_folds_non_ascii_case() {
        let (_dir, mut db) = open_temp();
        let mut records = sample();
        records.push(record(Some("Émile"), Some("Zola")));
        db.replace_members(&records).unwrap();

        for query in ["ÉMILE", "émile", "Émile", "zOLA"] {
            let hits = db.list_members(Some(query)).unwrap();
            assert_eq!(hits.len(), 1, "{query}");
            assert_eq!(hits[0].lastname.as_deref(), Some("Zola"));
        }
    }

    #[test]
    fn test_search_follows_updated_fields() {
        let (_dir, mut db) = open_temp();
        db.replace_members(&sample()).unwrap();

        let patch = MemberPatch::from_json(&json!({"lastname": "Ørsted"})).unwrap();
        db.update_member(3, &patch).unwrap().unwrap();

        assert!(db.list_members(Some("babbage")).unwrap().is_empty());
        let hits = db.list_members(Some("ØRSTED")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 3);
    }

    #[test]
    fn test_reopen_backfills_search_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE member (
                   id INTEGER PRIMARY KEY, firstname TEXT, lastname TEXT,
                   phone TEXT, email TEXT, board_contact TEXT,
                   membership_level TEXT, attendance_notes TEXT,
                   outreach_notes TEXT, tickets_feb_2026 INTEGER,
                   tickets_apr INTEGER, active INTEGER NOT NULL DEFAULT 1
                 );
                 INSERT INTO member (firstname, lastname) VALUES ('Émile', 'Zola');",
            )
            .unwrap();
        }

        let db = Database::open(&path).unwrap();
        let hits = db.list_members(Some("ÉMILE")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].lastname.as_deref(), Some("Zola"));
    }

    #[test]
    fn test_missing_names_sort_last() {
        let (_dir, mut db) = open_temp();
        db.replace_members(&[
            record(Some("Cher"), None),
            record(Some("Ada"), Some("Lovelace")),
            record(None, Some("Lovelace")),
            record(Some("Émile"), Some("Zola")),
        ])
        .unwrap();

        let names: Vec<_> = db
            .list_members(None)
            .unwrap()
            .into_iter()
            .map(|m| (m.firstname, m.lastname))
            .collect();
        assert_eq!(
            names,
            vec![
                (Some("Ada".to_string()), Some("Lovelace".to_string())),
                (None, Some("Lovelace".to_string())),
                (Some("Émile".to_string()), Some("Zola".to_string())),
                (Some("Cher".to_string()), None),
            ]
        );
    }

    #[test]
    fn test_get_member() {
        let (_dir, mut db) = open_temp();
        db.replace_members(&sample()).unwrap();

        let ada = db.get_member(1).unwrap().unwrap();
        assert_eq!(ada.firstname.as_deref(), Some("Ada"));
        assert_eq!(ada.membership_level.as_deref(), Some("Bush"));
        assert_eq!(ada.tickets_feb_2026, Some(2));
        assert!(ada.active);
        assert!(!db.get_member(2).unwrap().unwrap().active);
        assert_eq!(db.get_member(99).unwrap(), None);
    }

    #[test]
    fn test_update_member() {
        let (_dir, mut db) = open_temp();
        db.replace_members(&sample()).unwrap();

        let patch = MemberPatch::from_json(&json!({
            "tickets_apr": "4",
            "membership_level": "lincoln",
            "active": "no",
            "phone": null,
        }))
        .unwrap();

        let updated = db.update_member(1, &patch).unwrap().unwrap();
        assert_eq!(updated.tickets_apr, Some(4));
        assert_eq!(updated.membership_level.as_deref(), Some("Lincoln"));
        assert!(!updated.active);
        assert_eq!(updated.phone, None);
        assert_eq!(updated.firstname.as_deref(), Some("Ada"));

        assert_eq!(db.update_member(42, &patch).unwrap(), None);
    }

    #[test]
    fn test_member_serializes_with_column_names() {
        let (_dir, mut db) = open_temp();
        db.replace_members(&sample()).unwrap();
        let value = serde_json::to_value(db.get_member(1).unwrap().unwrap()).unwrap();
        assert_eq!(value["firstname"], "Ada");
        assert_eq!(value["tickets_feb_2026"], 2);
        assert_eq!(value["active"], true);
        assert!(value["tickets_apr"].is_null());
    }
}
