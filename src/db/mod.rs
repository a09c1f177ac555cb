use crate::import::normalize::NormalizedDonor;
use crate::lists::ListStats;
use chrono::Utc;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use std::env;
use uuid::Uuid;

pub mod models;

use models::{Donor, DonorStatus, Event, EventDonor, EventDonorList, EventStatus, ReviewStatus, User};

pub type DbPool = Pool<SqliteConnectionManager>;

/// Filled in when a reviewer excludes a donor without giving a reason.
pub const DEFAULT_EXCLUDE_REASON: &str = "No reason provided";

pub async fn init_pool() -> anyhow::Result<DbPool> {
    let path = env::var("DONORHUB_DB").unwrap_or_else(|_| "donorhub.db".to_string());
    let manager = SqliteConnectionManager::file(&path)
        .with_init(|conn| {
            conn.execute_batch(
                "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000; PRAGMA journal_mode = WAL;",
            )
        });
    let pool = Pool::builder()
        .max_size(10)
        .connection_timeout(std::time::Duration::from_secs(60))
        .build(manager)
        .map_err(|e| anyhow::anyhow!("Failed to create DB pool: {}", e))?;

    let conn = pool.get()?;
    bootstrap_schema(&conn)?;
    Ok(pool)
}

fn bootstrap_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            name TEXT NOT NULL,
            role TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS donors (
            id TEXT PRIMARY KEY,
            first_name TEXT,
            last_name TEXT,
            organization_name TEXT,
            pmm TEXT,
            smm TEXT,
            vmm TEXT,
            total_donations REAL NOT NULL DEFAULT 0,
            total_pledges REAL NOT NULL DEFAULT 0,
            largest_gift REAL NOT NULL DEFAULT 0,
            last_gift_amount REAL NOT NULL DEFAULT 0,
            first_gift_date TEXT,
            last_gift_date TEXT,
            excluded INTEGER NOT NULL DEFAULT 0,
            deceased INTEGER NOT NULL DEFAULT 0,
            email TEXT,
            phone TEXT,
            address TEXT,
            city TEXT,
            contact_preference TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            event_type TEXT,
            event_date TEXT,
            location TEXT,
            capacity INTEGER NOT NULL,
            focus TEXT,
            criteria_min_giving_level REAL,
            list_generation_date TEXT,
            review_deadline TEXT,
            invitation_date TEXT,
            status TEXT NOT NULL,
            deleted INTEGER NOT NULL DEFAULT 0,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS event_donor_lists (
            id TEXT PRIMARY KEY,
            event_id TEXT NOT NULL UNIQUE REFERENCES events(id) ON DELETE CASCADE,
            total_donors INTEGER NOT NULL DEFAULT 0,
            approved INTEGER NOT NULL DEFAULT 0,
            excluded INTEGER NOT NULL DEFAULT 0,
            pending INTEGER NOT NULL DEFAULT 0,
            auto_excluded INTEGER NOT NULL DEFAULT 0,
            review_status TEXT NOT NULL DEFAULT 'completed',
            updated_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS event_donors (
            id TEXT PRIMARY KEY,
            donor_list_id TEXT NOT NULL REFERENCES event_donor_lists(id) ON DELETE CASCADE,
            donor_id TEXT NOT NULL REFERENCES donors(id),
            status TEXT NOT NULL,
            exclude_reason TEXT,
            reviewer_id TEXT,
            review_date TEXT,
            comments TEXT,
            auto_excluded INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            UNIQUE (donor_list_id, donor_id)
        );
        CREATE INDEX IF NOT EXISTS idx_event_donors_list ON event_donors(donor_list_id);
        CREATE INDEX IF NOT EXISTS idx_event_donors_donor ON event_donors(donor_id);",
    )?;
    Ok(())
}

fn conversion_err(what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        format!("invalid {}: {}", what, value).into(),
    )
}

fn donor_from_row(row: &rusqlite::Row) -> rusqlite::Result<Donor> {
    let tags_json: String = row.get("tags")?;
    Ok(Donor {
        id: row.get("id")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        organization_name: row.get("organization_name")?,
        pmm: row.get("pmm")?,
        smm: row.get("smm")?,
        vmm: row.get("vmm")?,
        total_donations: row.get("total_donations")?,
        total_pledges: row.get("total_pledges")?,
        largest_gift: row.get("largest_gift")?,
        last_gift_amount: row.get("last_gift_amount")?,
        first_gift_date: row.get("first_gift_date")?,
        last_gift_date: row.get("last_gift_date")?,
        excluded: row.get("excluded")?,
        deceased: row.get("deceased")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        address: row.get("address")?,
        city: row.get("city")?,
        contact_preference: row.get("contact_preference")?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        notes: row.get("notes")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn event_from_row(row: &rusqlite::Row) -> rusqlite::Result<Event> {
    let status: String = row.get("status")?;
    Ok(Event {
        id: row.get("id")?,
        name: row.get("name")?,
        event_type: row.get("event_type")?,
        event_date: row.get("event_date")?,
        location: row.get("location")?,
        capacity: row.get("capacity")?,
        focus: row.get("focus")?,
        criteria_min_giving_level: row.get("criteria_min_giving_level")?,
        list_generation_date: row.get("list_generation_date")?,
        review_deadline: row.get("review_deadline")?,
        invitation_date: row.get("invitation_date")?,
        status: EventStatus::parse(&status).ok_or_else(|| conversion_err("event status", &status))?,
        deleted: row.get("deleted")?,
        created_by: row.get("created_by")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn list_from_row(row: &rusqlite::Row) -> rusqlite::Result<EventDonorList> {
    let review: String = row.get("review_status")?;
    Ok(EventDonorList {
        id: row.get("id")?,
        event_id: row.get("event_id")?,
        total_donors: row.get("total_donors")?,
        approved: row.get("approved")?,
        excluded: row.get("excluded")?,
        pending: row.get("pending")?,
        auto_excluded: row.get("auto_excluded")?,
        review_status: ReviewStatus::parse(&review)
            .ok_or_else(|| conversion_err("review status", &review))?,
        updated_at: row.get("updated_at")?,
    })
}

fn event_donor_from_row(row: &rusqlite::Row) -> rusqlite::Result<EventDonor> {
    let status: String = row.get("status")?;
    Ok(EventDonor {
        id: row.get("id")?,
        donor_list_id: row.get("donor_list_id")?,
        donor_id: row.get("donor_id")?,
        status: DonorStatus::parse(&status).ok_or_else(|| conversion_err("donor status", &status))?,
        exclude_reason: row.get("exclude_reason")?,
        reviewer_id: row.get("reviewer_id")?,
        review_date: row.get("review_date")?,
        comments: row.get("comments")?,
        auto_excluded: row.get("auto_excluded")?,
        created_at: row.get("created_at")?,
    })
}

// ---- users -----------------------------------------------------------------

/// Upsert used to seed the admin account from the environment at startup.
pub async fn ensure_user(
    pool: &DbPool,
    username: &str,
    password_hash: &str,
    name: &str,
    role: &str,
) -> anyhow::Result<()> {
    let conn = pool.get()?;
    let updated = conn.execute(
        "UPDATE users SET password_hash = ?2, name = ?3, role = ?4 WHERE username = ?1",
        params![username, password_hash, name, role],
    )?;
    if updated == 0 {
        conn.execute(
            "INSERT INTO users (id, username, password_hash, name, role, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![Uuid::new_v4().to_string(), username, password_hash, name, role, Utc::now()],
        )?;
    }
    Ok(())
}

pub async fn find_user_by_username(
    pool: &DbPool,
    username: &str,
) -> anyhow::Result<Option<(User, String)>> {
    let conn = pool.get()?;
    let result = conn
        .query_row(
            "SELECT id, username, password_hash, name, role, created_at FROM users WHERE username = ?1",
            params![username],
            |row| {
                Ok((
                    User {
                        id: row.get("id")?,
                        username: row.get("username")?,
                        name: row.get("name")?,
                        role: row.get("role")?,
                        created_at: row.get("created_at")?,
                    },
                    row.get::<_, String>("password_hash")?,
                ))
            },
        )
        .optional()?;
    Ok(result)
}

// ---- donors ----------------------------------------------------------------

pub async fn list_donors(pool: &DbPool) -> anyhow::Result<Vec<Donor>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare("SELECT * FROM donors ORDER BY last_name, organization_name")?;
    let donors = stmt
        .query_map([], donor_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(donors)
}

pub async fn get_donor(pool: &DbPool, id: &str) -> anyhow::Result<Option<Donor>> {
    let conn = pool.get()?;
    let donor = conn
        .query_row("SELECT * FROM donors WHERE id = ?1", params![id], donor_from_row)
        .optional()?;
    Ok(donor)
}

pub async fn donor_exists(pool: &DbPool, id: &str) -> anyhow::Result<bool> {
    let conn = pool.get()?;
    let count: i64 =
        conn.query_row("SELECT COUNT(*) FROM donors WHERE id = ?1", params![id], |r| r.get(0))?;
    Ok(count > 0)
}

/// Identity fields only, for building the import matching index.
pub async fn list_donor_match_fields(
    pool: &DbPool,
) -> anyhow::Result<Vec<(String, Option<String>, Option<String>, Option<String>)>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, first_name, last_name, organization_name FROM donors ORDER BY created_at",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn insert_donor(conn: &Connection, donor: &Donor) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO donors (
            id, first_name, last_name, organization_name, pmm, smm, vmm,
            total_donations, total_pledges, largest_gift, last_gift_amount,
            first_gift_date, last_gift_date, excluded, deceased,
            email, phone, address, city, contact_preference, tags, notes,
            created_at, updated_at
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23,?24)",
        params![
            donor.id,
            donor.first_name,
            donor.last_name,
            donor.organization_name,
            donor.pmm,
            donor.smm,
            donor.vmm,
            donor.total_donations,
            donor.total_pledges,
            donor.largest_gift,
            donor.last_gift_amount,
            donor.first_gift_date,
            donor.last_gift_date,
            donor.excluded,
            donor.deceased,
            donor.email,
            donor.phone,
            donor.address,
            donor.city,
            donor.contact_preference,
            serde_json::to_string(&donor.tags)?,
            donor.notes,
            donor.created_at,
            donor.updated_at,
        ],
    )?;
    Ok(())
}

pub async fn create_donor(pool: &DbPool, donor: &Donor) -> anyhow::Result<()> {
    let conn = pool.get()?;
    insert_donor(&conn, donor)
}

pub async fn update_donor(pool: &DbPool, donor: &Donor) -> anyhow::Result<bool> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE donors SET
            first_name = ?2, last_name = ?3, organization_name = ?4,
            pmm = ?5, smm = ?6, vmm = ?7,
            total_donations = ?8, total_pledges = ?9, largest_gift = ?10, last_gift_amount = ?11,
            first_gift_date = ?12, last_gift_date = ?13, excluded = ?14, deceased = ?15,
            email = ?16, phone = ?17, address = ?18, city = ?19, contact_preference = ?20,
            tags = ?21, notes = ?22, updated_at = ?23
         WHERE id = ?1",
        params![
            donor.id,
            donor.first_name,
            donor.last_name,
            donor.organization_name,
            donor.pmm,
            donor.smm,
            donor.vmm,
            donor.total_donations,
            donor.total_pledges,
            donor.largest_gift,
            donor.last_gift_amount,
            donor.first_gift_date,
            donor.last_gift_date,
            donor.excluded,
            donor.deceased,
            donor.email,
            donor.phone,
            donor.address,
            donor.city,
            donor.contact_preference,
            serde_json::to_string(&donor.tags)?,
            donor.notes,
            Utc::now(),
        ],
    )?;
    Ok(changed > 0)
}

fn donor_from_normalized(id: String, n: &NormalizedDonor) -> Donor {
    let now = Utc::now();
    Donor {
        id,
        first_name: n.first_name.clone(),
        last_name: n.last_name.clone(),
        organization_name: n.organization_name.clone(),
        pmm: n.pmm.clone(),
        smm: n.smm.clone(),
        vmm: n.vmm.clone(),
        total_donations: n.total_donations,
        total_pledges: n.total_pledges,
        largest_gift: n.largest_gift,
        last_gift_amount: n.last_gift_amount,
        first_gift_date: n.first_gift_date,
        last_gift_date: n.last_gift_date,
        excluded: n.excluded,
        deceased: n.deceased,
        email: n.email.clone(),
        phone: n.phone.clone(),
        address: n.address.clone(),
        city: n.city.clone(),
        contact_preference: n.contact_preference.clone(),
        tags: n.tags.clone(),
        notes: n.notes.clone(),
        created_at: now,
        updated_at: now,
    }
}

pub async fn create_donor_from_import(pool: &DbPool, n: &NormalizedDonor) -> anyhow::Result<String> {
    let donor = donor_from_normalized(Uuid::new_v4().to_string(), n);
    let conn = pool.get()?;
    insert_donor(&conn, &donor)?;
    Ok(donor.id)
}

/// Import-update overwrites every imported field, so re-importing the same
/// file leaves the donor equal to the file's values.
pub async fn update_donor_from_import(
    pool: &DbPool,
    id: &str,
    n: &NormalizedDonor,
) -> anyhow::Result<()> {
    let mut donor = donor_from_normalized(id.to_string(), n);
    donor.updated_at = Utc::now();
    update_donor(pool, &donor).await?;
    Ok(())
}

/// Hard delete. Removes the donor's event_donor rows and decrements each
/// affected list's counters in the same transaction.
pub async fn delete_donor(pool: &DbPool, id: &str) -> anyhow::Result<bool> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    let memberships: Vec<(String, String)> = {
        let mut stmt =
            tx.prepare("SELECT donor_list_id, status FROM event_donors WHERE donor_id = ?1")?;
        let rows = stmt
            .query_map(params![id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows
    };

    tx.execute("DELETE FROM event_donors WHERE donor_id = ?1", params![id])?;
    for (list_id, status) in &memberships {
        let status =
            DonorStatus::parse(status).ok_or_else(|| anyhow::anyhow!("invalid status {}", status))?;
        mutate_stats(&tx, list_id, |stats| stats.remove(status))?;
    }

    let deleted = tx.execute("DELETE FROM donors WHERE id = ?1", params![id])?;
    tx.commit()?;
    Ok(deleted > 0)
}

// ---- events ----------------------------------------------------------------

/// Creates the event and its one donor list in a single transaction.
pub async fn create_event(pool: &DbPool, event: &Event) -> anyhow::Result<EventDonorList> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO events (
            id, name, event_type, event_date, location, capacity, focus,
            criteria_min_giving_level, list_generation_date, review_deadline,
            invitation_date, status, deleted, created_by, created_at, updated_at
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)",
        params![
            event.id,
            event.name,
            event.event_type,
            event.event_date,
            event.location,
            event.capacity,
            event.focus,
            event.criteria_min_giving_level,
            event.list_generation_date,
            event.review_deadline,
            event.invitation_date,
            event.status.as_str(),
            event.deleted,
            event.created_by,
            event.created_at,
            event.updated_at,
        ],
    )?;

    let list = EventDonorList {
        id: Uuid::new_v4().to_string(),
        event_id: event.id.clone(),
        total_donors: 0,
        approved: 0,
        excluded: 0,
        pending: 0,
        auto_excluded: 0,
        review_status: ReviewStatus::Completed,
        updated_at: Utc::now(),
    };
    tx.execute(
        "INSERT INTO event_donor_lists (
            id, event_id, total_donors, approved, excluded, pending, auto_excluded,
            review_status, updated_at
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
        params![
            list.id,
            list.event_id,
            list.total_donors,
            list.approved,
            list.excluded,
            list.pending,
            list.auto_excluded,
            list.review_status.as_str(),
            list.updated_at,
        ],
    )?;
    tx.commit()?;
    Ok(list)
}

pub async fn list_events(pool: &DbPool) -> anyhow::Result<Vec<Event>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare("SELECT * FROM events WHERE deleted = 0 ORDER BY created_at DESC")?;
    let events = stmt
        .query_map([], event_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(events)
}

pub async fn get_event(pool: &DbPool, id: &str) -> anyhow::Result<Option<Event>> {
    let conn = pool.get()?;
    let event = conn
        .query_row(
            "SELECT * FROM events WHERE id = ?1 AND deleted = 0",
            params![id],
            event_from_row,
        )
        .optional()?;
    Ok(event)
}

pub async fn update_event(pool: &DbPool, event: &Event) -> anyhow::Result<bool> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE events SET
            name = ?2, event_type = ?3, event_date = ?4, location = ?5, capacity = ?6,
            focus = ?7, criteria_min_giving_level = ?8, list_generation_date = ?9,
            review_deadline = ?10, invitation_date = ?11, status = ?12, updated_at = ?13
         WHERE id = ?1 AND deleted = 0",
        params![
            event.id,
            event.name,
            event.event_type,
            event.event_date,
            event.location,
            event.capacity,
            event.focus,
            event.criteria_min_giving_level,
            event.list_generation_date,
            event.review_deadline,
            event.invitation_date,
            event.status.as_str(),
            Utc::now(),
        ],
    )?;
    Ok(changed > 0)
}

pub async fn soft_delete_event(pool: &DbPool, id: &str) -> anyhow::Result<bool> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE events SET deleted = 1, updated_at = ?2 WHERE id = ?1 AND deleted = 0",
        params![id, Utc::now()],
    )?;
    Ok(changed > 0)
}

// ---- donor lists -----------------------------------------------------------

pub async fn get_list_by_event(pool: &DbPool, event_id: &str) -> anyhow::Result<Option<EventDonorList>> {
    let conn = pool.get()?;
    let list = conn
        .query_row(
            "SELECT * FROM event_donor_lists WHERE event_id = ?1",
            params![event_id],
            list_from_row,
        )
        .optional()?;
    Ok(list)
}

fn load_stats(conn: &Connection, list_id: &str) -> anyhow::Result<ListStats> {
    let stats = conn.query_row(
        "SELECT total_donors, approved, excluded, pending, auto_excluded
         FROM event_donor_lists WHERE id = ?1",
        params![list_id],
        |row| {
            Ok(ListStats {
                total_donors: row.get(0)?,
                approved: row.get(1)?,
                excluded: row.get(2)?,
                pending: row.get(3)?,
                auto_excluded: row.get(4)?,
            })
        },
    )?;
    Ok(stats)
}

fn store_stats(conn: &Connection, list_id: &str, stats: &ListStats) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE event_donor_lists SET
            total_donors = ?2, approved = ?3, excluded = ?4, pending = ?5,
            auto_excluded = ?6, review_status = ?7, updated_at = ?8
         WHERE id = ?1",
        params![
            list_id,
            stats.total_donors,
            stats.approved,
            stats.excluded,
            stats.pending,
            stats.auto_excluded,
            stats.review_status().as_str(),
            Utc::now(),
        ],
    )?;
    Ok(())
}

/// Load-mutate-store for the list counters, always inside the caller's
/// transaction so counters and membership rows move together.
fn mutate_stats<F: FnOnce(&mut ListStats)>(
    conn: &Connection,
    list_id: &str,
    f: F,
) -> anyhow::Result<()> {
    let mut stats = load_stats(conn, list_id)?;
    f(&mut stats);
    store_stats(conn, list_id, &stats)
}

pub async fn list_event_donors(pool: &DbPool, list_id: &str) -> anyhow::Result<Vec<EventDonor>> {
    let conn = pool.get()?;
    let mut stmt =
        conn.prepare("SELECT * FROM event_donors WHERE donor_list_id = ?1 ORDER BY created_at")?;
    let entries = stmt
        .query_map(params![list_id], event_donor_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

pub async fn get_event_donor(
    pool: &DbPool,
    list_id: &str,
    donor_id: &str,
) -> anyhow::Result<Option<EventDonor>> {
    let conn = pool.get()?;
    let entry = conn
        .query_row(
            "SELECT * FROM event_donors WHERE donor_list_id = ?1 AND donor_id = ?2",
            params![list_id, donor_id],
            event_donor_from_row,
        )
        .optional()?;
    Ok(entry)
}

/// Bulk add. Donors already on the list are skipped; the counters are bumped
/// once for the whole batch of actual inserts.
pub async fn add_event_donors(
    pool: &DbPool,
    list_id: &str,
    donors: &[(String, DonorStatus)],
) -> anyhow::Result<usize> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    let mut inserted = Vec::new();
    for (donor_id, status) in donors {
        let now = Utc::now();
        let auto = *status == DonorStatus::AutoExcluded;
        let reason: Option<&str> = if auto { Some("Auto-excluded") } else { None };
        let changed = tx.execute(
            "INSERT OR IGNORE INTO event_donors (
                id, donor_list_id, donor_id, status, exclude_reason, reviewer_id,
                review_date, comments, auto_excluded, created_at
            ) VALUES (?1,?2,?3,?4,?5,NULL,NULL,NULL,?6,?7)",
            params![
                Uuid::new_v4().to_string(),
                list_id,
                donor_id,
                status.as_str(),
                reason,
                auto,
                now,
            ],
        )?;
        if changed > 0 {
            inserted.push(*status);
        }
    }

    let count = inserted.len();
    if count > 0 {
        mutate_stats(&tx, list_id, |stats| stats.add_bulk(inserted))?;
    }
    tx.commit()?;
    Ok(count)
}

pub async fn remove_event_donor(pool: &DbPool, list_id: &str, donor_id: &str) -> anyhow::Result<bool> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    let status: Option<String> = tx
        .query_row(
            "SELECT status FROM event_donors WHERE donor_list_id = ?1 AND donor_id = ?2",
            params![list_id, donor_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(status) = status else {
        return Ok(false);
    };
    let status =
        DonorStatus::parse(&status).ok_or_else(|| anyhow::anyhow!("invalid status {}", status))?;

    tx.execute(
        "DELETE FROM event_donors WHERE donor_list_id = ?1 AND donor_id = ?2",
        params![list_id, donor_id],
    )?;
    mutate_stats(&tx, list_id, |stats| stats.remove(status))?;
    tx.commit()?;
    Ok(true)
}

/// Reviewer status change. Stamps review_date and reviewer_id, auto-fills the
/// exclude reason when a reviewer excludes without giving one, and shifts the
/// counters in the same transaction.
pub async fn set_event_donor_status(
    pool: &DbPool,
    list_id: &str,
    donor_id: &str,
    new_status: DonorStatus,
    exclude_reason: Option<String>,
    comments: Option<String>,
    reviewer_id: &str,
) -> anyhow::Result<Option<EventDonor>> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    let old_status: Option<String> = tx
        .query_row(
            "SELECT status FROM event_donors WHERE donor_list_id = ?1 AND donor_id = ?2",
            params![list_id, donor_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(old_status) = old_status else {
        return Ok(None);
    };
    let old_status = DonorStatus::parse(&old_status)
        .ok_or_else(|| anyhow::anyhow!("invalid status {}", old_status))?;

    let exclude_reason = if new_status == DonorStatus::Excluded {
        Some(exclude_reason.unwrap_or_else(|| DEFAULT_EXCLUDE_REASON.to_string()))
    } else {
        exclude_reason
    };

    let now = Utc::now();
    tx.execute(
        "UPDATE event_donors SET
            status = ?3, exclude_reason = ?4, comments = COALESCE(?5, comments),
            reviewer_id = ?6, review_date = ?7, auto_excluded = ?8
         WHERE donor_list_id = ?1 AND donor_id = ?2",
        params![
            list_id,
            donor_id,
            new_status.as_str(),
            exclude_reason,
            comments,
            reviewer_id,
            now,
            new_status == DonorStatus::AutoExcluded,
        ],
    )?;
    mutate_stats(&tx, list_id, |stats| stats.transition(old_status, new_status))?;

    let entry = tx
        .query_row(
            "SELECT * FROM event_donors WHERE donor_list_id = ?1 AND donor_id = ?2",
            params![list_id, donor_id],
            event_donor_from_row,
        )
        .optional()?;
    tx.commit()?;
    Ok(entry)
}

/// Full recount from the membership rows, the corrective path for counter
/// drift and the safety net after bulk operations.
pub async fn recompute_list_stats(pool: &DbPool, list_id: &str) -> anyhow::Result<EventDonorList> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    let counts: Vec<(DonorStatus, i64)> = {
        let mut stmt = tx.prepare(
            "SELECT status, COUNT(*) FROM event_donors WHERE donor_list_id = ?1 GROUP BY status",
        )?;
        let raw = stmt
            .query_map(params![list_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raw.into_iter()
            .map(|(status, count)| {
                DonorStatus::parse(&status)
                    .map(|s| (s, count))
                    .ok_or_else(|| anyhow::anyhow!("invalid status {}", status))
            })
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    let stats = ListStats::from_counts(counts);
    store_stats(&tx, list_id, &stats)?;
    let list = tx.query_row(
        "SELECT * FROM event_donor_lists WHERE id = ?1",
        params![list_id],
        list_from_row,
    )?;
    tx.commit()?;
    Ok(list)
}

/// Administrative override of the list review status. Deliberately not
/// validated against the member rows; `recompute_list_stats` is the
/// corrective path when the override disagrees with reality.
pub async fn override_review_status(
    pool: &DbPool,
    list_id: &str,
    status: ReviewStatus,
) -> anyhow::Result<bool> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE event_donor_lists SET review_status = ?2, updated_at = ?3 WHERE id = ?1",
        params![list_id, status.as_str(), Utc::now()],
    )?;
    Ok(changed > 0)
}
