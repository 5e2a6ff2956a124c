use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::{params, params_from_iter, Connection};
use serde::Serialize;

use crate::models::{
    Booking, BookingEvent, BookingStatus, EventKind, JobTab, PaymentMethod, PaymentStatus, Profile,
    Role,
};

pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

const BOOKING_COLUMNS: &str = "b.id, b.customer_id, b.provider_id, b.booking_date, b.booking_time, \
     b.address, b.description, b.status, b.payment_method, b.payment_status, b.price, \
     b.payment_source, b.transaction_id, b.rating, b.review_text, b.request_id, b.version, \
     b.created_at, b.updated_at";

const PARTY_COLUMNS: &str = "p.full_name, p.email, p.phone, p.service_category";

const PROFILE_COLUMNS: &str = "id, role, full_name, email, phone, bio, experience_years, \
     price_range, service_category, service_area, address, is_verified, is_suspended, \
     average_rating, total_reviews, created_at, updated_at";

// ── Bookings ──

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, customer_id, provider_id, booking_date, booking_time, address, description,
                               status, payment_method, payment_status, price, payment_source, transaction_id,
                               rating, review_text, request_id, version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        params![
            booking.id,
            booking.customer_id,
            booking.provider_id,
            booking.booking_date.format(DATE_FORMAT).to_string(),
            booking.booking_time.format(TIME_FORMAT).to_string(),
            booking.address,
            booking.description,
            booking.status.as_str(),
            booking.payment_method.as_str(),
            booking.payment_status.as_str(),
            booking.price,
            booking.payment_source,
            booking.transaction_id,
            booking.rating.map(i64::from),
            booking.review_text,
            booking.request_id,
            booking.version,
            booking.created_at.format(TS_FORMAT).to_string(),
            booking.updated_at.format(TS_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn find_booking_by_request(
    conn: &Connection,
    customer_id: &str,
    request_id: &str,
) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings b
             WHERE b.customer_id = ?1 AND b.request_id = ?2"
        ),
        params![customer_id, request_id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// The other side of a booking, as the viewer sees it.
#[derive(Debug, Clone, Serialize)]
pub struct Party {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub service_category: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BookingWithParty {
    pub booking: Booking,
    pub party: Party,
}

pub fn list_customer_bookings(
    conn: &Connection,
    customer_id: &str,
) -> anyhow::Result<Vec<BookingWithParty>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS}, {PARTY_COLUMNS}
         FROM bookings b LEFT JOIN profiles p ON p.id = b.provider_id
         WHERE b.customer_id = ?1
         ORDER BY b.created_at DESC, b.rowid DESC"
    ))?;

    let rows = stmt.query_map(params![customer_id], |row| {
        Ok(parse_booking_with_party(row))
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn list_provider_bookings(
    conn: &Connection,
    provider_id: &str,
    tab: Option<JobTab>,
) -> anyhow::Result<Vec<BookingWithParty>> {
    let mut sql = format!(
        "SELECT {BOOKING_COLUMNS}, {PARTY_COLUMNS}
         FROM bookings b LEFT JOIN profiles p ON p.id = b.customer_id
         WHERE b.provider_id = ?1"
    );
    let mut values = vec![provider_id.to_string()];

    if let Some(tab) = tab {
        let statuses = tab.statuses();
        let placeholders = (0..statuses.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(" AND b.status IN ({placeholders})"));
        values.extend(statuses.iter().map(|s| s.as_str().to_string()));
    }
    sql.push_str(" ORDER BY b.created_at DESC, b.rowid DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
        Ok(parse_booking_with_party(row))
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn list_all_bookings(
    conn: &Connection,
    status_filter: Option<BookingStatus>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.status = ?1 \
                 ORDER BY b.created_at DESC, b.rowid DESC LIMIT ?2"
            ),
            vec![
                Box::new(status.as_str()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
        None => (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings b \
                 ORDER BY b.created_at DESC, b.rowid DESC LIMIT ?1"
            ),
            vec![Box::new(limit) as Box<dyn rusqlite::types::ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Writes `booking` only if the stored row is still at `expected_version`.
/// Returns false when another writer got there first.
pub fn update_booking(
    conn: &Connection,
    booking: &Booking,
    expected_version: i64,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET
            status = ?1,
            payment_status = ?2,
            price = ?3,
            payment_source = ?4,
            transaction_id = ?5,
            rating = ?6,
            review_text = ?7,
            version = ?8,
            updated_at = ?9
         WHERE id = ?10 AND version = ?11",
        params![
            booking.status.as_str(),
            booking.payment_status.as_str(),
            booking.price,
            booking.payment_source,
            booking.transaction_id,
            booking.rating.map(i64::from),
            booking.review_text,
            booking.version,
            booking.updated_at.format(TS_FORMAT).to_string(),
            booking.id,
            expected_version,
        ],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let date_str: String = row.get(3)?;
    let time_str: String = row.get(4)?;
    let status_str: String = row.get(7)?;
    let method_str: String = row.get(8)?;
    let payment_str: String = row.get(9)?;
    let created_at_str: String = row.get(17)?;
    let updated_at_str: String = row.get(18)?;

    let booking_date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
        .with_context(|| format!("invalid booking date: {date_str}"))?;
    let booking_time = NaiveTime::parse_from_str(&time_str, TIME_FORMAT)
        .with_context(|| format!("invalid booking time: {time_str}"))?;
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, TS_FORMAT)
        .unwrap_or_else(|_| Utc::now().naive_utc());
    let updated_at = NaiveDateTime::parse_from_str(&updated_at_str, TS_FORMAT)
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(Booking {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        provider_id: row.get(2)?,
        booking_date,
        booking_time,
        address: row.get(5)?,
        description: row.get(6)?,
        status: BookingStatus::parse(&status_str)
            .with_context(|| format!("unknown booking status: {status_str}"))?,
        payment_method: PaymentMethod::parse(&method_str)
            .with_context(|| format!("unknown payment method: {method_str}"))?,
        payment_status: PaymentStatus::parse(&payment_str)
            .with_context(|| format!("unknown payment status: {payment_str}"))?,
        price: row.get(10)?,
        payment_source: row.get(11)?,
        transaction_id: row.get(12)?,
        rating: row
            .get::<_, Option<i64>>(13)?
            .and_then(|r| u8::try_from(r).ok()),
        review_text: row.get(14)?,
        request_id: row.get(15)?,
        version: row.get(16)?,
        created_at,
        updated_at,
    })
}

fn parse_booking_with_party(row: &rusqlite::Row) -> anyhow::Result<BookingWithParty> {
    let booking = parse_booking_row(row)?;
    Ok(BookingWithParty {
        booking,
        party: Party {
            full_name: row.get(19)?,
            email: row.get(20)?,
            phone: row.get(21)?,
            service_category: row.get(22)?,
        },
    })
}

// ── Booking Events ──

pub fn insert_event(
    conn: &Connection,
    booking: &Booking,
    kind: EventKind,
    actor_id: &str,
) -> anyhow::Result<BookingEvent> {
    let created_at = booking.updated_at.format(TS_FORMAT).to_string();
    conn.execute(
        "INSERT INTO booking_events (booking_id, customer_id, provider_id, kind, status, payment_status, actor_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            booking.id,
            booking.customer_id,
            booking.provider_id,
            kind.as_str(),
            booking.status.as_str(),
            booking.payment_status.as_str(),
            actor_id,
            created_at,
        ],
    )?;

    Ok(BookingEvent {
        id: conn.last_insert_rowid(),
        booking_id: booking.id.clone(),
        customer_id: booking.customer_id.clone(),
        provider_id: booking.provider_id.clone(),
        kind: kind.as_str().to_string(),
        status: booking.status.as_str().to_string(),
        payment_status: booking.payment_status.as_str().to_string(),
        actor_id: actor_id.to_string(),
        created_at,
    })
}

/// Events after `since_id` that `viewer` is party to (`None` sees every
/// booking), oldest first. At most the newest `limit` are returned.
pub fn get_events_since(
    conn: &Connection,
    since_id: i64,
    viewer: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<BookingEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, booking_id, customer_id, provider_id, kind, status, payment_status,
                actor_id, created_at
         FROM booking_events
         WHERE id > ?1 AND (?2 IS NULL OR customer_id = ?2 OR provider_id = ?2)
         ORDER BY id DESC
         LIMIT ?3",
    )?;

    let rows = stmt.query_map(params![since_id, viewer, limit], parse_event_row)?;

    let mut events = vec![];
    for row in rows {
        events.push(row?);
    }
    events.reverse();
    Ok(events)
}

pub fn get_booking_events(
    conn: &Connection,
    booking_id: &str,
) -> anyhow::Result<Vec<BookingEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, booking_id, customer_id, provider_id, kind, status, payment_status, actor_id, created_at
         FROM booking_events WHERE booking_id = ?1
         ORDER BY id ASC",
    )?;

    let rows = stmt.query_map(params![booking_id], parse_event_row)?;

    let mut events = vec![];
    for row in rows {
        events.push(row?);
    }
    Ok(events)
}

fn parse_event_row(row: &rusqlite::Row) -> rusqlite::Result<BookingEvent> {
    Ok(BookingEvent {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        customer_id: row.get(2)?,
        provider_id: row.get(3)?,
        kind: row.get(4)?,
        status: row.get(5)?,
        payment_status: row.get(6)?,
        actor_id: row.get(7)?,
        created_at: row.get(8)?,
    })
}

// ── Profiles ──

/// Creates the profile row on first sight of a session; existing rows are left alone.
pub fn ensure_profile(
    conn: &Connection,
    id: &str,
    role: Role,
    email: Option<&str>,
    full_name: Option<&str>,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO profiles (id, role, email, full_name) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO NOTHING",
        params![id, role.as_str(), email, full_name],
    )?;
    Ok(())
}

pub fn get_profile(conn: &Connection, id: &str) -> anyhow::Result<Option<Profile>> {
    let result = conn.query_row(
        &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
        params![id],
        |row| Ok(parse_profile_row(row)),
    );

    match result {
        Ok(profile) => Ok(Some(profile?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn save_profile(conn: &Connection, profile: &Profile) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE profiles SET
            full_name = ?1,
            email = ?2,
            phone = ?3,
            bio = ?4,
            experience_years = ?5,
            price_range = ?6,
            service_category = ?7,
            service_area = ?8,
            address = ?9,
            updated_at = datetime('now')
         WHERE id = ?10",
        params![
            profile.full_name,
            profile.email,
            profile.phone,
            profile.bio,
            profile.experience_years,
            profile.price_range,
            profile.service_category,
            profile.service_area,
            profile.address,
            profile.id,
        ],
    )?;
    Ok(())
}

pub fn list_providers(conn: &Connection) -> anyhow::Result<Vec<Profile>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE role = 'provider' ORDER BY created_at DESC, rowid DESC"
    ))?;
    let rows = stmt.query_map([], |row| Ok(parse_profile_row(row)))?;

    let mut providers = vec![];
    for row in rows {
        providers.push(row??);
    }
    Ok(providers)
}

/// Providers a customer can book: not suspended, not busy, optionally
/// narrowed by category and a case-insensitive name/category search.
pub fn search_providers(
    conn: &Connection,
    category: Option<&str>,
    search: Option<&str>,
) -> anyhow::Result<Vec<Profile>> {
    let pattern = search.map(|s| format!("%{}%", escape_like(&s.to_lowercase())));
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles
         WHERE role = 'provider'
           AND is_suspended = 0
           AND (?1 IS NULL OR service_category = ?1)
           AND (?2 IS NULL
                OR LOWER(COALESCE(full_name, '')) LIKE ?2 ESCAPE '\\'
                OR LOWER(COALESCE(service_category, '')) LIKE ?2 ESCAPE '\\')
           AND id NOT IN (
               SELECT provider_id FROM bookings WHERE status IN ('accepted', 'in_progress')
           )
         ORDER BY average_rating DESC, full_name ASC"
    ))?;

    let rows = stmt.query_map(params![category, pattern], |row| Ok(parse_profile_row(row)))?;

    let mut providers = vec![];
    for row in rows {
        providers.push(row??);
    }
    Ok(providers)
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn set_provider_verified(conn: &Connection, id: &str, verified: bool) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE profiles SET is_verified = ?1, updated_at = datetime('now')
         WHERE id = ?2 AND role = 'provider'",
        params![verified as i32, id],
    )?;
    Ok(count > 0)
}

pub fn suspend_provider(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE profiles SET is_suspended = 1, updated_at = datetime('now')
         WHERE id = ?1 AND role = 'provider' AND is_suspended = 0",
        params![id],
    )?;
    Ok(count > 0)
}

/// Recomputes a provider's rating summary from every rated booking.
pub fn refresh_provider_rating(conn: &Connection, provider_id: &str) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE profiles SET
            average_rating = (SELECT COALESCE(AVG(rating), 0) FROM bookings
                              WHERE provider_id = ?1 AND rating IS NOT NULL),
            total_reviews = (SELECT COUNT(*) FROM bookings
                             WHERE provider_id = ?1 AND rating IS NOT NULL),
            updated_at = datetime('now')
         WHERE id = ?1",
        params![provider_id],
    )?;
    Ok(())
}

fn parse_profile_row(row: &rusqlite::Row) -> anyhow::Result<Profile> {
    let role_str: String = row.get(1)?;
    Ok(Profile {
        id: row.get(0)?,
        role: Role::parse(&role_str).with_context(|| format!("unknown role: {role_str}"))?,
        full_name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        bio: row.get(5)?,
        experience_years: row.get(6)?,
        price_range: row.get(7)?,
        service_category: row.get(8)?,
        service_area: row.get(9)?,
        address: row.get(10)?,
        is_verified: row.get::<_, i32>(11)? != 0,
        is_suspended: row.get::<_, i32>(12)? != 0,
        average_rating: row.get(13)?,
        total_reviews: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

// ── Stats ──

#[derive(Debug, Clone, Serialize)]
pub struct Earnings {
    pub completed_total: i64,
    pub completed_jobs: i64,
    pub collected_total: i64,
    pub awaiting_payment_total: i64,
    pub potential_total: i64,
    pub active_jobs: i64,
}

pub fn provider_earnings(conn: &Connection, provider_id: &str) -> anyhow::Result<Earnings> {
    let earnings = conn.query_row(
        "SELECT
            COALESCE(SUM(CASE WHEN status = 'completed' THEN COALESCE(price, 0) END), 0),
            COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN payment_status = 'paid' THEN COALESCE(price, 0) END), 0),
            COALESCE(SUM(CASE WHEN status = 'completed' AND payment_status != 'paid'
                              THEN COALESCE(price, 0) END), 0),
            COALESCE(SUM(CASE WHEN status IN ('accepted', 'in_progress') THEN COALESCE(price, 0) END), 0),
            COALESCE(SUM(CASE WHEN status IN ('accepted', 'in_progress') THEN 1 ELSE 0 END), 0)
         FROM bookings WHERE provider_id = ?1",
        params![provider_id],
        |row| {
            Ok(Earnings {
                completed_total: row.get(0)?,
                completed_jobs: row.get(1)?,
                collected_total: row.get(2)?,
                awaiting_payment_total: row.get(3)?,
                potential_total: row.get(4)?,
                active_jobs: row.get(5)?,
            })
        },
    )?;
    Ok(earnings)
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminStats {
    pub total_customers: i64,
    pub total_providers: i64,
    pub pending_verifications: i64,
    pub active_bookings: i64,
    pub completed_bookings: i64,
    pub revenue: i64,
}

pub fn get_admin_stats(conn: &Connection) -> anyhow::Result<AdminStats> {
    let (total_customers, total_providers, pending_verifications): (i64, i64, i64) = conn.query_row(
        "SELECT
            COALESCE(SUM(CASE WHEN role = 'customer' THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN role = 'provider' AND is_suspended = 0 THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN role = 'provider' AND is_suspended = 0 AND is_verified = 0 THEN 1 ELSE 0 END), 0)
         FROM profiles",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    let (active_bookings, completed_bookings, revenue): (i64, i64, i64) = conn.query_row(
        "SELECT
            COALESCE(SUM(CASE WHEN status IN ('accepted', 'in_progress') THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN payment_status = 'paid' THEN COALESCE(price, 0) END), 0)
         FROM bookings",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    Ok(AdminStats {
        total_customers,
        total_providers,
        pending_verifications,
        active_bookings,
        completed_bookings,
        revenue,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::booking::fixtures::booking;

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        ensure_profile(&conn, "cust-1", Role::Customer, None, Some("Asha")).unwrap();
        ensure_profile(&conn, "prov-1", Role::Provider, None, Some("Ravi Plumbing")).unwrap();
        conn
    }

    #[test]
    fn test_insert_and_get_booking() {
        let conn = setup_db();
        let b = booking(BookingStatus::Requested, PaymentMethod::Online);
        insert_booking(&conn, &b).unwrap();

        let loaded = get_booking_by_id(&conn, "bk-1").unwrap().unwrap();
        assert_eq!(loaded.status, BookingStatus::Requested);
        assert_eq!(loaded.booking_time.format(TIME_FORMAT).to_string(), "10:30");
        assert_eq!(loaded.description.as_deref(), Some("Leaking tap"));
        assert_eq!(loaded.version, 1);

        assert!(get_booking_by_id(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_update_with_stale_version_is_refused() {
        let conn = setup_db();
        let b = booking(BookingStatus::Requested, PaymentMethod::Online);
        insert_booking(&conn, &b).unwrap();

        let mut next = b.clone();
        next.status = BookingStatus::Accepted;
        next.version = 2;
        assert!(update_booking(&conn, &next, 1).unwrap());

        let mut stale = b.clone();
        stale.status = BookingStatus::Rejected;
        stale.version = 2;
        assert!(!update_booking(&conn, &stale, 1).unwrap());

        let loaded = get_booking_by_id(&conn, "bk-1").unwrap().unwrap();
        assert_eq!(loaded.status, BookingStatus::Accepted);
        assert_eq!(loaded.version, 2);
    }

    #[test]
    fn test_schema_rejects_transaction_id_while_pending() {
        let conn = setup_db();
        let mut b = booking(BookingStatus::Completed, PaymentMethod::Online);
        b.price = Some(200);
        b.transaction_id = Some("TXN-ABC".to_string());
        assert!(insert_booking(&conn, &b).is_err());
    }

    #[test]
    fn test_schema_rejects_paid_before_completion() {
        let conn = setup_db();
        let mut b = booking(BookingStatus::InProgress, PaymentMethod::Cash);
        b.payment_status = PaymentStatus::Paid;
        b.transaction_id = Some("TXN-ABC".to_string());
        assert!(insert_booking(&conn, &b).is_err());
    }

    #[test]
    fn test_provider_tabs() {
        let conn = setup_db();
        for (id, status) in [
            ("bk-req", BookingStatus::Requested),
            ("bk-act", BookingStatus::InProgress),
            ("bk-old", BookingStatus::Rejected),
        ] {
            let mut b = booking(status, PaymentMethod::Online);
            b.id = id.to_string();
            insert_booking(&conn, &b).unwrap();
        }

        let all = list_provider_bookings(&conn, "prov-1", None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].party.full_name.as_deref(), Some("Asha"));

        let active = list_provider_bookings(&conn, "prov-1", Some(JobTab::Active)).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].booking.id, "bk-act");

        let history = list_provider_bookings(&conn, "prov-1", Some(JobTab::History)).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].booking.id, "bk-old");
    }

    #[test]
    fn test_busy_providers_hidden_from_search() {
        let conn = setup_db();
        ensure_profile(&conn, "prov-2", Role::Provider, None, Some("Sparks Electric")).unwrap();

        let found = search_providers(&conn, None, None).unwrap();
        assert_eq!(found.len(), 2);

        let b = booking(BookingStatus::Accepted, PaymentMethod::Online);
        insert_booking(&conn, &b).unwrap();

        let found = search_providers(&conn, None, None).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "prov-2");
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let conn = setup_db();
        let found = search_providers(&conn, None, Some("PLUMB")).unwrap();
        assert_eq!(found.len(), 1);
        assert!(search_providers(&conn, None, Some("carpentry")).unwrap().is_empty());
    }

    #[test]
    fn test_search_wildcards_are_literal() {
        let conn = setup_db();
        assert!(search_providers(&conn, None, Some("%")).unwrap().is_empty());
        assert!(search_providers(&conn, None, Some("r_vi")).unwrap().is_empty());

        ensure_profile(&conn, "prov-2", Role::Provider, None, Some("100% Clean")).unwrap();
        let found = search_providers(&conn, None, Some("100%")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "prov-2");
    }

    #[test]
    fn test_refresh_provider_rating() {
        let conn = setup_db();
        for (id, rating) in [("bk-a", 4u8), ("bk-b", 5u8)] {
            let mut b = booking(BookingStatus::Completed, PaymentMethod::Cash);
            b.id = id.to_string();
            b.price = Some(100);
            b.payment_status = PaymentStatus::Paid;
            b.transaction_id = Some(format!("TXN-{id}"));
            b.rating = Some(rating);
            insert_booking(&conn, &b).unwrap();
        }

        refresh_provider_rating(&conn, "prov-1").unwrap();
        let p = get_profile(&conn, "prov-1").unwrap().unwrap();
        assert_eq!(p.total_reviews, 2);
        assert!((p.average_rating - 4.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_earnings() {
        let conn = setup_db();

        let mut done = booking(BookingStatus::Completed, PaymentMethod::Online);
        done.id = "bk-done".to_string();
        done.price = Some(700);
        insert_booking(&conn, &done).unwrap();

        let mut active = booking(BookingStatus::Accepted, PaymentMethod::Online);
        active.id = "bk-active".to_string();
        active.price = Some(250);
        insert_booking(&conn, &active).unwrap();

        let e = provider_earnings(&conn, "prov-1").unwrap();
        assert_eq!(e.completed_total, 700);
        assert_eq!(e.completed_jobs, 1);
        assert_eq!(e.collected_total, 0);
        assert_eq!(e.awaiting_payment_total, 700);
        assert_eq!(e.potential_total, 250);
        assert_eq!(e.active_jobs, 1);
    }

    #[test]
    fn test_earnings_empty() {
        let conn = setup_db();
        let e = provider_earnings(&conn, "prov-1").unwrap();
        assert_eq!(e.completed_total, 0);
        assert_eq!(e.active_jobs, 0);
    }

    #[test]
    fn test_ensure_profile_keeps_existing_row() {
        let conn = setup_db();
        ensure_profile(
            &conn,
            "cust-1",
            Role::Customer,
            Some("a@example.com"),
            Some("Other"),
        )
        .unwrap();
        let p = get_profile(&conn, "cust-1").unwrap().unwrap();
        assert_eq!(p.full_name.as_deref(), Some("Asha"));
    }

    #[test]
    fn test_event_log_order() {
        let conn = setup_db();
        let b = booking(BookingStatus::Requested, PaymentMethod::Online);
        insert_booking(&conn, &b).unwrap();
        let first = insert_event(&conn, &b, EventKind::Created, "cust-1").unwrap();

        let mut accepted = b.clone();
        accepted.status = BookingStatus::Accepted;
        let second = insert_event(&conn, &accepted, EventKind::StatusChanged, "prov-1").unwrap();
        assert!(second.id > first.id);

        let since = get_events_since(&conn, first.id, None, 100).unwrap();
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].status, "accepted");
        assert_eq!(get_booking_events(&conn, "bk-1").unwrap().len(), 2);
    }

    #[test]
    fn test_events_since_filters_viewer_and_caps() {
        let conn = setup_db();
        let b = booking(BookingStatus::Requested, PaymentMethod::Online);
        insert_booking(&conn, &b).unwrap();
        let mut ids = vec![];
        for _ in 0..5 {
            ids.push(insert_event(&conn, &b, EventKind::Created, "cust-1").unwrap().id);
        }

        assert_eq!(get_events_since(&conn, 0, Some("cust-1"), 100).unwrap().len(), 5);
        assert_eq!(get_events_since(&conn, 0, Some("prov-1"), 100).unwrap().len(), 5);
        assert!(get_events_since(&conn, 0, Some("prov-9"), 100).unwrap().is_empty());

        // The newest events win, still in log order
        let capped = get_events_since(&conn, 0, Some("cust-1"), 2).unwrap();
        let capped_ids: Vec<i64> = capped.iter().map(|e| e.id).collect();
        assert_eq!(capped_ids, ids[3..].to_vec());
    }

    #[test]
    fn test_admin_stats() {
        let conn = setup_db();
        let stats = get_admin_stats(&conn).unwrap();
        assert_eq!(stats.total_customers, 1);
        assert_eq!(stats.total_providers, 1);
        assert_eq!(stats.pending_verifications, 1);

        assert!(set_provider_verified(&conn, "prov-1", true).unwrap());
        assert!(!set_provider_verified(&conn, "cust-1", true).unwrap());
        assert_eq!(get_admin_stats(&conn).unwrap().pending_verifications, 0);

        assert!(suspend_provider(&conn, "prov-1").unwrap());
        assert!(!suspend_provider(&conn, "prov-1").unwrap());
        assert_eq!(get_admin_stats(&conn).unwrap().total_providers, 0);
    }
}
