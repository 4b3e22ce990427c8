//! Table definitions, applied once per pool via [`crate::PolicyStore::migrate`].
//!
//! The only place this crate's SQL differs between the server-grade and
//! file-embedded dialects is the auto-increment keyword on freshly created
//! tables; every other query is dialect-neutral and runs unchanged against
//! either backend through `sqlx::Any`.

use sqlx::any::AnyKind;

fn autoincrement_pk(kind: AnyKind) -> &'static str {
    match kind {
        AnyKind::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
        _ => "SERIAL PRIMARY KEY",
    }
}

/// Renders the full schema DDL for the detected backend.
#[must_use]
pub fn schema_sql(kind: AnyKind) -> String {
    let pk = autoincrement_pk(kind);
    format!(
        r"
CREATE TABLE IF NOT EXISTS groups (
    id {pk},
    guid TEXT UNIQUE
);

CREATE TABLE IF NOT EXISTS destinations (
    id {pk},
    group_id INTEGER NOT NULL REFERENCES groups(id),
    port INTEGER NOT NULL,
    protocol TEXT NOT NULL,
    UNIQUE (group_id, port, protocol)
);

CREATE TABLE IF NOT EXISTS policies (
    id {pk},
    group_id INTEGER NOT NULL REFERENCES groups(id),
    destination_id INTEGER NOT NULL REFERENCES destinations(id),
    UNIQUE (group_id, destination_id)
);

CREATE TABLE IF NOT EXISTS terminals (
    id {pk}
);

CREATE TABLE IF NOT EXISTS apps (
    id {pk},
    terminal_id INTEGER NOT NULL REFERENCES terminals(id),
    app_guid TEXT UNIQUE NOT NULL
);

CREATE TABLE IF NOT EXISTS spaces (
    id {pk},
    terminal_id INTEGER NOT NULL REFERENCES terminals(id),
    space_guid TEXT UNIQUE NOT NULL
);

CREATE TABLE IF NOT EXISTS ip_ranges (
    id {pk},
    protocol TEXT NOT NULL,
    start_ip TEXT NOT NULL,
    end_ip TEXT NOT NULL,
    start_port INTEGER,
    end_port INTEGER,
    icmp_type INTEGER,
    icmp_code INTEGER,
    terminal_id INTEGER NOT NULL REFERENCES terminals(id),
    UNIQUE (protocol, start_ip, end_ip, start_port, end_port, icmp_type, icmp_code, terminal_id)
);

CREATE TABLE IF NOT EXISTS destination_metadatas (
    id {pk},
    terminal_id INTEGER NOT NULL UNIQUE REFERENCES terminals(id),
    name TEXT,
    description TEXT
);

CREATE TABLE IF NOT EXISTS egress_policies (
    id {pk},
    source_terminal_id INTEGER NOT NULL REFERENCES terminals(id),
    destination_terminal_id INTEGER NOT NULL REFERENCES terminals(id),
    UNIQUE (source_terminal_id, destination_terminal_id)
);
"
    )
}
