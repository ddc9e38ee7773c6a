/// SQL DDL for the cadence-store database.
/// WAL mode + foreign keys enabled at connection time.
pub const SCHEMA_VERSION: u32 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS activities (
    id TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    subject TEXT NOT NULL,
    description TEXT,
    scheduled_at TEXT,
    due_date TEXT,
    completed_at TEXT,
    is_completed INTEGER NOT NULL DEFAULT 0,
    priority TEXT NOT NULL DEFAULT 'medium',
    assigned_to TEXT,
    escalated_to TEXT,
    escalated_at TEXT,
    recurrence TEXT,
    checklist TEXT NOT NULL DEFAULT '[]',
    progress INTEGER NOT NULL DEFAULT 0,
    rating INTEGER,
    snoozed_until TEXT,
    reminder_sent INTEGER NOT NULL DEFAULT 0,
    parent_id TEXT,
    custom_fields TEXT NOT NULL DEFAULT '{}',
    ticket_number TEXT UNIQUE,
    detail TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_activities_org ON activities(organization_id);
CREATE INDEX IF NOT EXISTS idx_activities_org_kind ON activities(organization_id, kind);
CREATE INDEX IF NOT EXISTS idx_activities_org_completed ON activities(organization_id, is_completed);
CREATE INDEX IF NOT EXISTS idx_activities_org_assigned ON activities(organization_id, assigned_to);
CREATE INDEX IF NOT EXISTS idx_activities_parent ON activities(parent_id);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;
