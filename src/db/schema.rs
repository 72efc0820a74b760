pub const SCHEMA: &str = r#"
-- schedule_items table (one row per chain item)
CREATE TABLE IF NOT EXISTS schedule_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner TEXT NOT NULL,
    group_id INTEGER NOT NULL,
    recurrence_id INTEGER NOT NULL DEFAULT 0,
    recurrence TEXT,
    name TEXT NOT NULL,
    date TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT,
    has_end_time INTEGER NOT NULL DEFAULT 0,
    role TEXT NOT NULL,
    origin_name TEXT,
    origin_lat REAL,
    origin_lng REAL,
    dest_name TEXT,
    dest_lat REAL,
    dest_lng REAL,
    transportation TEXT NOT NULL DEFAULT 'driving',
    is_updated INTEGER NOT NULL DEFAULT 0,
    priority INTEGER NOT NULL DEFAULT 0,
    tag_id INTEGER,
    routine_id INTEGER,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_items_owner_date ON schedule_items(owner, date);
CREATE INDEX IF NOT EXISTS idx_items_group ON schedule_items(group_id, date, start_time);
CREATE INDEX IF NOT EXISTS idx_items_recurrence ON schedule_items(recurrence_id, date);

-- schedule_logs table (one row per location-bearing group)
CREATE TABLE IF NOT EXISTS schedule_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id INTEGER NOT NULL,
    recurrence_id INTEGER NOT NULL DEFAULT 0,
    origin_lat REAL NOT NULL,
    origin_lng REAL NOT NULL,
    dest_lat REAL NOT NULL,
    dest_lng REAL NOT NULL,
    date TEXT NOT NULL,
    check_time TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_logs_due ON schedule_logs(date, check_time);
CREATE INDEX IF NOT EXISTS idx_logs_group ON schedule_logs(group_id);
CREATE INDEX IF NOT EXISTS idx_logs_recurrence ON schedule_logs(recurrence_id);

-- routines table
CREATE TABLE IF NOT EXISTS routines (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner TEXT NOT NULL,
    name TEXT NOT NULL,
    duration_minutes INTEGER NOT NULL,
    sort_order INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_routines_owner ON routines(owner, sort_order);

-- tags table and its ordered routine list
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner TEXT NOT NULL,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tag_routines (
    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    routine_id INTEGER NOT NULL,
    PRIMARY KEY (tag_id, position)
);

-- bedtimes table
CREATE TABLE IF NOT EXISTS bedtimes (
    owner TEXT PRIMARY KEY,
    sleep_time TEXT NOT NULL,
    wake_time TEXT NOT NULL
);

-- counters table (group and recurrence id allocation)
CREATE TABLE IF NOT EXISTS counters (
    name TEXT PRIMARY KEY,
    seq INTEGER NOT NULL
);
"#;
