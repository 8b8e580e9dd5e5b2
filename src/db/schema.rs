/// SQL-schema för Opsboard

pub const SCHEMA_VERSION: i32 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Användarprofiler
CREATE TABLE IF NOT EXISTS profiles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    full_name TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'staff' CHECK (role IN ('admin', 'manager', 'staff')),
    department TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Vattenkoefficienter (singleton, id=1)
CREATE TABLE IF NOT EXISTS water_config (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    hand_wash_frequency_per_day REAL NOT NULL,
    hand_wash_volume_liters REAL NOT NULL,
    toilet_flush_frequency_per_day REAL NOT NULL,
    toilet_flush_volume_liters REAL NOT NULL,
    emission_factor_per_cubic_meter REAL NOT NULL,
    cost_per_cubic_meter REAL NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Veckorapporter med koefficienterna som gällde vid sparandet
CREATE TABLE IF NOT EXISTS water_weekly_reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    week_start TEXT NOT NULL UNIQUE,
    hand_wash_frequency_per_day REAL NOT NULL,
    hand_wash_volume_liters REAL NOT NULL,
    toilet_flush_frequency_per_day REAL NOT NULL,
    toilet_flush_volume_liters REAL NOT NULL,
    emission_factor_per_cubic_meter REAL NOT NULL,
    cost_per_cubic_meter REAL NOT NULL DEFAULT 0,
    notes TEXT,
    evidence_url TEXT,
    total_liters REAL NOT NULL DEFAULT 0,
    total_carbon_kg REAL NOT NULL DEFAULT 0,
    total_cost REAL NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS water_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    report_id INTEGER,
    date TEXT NOT NULL UNIQUE,
    headcount INTEGER NOT NULL DEFAULT 0,
    is_holiday INTEGER NOT NULL DEFAULT 0,
    notes TEXT,
    water_liters REAL NOT NULL DEFAULT 0,
    carbon_kg REAL NOT NULL DEFAULT 0,
    cost REAL NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (report_id) REFERENCES water_weekly_reports(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_water_logs_report ON water_logs(report_id);

-- Elkoefficienter (singleton, id=1)
CREATE TABLE IF NOT EXISTS electricity_config (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    allocation_percentage REAL NOT NULL CHECK (allocation_percentage BETWEEN 0 AND 100),
    emission_factor_per_kwh REAL NOT NULL,
    cost_per_kwh REAL NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS electricity_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    building_kwh REAL NOT NULL DEFAULT 0,
    allocation_percentage REAL NOT NULL,
    emission_factor_per_kwh REAL NOT NULL,
    cost_per_kwh REAL NOT NULL DEFAULT 0,
    company_kwh REAL NOT NULL DEFAULT 0,
    carbon_kg REAL NOT NULL DEFAULT 0,
    cost REAL NOT NULL DEFAULT 0,
    notes TEXT,
    evidence_url TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    CHECK (end_date >= start_date),
    UNIQUE (start_date, end_date)
);

-- Utsläppsfaktorer per färdmedel ("mode" eller "mode:subtype")
CREATE TABLE IF NOT EXISTS travel_emission_config (
    mode_key TEXT PRIMARY KEY,
    emission_factor_per_km REAL NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS travel_activities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT,
    activity_date TEXT NOT NULL,
    created_by INTEGER,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (created_by) REFERENCES profiles(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS travel_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    activity_id INTEGER NOT NULL,
    travel_date TEXT NOT NULL,
    origin TEXT,
    destination TEXT,
    transport_mode TEXT NOT NULL,
    transport_subtype TEXT,
    distance_km REAL NOT NULL DEFAULT 0,
    passenger_count INTEGER NOT NULL DEFAULT 1,
    emission_factor_per_km REAL NOT NULL,
    emission_kg REAL NOT NULL DEFAULT 0,
    notes TEXT,
    evidence_url TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (activity_id) REFERENCES travel_activities(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_travel_logs_activity ON travel_logs(activity_id);

-- Operativa tillgångar
CREATE TABLE IF NOT EXISTS operational_assets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    condition TEXT NOT NULL DEFAULT 'good',
    status TEXT NOT NULL DEFAULT 'available',
    location TEXT,
    purchase_date TEXT,
    purchase_value REAL NOT NULL DEFAULT 0,
    current_value REAL NOT NULL DEFAULT 0,
    current_holder_id INTEGER,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (current_holder_id) REFERENCES profiles(id),
    CHECK ((current_holder_id IS NOT NULL) = (status = 'in_use'))
);

CREATE INDEX IF NOT EXISTS idx_assets_status ON operational_assets(status);
CREATE INDEX IF NOT EXISTS idx_assets_holder ON operational_assets(current_holder_id);

-- Granskningslogg (append-only)
CREATE TABLE IF NOT EXISTS operational_asset_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id INTEGER NOT NULL,
    kind TEXT NOT NULL,
    actor_id INTEGER,
    previous_holder_id INTEGER,
    new_holder_id INTEGER,
    previous_condition TEXT,
    new_condition TEXT,
    note TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (asset_id) REFERENCES operational_assets(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_asset_logs_asset ON operational_asset_logs(asset_id);

CREATE TABLE IF NOT EXISTS maintenance_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id INTEGER NOT NULL,
    date TEXT NOT NULL,
    description TEXT NOT NULL,
    cost REAL NOT NULL DEFAULT 0,
    vendor TEXT,
    next_due TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (asset_id) REFERENCES operational_assets(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_maintenance_asset ON maintenance_records(asset_id);

-- Småkassa
CREATE TABLE IF NOT EXISTS petty_cash_transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('top_up', 'expense')),
    amount REAL NOT NULL CHECK (amount > 0),
    category TEXT NOT NULL,
    description TEXT,
    receipt_url TEXT,
    created_by INTEGER,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (created_by) REFERENCES profiles(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_petty_cash_date ON petty_cash_transactions(date);

CREATE TABLE IF NOT EXISTS pipeline_leads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    company_name TEXT NOT NULL,
    contact_name TEXT,
    estimated_value REAL NOT NULL DEFAULT 0,
    stage TEXT NOT NULL DEFAULT 'prospect',
    owner_id INTEGER,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (owner_id) REFERENCES profiles(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_leads_stage ON pipeline_leads(stage);

CREATE TABLE IF NOT EXISTS pipeline_lead_activities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    lead_id INTEGER NOT NULL,
    actor_id INTEGER,
    from_stage TEXT,
    to_stage TEXT NOT NULL,
    note TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (lead_id) REFERENCES pipeline_leads(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_lead_activities_lead ON pipeline_lead_activities(lead_id);
"#;
