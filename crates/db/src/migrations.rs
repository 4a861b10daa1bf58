/// Inline SQL migrations for the larder import store.
///
/// We use simple inline migrations rather than sqlx migration files
/// because the schema is small and self-contained. One statement each.

pub const MIGRATIONS: &[&str] = &[
    // Migration 1: import jobs
    r#"
CREATE TABLE IF NOT EXISTS import_jobs (
    id               TEXT PRIMARY KEY,
    owner            TEXT NOT NULL,
    status           TEXT NOT NULL DEFAULT 'pending',
    source_kind      TEXT NOT NULL,
    content_type     TEXT NOT NULL,
    total_pages      INTEGER NOT NULL DEFAULT 0,
    current_page     INTEGER NOT NULL DEFAULT 0,
    error            TEXT,
    cancel_requested BOOLEAN NOT NULL DEFAULT 0,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL,
    CHECK (current_page <= total_pages)
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_import_jobs_owner ON import_jobs(owner, created_at DESC);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_import_jobs_status ON import_jobs(status);"#,
    // Migration 2: uploaded bytes, kept for the worker
    r#"
CREATE TABLE IF NOT EXISTS import_sources (
    job_id    TEXT PRIMARY KEY REFERENCES import_jobs(id) ON DELETE CASCADE,
    file_name TEXT,
    bytes     BLOB NOT NULL
);
"#,
    // Migration 3: minimal recipe records produced by imports
    r#"
CREATE TABLE IF NOT EXISTS recipes (
    id            TEXT PRIMARY KEY,
    owner         TEXT NOT NULL,
    title         TEXT NOT NULL,
    data          TEXT NOT NULL DEFAULT 'null',
    source_job_id TEXT,
    source_page   INTEGER,
    created_at    TEXT NOT NULL
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_recipes_owner ON recipes(owner);"#,
    // Migration 4: per-page outcomes
    r#"
CREATE TABLE IF NOT EXISTS import_job_results (
    job_id      TEXT NOT NULL REFERENCES import_jobs(id) ON DELETE CASCADE,
    page_number INTEGER NOT NULL,
    recipe_id   TEXT NOT NULL REFERENCES recipes(id),
    title       TEXT NOT NULL,
    PRIMARY KEY (job_id, page_number)
);
"#,
    r#"
CREATE TABLE IF NOT EXISTS import_job_skipped_pages (
    job_id      TEXT NOT NULL REFERENCES import_jobs(id) ON DELETE CASCADE,
    page_number INTEGER NOT NULL,
    reason      TEXT,
    PRIMARY KEY (job_id, page_number)
);
"#,
];
