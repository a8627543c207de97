use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS profiles (
            user_id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            school TEXT,
            grade INTEGER NOT NULL CHECK (grade BETWEEN 6 AND 9),
            grade_group TEXT NOT NULL,
            birth_date TEXT,
            avatar_url TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS admins (
            user_id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS guardians (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            area TEXT NOT NULL,
            progression_order INTEGER NOT NULL CHECK (progression_order >= 1),
            unlock_threshold REAL NOT NULL CHECK (unlock_threshold BETWEEN 0 AND 100)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS fragments (
            id INTEGER PRIMARY KEY,
            guardian_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            capacity INTEGER NOT NULL CHECK (capacity > 0),
            FOREIGN KEY (guardian_id) REFERENCES guardians(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS lessons (
            id INTEGER PRIMARY KEY,
            guardian_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            unit INTEGER NOT NULL CHECK (unit >= 1),
            position INTEGER NOT NULL CHECK (position >= 1),
            active INTEGER NOT NULL,
            grade_group TEXT NOT NULL,
            video_urls TEXT NOT NULL,
            image_url TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (guardian_id) REFERENCES guardians(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS activities (
            id INTEGER PRIMARY KEY,
            lesson_id INTEGER NOT NULL,
            prompt TEXT NOT NULL,
            options TEXT NOT NULL,
            answer TEXT NOT NULL,
            position INTEGER NOT NULL CHECK (position >= 1),
            FOREIGN KEY (lesson_id) REFERENCES lessons(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS user_fragments (
            user_id TEXT NOT NULL,
            fragment_id INTEGER NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity >= 0),
            updated_at TEXT NOT NULL,
            PRIMARY KEY (user_id, fragment_id),
            FOREIGN KEY (fragment_id) REFERENCES fragments(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS completed_lessons (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            lesson_id INTEGER NOT NULL,
            completed_at TEXT NOT NULL,
            UNIQUE (user_id, lesson_id),
            FOREIGN KEY (lesson_id) REFERENCES lessons(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            icon TEXT NOT NULL,
            color TEXT NOT NULL,
            link TEXT,
            read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_lessons_guardian_position
            ON lessons (guardian_id, position, created_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_activities_lesson_position
            ON activities (lesson_id, position);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_completed_lessons_user_completed
            ON completed_lessons (user_id, completed_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_notifications_user_created
            ON notifications (user_id, created_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_profiles_grade_group
            ON profiles (grade_group);
    ",
];

/// Runs the versioned schema migrations.
///
/// Version 1 creates profiles, the catalog, lessons with activities, user
/// progress and notifications.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
