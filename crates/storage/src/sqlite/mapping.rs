use chrono::{DateTime, NaiveDate, Utc};
use chronicles_core::model::{
    Activity, ActivityId, Area, CompletedLesson, CorrectAnswer, Fragment, FragmentId, Grade,
    GradeGroup, Guardian, GuardianId, Lesson, LessonId, Notification, NotificationId, Profile,
    UserFragment, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use url::Url;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Map a driver error, keeping constraint violations distinguishable.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
        _ => StorageError::Connection(e.to_string()),
    }
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn user_key(user_id: UserId) -> String {
    user_id.to_string()
}

fn user_id_from_row(row: &SqliteRow) -> Result<UserId, StorageError> {
    row.try_get::<String, _>("user_id")
        .map_err(ser)?
        .parse::<UserId>()
        .map_err(ser)
}

fn url_from_str(raw: &str) -> Result<Url, StorageError> {
    Url::parse(raw).map_err(|e| StorageError::Serialization(format!("invalid url {raw}: {e}")))
}

pub(crate) fn urls_to_json(urls: &[Url]) -> Result<String, StorageError> {
    let raw: Vec<&str> = urls.iter().map(Url::as_str).collect();
    serde_json::to_string(&raw).map_err(ser)
}

pub(crate) fn options_to_json(options: &[String]) -> Result<String, StorageError> {
    serde_json::to_string(options).map_err(ser)
}

pub(crate) fn answer_to_json(answer: &CorrectAnswer) -> Result<String, StorageError> {
    serde_json::to_string(answer).map_err(ser)
}

pub(crate) fn map_profile_row(row: &SqliteRow) -> Result<Profile, StorageError> {
    let grade_raw: i64 = row.try_get("grade").map_err(ser)?;
    let grade = u8::try_from(grade_raw)
        .map_err(ser)
        .and_then(|g| Grade::new(g).map_err(ser))?;
    let avatar_url = row
        .try_get::<Option<String>, _>("avatar_url")
        .map_err(ser)?
        .as_deref()
        .map(url_from_str)
        .transpose()?;

    Ok(Profile {
        user_id: user_id_from_row(row)?,
        display_name: row.try_get("display_name").map_err(ser)?,
        school: row.try_get("school").map_err(ser)?,
        grade,
        birth_date: row.try_get::<Option<NaiveDate>, _>("birth_date").map_err(ser)?,
        avatar_url,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_guardian_row(row: &SqliteRow) -> Result<Guardian, StorageError> {
    guardian_from_columns(row, "id", "name", "area", "progression_order", "unlock_threshold")
}

/// Guardian columns can be aliased when joined with fragments.
pub(crate) fn guardian_from_columns(
    row: &SqliteRow,
    id: &str,
    name: &str,
    area: &str,
    order: &str,
    threshold: &str,
) -> Result<Guardian, StorageError> {
    let area: Area = row.try_get::<String, _>(area).map_err(ser)?.parse().map_err(ser)?;
    Guardian::new(
        GuardianId::new(i64_to_u64("guardian_id", row.try_get(id).map_err(ser)?)?),
        row.try_get::<String, _>(name).map_err(ser)?,
        area,
        i64_to_u32("progression_order", row.try_get(order).map_err(ser)?)?,
        row.try_get::<f64, _>(threshold).map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_fragment_row(row: &SqliteRow) -> Result<Fragment, StorageError> {
    Fragment::new(
        FragmentId::new(i64_to_u64("fragment_id", row.try_get("id").map_err(ser)?)?),
        GuardianId::new(i64_to_u64("guardian_id", row.try_get("guardian_id").map_err(ser)?)?),
        row.try_get::<String, _>("name").map_err(ser)?,
        i64_to_u32("capacity", row.try_get("capacity").map_err(ser)?)?,
    )
    .map_err(ser)
}

pub(crate) fn map_lesson_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    let grade_group: GradeGroup = row
        .try_get::<String, _>("grade_group")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let video_raw: Vec<String> =
        serde_json::from_str(&row.try_get::<String, _>("video_urls").map_err(ser)?).map_err(ser)?;
    let video_urls = video_raw
        .iter()
        .map(|raw| url_from_str(raw))
        .collect::<Result<Vec<_>, _>>()?;
    let image_url = row
        .try_get::<Option<String>, _>("image_url")
        .map_err(ser)?
        .as_deref()
        .map(url_from_str)
        .transpose()?;

    Ok(Lesson {
        id: LessonId::new(i64_to_u64("lesson_id", row.try_get("id").map_err(ser)?)?),
        guardian_id: GuardianId::new(i64_to_u64(
            "guardian_id",
            row.try_get("guardian_id").map_err(ser)?,
        )?),
        title: row.try_get("title").map_err(ser)?,
        content: row.try_get("content").map_err(ser)?,
        unit: i64_to_u32("unit", row.try_get("unit").map_err(ser)?)?,
        position: i64_to_u32("position", row.try_get("position").map_err(ser)?)?,
        active: row.try_get::<i64, _>("active").map_err(ser)? != 0,
        grade_group,
        video_urls,
        image_url,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_activity_row(row: &SqliteRow) -> Result<Activity, StorageError> {
    let options: Vec<String> =
        serde_json::from_str(&row.try_get::<String, _>("options").map_err(ser)?).map_err(ser)?;
    let answer: CorrectAnswer =
        serde_json::from_str(&row.try_get::<String, _>("answer").map_err(ser)?).map_err(ser)?;
    Ok(Activity {
        id: ActivityId::new(i64_to_u64("activity_id", row.try_get("id").map_err(ser)?)?),
        lesson_id: LessonId::new(i64_to_u64("lesson_id", row.try_get("lesson_id").map_err(ser)?)?),
        prompt: row.try_get("prompt").map_err(ser)?,
        options,
        answer,
        position: i64_to_u32("position", row.try_get("position").map_err(ser)?)?,
    })
}

pub(crate) fn map_user_fragment_row(row: &SqliteRow) -> Result<UserFragment, StorageError> {
    Ok(UserFragment {
        user_id: user_id_from_row(row)?,
        fragment_id: FragmentId::new(i64_to_u64(
            "fragment_id",
            row.try_get("fragment_id").map_err(ser)?,
        )?),
        quantity: i64_to_u32("quantity", row.try_get("quantity").map_err(ser)?)?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_completion_row(row: &SqliteRow) -> Result<CompletedLesson, StorageError> {
    Ok(CompletedLesson {
        user_id: user_id_from_row(row)?,
        lesson_id: LessonId::new(i64_to_u64("lesson_id", row.try_get("lesson_id").map_err(ser)?)?),
        completed_at: row.try_get("completed_at").map_err(ser)?,
    })
}

pub(crate) fn map_notification_row(row: &SqliteRow) -> Result<Notification, StorageError> {
    Ok(Notification {
        id: NotificationId::new(i64_to_u64("notification_id", row.try_get("id").map_err(ser)?)?),
        user_id: user_id_from_row(row)?,
        title: row.try_get("title").map_err(ser)?,
        message: row.try_get("message").map_err(ser)?,
        icon: row.try_get("icon").map_err(ser)?,
        color: row.try_get("color").map_err(ser)?,
        link: row.try_get("link").map_err(ser)?,
        read: row.try_get::<i64, _>("read").map_err(ser)? != 0,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}
