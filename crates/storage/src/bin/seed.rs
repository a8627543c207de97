use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use chronicles_core::model::{
    ActivityDraft, Area, CorrectAnswer, DEFAULT_FRAGMENT_CAPACITY, Fragment, FragmentId, GradeGroup,
    Guardian, GuardianId, LessonDraft, SignUpForm, UserId,
};
use storage::repository::{LessonFilter, Storage};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    demo_users: bool,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("CHRONICLES_DB_URL")
            .unwrap_or_else(|_| "sqlite:chronicles.sqlite3".into());
        let mut demo_users = false;
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--demo-users" => demo_users = true,
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            demo_users,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>   SQLite URL (default: sqlite:chronicles.sqlite3)");
    eprintln!("  --demo-users        Also create a demo student and a demo admin");
    eprintln!("  --now <rfc3339>     Fixed current time for deterministic seeding");
    eprintln!("  -h, --help          Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  CHRONICLES_DB_URL");
}

/// (id, guardian name, area, order, threshold, fragment name)
const CATALOG: [(u64, &str, Area, u32, f64, &str); 4] = [
    (1, "Machado", Area::Portuguese, 1, 0.0, "Quill Fragment"),
    (2, "Pythagoras", Area::Math, 2, 60.0, "Triangle Fragment"),
    (3, "Herodotus", Area::Humanities, 3, 60.0, "Scroll Fragment"),
    (4, "Einstein", Area::Science, 4, 60.0, "Atom Fragment"),
];

/// (guardian, title, content)
const LESSONS: [(u64, &str, &str); 8] = [
    (1, "Nouns and adjectives", "A noun names a thing; an adjective describes it."),
    (1, "Verb tenses", "Past, present and future tell us when an action happens."),
    (2, "Fractions", "A fraction splits a whole into equal parts."),
    (2, "Decimals", "Decimals are fractions written in base ten."),
    (3, "Ancient Egypt", "The Nile shaped how Egyptians farmed and traded."),
    (3, "Ancient Greece", "City-states like Athens and Sparta ruled themselves."),
    (4, "States of matter", "Matter can be solid, liquid or gas."),
    (4, "The water cycle", "Water evaporates, condenses and falls as rain."),
];

fn catalog() -> Result<Vec<(Guardian, Fragment)>, chronicles_core::Error> {
    let mut out = Vec::with_capacity(CATALOG.len());
    for (id, name, area, order, threshold, fragment) in CATALOG {
        let guardian = Guardian::new(GuardianId::new(id), name, area, order, threshold)?;
        let fragment = Fragment::new(
            FragmentId::new(id),
            guardian.id(),
            fragment,
            DEFAULT_FRAGMENT_CAPACITY,
        )?;
        out.push((guardian, fragment));
    }
    Ok(out)
}

async fn seed_catalog(storage: &Storage) -> Result<(), Box<dyn std::error::Error>> {
    for (guardian, fragment) in catalog()? {
        storage.catalog.upsert_guardian(&guardian).await?;
        storage.catalog.upsert_fragment(&fragment).await?;
    }
    Ok(())
}

async fn seed_lessons(
    storage: &Storage,
    now: DateTime<Utc>,
) -> Result<usize, Box<dyn std::error::Error>> {
    // Re-running the seed must not duplicate content.
    if !storage.lessons.list_lessons(LessonFilter::default()).await?.is_empty() {
        return Ok(0);
    }

    let mut created = 0;
    for (index, (guardian, title, content)) in LESSONS.iter().enumerate() {
        let position = u32::try_from(index % 2 + 1)?;
        let lesson = LessonDraft {
            guardian_id: GuardianId::new(*guardian),
            title: (*title).to_owned(),
            content: (*content).to_owned(),
            unit: 1,
            position,
            active: true,
            grade_group: GradeGroup::All,
            video_urls: Vec::new(),
            image_url: None,
        }
        .validate(now)?;
        let lesson = storage.lessons.insert_lesson(&lesson).await?;

        let questions = [
            ActivityDraft {
                lesson_id: lesson.id,
                prompt: format!("Did you read \"{title}\"?"),
                options: vec!["Yes".into(), "No".into()],
                answer: CorrectAnswer::Index(0),
                position: 1,
            },
            ActivityDraft {
                lesson_id: lesson.id,
                prompt: "Pick every word that appears in the lesson title.".into(),
                options: title.split_whitespace().map(str::to_owned).chain(["zebra".to_owned()]).collect(),
                answer: CorrectAnswer::Indices(
                    (0..title.split_whitespace().count()).collect(),
                ),
                position: 2,
            },
            ActivityDraft {
                lesson_id: lesson.id,
                prompt: "Type the first word of the lesson title.".into(),
                options: Vec::new(),
                answer: CorrectAnswer::Text(
                    title.split_whitespace().next().unwrap_or(title).to_owned(),
                ),
                position: 3,
            },
        ];
        for question in questions {
            storage.activities.insert_activity(&question.validate()?).await?;
        }
        created += 1;
    }
    Ok(created)
}

async fn seed_demo_users(
    storage: &Storage,
    now: DateTime<Utc>,
) -> Result<(UserId, UserId), Box<dyn std::error::Error>> {
    let student = UserId::random();
    let admin = UserId::random();
    for (user_id, name, email, grade) in [
        (student, "Ana Demo", "ana@example.org", 7),
        (admin, "Admin Demo", "admin@example.org", 9),
    ] {
        let profile = SignUpForm {
            email: email.into(),
            password: "demo-password".into(),
            password_confirmation: "demo-password".into(),
            display_name: name.into(),
            school: Some("Demo School".into()),
            grade: Some(grade),
            birth_date: NaiveDate::from_ymd_opt(2012, 1, 1),
        }
        .validate(user_id, now)?;
        storage.profiles.insert_profile(&profile).await?;
    }
    storage.profiles.grant_admin(admin).await?;
    Ok((student, admin))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    seed_catalog(&storage).await?;
    let guardians = storage.catalog.list_guardians().await?;
    let lessons = seed_lessons(&storage, now).await?;
    println!(
        "Seeded {} guardians and {} lessons into {}",
        guardians.len(),
        lessons,
        args.db_url
    );

    if args.demo_users {
        let (student, admin) = seed_demo_users(&storage, now).await?;
        println!("Demo student: {student}");
        println!("Demo admin:   {admin}");
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
