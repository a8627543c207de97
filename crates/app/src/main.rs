mod config;
mod dashboard;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chronicles_core::model::{
    Broadcast, GradeGroup, GuardianId, LessonId, NotificationDraft, UserId,
};
use services::{AppServices, AvatarStore, Clock, HttpAvatarStore, Inbox, parse_answers};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt as log_fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, require_env};

/// How often `inbox --follow` checks storage for new items.
const FOLLOW_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug)]
enum ArgsError {
    MissingCommand,
    UnknownCommand(String),
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidValue { flag: &'static str, raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingCommand => write!(f, "missing subcommand"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidValue { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
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

fn parse_flag<T: std::str::FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    let raw = require_value(args, flag)?;
    raw.parse()
        .map_err(|_| ArgsError::InvalidValue { flag, raw })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Help,
    Dashboard,
    Lessons {
        guardian: Option<GuardianId>,
    },
    Submit {
        lesson: LessonId,
        answers: String,
    },
    Inbox {
        mark_read: bool,
        follow: bool,
    },
    Notify {
        title: String,
        message: String,
        group: Option<GradeGroup>,
        color: Option<String>,
        link: Option<String>,
    },
    Avatar {
        file: PathBuf,
    },
}

/// Flags seen on the command line, before checking what the subcommand needs.
#[derive(Debug, Default)]
struct Flags {
    db_url: Option<String>,
    user: Option<UserId>,
    guardian: Option<GuardianId>,
    lesson: Option<LessonId>,
    answers: Option<String>,
    mark_read: bool,
    follow: bool,
    title: Option<String>,
    message: Option<String>,
    group: Option<GradeGroup>,
    color: Option<String>,
    link: Option<String>,
    file: Option<PathBuf>,
}

#[derive(Debug)]
struct Args {
    command: Command,
    db_url: Option<String>,
    user: Option<UserId>,
}

impl Args {
    fn help() -> Self {
        Self {
            command: Command::Help,
            db_url: None,
            user: None,
        }
    }

    fn parse(argv: impl IntoIterator<Item = String>) -> Result<Self, ArgsError> {
        let mut args = argv.into_iter();
        let name = match args.next() {
            Some(arg) if arg == "--help" || arg == "-h" => return Ok(Self::help()),
            Some(arg) => arg,
            None => return Err(ArgsError::MissingCommand),
        };

        let mut flags = Flags::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    flags.db_url = Some(normalize_sqlite_url(value));
                }
                "--user" => flags.user = Some(parse_flag(&mut args, "--user")?),
                "--guardian" => flags.guardian = Some(parse_flag(&mut args, "--guardian")?),
                "--lesson" => flags.lesson = Some(parse_flag(&mut args, "--lesson")?),
                "--answers" => flags.answers = Some(require_value(&mut args, "--answers")?),
                "--mark-read" => flags.mark_read = true,
                "--follow" => flags.follow = true,
                "--title" => flags.title = Some(require_value(&mut args, "--title")?),
                "--message" => flags.message = Some(require_value(&mut args, "--message")?),
                "--group" => flags.group = Some(parse_flag(&mut args, "--group")?),
                "--color" => flags.color = Some(require_value(&mut args, "--color")?),
                "--link" => flags.link = Some(require_value(&mut args, "--link")?),
                "--file" => flags.file = Some(PathBuf::from(require_value(&mut args, "--file")?)),
                "--help" | "-h" => return Ok(Self::help()),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let command = match name.as_str() {
            "dashboard" => Command::Dashboard,
            "lessons" => Command::Lessons {
                guardian: flags.guardian,
            },
            "submit" => Command::Submit {
                lesson: flags.lesson.ok_or(ArgsError::MissingFlag { flag: "--lesson" })?,
                answers: flags.answers.ok_or(ArgsError::MissingFlag { flag: "--answers" })?,
            },
            "inbox" => Command::Inbox {
                mark_read: flags.mark_read,
                follow: flags.follow,
            },
            "notify" => Command::Notify {
                title: flags.title.ok_or(ArgsError::MissingFlag { flag: "--title" })?,
                message: flags.message.ok_or(ArgsError::MissingFlag { flag: "--message" })?,
                group: flags.group,
                color: flags.color,
                link: flags.link,
            },
            "avatar" => Command::Avatar {
                file: flags.file.ok_or(ArgsError::MissingFlag { flag: "--file" })?,
            },
            other => return Err(ArgsError::UnknownCommand(other.to_owned())),
        };

        Ok(Self {
            command,
            db_url: flags.db_url,
            user: flags.user,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- dashboard [--user <uuid>] [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- lessons   [--guardian <id>]");
    eprintln!("  cargo run -p app -- submit    --lesson <id> --answers '<json>'");
    eprintln!("  cargo run -p app -- inbox     [--mark-read] [--follow]");
    eprintln!("  cargo run -p app -- notify    --title <t> --message <m> [--group 6-7|8-9|all]");
    eprintln!("                                [--color #RRGGBB] [--link /path]");
    eprintln!("  cargo run -p app -- avatar    --file <image>");
    eprintln!();
    eprintln!("Answers are keyed by activity index: '{{\"0\": 1, \"1\": [0, 2], \"2\": \"rio\"}}'");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  CHRONICLES_DB_URL, CHRONICLES_USER, CHRONICLES_UTC_OFFSET_MINUTES,");
    eprintln!("  CHRONICLES_AVATAR_URL, CHRONICLES_AVATAR_KEY, RUST_LOG");
}

fn normalize_sqlite_url(raw: String) -> String {
    let trimmed = raw.trim().to_owned();
    if is_memory_url(&trimmed) || trimmed.starts_with("sqlite://") {
        return trimmed;
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed.as_str());
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if is_memory_url(db_url) {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_owned(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_owned(),
        }
        .into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

fn init_tracing(filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(log_fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    if args.command == Command::Help {
        print_usage();
        return Ok(());
    }

    let config = Config::from_env()?;
    init_tracing(&config.log_filter);

    let db_url = args
        .db_url
        .unwrap_or_else(|| normalize_sqlite_url(config.db_url.clone()));
    prepare_sqlite_file(&db_url)?;

    let avatars = config
        .avatar
        .clone()
        .map(|c| Arc::new(HttpAvatarStore::new(c)) as Arc<dyn AvatarStore>);
    let services =
        AppServices::new_sqlite(&db_url, Clock::default(), config.utc_offset, avatars).await?;
    info!(%db_url, "storage ready");

    let user = match args.user {
        Some(user) => user,
        None => require_env("CHRONICLES_USER")?.parse::<UserId>()?,
    };

    match args.command {
        Command::Help => print_usage(),
        Command::Dashboard => {
            print!("{}", dashboard::load(&services, user).await.render());
        }
        Command::Lessons { guardian } => show_lessons(&services, user, guardian).await?,
        Command::Submit { lesson, answers } => {
            let answers = parse_answers(&answers)?;
            let submission = services.activities().submit(user, lesson, &answers).await?;
            println!("{}", serde_json::to_string_pretty(&submission.report)?);
            if !submission.report.passed {
                println!("Not passed yet. Nothing was recorded.");
            } else if submission.is_review() {
                println!("Review mode: this lesson was already completed.");
            } else if submission.fragment_awarded {
                println!("Lesson completed! You earned a fragment.");
            } else {
                println!("Lesson completed.");
            }
        }
        Command::Inbox { mark_read, follow } => {
            show_inbox(&services, user, mark_read, follow).await?;
        }
        Command::Notify {
            title,
            message,
            group,
            color,
            link,
        } => {
            let mut draft = NotificationDraft::new(title, message);
            draft.color = color;
            draft.link = link;
            let sent = services
                .notifications()
                .broadcast(
                    user,
                    Broadcast {
                        draft,
                        grade_filter: group,
                    },
                )
                .await?;
            println!("Sent to {} student(s).", sent.len());
        }
        Command::Avatar { file } => {
            let bytes = std::fs::read(&file)?;
            let extension = file.extension().and_then(|e| e.to_str()).unwrap_or_default();
            let profile = services.profiles().upload_avatar(user, bytes, extension).await?;
            if let Some(url) = profile.avatar_url {
                println!("Avatar: {url}");
            }
        }
    }

    Ok(())
}

async fn show_lessons(
    services: &AppServices,
    user: UserId,
    guardian: Option<GuardianId>,
) -> Result<(), Box<dyn std::error::Error>> {
    let units = services.lessons().lessons_by_unit(user, guardian).await?;
    if units.is_empty() {
        println!("No lessons available.");
        return Ok(());
    }
    for (unit, lessons) in units {
        println!("Unit {unit}");
        for lesson in lessons {
            println!(
                "  {}. {} [id {}, guardian {}]",
                lesson.position, lesson.title, lesson.id, lesson.guardian_id
            );
        }
    }
    Ok(())
}

async fn show_inbox(
    services: &AppServices,
    user: UserId,
    mark_read: bool,
    follow: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let notifications = services.notifications();
    let mut inbox = Inbox::new(notifications.list(user).await?);

    for item in inbox.items() {
        println!("{} {} | {}", if item.read { " " } else { "*" }, item.title, item.message);
    }
    println!("{} unread", inbox.unread_count());

    if mark_read {
        let changed = notifications.mark_all_read(user).await?;
        inbox.mark_all_read();
        println!("Marked {changed} as read.");
    }

    if !follow {
        return Ok(());
    }

    // Other processes write straight to storage, so poll it and let the
    // inbox drop what it already holds.
    println!("Following new notifications (Ctrl-C to stop)...");
    let mut feed = notifications.subscribe(user);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            pushed = feed.recv() => match pushed {
                Some(item) => {
                    println!("* {} | {}", item.title, item.message);
                    inbox.push(item);
                }
                None => break,
            },
            () = tokio::time::sleep(FOLLOW_INTERVAL) => {
                for item in notifications.list(user).await?.into_iter().rev() {
                    let line = format!("* {} | {}", item.title, item.message);
                    if inbox.push(item) {
                        println!("{line}");
                    }
                }
            }
        }
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
