//! DanceConnect operator tooling.
//!
//! Works directly against the configured backend, bypassing the client-side
//! role checks: seed fixture data, manage slots and courses, inspect tables.
//!
//! # Usage
//!
//! ```bash
//! dc-admin seed
//! dc-admin add-slot --teacher 1 --date 2025-06-01 --time 14:00
//! dc-admin list slots
//! dc-admin courses add 1 --title "Atelier barre au sol" --style "Ballet" \
//!     --level "Intermédiaire" --price 40 --duration 1h30
//! ```

use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use danceconnect::config::Config;
use danceconnect::models::Course;
use danceconnect::remote::{create_store, NewSlot, RemoteStore};
use danceconnect::seed;

#[derive(Parser)]
#[command(name = "dc-admin")]
#[command(version)]
#[command(about = "DanceConnect backend administration tool")]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert the fixture teachers and a week of slots
    Seed,

    /// Publish a slot for a teacher
    AddSlot(AddSlotCommand),

    /// Delete a slot
    RemoveSlot(RemoveSlotCommand),

    /// Print a table's rows
    List(ListCommand),

    /// Manage a teacher's courses
    Courses(CoursesCommand),
}

#[derive(Args)]
struct AddSlotCommand {
    /// Teacher ID
    #[arg(long, short)]
    teacher: i64,

    /// Date (YYYY-MM-DD)
    #[arg(long, short)]
    date: String,

    /// Time (HH:MM)
    #[arg(long)]
    time: String,
}

#[derive(Args)]
struct RemoveSlotCommand {
    /// Slot ID
    slot_id: i64,
}

#[derive(Args)]
struct ListCommand {
    /// Table name (teachers, slots, bookings, chats)
    table: String,
}

#[derive(Args)]
struct CoursesCommand {
    #[command(subcommand)]
    command: CoursesSubcommand,
}

#[derive(Subcommand)]
enum CoursesSubcommand {
    /// Add or replace a course on a teacher profile
    Add {
        /// Teacher ID
        teacher_id: i64,

        /// Course ID (defaults to the next free one)
        #[arg(long)]
        id: Option<i64>,

        /// Course title
        #[arg(long)]
        title: String,

        /// Dance style
        #[arg(long)]
        style: String,

        /// Level, e.g. "Débutant"
        #[arg(long)]
        level: String,

        /// Price in EUR
        #[arg(long)]
        price: String,

        /// Duration, e.g. "1h30"
        #[arg(long)]
        duration: String,
    },

    /// Remove a course from a teacher profile
    Remove {
        /// Teacher ID
        teacher_id: i64,

        /// Course ID
        course_id: i64,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "danceconnect=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load(cli.config)?;
    let store = create_store(&config)?;

    match &cli.command {
        Commands::Seed => seed_backend(&store).await,
        Commands::AddSlot(cmd) => add_slot(&store, cmd).await,
        Commands::RemoveSlot(cmd) => {
            store.delete_slot(cmd.slot_id).await?;
            println!("Deleted slot {}", cmd.slot_id);
            Ok(())
        }
        Commands::List(cmd) => list_table(&store, &cmd.table).await,
        Commands::Courses(cmd) => courses(&store, &cmd.command).await,
    }
}

async fn seed_backend(store: &Arc<dyn RemoteStore>) -> Result<(), Box<dyn std::error::Error>> {
    let teachers = seed::fixture_teachers();
    for teacher in &teachers {
        store.upsert_teacher(teacher.clone()).await?;
    }

    let slots = seed::fixture_slots(seed::fixture_start_date());
    for slot in &slots {
        store
            .insert_slot(NewSlot {
                teacher_id: slot.teacher_id,
                date: slot.date,
                time: slot.time,
                status: slot.status,
            })
            .await?;
    }

    println!(
        "Seeded {} teacher(s) and {} slot(s)",
        teachers.len(),
        slots.len()
    );
    Ok(())
}

async fn add_slot(
    store: &Arc<dyn RemoteStore>,
    cmd: &AddSlotCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    let date = NaiveDate::parse_from_str(&cmd.date, "%Y-%m-%d")?;
    let time = NaiveTime::parse_from_str(&cmd.time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(&cmd.time, "%H:%M:%S"))?;

    let slot = store
        .insert_slot(NewSlot {
            teacher_id: cmd.teacher,
            date,
            time,
            status: danceconnect::models::SlotStatus::Available,
        })
        .await?;
    println!(
        "Added slot {} for teacher {} on {} at {}",
        slot.id,
        slot.teacher_id,
        slot.date,
        slot.time.format("%H:%M")
    );
    Ok(())
}

async fn list_table(
    store: &Arc<dyn RemoteStore>,
    table: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match table {
        "teachers" => {
            for t in store.fetch_teachers().await? {
                println!(
                    "{:>3}  {:<22} {:<20} {:<14} {} course(s)",
                    t.id,
                    t.name,
                    t.style,
                    t.location,
                    t.courses.len()
                );
            }
        }
        "slots" => {
            for s in store.fetch_slots().await? {
                println!(
                    "{:>4}  teacher {:>3}  {} {}  {}",
                    s.id,
                    s.teacher_id,
                    s.date,
                    s.time.format("%H:%M"),
                    s.status
                );
            }
        }
        "bookings" => {
            for b in store.fetch_bookings().await? {
                println!(
                    "{:>4}  {} {}  student {:<8} teacher {:>3}  slot {:?}",
                    b.id,
                    b.date,
                    b.time.format("%H:%M"),
                    b.student_id,
                    b.teacher_id,
                    b.slot_id
                );
            }
        }
        "chats" => {
            for c in store.fetch_chats().await? {
                println!(
                    "{}  {}  {} message(s)",
                    c.id,
                    c.participants.join(" / "),
                    c.messages.len()
                );
            }
        }
        other => return Err(format!("Unknown table '{}'", other).into()),
    }
    Ok(())
}

async fn courses(
    store: &Arc<dyn RemoteStore>,
    command: &CoursesSubcommand,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        CoursesSubcommand::Add {
            teacher_id,
            id,
            title,
            style,
            level,
            price,
            duration,
        } => {
            let id = match id {
                Some(id) => *id,
                None => {
                    let teachers = store.fetch_teachers().await?;
                    let teacher = teachers
                        .iter()
                        .find(|t| t.id == *teacher_id)
                        .ok_or_else(|| format!("No teacher with id {}", teacher_id))?;
                    teacher.courses.iter().map(|c| c.id).max().unwrap_or(0) + 1
                }
            };

            let course = Course {
                id,
                title: title.clone(),
                style: style.clone(),
                level: level.clone(),
                price: price.clone(),
                duration: duration.clone(),
                rating: 0.0,
                reviews: 0,
            };
            let teacher = store.upsert_course(*teacher_id, course).await?;
            println!("Teacher {} now has {} course(s)", teacher.name, teacher.courses.len());
            Ok(())
        }

        CoursesSubcommand::Remove {
            teacher_id,
            course_id,
        } => {
            let teacher = store.delete_course(*teacher_id, *course_id).await?;
            println!("Teacher {} now has {} course(s)", teacher.name, teacher.courses.len());
            Ok(())
        }
    }
}
