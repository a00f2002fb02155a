//! Browse commands: teacher list, teacher profile, slot list.

use clap::Args;

use danceconnect::models::Teacher;
use danceconnect::sync::SyncService;

use super::OutputFormat;

#[derive(Args)]
pub struct TeachersCommand {
    /// Match against name, style, and location
    #[arg(long, short)]
    pub search: Option<String>,

    /// Filter by dance style
    #[arg(long)]
    pub style: Option<String>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl TeachersCommand {
    pub async fn run(&self, service: &SyncService) -> Result<(), Box<dyn std::error::Error>> {
        service.load_all().await;

        let mut teachers = match &self.search {
            Some(query) => service.search_teachers(query).await,
            None => service.teachers().await,
        };
        if let Some(style) = &self.style {
            let style = style.to_lowercase();
            teachers.retain(|t| {
                t.style.to_lowercase().contains(&style)
                    || t.styles.iter().any(|s| s.to_lowercase().contains(&style))
            });
        }

        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&teachers)?);
            }
            OutputFormat::Text => {
                if teachers.is_empty() {
                    println!("No teachers found");
                    return Ok(());
                }
                for teacher in &teachers {
                    let fav = if service.is_favorite(teacher.id)? {
                        "*"
                    } else {
                        " "
                    };
                    println!(
                        "{} {:>3}  {:<22} {:<20} {:<14} {:>4} EUR/h  {:.1} ({} avis)",
                        fav,
                        teacher.id,
                        teacher.name,
                        teacher.style,
                        teacher.location,
                        teacher.price,
                        teacher.rating,
                        teacher.reviews
                    );
                }
                println!("\nTotal: {} teacher(s)", teachers.len());
            }
        }
        Ok(())
    }
}

#[derive(Args)]
pub struct TeacherCommand {
    /// Teacher ID
    pub id: i64,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl TeacherCommand {
    pub async fn run(&self, service: &SyncService) -> Result<(), Box<dyn std::error::Error>> {
        service.load_all().await;

        let teacher = service
            .teacher(self.id)
            .await
            .ok_or_else(|| format!("No teacher with id {}", self.id))?;

        if let OutputFormat::Json = self.format {
            println!("{}", serde_json::to_string_pretty(&teacher)?);
            return Ok(());
        }

        print_profile(&teacher);

        let slots = service.slots_for_teacher(self.id).await;
        if slots.is_empty() {
            println!("\nNo open slots");
        } else {
            println!("\nOpen slots:");
            for slot in &slots {
                println!("  {:>3}  {} {}", slot.id, slot.date, slot.time.format("%H:%M"));
            }
        }
        Ok(())
    }
}

fn print_profile(teacher: &Teacher) {
    println!("{}", teacher.name);
    println!("{}", "=".repeat(teacher.name.len()));
    println!("Style: {}", teacher.style);
    if !teacher.styles.is_empty() {
        println!("Styles: {}", teacher.styles.join(", "));
    }
    println!("Location: {}", teacher.location);
    println!("Price: {} EUR/h", teacher.price);
    println!("Rating: {:.1} ({} avis)", teacher.rating, teacher.reviews);
    if let Some(experience) = &teacher.experience {
        println!("Experience: {}", experience);
    }
    if let Some(bio) = &teacher.bio {
        println!("\n{}", bio);
    }
    if !teacher.courses.is_empty() {
        println!("\nCourses:");
        for course in &teacher.courses {
            println!(
                "  {:>3}  {:<26} {:<14} {:<14} {:>4} EUR  {}",
                course.id, course.title, course.style, course.level, course.price, course.duration
            );
        }
    }
}

#[derive(Args)]
pub struct SlotsCommand {
    /// Only this teacher's slots
    #[arg(long, short)]
    pub teacher: Option<i64>,

    /// Include booked slots
    #[arg(long)]
    pub all: bool,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl SlotsCommand {
    pub async fn run(&self, service: &SyncService) -> Result<(), Box<dyn std::error::Error>> {
        service.load_all().await;

        let mut slots = service.slots().await;
        if let Some(teacher_id) = self.teacher {
            slots.retain(|s| s.teacher_id == teacher_id);
        }
        if !self.all {
            slots.retain(|s| s.is_available());
        }
        slots.sort_by_key(|s| (s.date, s.time));

        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&slots)?);
            }
            OutputFormat::Text => {
                if slots.is_empty() {
                    println!("No slots found");
                    return Ok(());
                }
                for slot in &slots {
                    let teacher = service.teacher(slot.teacher_id).await;
                    let name = teacher.map(|t| t.name).unwrap_or_default();
                    println!(
                        "{:>4}  {} {}  {:<22} {}",
                        slot.id,
                        slot.date,
                        slot.time.format("%H:%M"),
                        name,
                        slot.status
                    );
                }
                println!("\nTotal: {} slot(s)", slots.len());
            }
        }
        Ok(())
    }
}
