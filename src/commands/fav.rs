//! Favorite teachers, kept locally.

use clap::{Args, Subcommand};

use danceconnect::sync::SyncService;

#[derive(Args)]
pub struct FavCommand {
    #[command(subcommand)]
    pub command: Option<FavSubcommand>,
}

#[derive(Subcommand)]
pub enum FavSubcommand {
    /// Add or remove a teacher from favorites
    Toggle {
        /// Teacher ID
        teacher_id: i64,
    },
}

impl FavCommand {
    pub async fn run(&self, service: &SyncService) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            Some(FavSubcommand::Toggle { teacher_id }) => {
                if service.toggle_favorite(*teacher_id)? {
                    println!("Added teacher {} to favorites", teacher_id);
                } else {
                    println!("Removed teacher {} from favorites", teacher_id);
                }
                Ok(())
            }

            None => {
                let favorites = service.favorites()?;
                if favorites.is_empty() {
                    println!("No favorites");
                    return Ok(());
                }
                // Resolve names when the backend is reachable; ids otherwise.
                service.load_all().await;
                for teacher_id in &favorites {
                    match service.teacher(*teacher_id).await {
                        Some(teacher) => println!(
                            "{:>3}  {:<22} {:<20} {}",
                            teacher.id, teacher.name, teacher.style, teacher.location
                        ),
                        None => println!("{:>3}  (unknown teacher)", teacher_id),
                    }
                }
                println!("\nTotal: {} favorite(s)", favorites.len());
                Ok(())
            }
        }
    }
}
