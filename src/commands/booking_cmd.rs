//! Booking commands.

use clap::Args;

use danceconnect::config::Config;
use danceconnect::sync::SyncService;

use super::{apply_write_policy, OutputFormat};

#[derive(Args)]
pub struct BookCommand {
    /// Slot ID to book
    pub slot_id: i64,
}

impl BookCommand {
    pub async fn run(
        &self,
        service: &SyncService,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        service.load_all().await;

        let result = service.book_slot(self.slot_id).await;
        match apply_write_policy(result, config.write_policy.value)? {
            Some(booking) => {
                println!(
                    "Booked {} with {} on {} at {}",
                    booking.style,
                    booking.teacher_name,
                    booking.date,
                    booking.time.format("%H:%M")
                );
                println!("Booking id: {} ({})", booking.id, booking.status_label);
            }
            None => println!("Booking requested"),
        }
        Ok(())
    }
}

#[derive(Args)]
pub struct BookingsCommand {
    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl BookingsCommand {
    pub async fn run(&self, service: &SyncService) -> Result<(), Box<dyn std::error::Error>> {
        service.load_all().await;

        let mut bookings = service.bookings().await;
        // The backend scopes bookings to the caller; the memory backend
        // returns everything, so filter here too.
        if let Some(user) = service.session().current_user() {
            bookings.retain(|b| b.student_id == user.id);
        }

        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&bookings)?);
            }
            OutputFormat::Text => {
                if bookings.is_empty() {
                    println!("No bookings");
                    return Ok(());
                }
                for booking in &bookings {
                    println!(
                        "{:>4}  {} {}  {:<22} {:<18} {:<14} {}",
                        booking.id,
                        booking.date,
                        booking.time.format("%H:%M"),
                        booking.teacher_name,
                        booking.style,
                        booking.location,
                        booking.status_label
                    );
                }
                println!("\nTotal: {} booking(s)", bookings.len());
            }
        }
        Ok(())
    }
}
