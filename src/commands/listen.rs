//! Live change-feed tail.

use clap::Args;
use tokio::sync::broadcast;

use danceconnect::remote::ChangeEvent;
use danceconnect::sync::SyncService;

#[derive(Args)]
pub struct ListenCommand {}

impl ListenCommand {
    pub async fn run(&self, service: &SyncService) -> Result<(), Box<dyn std::error::Error>> {
        service.load_all().await;

        let mut events = service.events();
        service.subscribe().await?;
        println!("Listening for changes (Ctrl-C to stop)");

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                event = events.recv() => match event {
                    Ok(event) => println!("{:<6} {:<9} {}", event.kind(), event.table(), describe(&event)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        eprintln!("(lagged, {} event(s) skipped)", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        service.unsubscribe();
        Ok(())
    }
}

fn describe(event: &ChangeEvent) -> String {
    match event {
        ChangeEvent::SlotInserted(slot) | ChangeEvent::SlotUpdated(slot) => format!(
            "slot {} teacher {} {} {} ({})",
            slot.id,
            slot.teacher_id,
            slot.date,
            slot.time.format("%H:%M"),
            slot.status
        ),
        ChangeEvent::SlotDeleted { id } => format!("slot {}", id),
        ChangeEvent::BookingInserted(booking) => format!(
            "booking {} slot {:?} student {}",
            booking.id, booking.slot_id, booking.student_id
        ),
        ChangeEvent::ChatInserted(chat) => {
            format!("chat {} between {}", chat.id, chat.participants.join(" and "))
        }
        ChangeEvent::MessageInserted(message) => {
            format!("message in {} from {}", message.chat_id, message.sender_id)
        }
    }
}
