//! Chat commands: list, start, send, show, tail.

use clap::{Args, Subcommand};
use tokio::sync::broadcast;
use uuid::Uuid;

use danceconnect::config::Config;
use danceconnect::models::Message;
use danceconnect::remote::ChangeEvent;
use danceconnect::sync::SyncService;

use super::{apply_write_policy, OutputFormat};

#[derive(Args)]
pub struct ChatsCommand {
    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl ChatsCommand {
    pub async fn run(&self, service: &SyncService) -> Result<(), Box<dyn std::error::Error>> {
        service.load_all().await;

        let chats = service.chats().await;
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&chats)?);
            }
            OutputFormat::Text => {
                if chats.is_empty() {
                    println!("No chats");
                    return Ok(());
                }
                let me = service.session().current_user().map(|u| u.id);
                for chat in &chats {
                    let with = match me.as_deref().and_then(|id| chat.other_participant(id)) {
                        Some(other) => other.to_string(),
                        None => chat.participants.join(" / "),
                    };
                    println!(
                        "{}  with {:<12} {:>3} message(s)  last activity {}",
                        chat.id,
                        with,
                        chat.messages.len(),
                        chat.last_activity().format("%Y-%m-%d %H:%M")
                    );
                }
                println!("\nTotal: {} chat(s)", chats.len());
            }
        }
        Ok(())
    }
}

#[derive(Args)]
pub struct ChatCommand {
    #[command(subcommand)]
    pub command: ChatSubcommand,
}

#[derive(Subcommand)]
pub enum ChatSubcommand {
    /// Open (or reuse) the chat with another user
    Start {
        /// The other participant's user ID
        user_id: String,
    },

    /// Send a message
    Send {
        /// Chat ID
        chat_id: Uuid,

        /// Message text
        text: String,
    },

    /// Show a chat's messages
    Show {
        /// Chat ID
        chat_id: Uuid,
    },

    /// Follow a chat live until Ctrl-C
    Tail {
        /// Chat ID
        chat_id: Uuid,
    },
}

impl ChatCommand {
    pub async fn run(
        &self,
        service: &SyncService,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ChatSubcommand::Start { user_id } => {
                service.load_all().await;
                let result = service.start_chat(user_id).await;
                match apply_write_policy(result, config.write_policy.value)? {
                    Some(chat) => println!("Chat id: {}", chat.id),
                    None => println!("Chat requested"),
                }
                Ok(())
            }

            ChatSubcommand::Send { chat_id, text } => {
                let result = service.send_message(*chat_id, text).await;
                match apply_write_policy(result, config.write_policy.value)? {
                    Some(message) => {
                        println!("Sent at {}", message.created_at.format("%H:%M:%S"))
                    }
                    None => println!("Message sent"),
                }
                Ok(())
            }

            ChatSubcommand::Show { chat_id } => {
                service.load_all().await;
                let chat = service
                    .chat(*chat_id)
                    .await
                    .ok_or_else(|| format!("No chat with id {}", chat_id))?;
                if chat.messages.is_empty() {
                    println!("No messages yet");
                    return Ok(());
                }
                for message in &chat.messages {
                    print_message(message);
                }
                Ok(())
            }

            ChatSubcommand::Tail { chat_id } => {
                service.load_all().await;
                let chat = service
                    .chat(*chat_id)
                    .await
                    .ok_or_else(|| format!("No chat with id {}", chat_id))?;

                let mut events = service.events();
                service.subscribe().await?;

                for message in &chat.messages {
                    print_message(message);
                }
                println!("-- following, Ctrl-C to stop --");

                let chat_id = *chat_id;
                loop {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => break,
                        event = events.recv() => match event {
                            Ok(ChangeEvent::MessageInserted(message))
                                if message.chat_id == chat_id =>
                            {
                                print_message(&message);
                            }
                            Ok(_) => {}
                            Err(broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(broadcast::error::RecvError::Closed) => break,
                        },
                    }
                }
                service.unsubscribe();
                Ok(())
            }
        }
    }
}

fn print_message(message: &Message) {
    println!(
        "[{}] {}: {}",
        message.created_at.format("%Y-%m-%d %H:%M"),
        message.sender_id,
        message.text
    );
}
