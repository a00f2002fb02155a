//! Account commands: login, signup, logout, whoami.

use clap::Args;
use std::io::{self, Write};

use danceconnect::models::UserRole;
use danceconnect::sync::SyncService;

#[derive(Args)]
pub struct LoginCommand {
    /// Account email
    pub email: String,
}

impl LoginCommand {
    pub async fn run(&self, service: &SyncService) -> Result<(), Box<dyn std::error::Error>> {
        let password = prompt("Password: ")?;
        let user = service.session().log_in(&self.email, &password).await?;
        println!("Logged in as {} ({})", user.name, user.role);
        Ok(())
    }
}

#[derive(Args)]
pub struct SignupCommand {
    /// Account email
    pub email: String,

    /// Display name
    #[arg(long)]
    pub name: String,

    /// Account role (student, teacher)
    #[arg(long, default_value = "student")]
    pub role: String,
}

impl SignupCommand {
    pub async fn run(&self, service: &SyncService) -> Result<(), Box<dyn std::error::Error>> {
        let role: UserRole = self.role.parse()?;
        let password = prompt("Password: ")?;
        let user = service
            .session()
            .sign_up(&self.email, &password, &self.name, role)
            .await?;
        println!("Welcome, {}! Account created ({})", user.name, user.role);
        Ok(())
    }
}

pub async fn logout(service: &SyncService) -> Result<(), Box<dyn std::error::Error>> {
    if !service.session().is_authenticated() {
        println!("Not logged in");
        return Ok(());
    }
    service.session().log_out().await?;
    println!("Logged out");
    Ok(())
}

pub fn whoami(service: &SyncService) {
    match service.session().current_user() {
        Some(user) => {
            println!("{} ({})", user.name, user.role);
            println!("  id: {}", user.id);
            if let Some(email) = &user.email {
                println!("  email: {}", email);
            }
        }
        None => println!("Not logged in"),
    }
}

fn prompt(label: &str) -> io::Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
