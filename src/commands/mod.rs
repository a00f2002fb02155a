mod auth;
mod booking_cmd;
mod chat_cmd;
mod config_cmd;
mod fav;
mod listen;
mod teachers;

pub use auth::{logout, whoami, LoginCommand, SignupCommand};
pub use booking_cmd::{BookCommand, BookingsCommand};
pub use chat_cmd::{ChatCommand, ChatsCommand};
pub use config_cmd::ConfigCommand;
pub use fav::FavCommand;
pub use listen::ListenCommand;
pub use teachers::{SlotsCommand, TeacherCommand, TeachersCommand};

use clap::ValueEnum;
use danceconnect::config::WritePolicy;
use danceconnect::error::SyncError;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Applies the configured write policy to a mutating call's outcome.
///
/// Strict surfaces the error to the caller. Optimistic logs it and reports
/// no result, so the command finishes quietly and the change feed is left
/// to reflect whatever actually happened.
pub(crate) fn apply_write_policy<T>(
    result: Result<T, SyncError>,
    policy: WritePolicy,
) -> Result<Option<T>, SyncError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if policy == WritePolicy::Optimistic => {
            tracing::warn!(error = %err, "write failed, continuing optimistically");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed() -> Result<u32, SyncError> {
        Err(SyncError::Conflict("slot 1 is already booked".to_string()))
    }

    #[test]
    fn test_apply_write_policy_passes_success_through() {
        let out = apply_write_policy(Ok(7u32), WritePolicy::Strict).unwrap();
        assert_eq!(out, Some(7));
        let out = apply_write_policy(Ok(7u32), WritePolicy::Optimistic).unwrap();
        assert_eq!(out, Some(7));
    }

    #[test]
    fn test_apply_write_policy_strict_surfaces_the_error() {
        let err = apply_write_policy(failed(), WritePolicy::Strict).unwrap_err();
        assert!(matches!(err, SyncError::Conflict(_)));
    }

    #[test]
    fn test_apply_write_policy_optimistic_swallows_the_error() {
        let out = apply_write_policy(failed(), WritePolicy::Optimistic).unwrap();
        assert_eq!(out, None);
    }
}
