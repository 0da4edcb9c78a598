pub mod task;
pub mod user;

pub use task::{Task, TaskFilter, TaskInput, TaskUpdate};
pub use user::{NewUser, PublicUser, User, UserUpdate};

use validator::ValidationError;

/// Shared rule for required text fields: whitespace-only counts as empty.
pub(crate) fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some("must not be empty".into());
        return Err(error);
    }
    Ok(())
}
