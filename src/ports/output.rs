use crate::domain::DomainError;

/// Port for delivering the final transcript to the user.
pub trait TextOutput: Send + Sync {
    fn deliver(&self, text: &str) -> Result<(), DomainError>;
}
