use thiserror::Error;

/// Input rejected before any network call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("No conversation selected")]
    NoPeerSelected,

    #[error("Post text is required")]
    EmptyPost,

    #[error("Comment is empty")]
    EmptyComment,

    #[error("Name and email are required")]
    MissingProfileFields,

    #[error("Please enter your password to confirm")]
    MissingConfirmation,

    #[error("All password fields are required")]
    MissingPasswordFields,

    #[error("New password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("New password and confirm password do not match")]
    PasswordMismatch,

    #[error("New password must be different from current password")]
    PasswordUnchanged,
}
