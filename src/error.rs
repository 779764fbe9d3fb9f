/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// The store rejected the email/password pair
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account with this email already exists")]
    AccountExists,

    /// Sign-up created the auth principal but the profile record could not be written
    #[error("Failed to create user profile")]
    ProfileCreationFailed,

    #[error("{0}")]
    Auth(String),

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Search provider error: {0}")]
    SearchProvider(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this error belongs to the authentication layer and should be
    /// shown on the sign-in/sign-up form
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            AppError::InvalidCredentials
                | AppError::AccountExists
                | AppError::ProfileCreationFailed
                | AppError::Auth(_)
                | AppError::NotAuthenticated
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_messages() {
        assert_eq!(
            AppError::InvalidCredentials.to_string(),
            "Invalid email or password"
        );
        assert_eq!(
            AppError::ProfileCreationFailed.to_string(),
            "Failed to create user profile"
        );
        assert_eq!(
            AppError::Auth("Email not confirmed".to_string()).to_string(),
            "Email not confirmed"
        );
    }

    #[test]
    fn test_is_auth() {
        assert!(AppError::InvalidCredentials.is_auth());
        assert!(AppError::ProfileCreationFailed.is_auth());
        assert!(!AppError::SearchProvider("timeout".to_string()).is_auth());
        assert!(!AppError::ExternalApi("503".to_string()).is_auth());
    }
}
