pub mod agent;
pub mod backend;
pub mod config;
pub mod messages;
pub mod session;
pub mod tools;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ZarvisError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Session busy: {0}")]
    SessionBusy(String),

    #[error("Channel error: {0}")]
    Channel(String),
}

impl From<std::io::Error> for ZarvisError {
    fn from(e: std::io::Error) -> Self {
        ZarvisError::Io(e.to_string())
    }
}

impl From<reqwest::Error> for ZarvisError {
    fn from(e: reqwest::Error) -> Self {
        ZarvisError::Upstream(e.to_string())
    }
}

impl From<serde_json::Error> for ZarvisError {
    fn from(e: serde_json::Error) -> Self {
        ZarvisError::InvalidArgument(e.to_string())
    }
}

impl ZarvisError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // The reasoning step can react to bad tool input
            ZarvisError::InvalidArgument(_) => true,
            ZarvisError::NotFound(_) => true,
            // Remote failures are typically transient; the caller may retry the turn
            ZarvisError::Upstream(_) => true,
            ZarvisError::Orchestrator(_) => true,
            ZarvisError::Io(_) => false,
            ZarvisError::Config(_) => false,
            ZarvisError::Cancelled(_) => true,
            ZarvisError::SessionBusy(_) => true,
            ZarvisError::Channel(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            ZarvisError::InvalidArgument(_) => {
                "The request contained an invalid argument.".to_string()
            }
            ZarvisError::NotFound(_) => "A referenced file could not be found.".to_string(),
            ZarvisError::Upstream(_) => {
                "The AI service failed to respond. Please try again.".to_string()
            }
            ZarvisError::Orchestrator(_) => {
                "The assistant could not finish this request. Please rephrase and try again."
                    .to_string()
            }
            ZarvisError::Io(_) => "File system error occurred.".to_string(),
            ZarvisError::Config(_) => "Configuration error. Please check settings.".to_string(),
            ZarvisError::Cancelled(_) => "The request was cancelled.".to_string(),
            ZarvisError::SessionBusy(_) => {
                "Still working on the previous request. Please wait.".to_string()
            }
            ZarvisError::Channel(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ZarvisError>;
