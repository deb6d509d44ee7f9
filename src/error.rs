#[derive(Debug)]
pub enum AppError {
    Config(String),
    EventSource(String),
    Shutdown(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "Configuration Error: {msg}"),
            AppError::EventSource(msg) => write!(f, "Event Source Error: {msg}"),
            AppError::Shutdown(msg) => write!(f, "Shut Down: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}
