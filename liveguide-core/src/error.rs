use crate::models::ChannelId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Duplicate channel: {0}")]
    DuplicateChannel(ChannelId),
    #[error("Time window out of range")]
    WindowOutOfRange,
    #[error("Unexpected status: {0}")]
    UnexpectedStatus(reqwest::StatusCode),
    #[error("Transport error: {0}")]
    Transport(reqwest::Error),
    #[error("URL error: {0}")]
    UrlError(url::ParseError),
    #[error("std::io error: {0}")]
    IoError(std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(serde_json::Error),
    #[error("YAML error: {0}")]
    YamlError(serde_yaml::Error),
    #[error("actlet error: {0}")]
    ActletError(actlet::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::UrlError(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err)
    }
}

impl From<actlet::Error> for Error {
    fn from(err: actlet::Error) -> Self {
        Self::ActletError(err)
    }
}
