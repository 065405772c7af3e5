use std::io;

use thiserror::Error;

use sdnqos_wire::flow::DatapathId;

/// Failure to hand a command to a switch connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Command channel to switch {0} is full")]
    Full(DatapathId),
    #[error("Switch {0} disconnected")]
    Closed(DatapathId),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0:?}")]
    Io(#[from] io::Error),
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Traffic class with an empty name")]
    EmptyName,
    #[error("Duplicate traffic class: {0}")]
    DuplicateClass(String),
}
