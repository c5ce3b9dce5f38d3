//! Error types shared across the plugin framework

use crate::plugin::lifecycle::LifecycleState;
use crate::plugin::scanner::ScanError;
use crate::plugin::ComponentKind;
use std::path::PathBuf;
use thiserror::Error;

/// Boot-critical failure. Aborts the owning plugin instance only.
#[derive(Debug, Error)]
pub enum BootError {
    #[error("Could not create plugin folder {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not read namespace root: {0}")]
    Scan(#[from] ScanError),

    #[error("Could not build discovery thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Load hook of plugin '{plugin}' failed: {source}")]
    LoadHook {
        plugin: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Plugin '{plugin}' cannot transition from {from} to {to}")]
    InvalidTransition {
        plugin: String,
        from: LifecycleState,
        to: LifecycleState,
    },
}

/// Failure to construct a single discovered component
#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("Failed to construct {class}: {source}")]
    Construction {
        class: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Constructor of {class} panicked: {message}")]
    Panicked { class: String, message: String },

    #[error("{class} is marked as {expected} but its factory returned kind '{actual}'")]
    KindMismatch {
        class: String,
        expected: ComponentKind,
        actual: ComponentKind,
    },
}

/// A fault raised by one listener or component hook
#[derive(Debug, Error)]
pub enum ListenerFault {
    #[error("{hook} of {listener} failed: {source}")]
    Failed {
        listener: String,
        hook: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("{hook} of {listener} panicked: {message}")]
    Panicked {
        listener: String,
        hook: &'static str,
        message: String,
    },
}

/// Errors reported by host-facing registration calls
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Failed to register command: {0}")]
    Command(String),

    #[error("Failed to register listener: {0}")]
    Listener(String),

    #[error("Host rejected the request: {0}")]
    Rejected(String),
}

/// Extract a readable message from a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
