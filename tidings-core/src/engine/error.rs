// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Engine Error Types

use thiserror::Error;

use super::transport::TransportError;
use crate::storage::StorageError;

/// Errors raised by the engine and its background tasks.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine is not running")]
    NotRunning,

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[source] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Friend no longer exists: {0}")]
    FriendGone(String),

    #[error("Task panicked: {0}")]
    Panicked(String),

    #[error("Peer is not a friend")]
    UnauthorizedPeer,

    #[error("Invalid status document: {0}")]
    InvalidStatus(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
