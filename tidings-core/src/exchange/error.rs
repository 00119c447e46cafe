// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Exchange Error Types

use thiserror::Error;

use crate::identity::IdentityError;
use crate::storage::StorageError;

/// Errors that can occur while pairing with a friend.
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Invalid exchange payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid identity: {0}")]
    InvalidIdentity(#[from] IdentityError),

    #[error("Exchange session timed out")]
    SessionTimeout,

    #[error("Exchange was cancelled")]
    Cancelled,

    #[error("Cannot exchange with yourself")]
    SelfExchange,

    #[error("A different friend already uses this nickname")]
    DuplicateFriend,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
