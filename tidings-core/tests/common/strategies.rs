// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Proptest Strategies

use proptest::prelude::*;

/// Strategy for nicknames (non-empty, reasonable length).
pub fn nickname_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_]{0,19}"
}

/// Strategy for message contents.
pub fn message_content_strategy() -> impl Strategy<Value = String> {
    ".{0,80}"
}

/// Strategy for offsets in seconds from a base time.
pub fn offset_secs_strategy() -> impl Strategy<Value = i64> {
    -86_400i64..86_400
}
