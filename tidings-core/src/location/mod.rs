// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Location Module
//!
//! Picks the best of a stream of location fixes coming from several
//! providers. Fixes are produced by an external [`LocationSource`] and fed to
//! a [`LocationTracker`]; the best fix is then reported into own status.
//!
//! [`LocationSource`]: crate::engine::LocationSource

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::storage::{DataStore, Location, StorageError};

/// Window inside which accuracy decides between two fixes.
const SIGNIFICANT_AGE_MILLIS: i64 = 2 * 60 * 1000;

/// Largest accuracy loss (meters) accepted for a newer fix from the same provider.
const TOLERATED_ACCURACY_LOSS: i32 = 200;

/// A single fix reported by a location provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Estimated accuracy radius in meters.
    pub accuracy: f32,
    /// Provider name ("gps", "network", ...), if known.
    pub provider: Option<String>,
}

impl LocationFix {
    pub fn new(
        timestamp: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        accuracy: f32,
        provider: Option<&str>,
    ) -> Self {
        LocationFix {
            timestamp,
            latitude,
            longitude,
            accuracy,
            provider: provider.map(str::to_string),
        }
    }

    /// Converts the fix into the location published in a status.
    pub fn to_location(&self, street_address: Option<String>) -> Location {
        Location {
            timestamp: self.timestamp,
            latitude: self.latitude,
            longitude: self.longitude,
            precision: self.accuracy as i32,
            street_address,
        }
    }
}

/// Decides whether `candidate` should replace `current` as the best fix.
///
/// A fix more than two minutes newer always wins and one more than two
/// minutes older always loses. Inside that window the more accurate fix
/// wins; a newer fix also wins when it is no less accurate, or when it is
/// at most 200 m less accurate and comes from the same provider.
pub fn is_better_location(candidate: &LocationFix, current: Option<&LocationFix>) -> bool {
    let current = match current {
        Some(current) => current,
        None => return true,
    };

    let time_delta = (candidate.timestamp - current.timestamp).num_milliseconds();
    if time_delta > SIGNIFICANT_AGE_MILLIS {
        return true;
    }
    if time_delta < -SIGNIFICANT_AGE_MILLIS {
        return false;
    }
    let is_newer = time_delta > 0;

    // Truncated to whole meters before comparing
    let accuracy_delta = (candidate.accuracy - current.accuracy) as i32;
    let is_less_accurate = accuracy_delta > 0;
    let is_more_accurate = accuracy_delta < 0;
    let is_significantly_less_accurate = accuracy_delta > TOLERATED_ACCURACY_LOSS;

    let same_provider = candidate.provider == current.provider;

    is_more_accurate
        || (is_newer && !is_less_accurate)
        || (is_newer && !is_significantly_less_accurate && same_provider)
}

/// Keeps the best fix seen so far.
///
/// Shared between the location source feeding it and whoever reports the
/// result into own status.
#[derive(Debug, Default)]
pub struct LocationTracker {
    current: Mutex<Option<LocationFix>>,
}

impl LocationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers a fix. Returns true if it became the current best.
    pub fn offer(&self, fix: LocationFix) -> bool {
        let mut current = self.current.lock();
        if is_better_location(&fix, current.as_ref()) {
            debug!(
                "New best location fix from {}",
                fix.provider.as_deref().unwrap_or("unknown provider")
            );
            *current = Some(fix);
            true
        } else {
            false
        }
    }

    /// Returns the current best fix.
    pub fn current(&self) -> Option<LocationFix> {
        self.current.lock().clone()
    }

    /// Returns the current best fix as a status location.
    pub fn best_location(&self, street_address: Option<String>) -> Option<Location> {
        self.current
            .lock()
            .as_ref()
            .map(|fix| fix.to_location(street_address))
    }

    /// Writes the best fix into own status.
    ///
    /// Returns `Ok(false)` without touching the store when no fix is known.
    pub fn report(&self, store: &DataStore) -> Result<bool, StorageError> {
        match self.best_location(None) {
            Some(location) => {
                store.update_self_status_location(location)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Forgets the current fix.
    pub fn clear(&self) {
        *self.current.lock() = None;
    }
}
