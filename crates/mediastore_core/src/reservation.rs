//! Two-phase upload reservations and held media IDs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A media ID reserved before its bytes exist.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use mediastore_core::{ExpiringMediaRecord, ReservationState};
///
/// let now = Utc::now();
/// let reservation = ExpiringMediaRecord {
///     origin: "example.org".into(),
///     media_id: "abc".into(),
///     user_id: "@alice:example.org".into(),
///     expires_at: now + Duration::minutes(5),
/// };
/// assert_eq!(reservation.state_at(now), ReservationState::Reserved);
/// assert_eq!(
///     reservation.state_at(now + Duration::minutes(6)),
///     ReservationState::Expired
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiringMediaRecord {
    /// Origin the ID was issued under
    pub origin: String,
    /// The reserved ID
    pub media_id: String,
    /// User allowed to claim the reservation
    pub user_id: String,
    /// When the reservation lapses
    pub expires_at: DateTime<Utc>,
}

impl ExpiringMediaRecord {
    /// True if the reservation has lapsed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// State of an unclaimed reservation at `now`.
    pub fn state_at(&self, now: DateTime<Utc>) -> ReservationState {
        if self.is_expired_at(now) {
            ReservationState::Expired
        } else {
            ReservationState::Reserved
        }
    }
}

/// Lifecycle of a two-phase upload: `Reserved → Claimed | Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ReservationState {
    /// ID issued, waiting for bytes
    Reserved,
    /// Bytes uploaded by the reserving user
    Claimed,
    /// Reservation lapsed or was never issued
    Expired,
}

/// Why a media ID is held.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum HeldReason {
    /// Held while an upload or reservation is being created
    ForCreate,
}

/// Short-lived uniqueness reservation for a freshly generated media ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldMediaId {
    /// Origin the ID belongs to
    pub origin: String,
    /// The held ID
    pub media_id: String,
    /// Purpose of the hold
    pub reason: HeldReason,
    /// When the hold was taken
    pub held_at: DateTime<Utc>,
}
