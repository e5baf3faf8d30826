//! Cached token entries as persisted per resource.

// crates.io
use time::macros::datetime;
// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

const LATEST_EXPIRY: OffsetDateTime = datetime!(9999-12-31 23:59:59 UTC);

/// Lifecycle status of a cached token relative to the renewal offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token is usable and outside the renewal window.
	Active,
	/// Token has not expired yet but falls inside the renewal offset.
	Expiring,
	/// Token expiry has passed.
	Expired,
}

/// Token cached for a single resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
	/// Resource the token was issued for.
	pub resource: String,
	/// Access token (or identity token for the login resource).
	pub access_token: TokenSecret,
	/// Absolute expiry instant.
	pub expires_at: OffsetDateTime,
}
impl CachedToken {
	/// Rebuilds an entry from the raw token and expiration slots.
	///
	/// The expiration slot holds epoch seconds. Entries with an empty token or an
	/// unparseable expiry yield `None`.
	pub fn from_slots(resource: impl Into<String>, token: &str, expiry: &str) -> Option<Self> {
		if token.is_empty() {
			return None;
		}

		let seconds = expiry.trim().parse::<i64>().ok()?;
		let expires_at = OffsetDateTime::from_unix_timestamp(seconds).ok()?;

		Some(Self { resource: resource.into(), access_token: TokenSecret::new(token), expires_at })
	}

	/// Builds an entry expiring `seconds` after the epoch.
	///
	/// Instants outside `1970..=9999` are clamped so the entry always has a slot value.
	pub fn expiring_at(
		resource: impl Into<String>,
		token: impl Into<String>,
		seconds: i64,
	) -> Self {
		let seconds = seconds.clamp(0, LATEST_EXPIRY.unix_timestamp());
		let expires_at = OffsetDateTime::from_unix_timestamp(seconds).unwrap_or(LATEST_EXPIRY);

		Self { resource: resource.into(), access_token: TokenSecret::new(token), expires_at }
	}

	/// Epoch seconds persisted in the expiration slot.
	pub fn expiry_slot(&self) -> String {
		self.expires_at.unix_timestamp().to_string()
	}

	/// Computes the lifecycle status at `instant`, treating `offset` as the renewal window.
	pub fn status_at(&self, instant: OffsetDateTime, offset: Duration) -> TokenStatus {
		if self.expires_at <= instant {
			return TokenStatus::Expired;
		}
		if self.expires_at <= instant + offset {
			return TokenStatus::Expiring;
		}

		TokenStatus::Active
	}

	/// Returns `true` when the token may still be handed out at `instant`.
	pub fn is_valid_at(&self, instant: OffsetDateTime, offset: Duration) -> bool {
		matches!(self.status_at(instant, offset), TokenStatus::Active)
	}
}
