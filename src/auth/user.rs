//! Signed-in user derived from identity token claims.

// self
use crate::{_prelude::*, auth::id_token::IdTokenClaims};

/// User information held in memory after a successful login.
#[derive(Clone, Debug, PartialEq)]
pub struct User {
	/// `upn` claim, falling back to `email`, or empty when neither is present.
	pub user_name: String,
	/// Full decoded claims.
	pub profile: IdTokenClaims,
}
impl User {
	/// Builds a user from already-decoded claims.
	pub fn from_claims(profile: IdTokenClaims) -> Self {
		let user_name =
			profile.upn.clone().or_else(|| profile.email.clone()).unwrap_or_default();

		Self { user_name, profile }
	}

	/// Domain hint derived from the last `@`-delimited segment of the `upn` claim.
	///
	/// The local part may itself contain a quoted `@`, so only the final segment is used.
	pub fn domain_hint(&self) -> Option<&str> {
		let upn = self.profile.upn.as_deref()?;

		upn.rsplit_once('@').map(|(_, domain)| domain)
	}
}
