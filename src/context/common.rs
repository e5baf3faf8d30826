// crates.io
use url::form_urlencoded;
use uuid::Uuid;
// self
use crate::{
	_prelude::*,
	auth::User,
	context::{AuthenticationContext, LIB_VERSION, state::ResponseType},
};

const CLIENT_SKU: &str = "Rust";
const DEFAULT_EXPIRES_IN: i64 = 3599;

/// Generates a random RFC 4122 version 4 identifier.
pub fn guid() -> String {
	Uuid::new_v4().to_string()
}

/// Strips everything up to a leading `#/` or `#`.
pub(crate) fn strip_hash(hash: &str) -> &str {
	if let Some(index) = hash.find("#/") {
		&hash[index + 2..]
	} else if let Some(index) = hash.find('#') {
		&hash[index + 1..]
	} else {
		hash
	}
}

/// Decodes `key=value&...`; segments without `=` or with an empty key are skipped.
pub(crate) fn deserialize(query: &str) -> BTreeMap<String, String> {
	query
		.split('&')
		.filter(|segment| segment.split_once('=').is_some_and(|(key, _)| !key.is_empty()))
		.filter_map(|segment| form_urlencoded::parse(segment.as_bytes()).next())
		.map(|(key, value)| (key.into_owned(), value.into_owned()))
		.collect()
}

pub(crate) fn has_query_param(url: &Url, name: &str) -> bool {
	url.query_pairs().any(|(key, _)| key == name)
}

pub(crate) fn append_query_param(url: &mut Url, name: &str, value: &str) {
	url.query_pairs_mut().append_pair(name, value);
}

/// Appends every pair of a raw `a=b&c=d` string; a leading `&` is tolerated.
pub(crate) fn append_raw_query(url: &mut Url, raw: &str) {
	let pairs: Vec<_> = form_urlencoded::parse(raw.trim_start_matches('&').as_bytes()).collect();

	if !pairs.is_empty() {
		url.query_pairs_mut().extend_pairs(pairs);
	}
}

pub(crate) fn remove_query_param(url: &mut Url, name: &str) {
	let kept: Vec<(String, String)> = url
		.query_pairs()
		.filter(|(key, _)| key != name)
		.map(|(key, value)| (key.into_owned(), value.into_owned()))
		.collect();

	if kept.is_empty() {
		url.set_query(None);
	} else {
		url.query_pairs_mut().clear().extend_pairs(kept);
	}
}

/// Returns the resource encoded after the first `|` of a state value.
pub(crate) fn resource_from_state(state: &str) -> &str {
	state.split_once('|').map(|(_, resource)| resource).unwrap_or_default()
}

/// Host (with port) of an `http(s)://` URI; other input is returned up to its first `/`.
pub(crate) fn host_from_uri(uri: &str) -> &str {
	let rest = uri
		.strip_prefix("https://")
		.or_else(|| uri.strip_prefix("http://"))
		.unwrap_or(uri);

	rest.split('/').next().unwrap_or_default()
}

/// Absolute expiry in epoch seconds; missing or unparseable lifetimes default to 3599.
pub(crate) fn expires_at(now: OffsetDateTime, expires_in: Option<&str>) -> i64 {
	let lifetime = expires_in
		.and_then(|raw| raw.trim().parse::<i64>().ok())
		.unwrap_or(DEFAULT_EXPIRES_IN);

	now.unix_timestamp().saturating_add(lifetime)
}

/// Splits a `||`-delimited slot into its non-empty entries.
pub(crate) fn split_cached(raw: &str) -> impl Iterator<Item = &str> {
	raw.split(crate::store::keys::CACHE_DELIMITER).filter(|entry| !entry.is_empty())
}

impl AuthenticationContext {
	/// Builds an authorization URL for the configured authority.
	pub(crate) fn navigate_url(
		&self,
		response_type: ResponseType,
		resource: Option<&str>,
		state: &str,
	) -> Url {
		let settings = self.settings();
		let mut url = settings.authority_endpoint("authorize");

		{
			let mut query = url.query_pairs_mut();

			query.append_pair("response_type", response_type.as_str());
			query.append_pair("client_id", &settings.client_id);

			if let Some(resource) = resource {
				query.append_pair("resource", resource);
			}

			query.append_pair("redirect_uri", settings.redirect_uri.as_str());
			query.append_pair("state", state);
		}

		if let Some(extra) = settings.extra_query_parameter.as_deref() {
			append_raw_query(&mut url, extra);
		}

		let request_id = settings.correlation_id.clone().unwrap_or_else(guid);

		url.query_pairs_mut()
			.append_pair("client-request-id", &request_id)
			.append_pair("x-client-SKU", CLIENT_SKU)
			.append_pair("x-client-Ver", LIB_VERSION);

		url
	}

	/// Adds `sid`, `login_hint`, and `domain_hint` derived from the cached user.
	pub(crate) fn add_hint_parameters(&self, url: &mut Url, user: Option<&User>) {
		let Some(user) = user else {
			return;
		};
		let prompt_none = url.query_pairs().any(|(key, value)| key == "prompt" && value == "none");
		let sid = user.profile.sid.as_deref().filter(|_| prompt_none);

		match (sid, user.profile.upn.as_deref()) {
			(Some(sid), _) =>
				if !has_query_param(url, "sid") {
					append_query_param(url, "sid", sid);
				},
			(None, Some(upn)) => {
				if !has_query_param(url, "login_hint") {
					append_query_param(url, "login_hint", upn);
				}

				let domain = user.domain_hint().filter(|_| !has_query_param(url, "domain_hint"));

				if let Some(domain) = domain {
					append_query_param(url, "domain_hint", domain);
				}
			},
			(None, None) => {},
		}
	}
}
