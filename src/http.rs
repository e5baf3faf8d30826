//! Bearer-token HTTP adapter.
//!
//! [`BearerTokenClient`] wraps any [`HttpTransport`] and attaches
//! `Authorization: Bearer <token>` to each request whose endpoint maps to a resource.
//! Tokens come from [`AuthenticationContext::acquire_token`], so the adapter keeps no
//! cache of its own; a failed acquisition rejects the call before anything is sent.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::{
	HttpRequest, HttpResponse,
	http::header::{AUTHORIZATION, HeaderValue},
};
// self
use crate::{_prelude::*, context::AuthenticationContext, error::TransportError};

/// Future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Transport capable of executing a single HTTP request.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and returns the full response, whatever its status.
	fn send(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// [`ReqwestClient`]-backed transport.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let response = self.0.execute(request.try_into()?).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut converted = HttpResponse::new(response.bytes().await?.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

/// Transport decorator that authorizes requests with tokens from an authentication context.
#[derive(Debug)]
pub struct BearerTokenClient<T> {
	context: AuthenticationContext,
	transport: T,
	resource: Option<String>,
}
impl<T> BearerTokenClient<T>
where
	T: HttpTransport,
{
	/// Resolves each request's resource from its URI.
	pub fn new(context: AuthenticationContext, transport: T) -> Self {
		Self { context, transport, resource: None }
	}

	/// Uses `resource` for every request instead of resolving it per endpoint.
	pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
		self.resource = Some(resource.into());

		self
	}

	/// Context tokens are acquired from.
	pub fn context(&self) -> &AuthenticationContext {
		&self.context
	}

	/// Wrapped transport.
	pub fn transport(&self) -> &T {
		&self.transport
	}

	/// Resource whose token would be attached to a request for `uri`.
	pub fn resource_for(&self, uri: &str) -> Option<String> {
		self.resource.clone().or_else(|| self.context.resource_for_endpoint(uri))
	}

	/// Authorizes and sends `request` once.
	pub async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse> {
		let uri = request.uri().to_string();

		match self.resource_for(&uri) {
			Some(resource) => {
				let token = self.context.acquire_token(&resource).await?;
				let value =
					HeaderValue::from_str(&token.bearer()).map_err(TransportError::from)?;

				request.headers_mut().insert(AUTHORIZATION, value);
			},
			None => self.context.logger().verbose(&format!("No resource mapped for {uri}")),
		}

		Ok(self.transport.send(request).await?)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::{Request, StatusCode};
	// self
	use super::*;
	use crate::{
		config::AuthConfig,
		context::tests::context_with,
		error::AuthFailure,
		store::keys,
	};

	#[derive(Default)]
	struct RecordingTransport {
		seen: Mutex<Vec<Option<String>>>,
	}
	impl HttpTransport for RecordingTransport {
		fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
			let authorization = request
				.headers()
				.get(AUTHORIZATION)
				.and_then(|value| value.to_str().ok())
				.map(str::to_owned);

			self.seen.lock().push(authorization);

			Box::pin(async move {
				let mut response = HttpResponse::new(Vec::new());

				*response.status_mut() = StatusCode::NO_CONTENT;

				Ok(response)
			})
		}
	}

	fn client() -> BearerTokenClient<RecordingTransport> {
		let (ctx, _) = context_with(
			AuthConfig::builder("client-1")
				.endpoint("https://api.example/", "https://api")
				.anonymous_endpoint("https://api.example/health")
				.build()
				.expect("Test config should build."),
		);
		let expiry = ctx.host().now().unix_timestamp() + 3600;

		ctx.store().save(keys::TOKEN_KEYS, "https://api|", false);
		ctx.store().save(&keys::scoped(keys::ACCESS_TOKEN_KEY, "https://api"), "at-1", false);
		ctx.store().save(
			&keys::scoped(keys::EXPIRATION_KEY, "https://api"),
			&expiry.to_string(),
			false,
		);

		BearerTokenClient::new(ctx, RecordingTransport::default())
	}

	fn get(uri: &str) -> HttpRequest {
		Request::get(uri).body(Vec::new()).expect("Test request should build.")
	}

	#[test]
	fn mapped_requests_are_authorized() {
		let client = client();
		let response = futures::executor::block_on(client.send(get("https://api.example/me")))
			.expect("Authorized request should be sent.");

		assert_eq!(response.status(), StatusCode::NO_CONTENT);
		futures::executor::block_on(client.send(get("https://api.example/health")))
			.expect("Anonymous request should be sent.");
		assert_eq!(*client.transport().seen.lock(), [Some("Bearer at-1".to_owned()), None]);
	}

	#[test]
	fn acquisition_failures_short_circuit() {
		let client = client().with_resource("https://other");
		let error = futures::executor::block_on(client.send(get("https://api.example/me")))
			.expect_err("Missing user should fail.");

		assert_eq!(error.as_auth(), Some(&AuthFailure::LoginRequired));
		assert!(client.transport().seen.lock().is_empty());
	}
}
