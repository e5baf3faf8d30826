mod support;

// std
use std::{
	sync::{Arc, atomic::Ordering},
	time::Duration as StdDuration,
};
// crates.io
use parking_lot::Mutex;
// self
use oauth2_implicit::{
	auth::TokenGrant,
	config::AuthConfigBuilder,
	context::{AuthenticationContext, SessionState},
	error::AuthFailure,
	host::FrameInfo,
	registry::ContextRegistry,
	store::keys,
};
use support::*;

const GRAPH: &str = "https://graph.example";

type Outcomes = Arc<Mutex<Vec<Result<TokenGrant, AuthFailure>>>>;

fn recording(builder: AuthConfigBuilder) -> (AuthConfigBuilder, Outcomes) {
	let outcomes = Outcomes::default();
	let sink = outcomes.clone();

	(builder.callback(move |outcome| sink.lock().push(outcome)), outcomes)
}

fn signed_in(host: Arc<TestHost>) -> AuthenticationContext {
	let ctx = AuthenticationContext::new(config().build().expect("Test config should build."), host);

	ctx.store().save(keys::IDTOKEN, &id_token("jane@contoso.com", None), false);

	ctx
}

async fn settle() {
	tokio::time::sleep(StdDuration::from_millis(20)).await;
}

#[tokio::test(start_paused = true)]
async fn popup_login_signs_the_user_in() {
	let host = TestHost::top_level("main", "https://app.example/index.html");
	let (builder, outcomes) = recording(config().popup(true));
	let settings = builder.build().expect("Test config should build.");
	let ctx = AuthenticationContext::new(settings, host.clone());

	ctx.login();

	let popup = host.last_popup().expect("Login popup should open.");
	let nonce = query_value(&popup.opened_with, "nonce").expect("Login URL should carry a nonce.");
	let token = id_token("jane@contoso.com", Some(&nonce));

	assert_eq!(ctx.opened_popups(), 1);
	assert_eq!(ctx.session_state(), SessionState::LoginInProgress);

	popup.redirect(&format!("id_token={token}&state={}", popup.state()));
	settle().await;

	assert!(popup.closed.load(Ordering::SeqCst));
	assert_eq!(*outcomes.lock(), [Ok(TokenGrant::id_token(token))]);
	assert_eq!(
		ctx.session_state(),
		SessionState::Authenticated { user_name: "jane@contoso.com".into() }
	);
	assert_eq!(ctx.opened_popups(), 0);
}

#[tokio::test(start_paused = true)]
async fn closing_the_login_popup_fails_the_login() {
	let host = TestHost::top_level("main", "https://app.example/index.html");
	let (builder, outcomes) = recording(config().popup(true));
	let settings = builder.build().expect("Test config should build.");
	let ctx = AuthenticationContext::new(settings, host.clone());

	ctx.login();
	host.last_popup().expect("Login popup should open.").closed.store(true, Ordering::SeqCst);
	settle().await;

	assert_eq!(*outcomes.lock(), [Err(AuthFailure::PopupClosed)]);
	assert_eq!(ctx.login_error(), Some(AuthFailure::PopupClosed.description()));
	assert_eq!(ctx.session_state(), SessionState::NoUser);
}

#[tokio::test(start_paused = true)]
async fn popup_acquisition_returns_the_access_token() {
	let host = TestHost::top_level("main", "https://app.example/index.html");
	let ctx = signed_in(host.clone());
	let pending =
		ctx.acquire_token_popup(GRAPH, Some("mkt=en-gb"), Some(r#"{"access_token":{}}"#));
	let popup = host.last_popup().expect("Acquisition popup should open.");

	assert_eq!(query_value(&popup.opened_with, "prompt").as_deref(), Some("select_account"));
	assert_eq!(query_value(&popup.opened_with, "mkt").as_deref(), Some("en-gb"));
	assert!(ctx.is_acquire_token_in_progress());

	popup.redirect(&format!("access_token=at-popup&expires_in=600&state={}", popup.state()));

	let token = pending.await.expect("Popup acquisition should succeed.");

	assert_eq!(token.expose(), "at-popup");
	assert!(!ctx.is_acquire_token_in_progress());
	assert_eq!(ctx.cached_token(GRAPH).map(|t| t.into_inner()).as_deref(), Some("at-popup"));
}

#[tokio::test(start_paused = true)]
async fn blocked_popups_fail_fast() {
	let host = TestHost::top_level("main", "https://app.example/index.html");
	let ctx = signed_in(host.clone());

	host.block_popups.store(true, Ordering::SeqCst);

	let error =
		ctx.acquire_token_popup(GRAPH, None, None).await.expect_err("Blocked popup should fail.");

	assert_eq!(error.as_auth(), Some(&AuthFailure::PopupBlocked));
	assert_eq!(ctx.store().get(keys::ERROR).as_deref(), Some("Error opening popup"));
}

#[tokio::test(start_paused = true)]
async fn redirect_login_completes_on_the_next_page_load() {
	let host = TestHost::top_level("main", "https://app.example/index.html#/inbox");
	let settings = config().build().expect("Test config should build.");
	let ctx = AuthenticationContext::new(settings, host.clone());

	ctx.login();

	let authorize = host.navigations.lock().pop().expect("Login should navigate.");
	let state = query_value(&authorize, "state").expect("Login URL should carry a state.");
	let nonce = query_value(&authorize, "nonce").expect("Login URL should carry a nonce.");
	let token = id_token("jane@contoso.com", Some(&nonce));
	let reloaded = TestHost::child(
		&host,
		FrameInfo::top_level(window("main")),
		&format!("{REDIRECT_URI}#id_token={token}&state={state}"),
	);
	let registry = ContextRegistry::new();
	let (builder, outcomes) = recording(config());
	let page =
		registry.install(builder.build().expect("Test config should build."), reloaded.clone());

	assert!(page.handle_window_callback(&registry, None));
	assert_eq!(*outcomes.lock(), [Ok(TokenGrant::id_token(token))]);
	assert_eq!(page.user().map(|user| user.user_name), Ok("jane@contoso.com".to_owned()));
	assert_eq!(*reloaded.navigations.lock(), [url("https://app.example/index.html#/inbox")]);
	assert!(!page.handle_window_callback(&registry, Some("#/inbox")));
}

#[tokio::test(start_paused = true)]
async fn redirect_acquisition_surfaces_server_errors() {
	let host = TestHost::top_level("main", "https://app.example/index.html#/mail");
	let ctx = signed_in(host.clone());

	ctx.acquire_token_redirect(GRAPH, None, None).expect("Redirect acquisition should start.");

	let authorize = host.navigations.lock().pop().expect("Acquisition should navigate.");
	let state = query_value(&authorize, "state").expect("Acquisition URL should carry a state.");
	let reloaded = TestHost::child(
		&host,
		FrameInfo::top_level(window("main")),
		&format!(
			"{REDIRECT_URI}#error=interaction_required&error_description=AADSTS50058&state={state}"
		),
	);
	let registry = ContextRegistry::new();
	let (builder, outcomes) = recording(config());
	let page =
		registry.install(builder.build().expect("Test config should build."), reloaded.clone());

	assert!(page.handle_window_callback(&registry, None));
	assert_eq!(
		*outcomes.lock(),
		[Err(AuthFailure::Server {
			error: "interaction_required".into(),
			description: "AADSTS50058".into(),
		})]
	);
	assert_eq!(page.store().get(keys::ERROR).as_deref(), Some("interaction_required"));
	assert_eq!(page.store().get(keys::ERROR_DESCRIPTION).as_deref(), Some("AADSTS50058"));
	assert_eq!(*reloaded.navigations.lock(), [url("https://app.example/index.html#/mail")]);
}
