// self
use crate::{_prelude::*, obs::FlowKind};

/// Future returned by [`FlowSpan::instrument`].
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`FlowSpan::instrument`].
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

#[cfg(feature = "tracing")]
type SpanHandle = tracing::Span;
#[cfg(not(feature = "tracing"))]
type SpanHandle = ();

#[cfg(feature = "tracing")]
type EnteredHandle = tracing::span::EnteredSpan;
#[cfg(not(feature = "tracing"))]
type EnteredHandle = ();

/// `oauth2_implicit.flow` span carrying `flow`, `stage`, and an optional `resource`.
#[derive(Clone, Debug)]
pub struct FlowSpan(SpanHandle);
impl FlowSpan {
	/// Opens a span for `stage` of `kind`.
	#[cfg(feature = "tracing")]
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		Self(tracing::info_span!(
			"oauth2_implicit.flow",
			flow = kind.as_str(),
			stage,
			resource = tracing::field::Empty,
		))
	}

	/// Opens a span for `stage` of `kind`.
	#[cfg(not(feature = "tracing"))]
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		let _ = (kind, stage);

		Self(())
	}

	/// Records the resource the flow works for.
	pub fn with_resource(self, resource: &str) -> Self {
		#[cfg(feature = "tracing")]
		self.0.record("resource", resource);
		#[cfg(not(feature = "tracing"))]
		let _ = resource;

		self
	}

	/// Enters the span until the guard drops.
	#[cfg(feature = "tracing")]
	pub fn entered(self) -> FlowSpanGuard {
		FlowSpanGuard(self.0.entered())
	}

	/// Enters the span until the guard drops.
	#[cfg(not(feature = "tracing"))]
	pub fn entered(self) -> FlowSpanGuard {
		let _ = self;

		FlowSpanGuard(())
	}

	/// Attaches the span to a future that outlives the calling frame.
	#[cfg(feature = "tracing")]
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		tracing::Instrument::instrument(fut, self.0.clone())
	}

	/// Attaches the span to a future that outlives the calling frame.
	#[cfg(not(feature = "tracing"))]
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		fut
	}
}

/// Guard returned by [`FlowSpan::entered`].
pub struct FlowSpanGuard(#[allow(dead_code)] EnteredHandle);
impl Debug for FlowSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("FlowSpanGuard(..)")
	}
}
