//! Span and event emission, compiled to no-ops without the `tracing` feature.

// self
use crate::{_prelude::*, obs::FlowKind};

#[derive(Clone, Debug)]
pub(super) struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	pub(super) fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			Self { span: tracing::info_span!("oauth2_bff.flow", flow = kind.as_str(), stage) }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	pub(super) fn instrument<F>(&self, fut: F) -> impl Future<Output = F::Output>
	where
		F: Future,
	{
		#[cfg(feature = "tracing")]
		{
			tracing::Instrument::instrument(fut, self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}

	pub(super) fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
		#[cfg(feature = "tracing")]
		{
			self.span.in_scope(f)
		}
		#[cfg(not(feature = "tracing"))]
		{
			f()
		}
	}
}

/// `absorbed` marks failures the operation recovered from (logout without a logout URL).
pub(super) fn record_failure(kind: FlowKind, err: &Error, absorbed: bool) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			flow = kind.as_str(),
			status = err.status(),
			absorbed,
			error = %err,
			"broker operation failed"
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, err, absorbed);
	}
}
