//! Operation-level observability.
//!
//! Every broker operation runs inside a [`Flow`]: it counts the attempt, wraps the work in a
//! span, and records exactly one terminal outcome together with its latency.
//!
//! # Feature Flags
//!
//! - `tracing`: spans named `oauth2_bff.flow` carrying `flow` and `stage` fields, plus a
//!   warning event for every failure (absorbed or not).
//! - `metrics`: the `oauth2_bff_flow_total` counter and the `oauth2_bff_flow_duration_seconds`
//!   histogram, both labeled by `flow` and `outcome`.

mod meter;
mod trace;

// std
use std::time::Instant;
// self
use crate::_prelude::*;

/// Session operations observed by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Authorization redirect construction.
	LoginStart,
	/// Callback handling and code exchange.
	LoginEnd,
	/// Refresh-token rotation.
	Refresh,
	/// Session presence check.
	Session,
	/// Cookie clearing and end-session URL construction.
	Logout,
}
impl FlowKind {
	/// Every operation, in lifecycle order.
	pub const ALL: [FlowKind; 5] = [
		FlowKind::LoginStart,
		FlowKind::LoginEnd,
		FlowKind::Refresh,
		FlowKind::Session,
		FlowKind::Logout,
	];

	/// Label used in span fields and metric labels.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::LoginStart => "login_start",
			FlowKind::LoginEnd => "login_end",
			FlowKind::Refresh => "refresh",
			FlowKind::Session => "session",
			FlowKind::Logout => "logout",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Operation entered.
	Attempt,
	/// Operation returned a value.
	Success,
	/// Operation returned an error.
	Failure,
}
impl FlowOutcome {
	/// Label used in metric labels.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// One in-flight broker operation.
///
/// Consumed by [`finish`](Self::finish) or [`succeed`](Self::succeed), so an operation cannot
/// report two outcomes.
#[derive(Debug)]
pub struct Flow {
	kind: FlowKind,
	started: Instant,
	span: trace::FlowSpan,
}
impl Flow {
	/// Counts an attempt of `kind` and opens its span; `stage` names the call site.
	pub fn start(kind: FlowKind, stage: &'static str) -> Self {
		meter::record_outcome(kind, FlowOutcome::Attempt);

		Self { kind, started: Instant::now(), span: trace::FlowSpan::new(kind, stage) }
	}

	/// Operation being observed.
	pub fn kind(&self) -> FlowKind {
		self.kind
	}

	/// Runs `fut` inside the span without holding a guard across `.await` points.
	pub fn instrument<F>(&self, fut: F) -> impl Future<Output = F::Output>
	where
		F: Future,
	{
		self.span.instrument(fut)
	}

	/// Runs `f` inside the span.
	pub fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
		self.span.in_scope(f)
	}

	/// Logs a failure the operation recovered from.
	pub fn absorb(&self, err: &Error) {
		trace::record_failure(self.kind, err, true);
	}

	/// Records the terminal outcome of `result` and passes it through.
	pub fn finish<T>(self, result: Result<T>) -> Result<T> {
		match &result {
			Ok(_) => self.close(FlowOutcome::Success),
			Err(err) => {
				trace::record_failure(self.kind, err, false);
				self.close(FlowOutcome::Failure);
			},
		}

		result
	}

	/// Records success for operations that cannot fail.
	pub fn succeed(self) {
		self.close(FlowOutcome::Success);
	}

	fn close(self, outcome: FlowOutcome) {
		meter::record_outcome(self.kind, outcome);
		meter::record_duration(self.kind, outcome, self.started.elapsed());
	}
}
