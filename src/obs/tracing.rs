// self
use crate::{
	_prelude::*,
	auth::KeyId,
	obs::{self, Operation},
	signer::SignerError,
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOperation<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOperation<F> = F;

/// A span wrapping one public issuer operation.
#[derive(Clone, Debug)]
pub struct OperationSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OperationSpan {
	/// Creates a new span tagged with the provided operation + stage.
	pub fn new(operation: Operation, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span =
				tracing::info_span!("oauth2_issuer.operation", operation = operation.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (operation, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOperation<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a failed operation.
///
/// Server errors are alert-worthy and carry the full source chain; client errors only carry the
/// caller-facing description, which never contains secrets.
pub fn log_failure(operation: Operation, error: &AuthError) {
	#[cfg(feature = "tracing")]
	{
		if error.is_server_error() {
			tracing::error!(
				operation = operation.as_str(),
				code = error.code(),
				category = error.category().as_str(),
				error = %obs::error_chain(error),
				"Operation failed."
			);
		} else {
			tracing::info!(
				operation = operation.as_str(),
				code = error.code(),
				category = error.category().as_str(),
				description = %error.description(),
				"Request rejected."
			);
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (operation, error, obs::error_chain);
	}
}

/// Logs a token lifecycle transition.
pub fn log_transition(operation: Operation, state: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(operation = operation.as_str(), state, "Token state changed.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (operation, state);
	}
}

/// Logs a retryable signer failure before the next attempt.
pub fn log_signer_retry(call: &'static str, attempt: u32, error: &SignerError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(call, attempt, error = %obs::error_chain(error), "Retrying signer call.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (call, attempt, error);
	}
}

/// Logs that the signing key's public half could not be resolved for the `kid` header.
pub fn log_kid_unavailable(key: &KeyId, error: &AuthError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			key = %key,
			error = %obs::error_chain(error),
			"Minting without kid; public key unavailable."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (key, error);
	}
}
