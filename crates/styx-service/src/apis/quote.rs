//! Adapter quotes at wire precision.

use super::swap_error;
use styx_core::SwapEngine;
use styx_types::{APIError, QuoteRequest, QuoteResponse};

/// Quotes `request.amount_in` rounded down to the nearest compressible
/// amount, which is the amount a signer must authorize.
pub async fn process_quote_request(
	request: QuoteRequest,
	engine: &SwapEngine,
) -> Result<QuoteResponse, APIError> {
	let quote = engine
		.quote(
			request.adapter_id,
			request.token_in,
			request.token_out,
			request.amount_in,
		)
		.await
		.map_err(swap_error)?;

	Ok(QuoteResponse {
		amount_in: quote.amount_in,
		compressed_amount_in: quote.compressed_amount_in.to_raw(),
		amount_out: quote.amount_out,
	})
}
