//! Instruction encode and decode endpoints.

use styx_codec::{decode, encode, CodecError, Instruction};
use styx_types::{APIError, DecodeRequest, EncodeResponse};

fn codec_error(err: CodecError) -> APIError {
	APIError::BadRequest {
		error_type: "decode_error".to_string(),
		message: err.to_string(),
	}
}

pub fn process_encode_request(instruction: Instruction) -> Result<EncodeResponse, APIError> {
	let data = encode(&instruction).map_err(codec_error)?;
	Ok(EncodeResponse {
		length: data.len(),
		data,
	})
}

pub fn process_decode_request(request: DecodeRequest) -> Result<Instruction, APIError> {
	decode(&request.data).map_err(codec_error)
}
