//! `data:` URL decoding for images the page hands back as strings.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataUrlError {
	#[error("not a data URL")]
	MissingScheme,
	#[error("data URL has no payload separator")]
	MissingPayload,
	#[error("only base64 data URLs are supported")]
	NotBase64,
	#[error("invalid base64 payload: {0}")]
	Decode(String),
}

/// A decoded `data:<mime>;base64,<payload>` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
	pub mime: String,
	pub bytes: Vec<u8>,
}

impl DataUrl {
	pub fn parse(input: &str) -> Result<Self, DataUrlError> {
		let rest = input.trim().strip_prefix("data:").ok_or(DataUrlError::MissingScheme)?;
		let (header, payload) = rest.split_once(',').ok_or(DataUrlError::MissingPayload)?;
		let mime = header.strip_suffix(";base64").ok_or(DataUrlError::NotBase64)?;
		let bytes = STANDARD.decode(payload).map_err(|e| DataUrlError::Decode(e.to_string()))?;

		Ok(Self {
			mime: if mime.is_empty() { "text/plain".to_string() } else { mime.to_string() },
			bytes,
		})
	}

	/// File extension matching the mime type, without the dot.
	pub fn extension(&self) -> &'static str {
		match self.mime.as_str() {
			"image/png" => "png",
			"image/jpeg" => "jpg",
			"image/svg+xml" => "svg",
			"image/webp" => "webp",
			_ => "bin",
		}
	}
}
