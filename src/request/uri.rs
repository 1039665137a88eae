//! Final URI construction from an endpoint, a path template, and request parameters.

// crates.io
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
// self
use crate::{_prelude::*, error::ConfigError, request::QueryParams};

/// Positional placeholder recognized in path templates.
pub const PLACEHOLDER: &str = "%s";

// RFC 3986 unreserved characters stay literal; everything else is escaped.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Builds the final URI for a request.
///
/// `endpoint` must already end with `/`; a leading `/` on `template` is dropped so the two
/// never double up. Each path parameter is percent-encoded on its own before it replaces the
/// next `%s` placeholder, which keeps `/` or `?` inside a value from changing the path shape.
pub fn build_uri(
	endpoint: &str,
	template: &str,
	path_params: &[String],
	query: &QueryParams,
) -> Result<Url, ConfigError> {
	let mut uri = String::from(endpoint);

	uri.push_str(&substitute(template.trim_start_matches('/'), path_params)?);

	if !query.is_empty() {
		uri.push('?');
		uri.push_str(&render_query(query));
	}

	Url::parse(&uri).map_err(|source| ConfigError::InvalidUri { uri, source })
}

/// Replaces `%s` placeholders with encoded parameters, in order.
pub fn substitute(template: &str, params: &[String]) -> Result<String, ConfigError> {
	let expected = template.matches(PLACEHOLDER).count();

	if expected != params.len() {
		return Err(ConfigError::PathParamCount {
			template: template.to_owned(),
			expected,
			actual: params.len(),
		});
	}

	let mut out = String::with_capacity(template.len());
	let mut params = params.iter();

	for (idx, piece) in template.split(PLACEHOLDER).enumerate() {
		if idx > 0 {
			// Counts were checked above.
			if let Some(param) = params.next() {
				out.extend(utf8_percent_encode(param, COMPONENT));
			}
		}

		out.push_str(piece);
	}

	Ok(out)
}

/// Renders `key=value` pairs joined by `&`, one pair per value.
pub fn render_query(query: &QueryParams) -> String {
	let mut buf = String::new();

	for (key, values) in query.iter() {
		for value in values {
			if !buf.is_empty() {
				buf.push('&');
			}

			buf.extend(utf8_percent_encode(key, COMPONENT));
			buf.push('=');
			buf.extend(utf8_percent_encode(value, COMPONENT));
		}
	}

	buf
}
