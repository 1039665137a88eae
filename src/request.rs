//! Immutable request descriptions and the response shapes they decode into.
//!
//! A [`Request`] carries everything a transport needs to dispatch a call (operation, path
//! template, path and query parameters, headers, body) plus a [`ResponseType`] that tells the
//! client how to turn a 2xx body into `T`. Requests are assembled through [`RequestBuilder`]
//! and never change afterwards.

pub mod uri;

// std
use std::marker::PhantomData;
// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, error::BoxError};

/// HTTP operations supported by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
	/// `GET`.
	Get,
	/// `PUT`.
	Put,
	/// `POST`.
	Post,
	/// `DELETE`.
	Delete,
}
impl Operation {
	/// Returns the HTTP method token.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::Get => "GET",
			Operation::Put => "PUT",
			Operation::Post => "POST",
			Operation::Delete => "DELETE",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Request payload; raw bytes and pre-encoded text are mutually exclusive.
#[derive(Clone, PartialEq, Eq)]
pub enum Body {
	/// Raw bytes sent as-is.
	Bytes(Vec<u8>),
	/// Pre-encoded string (JSON, form data, plain text).
	Text(String),
}
impl Body {
	/// Returns the payload bytes.
	pub fn as_bytes(&self) -> &[u8] {
		match self {
			Body::Bytes(bytes) => bytes,
			Body::Text(text) => text.as_bytes(),
		}
	}

	/// Consumes the body and returns its bytes.
	pub fn into_bytes(self) -> Vec<u8> {
		match self {
			Body::Bytes(bytes) => bytes,
			Body::Text(text) => text.into_bytes(),
		}
	}
}
impl Debug for Body {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		// Bodies may carry credentials (token requests), so only the size is printed.
		match self {
			Body::Bytes(bytes) => f.debug_tuple("Body::Bytes").field(&bytes.len()).finish(),
			Body::Text(text) => f.debug_tuple("Body::Text").field(&text.len()).finish(),
		}
	}
}

/// Multi-valued query parameters.
///
/// Keys keep the order of their first insertion and values keep the order they were
/// appended, so `a=1&a=2` always renders in that order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, Vec<String>)>);
impl QueryParams {
	/// Appends a value for `key`, creating the key on first use.
	pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
		let key = key.into();
		let value = value.into();

		match self.0.iter_mut().find(|(existing, _)| *existing == key) {
			Some((_, values)) => values.push(value),
			None => self.0.push((key, vec![value])),
		}
	}

	/// Returns all values recorded for `key`.
	pub fn get(&self, key: &str) -> Option<&[String]> {
		self.0.iter().find(|(existing, _)| existing == key).map(|(_, values)| values.as_slice())
	}

	/// Iterates over `(key, values)` pairs in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
		self.0.iter().map(|(key, values)| (key.as_str(), values.as_slice()))
	}

	/// Returns true when no parameters are present.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

/// Shape a successful response body is decoded into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKind {
	/// Body bytes are handed back untouched.
	Bytes,
	/// Body is ignored and the result is `()`.
	NoContent,
	/// Body is decoded as JSON.
	Json,
}

type Decoder<T> = fn(Vec<u8>) -> std::result::Result<T, serde_path_to_error::Error<serde_json::Error>>;

/// Response-shape descriptor pairing a [`ResponseKind`] with its decoder.
pub struct ResponseType<T> {
	kind: ResponseKind,
	decode: Decoder<T>,
}
impl<T> ResponseType<T> {
	/// Returns the response kind.
	pub fn kind(&self) -> ResponseKind {
		self.kind
	}

	/// Decodes a 2xx body.
	pub fn decode(
		&self,
		body: Vec<u8>,
	) -> std::result::Result<T, serde_path_to_error::Error<serde_json::Error>> {
		(self.decode)(body)
	}
}
impl ResponseType<Vec<u8>> {
	/// Passes the raw body through.
	pub fn bytes() -> Self {
		Self { kind: ResponseKind::Bytes, decode: Ok }
	}
}
impl ResponseType<()> {
	/// Discards the body and produces no value.
	pub fn no_content() -> Self {
		Self { kind: ResponseKind::NoContent, decode: |_| Ok(()) }
	}
}
impl<T> ResponseType<T>
where
	T: DeserializeOwned,
{
	/// Decodes the body as JSON into `T`.
	pub fn json() -> Self {
		Self { kind: ResponseKind::Json, decode: decode_json::<T> }
	}
}
impl<T> Clone for ResponseType<T> {
	fn clone(&self) -> Self {
		*self
	}
}
impl<T> Copy for ResponseType<T> {}
impl<T> Debug for ResponseType<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ResponseType").field(&self.kind).finish()
	}
}

fn decode_json<T>(body: Vec<u8>) -> std::result::Result<T, serde_path_to_error::Error<serde_json::Error>>
where
	T: DeserializeOwned,
{
	let mut de = serde_json::Deserializer::from_slice(&body);

	serde_path_to_error::deserialize(&mut de)
}

/// Immutable description of one outbound call producing `T`.
#[derive(Debug)]
pub struct Request<T> {
	operation: Operation,
	path: String,
	path_params: Vec<String>,
	query_params: QueryParams,
	headers: Headers,
	body: Option<Body>,
	response_type: ResponseType<T>,
	deferred_error: Option<BoxError>,
	_marker: PhantomData<fn() -> T>,
}
impl<T> Request<T> {
	/// Starts a builder; operation and response shape are mandatory.
	pub fn builder(operation: Operation, response_type: ResponseType<T>) -> RequestBuilder<T> {
		RequestBuilder::new(operation, response_type)
	}

	/// HTTP operation.
	pub fn operation(&self) -> Operation {
		self.operation
	}

	/// Path template with `%s` placeholders.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Positional path parameters (unencoded).
	pub fn path_params(&self) -> &[String] {
		&self.path_params
	}

	/// Query parameters.
	pub fn query_params(&self) -> &QueryParams {
		&self.query_params
	}

	/// Per-request headers.
	pub fn headers(&self) -> &Headers {
		&self.headers
	}

	/// Request body, if any.
	pub fn body(&self) -> Option<&Body> {
		self.body.as_ref()
	}

	/// Expected response shape.
	pub fn response_type(&self) -> ResponseType<T> {
		self.response_type
	}

	/// Takes the serialization failure captured while building, if any.
	pub(crate) fn take_deferred_error(&mut self) -> Option<BoxError> {
		self.deferred_error.take()
	}

	pub(crate) fn take_body(&mut self) -> Option<Body> {
		self.body.take()
	}
}

/// Builder for [`Request`].
#[derive(Debug)]
#[must_use = "RequestBuilder does nothing until .build() is called"]
pub struct RequestBuilder<T> {
	operation: Operation,
	path: String,
	path_params: Vec<String>,
	query_params: QueryParams,
	headers: Headers,
	body: Option<Body>,
	response_type: ResponseType<T>,
	deferred_error: Option<BoxError>,
}
impl<T> RequestBuilder<T> {
	fn new(operation: Operation, response_type: ResponseType<T>) -> Self {
		Self {
			operation,
			path: String::new(),
			path_params: Vec::new(),
			query_params: QueryParams::default(),
			headers: Headers::new(),
			body: None,
			response_type,
			deferred_error: None,
		}
	}

	/// Sets the path template, relative to the client endpoint.
	pub fn path(mut self, path: impl Into<String>) -> Self {
		self.path = path.into();

		self
	}

	/// Appends one positional path parameter.
	pub fn path_param(mut self, value: impl Into<String>) -> Self {
		self.path_params.push(value.into());

		self
	}

	/// Appends several positional path parameters in order.
	pub fn path_params<I, S>(mut self, values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.path_params.extend(values.into_iter().map(Into::into));

		self
	}

	/// Appends a query parameter value; repeated keys are kept.
	pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query_params.append(key, value);

		self
	}

	/// Sets a single header, replacing any previous value for the same name.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());

		self
	}

	/// Merges a set of headers.
	pub fn headers<I, K, V>(mut self, headers: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.headers.extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));

		self
	}

	/// Uses raw bytes as the body.
	pub fn bytes(mut self, data: impl Into<Vec<u8>>) -> Self {
		self.body = Some(Body::Bytes(data.into()));

		self
	}

	/// Uses a pre-encoded string as the body.
	pub fn text(mut self, data: impl Into<String>) -> Self {
		self.body = Some(Body::Text(data.into()));

		self
	}

	/// Serializes `value` as the JSON body and sets `Content-Type` unless already present.
	///
	/// A serialization failure is kept and reported when the request is sent.
	pub fn json<B>(mut self, value: &B) -> Self
	where
		B: ?Sized + Serialize,
	{
		match serde_json::to_string(value) {
			Ok(text) => {
				self.headers
					.entry(CONTENT_TYPE.into())
					.or_insert_with(|| "application/json".into());
				self.body = Some(Body::Text(text));
			},
			Err(e) => self.deferred_error = Some(Box::new(e)),
		}

		self
	}

	/// Form-url-encodes `value` as the body and sets `Content-Type` unless already present.
	///
	/// A serialization failure is kept and reported when the request is sent.
	pub fn form<B>(mut self, value: &B) -> Self
	where
		B: ?Sized + Serialize,
	{
		match serde_urlencoded::to_string(value) {
			Ok(text) => {
				self.headers
					.entry(CONTENT_TYPE.into())
					.or_insert_with(|| FORM_URL_ENCODED.into());
				self.body = Some(Body::Text(text));
			},
			Err(e) => self.deferred_error = Some(Box::new(e)),
		}

		self
	}

	/// Finalizes the request.
	pub fn build(self) -> Request<T> {
		Request {
			operation: self.operation,
			path: self.path,
			path_params: self.path_params,
			query_params: self.query_params,
			headers: self.headers,
			body: self.body,
			response_type: self.response_type,
			deferred_error: self.deferred_error,
			_marker: PhantomData,
		}
	}
}

/// `Content-Type` header name.
pub const CONTENT_TYPE: &str = "Content-Type";
/// Form-url-encoded media type.
pub const FORM_URL_ENCODED: &str = "application/x-www-form-urlencoded";
