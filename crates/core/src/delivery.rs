//! Conditional HTTP delivery of backend objects
//!
//! Translates inbound conditional-request headers into backend read
//! preconditions, and the backend's answer into an HTTP status, a header set
//! and a streamed body. The body is never buffered in memory.

use std::fmt;

use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use jiff::fmt::rfc2822::{DateTimeParser, DateTimePrinter};
use jiff::tz::TimeZone;
use jiff::Timestamp;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::traits::StreamingBackend;
use crate::types::ObjectReader;

static HTTP_DATE_PARSER: DateTimeParser = DateTimeParser::new();
static HTTP_DATE_PRINTER: DateTimePrinter = DateTimePrinter::new();

/// Obsolete HTTP-date forms still accepted by RFC 9110 recipients
const OBSOLETE_DATE_FORMATS: [&str; 2] = ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"];

/// Preconditions and range for a conditional read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadConditions {
    pub if_modified_since: Option<Timestamp>,
    pub if_unmodified_since: Option<Timestamp>,
    pub if_match: Option<String>,
    pub if_none_match: Option<String>,
    /// Raw `Range` header value
    pub range: Option<String>,
}

impl ReadConditions {
    /// Extract conditions from request headers
    ///
    /// Fails with [`Error::InvalidRequest`] when a date header is not a valid
    /// HTTP-date or a header value is not visible ASCII.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self> {
        let if_modified_since = header_str(headers, header::IF_MODIFIED_SINCE)?
            .map(parse_http_date)
            .transpose()?;
        let if_unmodified_since = header_str(headers, header::IF_UNMODIFIED_SINCE)?
            .map(parse_http_date)
            .transpose()?;

        Ok(Self {
            if_modified_since,
            if_unmodified_since,
            if_match: header_str(headers, header::IF_MATCH)?.map(str::to_string),
            if_none_match: header_str(headers, header::IF_NONE_MATCH)?.map(str::to_string),
            range: header_str(headers, header::RANGE)?.map(str::to_string),
        })
    }

    /// Whether any precondition is set
    pub fn has_preconditions(&self) -> bool {
        self.if_modified_since.is_some()
            || self.if_unmodified_since.is_some()
            || self.if_match.is_some()
            || self.if_none_match.is_some()
    }

    /// Evaluate the preconditions against an object's validators
    ///
    /// For backends without native conditional reads. Follows the evaluation
    /// order of RFC 9110 section 13.2.2 for GET and HEAD; timestamps compare
    /// at whole-second precision.
    pub fn evaluate(
        &self,
        path: &str,
        last_modified: Option<Timestamp>,
        etag: Option<&str>,
    ) -> Result<()> {
        let modified = last_modified.map(whole_seconds);

        if let Some(if_match) = &self.if_match {
            if !etag_matches(if_match, etag, false) {
                return Err(Error::PreconditionFailed(path.to_string()));
            }
        } else if let (Some(since), Some(modified)) = (self.if_unmodified_since, modified)
            && modified > since
        {
            return Err(Error::PreconditionFailed(path.to_string()));
        }

        if let Some(if_none_match) = &self.if_none_match {
            if etag_matches(if_none_match, etag, true) {
                return Err(Error::NotModified(path.to_string()));
            }
        } else if let (Some(since), Some(modified)) = (self.if_modified_since, modified)
            && modified <= since
        {
            return Err(Error::NotModified(path.to_string()));
        }

        Ok(())
    }
}

/// Object metadata a backend returns with a conditional read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryMetadata {
    pub cache_control: Option<String>,
    pub expires: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
    pub content_length: Option<u64>,
    pub content_range: Option<String>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<Timestamp>,
}

/// Successful conditional read: metadata plus the content reader
pub struct ConditionalRead {
    pub metadata: DeliveryMetadata,
    pub content: ObjectReader,
}

impl fmt::Debug for ConditionalRead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalRead")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Response body produced by [`deliver`]
pub enum DeliveryBody {
    /// No body (errors, 304, HEAD)
    Empty,
    /// Object content, read on demand
    Stream(ObjectReader),
}

impl DeliveryBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, DeliveryBody::Empty)
    }

    /// Copy the body into `sink`, returning the number of bytes written
    pub async fn write_to<W>(self, sink: &mut W) -> std::io::Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        match self {
            DeliveryBody::Empty => Ok(0),
            DeliveryBody::Stream(mut reader) => {
                let written = tokio::io::copy(&mut reader, sink).await?;
                sink.flush().await?;
                Ok(written)
            }
        }
    }
}

impl fmt::Debug for DeliveryBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryBody::Empty => f.write_str("DeliveryBody::Empty"),
            DeliveryBody::Stream(_) => f.write_str("DeliveryBody::Stream(..)"),
        }
    }
}

/// Serve `path` from `backend` as an HTTP response to `request`
///
/// Failures are always expressed as a status code with an empty body.
pub async fn deliver<S>(backend: &S, request: &Request<()>, path: &str) -> Response<DeliveryBody>
where
    S: StreamingBackend + ?Sized,
{
    let conditions = match ReadConditions::from_headers(request.headers()) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(path, error = %e, "Rejecting request with malformed headers");
            return status_only(StatusCode::BAD_REQUEST);
        }
    };

    let read = match backend.get_object_conditional(path, &conditions).await {
        Ok(r) => r,
        Err(e) => {
            let status = status_for_error(&e);
            tracing::debug!(path, status = status.as_u16(), error = %e, "Conditional read refused");
            return status_only(status);
        }
    };

    let status = response_status(&read.metadata);
    let headers = response_headers(&read.metadata);
    let body = if request.method() == Method::HEAD {
        DeliveryBody::Empty
    } else {
        DeliveryBody::Stream(read.content)
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// HTTP status for a failed conditional read
///
/// Anything that is not a missing object or a precondition outcome maps to
/// 400: transport failures are reported as client errors, not 5xx.
pub fn status_for_error(err: &Error) -> StatusCode {
    match err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::NotModified(_) => StatusCode::NOT_MODIFIED,
        Error::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// 206 when the content range covers less than the whole object, else 200
pub fn response_status(metadata: &DeliveryMetadata) -> StatusCode {
    let (Some(range), Some(length)) = (&metadata.content_range, metadata.content_length) else {
        return StatusCode::OK;
    };

    match range_total_size(range) {
        Some(total) if total != length => StatusCode::PARTIAL_CONTENT,
        _ => StatusCode::OK,
    }
}

/// Response headers copied from the backend metadata
pub fn response_headers(metadata: &DeliveryMetadata) -> HeaderMap {
    let content_length = metadata.content_length.map(|l| l.to_string());
    let last_modified = metadata
        .last_modified
        .and_then(|ts| format_http_date(ts).ok());

    let entries: [(HeaderName, Option<&str>); 10] = [
        (header::CACHE_CONTROL, metadata.cache_control.as_deref()),
        (header::EXPIRES, metadata.expires.as_deref()),
        (header::CONTENT_DISPOSITION, metadata.content_disposition.as_deref()),
        (header::CONTENT_ENCODING, metadata.content_encoding.as_deref()),
        (header::CONTENT_LANGUAGE, metadata.content_language.as_deref()),
        (header::CONTENT_LENGTH, content_length.as_deref()),
        (header::CONTENT_RANGE, metadata.content_range.as_deref()),
        (header::CONTENT_TYPE, metadata.content_type.as_deref()),
        (header::ETAG, metadata.etag.as_deref()),
        (header::LAST_MODIFIED, last_modified.as_deref()),
    ];

    let mut headers = HeaderMap::new();
    for (name, value) in entries {
        let Some(value) = value else {
            continue;
        };
        match HeaderValue::from_str(value) {
            Ok(v) => {
                headers.insert(name, v);
            }
            Err(_) => tracing::warn!(header = %name, "Dropping header with invalid value"),
        }
    }
    headers
}

/// Parse an HTTP-date (IMF-fixdate, or the obsolete RFC 850 and asctime forms)
pub fn parse_http_date(value: &str) -> Result<Timestamp> {
    let value = value.trim();
    if let Ok(ts) = HTTP_DATE_PARSER.parse_timestamp(value) {
        return Ok(ts);
    }

    for format in OBSOLETE_DATE_FORMATS {
        let parsed = jiff::fmt::strtime::parse(format, value)
            .and_then(|tm| tm.to_datetime())
            .and_then(|dt| dt.to_zoned(TimeZone::UTC));
        if let Ok(zoned) = parsed {
            return Ok(zoned.timestamp());
        }
    }

    Err(Error::InvalidRequest(format!("invalid HTTP date: {value}")))
}

/// Format a timestamp as an IMF-fixdate
pub fn format_http_date(ts: Timestamp) -> Result<String> {
    HTTP_DATE_PRINTER
        .timestamp_to_rfc9110_string(&ts)
        .map_err(|e| Error::General(format!("format HTTP date: {e}")))
}

/// Resolve a single `bytes=` range against an object of `size` bytes
///
/// Returns inclusive `(start, end)`; `None` for multi-range, malformed or
/// unsatisfiable ranges, in which case the whole object is served.
pub fn parse_byte_range(range: &str, size: u64) -> Option<(u64, u64)> {
    let spec = range.trim().strip_prefix("bytes=")?;
    if size == 0 || spec.contains(',') {
        return None;
    }

    let (first, last) = spec.split_once('-')?;
    let (first, last) = (first.trim(), last.trim());

    let start = if first.is_empty() {
        // Suffix range: the last N bytes
        let suffix: u64 = last.parse().ok()?;
        if suffix == 0 {
            return None;
        }
        size.saturating_sub(suffix)
    } else {
        first.parse().ok()?
    };

    let end = if first.is_empty() || last.is_empty() {
        size - 1
    } else {
        last.parse::<u64>().ok()?.min(size - 1)
    };

    if start > end || start >= size {
        return None;
    }
    Some((start, end))
}

fn status_only(status: StatusCode) -> Response<DeliveryBody> {
    let mut response = Response::new(DeliveryBody::Empty);
    *response.status_mut() = status;
    response
}

/// Non-empty header value as a string
fn header_str(headers: &HeaderMap, name: HeaderName) -> Result<Option<&str>> {
    let Some(value) = headers.get(&name) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| Error::InvalidRequest(format!("invalid {name} header")))?;
    Ok(Some(value).filter(|v| !v.is_empty()))
}

fn range_total_size(content_range: &str) -> Option<u64> {
    content_range.split('/').nth(1)?.trim().parse().ok()
}

fn whole_seconds(ts: Timestamp) -> Timestamp {
    Timestamp::from_second(ts.as_second()).unwrap_or(ts)
}

/// Match an `If-Match`/`If-None-Match` list against the current entity tag
fn etag_matches(list: &str, etag: Option<&str>, weak: bool) -> bool {
    if list.trim() == "*" {
        return true;
    }
    let Some(etag) = etag else {
        return false;
    };

    list.split(',').map(str::trim).any(|candidate| {
        if weak {
            candidate.trim_start_matches("W/") == etag.trim_start_matches("W/")
        } else {
            !candidate.starts_with("W/") && !etag.starts_with("W/") && candidate == etag
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> Timestamp {
        Timestamp::from_second(secs).unwrap()
    }

    #[test]
    fn test_parse_http_date_formats() {
        let expected = ts(784_111_777);
        assert_eq!(parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap(), expected);
        assert_eq!(parse_http_date("Sunday, 06-Nov-94 08:49:37 GMT").unwrap(), expected);
    }

    #[test]
    fn test_parse_http_date_invalid() {
        assert!(matches!(
            parse_http_date("yesterday"),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_format_http_date() {
        assert_eq!(
            format_http_date(ts(784_111_777)).unwrap(),
            "Sun, 06 Nov 1994 08:49:37 GMT"
        );
    }

    #[test]
    fn test_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::IF_MODIFIED_SINCE,
            HeaderValue::from_static("Sun, 06 Nov 1994 08:49:37 GMT"),
        );
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"abc\""));
        headers.insert(header::IF_MATCH, HeaderValue::from_static(""));
        headers.insert(header::RANGE, HeaderValue::from_static("bytes=0-99"));

        let conditions = ReadConditions::from_headers(&headers).unwrap();
        assert_eq!(conditions.if_modified_since, Some(ts(784_111_777)));
        assert_eq!(conditions.if_none_match.as_deref(), Some("\"abc\""));
        assert_eq!(conditions.if_match, None);
        assert_eq!(conditions.range.as_deref(), Some("bytes=0-99"));
        assert!(conditions.has_preconditions());
    }

    #[test]
    fn test_from_headers_malformed_date() {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_UNMODIFIED_SINCE, HeaderValue::from_static("not a date"));
        assert!(ReadConditions::from_headers(&headers).is_err());
    }

    #[test]
    fn test_evaluate_if_modified_since() {
        let conditions = ReadConditions {
            if_modified_since: Some(ts(1000)),
            ..Default::default()
        };
        assert!(matches!(
            conditions.evaluate("a", Some(ts(500)), None),
            Err(Error::NotModified(_))
        ));
        assert!(matches!(
            conditions.evaluate("a", Some(ts(1000)), None),
            Err(Error::NotModified(_))
        ));
        assert!(conditions.evaluate("a", Some(ts(1001)), None).is_ok());
    }

    #[test]
    fn test_evaluate_if_unmodified_since() {
        let conditions = ReadConditions {
            if_unmodified_since: Some(ts(1000)),
            ..Default::default()
        };
        assert!(conditions.evaluate("a", Some(ts(1000)), None).is_ok());
        assert!(matches!(
            conditions.evaluate("a", Some(ts(1001)), None),
            Err(Error::PreconditionFailed(_))
        ));
    }

    #[test]
    fn test_evaluate_etags() {
        let if_match = ReadConditions {
            if_match: Some("\"a\", \"b\"".to_string()),
            ..Default::default()
        };
        assert!(if_match.evaluate("x", None, Some("\"b\"")).is_ok());
        assert!(matches!(
            if_match.evaluate("x", None, Some("\"c\"")),
            Err(Error::PreconditionFailed(_))
        ));
        assert!(matches!(
            if_match.evaluate("x", None, None),
            Err(Error::PreconditionFailed(_))
        ));

        let if_none_match = ReadConditions {
            if_none_match: Some("W/\"a\"".to_string()),
            if_modified_since: Some(ts(0)),
            ..Default::default()
        };
        assert!(matches!(
            if_none_match.evaluate("x", Some(ts(10)), Some("\"a\"")),
            Err(Error::NotModified(_))
        ));
        // If-None-Match takes precedence over If-Modified-Since
        assert!(if_none_match.evaluate("x", Some(ts(0)), Some("\"z\"")).is_ok());

        let star = ReadConditions {
            if_match: Some("*".to_string()),
            ..Default::default()
        };
        assert!(star.evaluate("x", None, None).is_ok());
    }

    #[test]
    fn test_status_for_error() {
        assert_eq!(
            status_for_error(&Error::NotFound("a".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for_error(&Error::NotModified("a".into())),
            StatusCode::NOT_MODIFIED
        );
        assert_eq!(
            status_for_error(&Error::PreconditionFailed("a".into())),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            status_for_error(&Error::Network("reset".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_response_status_partial_content() {
        let partial = DeliveryMetadata {
            content_range: Some("bytes 0-99/500".to_string()),
            content_length: Some(100),
            ..Default::default()
        };
        assert_eq!(response_status(&partial), StatusCode::PARTIAL_CONTENT);

        let whole = DeliveryMetadata {
            content_range: Some("bytes 0-499/500".to_string()),
            content_length: Some(500),
            ..Default::default()
        };
        assert_eq!(response_status(&whole), StatusCode::OK);

        let unknown_total = DeliveryMetadata {
            content_range: Some("bytes 0-99/*".to_string()),
            content_length: Some(100),
            ..Default::default()
        };
        assert_eq!(response_status(&unknown_total), StatusCode::OK);

        assert_eq!(response_status(&DeliveryMetadata::default()), StatusCode::OK);
    }

    #[test]
    fn test_response_headers() {
        let metadata = DeliveryMetadata {
            cache_control: Some("max-age=60".to_string()),
            content_length: Some(42),
            content_type: Some("application/gzip".to_string()),
            etag: Some("\"abc\"".to_string()),
            last_modified: Some(ts(784_111_777)),
            expires: Some("bad\nvalue".to_string()),
            ..Default::default()
        };

        let headers = response_headers(&metadata);
        assert_eq!(headers[header::CACHE_CONTROL], "max-age=60");
        assert_eq!(headers[header::CONTENT_LENGTH], "42");
        assert_eq!(headers[header::CONTENT_TYPE], "application/gzip");
        assert_eq!(headers[header::ETAG], "\"abc\"");
        assert_eq!(headers[header::LAST_MODIFIED], "Sun, 06 Nov 1994 08:49:37 GMT");
        assert!(!headers.contains_key(header::EXPIRES));
        assert!(!headers.contains_key(header::CONTENT_RANGE));
    }

    #[test]
    fn test_parse_byte_range() {
        assert_eq!(parse_byte_range("bytes=0-99", 500), Some((0, 99)));
        assert_eq!(parse_byte_range("bytes=100-", 500), Some((100, 499)));
        assert_eq!(parse_byte_range("bytes=-50", 500), Some((450, 499)));
        assert_eq!(parse_byte_range("bytes=400-999", 500), Some((400, 499)));
        assert_eq!(parse_byte_range("bytes=500-600", 500), None);
        assert_eq!(parse_byte_range("bytes=0-1,4-5", 500), None);
        assert_eq!(parse_byte_range("items=0-1", 500), None);
        assert_eq!(parse_byte_range("bytes=0-1", 0), None);
    }

    #[tokio::test]
    async fn test_body_write_to() {
        let body = DeliveryBody::Stream(Box::pin(&b"payload"[..]));
        let mut sink = Vec::new();
        let written = body.write_to(&mut sink).await.unwrap();
        assert_eq!(written, 7);
        assert_eq!(sink, b"payload");

        let mut sink = Vec::new();
        assert_eq!(DeliveryBody::Empty.write_to(&mut sink).await.unwrap(), 0);
    }
}
