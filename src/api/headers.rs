//! `X-Request-Id` propagation, required on every response per spec.

use axum::http::{HeaderName, HeaderValue, Response};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Stamps `X-Request-Id` onto a response, generating one if the caller
/// didn't already read it from the inbound request headers.
pub fn inject_request_id<B>(response: &mut Response<B>, request_id: &str) {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_request_id() {
        let mut response = Response::new("body");
        inject_request_id(&mut response, "req-123");
        assert_eq!(
            response.headers().get(REQUEST_ID_HEADER).unwrap(),
            "req-123"
        );
    }
}
