//! Request ID generation middleware

use uuid::Uuid;

/// Generate a new request ID using UUID v4
///
/// Returns a unique correlation ID that can be used to track
/// requests through the system, including retries and fallbacks.
///
/// # Examples
///
/// ```
/// use gatewaylib::logging::generate_request_id;
///
/// let request_id = generate_request_id();
/// assert!(!request_id.is_empty());
/// ```
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}
