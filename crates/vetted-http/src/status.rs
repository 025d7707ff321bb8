//! HTTP status range predicates.

/// Status used for failures that never produced an HTTP response.
pub const SYNTHETIC: u16 = 500;

/// Too Many Requests.
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Whether `status` lies in the HTTP status space [100, 599].
pub fn is_valid_status(status: u16) -> bool {
    (100..=599).contains(&status)
}

/// 1xx.
pub fn is_informational(status: u16) -> bool {
    (100..=199).contains(&status)
}

/// 2xx.
pub fn is_success(status: u16) -> bool {
    (200..=299).contains(&status)
}

/// 3xx.
pub fn is_redirect(status: u16) -> bool {
    (300..=399).contains(&status)
}

/// 4xx.
pub fn is_client_error(status: u16) -> bool {
    (400..=499).contains(&status)
}

/// 5xx.
pub fn is_server_error(status: u16) -> bool {
    (500..=599).contains(&status)
}

/// 4xx or 5xx.
pub fn is_error(status: u16) -> bool {
    is_client_error(status) || is_server_error(status)
}

/// Whether `status` is 429.
pub fn is_rate_limited(status: u16) -> bool {
    status == TOO_MANY_REQUESTS
}
