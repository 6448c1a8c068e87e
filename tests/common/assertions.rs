//! Assertion helpers shared by the integration and property tests

use serde_json::Value;

/// Assert that a set of positions is exactly `0..n-1`
#[macro_export]
macro_rules! assert_dense {
    ($positions:expr) => {{
        let positions: Vec<i32> = $positions.into_iter().collect();
        assert!(
            boardsync::shared::ledger::is_dense(positions.iter().copied()),
            "positions are not dense: {:?}",
            positions
        );
    }};
}

/// Assert that `body` is a failure envelope with `code`
pub fn assert_failure(body: &Value, code: &str) {
    assert_eq!(body["success"], false, "expected a failure envelope: {}", body);
    assert_eq!(body["code"], code, "unexpected error code: {}", body);
    assert!(body["error"].is_string(), "failure without message: {}", body);
}
