//! Gateway notification signatures.
//!
//! Inbound server-to-server notifications carry a hex SHA-256 digest of
//! the correlation fields concatenated with the shared secret. The raw
//! string layout must match the gateway contract exactly.

use sha2::{Digest, Sha256};

/// Compute the signature for a notification's correlation fields.
pub fn sign_notification(
    secret: &str,
    order_id: &str,
    result_code: i64,
    amount: i64,
    trans_id: Option<&str>,
) -> String {
    let raw = format!(
        "amount={amount}&orderId={order_id}&resultCode={result_code}&transId={}",
        trans_id.unwrap_or("")
    );

    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verify a received signature against the recomputed one.
pub fn verify_notification(
    secret: &str,
    order_id: &str,
    result_code: i64,
    amount: i64,
    trans_id: Option<&str>,
    signature: &str,
) -> bool {
    let expected = sign_notification(secret, order_id, result_code, amount, trans_id);
    expected.eq_ignore_ascii_case(signature)
}
