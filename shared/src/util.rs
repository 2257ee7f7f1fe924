/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a UUIDv4 string for use as record ID
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Generate a random access token for QR entries.
///
/// 32 lowercase hex characters (128 bits). Tokens are opaque strings;
/// there is no structure to parse.
pub fn random_token() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..32)
        .map(|_| {
            let n: u32 = rng.gen_range(0..16);
            char::from_digit(n, 16).unwrap()
        })
        .collect()
}
