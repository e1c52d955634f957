use rand::Rng;

/// Generate a random signing secret (32 bytes, hex encoded = 64 characters)
pub fn generate_secret() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

/// Generate a record identifier
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
