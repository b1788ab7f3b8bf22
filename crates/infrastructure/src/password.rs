use application::{password::PasswordHasherError, PasswordHasher};
use data_encoding::HEXLOWER;
use domain::PasswordHash;
use ring::hmac;

/// `HMAC-SHA256(app_key, password)`，十六进制小写编码
#[derive(Clone)]
pub struct HmacPasswordHasher {
    key: hmac::Key,
}

impl HmacPasswordHasher {
    pub fn new(app_key: &str) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, app_key.as_bytes()),
        }
    }
}

impl PasswordHasher for HmacPasswordHasher {
    fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError> {
        let tag = hmac::sign(&self.key, plaintext.as_bytes());
        PasswordHash::new(HEXLOWER.encode(tag.as_ref()))
            .map_err(|err| PasswordHasherError::hash_error(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_keyed_and_deterministic() {
        let hasher = HmacPasswordHasher::new("app-key");
        let hashed = hasher.hash("hunter2").unwrap();

        assert_eq!(hashed.as_str().len(), 64);
        assert_ne!(hashed.as_str(), "hunter2");
        assert_eq!(hasher.hash("hunter2").unwrap(), hashed);
        assert_ne!(hasher.hash("hunter3").unwrap(), hashed);

        let other_key = HmacPasswordHasher::new("another-key");
        assert_ne!(other_key.hash("hunter2").unwrap(), hashed);
    }
}
