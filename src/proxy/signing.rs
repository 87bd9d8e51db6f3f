//! Image path signing and encoding.
//!
//! Signed paths have the form `/<signature>/<path>` where the signature is
//! HMAC-SHA1 over `<path>` keyed with the configured security key.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use url::Url;

type HmacSha1 = Hmac<Sha1>;

/// HMAC-SHA1 signer for image paths.
#[derive(Clone)]
pub struct UrlSigner {
    mac: HmacSha1,
}

impl UrlSigner {
    pub fn new(key: impl AsRef<[u8]>) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            mac: HmacSha1::new_from_slice(key.as_ref())?,
        })
    }

    fn digest(&self, path: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(path.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    /// Standard base64 of the HMAC-SHA1 digest of `path`.
    pub fn sign(&self, path: &str) -> String {
        STANDARD.encode(self.digest(path))
    }

    /// URL-safe base64 variant, usable as a path segment.
    pub fn sign_url_safe(&self, path: &str) -> String {
        URL_SAFE.encode(self.digest(path))
    }

    /// `/<signature>/<path>` with the leading slash of `path` stripped before signing.
    pub fn signed_path(&self, path: &str) -> String {
        let unsigned = path.trim_start_matches('/');
        format!("/{}/{}", self.sign_url_safe(unsigned), unsigned)
    }

    /// Check `signature` (either alphabet) against `path` in constant time.
    pub fn verify(&self, signature: &str, path: &str) -> bool {
        let decoded = STANDARD
            .decode(signature)
            .or_else(|_| URL_SAFE.decode(signature));
        match decoded {
            Ok(bytes) => {
                let mut mac = self.mac.clone();
                mac.update(path.as_bytes());
                mac.verify_slice(&bytes).is_ok()
            }
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").finish_non_exhaustive()
    }
}

/// Percent-encode characters that are not valid in a URI path or query,
/// keeping existing escapes.
pub fn encode_path(path: &str) -> String {
    let Ok(mut url) = Url::parse("http://localhost/") else {
        return path.to_string();
    };
    let (raw_path, query) = match path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path, None),
    };
    url.set_path(raw_path);
    url.set_query(query);

    match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_matches_reference_digest() {
        let signer = UrlSigner::new("key").unwrap();
        assert_eq!(
            signer.sign("The quick brown fox jumps over the lazy dog"),
            "3nybhbi3iqa8ino29wqQcBydtNk="
        );
    }

    #[test]
    fn url_safe_alphabet_for_paths() {
        let signer = UrlSigner::new("secret").unwrap();
        assert_eq!(signer.sign("300x200/photo.jpg"), "G7FYWzd+9qnBXj3dok1dXzr6laA=");
        assert_eq!(signer.sign_url_safe("300x200/photo.jpg"), "G7FYWzd-9qnBXj3dok1dXzr6laA=");
        assert_eq!(
            signer.signed_path("/300x200/photo.jpg"),
            "/G7FYWzd-9qnBXj3dok1dXzr6laA=/300x200/photo.jpg"
        );
    }

    #[test]
    fn verify_accepts_both_alphabets() {
        let signer = UrlSigner::new("secret").unwrap();
        assert!(signer.verify("G7FYWzd+9qnBXj3dok1dXzr6laA=", "300x200/photo.jpg"));
        assert!(signer.verify("G7FYWzd-9qnBXj3dok1dXzr6laA=", "300x200/photo.jpg"));
        assert!(!signer.verify("G7FYWzd-9qnBXj3dok1dXzr6laA=", "300x200/other.jpg"));
        assert!(!signer.verify("not base64!", "300x200/photo.jpg"));
    }

    #[test]
    fn encode_path_requotes() {
        assert_eq!(encode_path("/unsafe/my photo.jpg"), "/unsafe/my%20photo.jpg");
        assert_eq!(encode_path("/unsafe/a%20b.jpg"), "/unsafe/a%20b.jpg");
        assert_eq!(encode_path("/filters:quality(80)/a.jpg"), "/filters:quality(80)/a.jpg");
        assert_eq!(encode_path("/a.jpg?v=1"), "/a.jpg?v=1");
    }
}
