use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Signs booking ids into `id|hex(hmac)` ticket tokens.
#[derive(Clone)]
pub struct TicketSigner {
    secret: String,
    base_url: String,
}

impl TicketSigner {
    pub fn new(secret: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn digest(&self, booking_id: i64) -> String {
        let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(self.secret.as_bytes()) else {
            unreachable!("HMAC accepts keys of any length");
        };
        mac.update(booking_id.to_string().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn sign(&self, booking_id: i64) -> String {
        format!("{}|{}", booking_id, self.digest(booking_id))
    }

    /// Returns the booking id when the token is authentic.
    pub fn verify(&self, token: &str) -> Option<i64> {
        let (id, sig) = token.split_once('|')?;
        let booking_id: i64 = id.parse().ok()?;
        let expected = self.digest(booking_id);

        constant_time_eq(expected.as_bytes(), sig.as_bytes()).then_some(booking_id)
    }

    pub fn download_url(&self, booking_id: i64) -> String {
        format!(
            "{}/bookings/{}/ticket?download=true&token={}",
            self.base_url,
            booking_id,
            urlencoding::encode(&self.sign(booking_id))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TicketSigner {
        TicketSigner::new("ticket-secret", "https://courts.example/")
    }

    #[test]
    fn signed_token_verifies() {
        let s = signer();
        let token = s.sign(42);
        assert!(token.starts_with("42|"));
        assert_eq!(s.verify(&token), Some(42));
    }

    #[test]
    fn tampered_tokens_fail() {
        let s = signer();
        let token = s.sign(42);
        let forged = token.replacen("42|", "43|", 1);
        assert_eq!(s.verify(&forged), None);
        assert_eq!(s.verify("42"), None);
        assert_eq!(s.verify("abc|00"), None);

        let other = TicketSigner::new("different", "https://courts.example");
        assert_eq!(other.verify(&token), None);
    }

    #[test]
    fn empty_secret_still_signs() {
        let s = TicketSigner::new("", "https://courts.example");
        assert_eq!(s.verify(&s.sign(5)), Some(5));
    }

    #[test]
    fn download_url_embeds_encoded_token() {
        let url = signer().download_url(7);
        assert!(url.starts_with("https://courts.example/bookings/7/ticket?download=true&token=7%7C"));
    }
}
