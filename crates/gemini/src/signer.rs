use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use bot_core::config::Credentials;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use sha2::Sha384;

use crate::envelope::RequestEnvelope;
use crate::error::{GeminiError, Result};

type HmacSha384 = Hmac<Sha384>;

pub const APIKEY_HEADER: &str = "X-GEMINI-APIKEY";
pub const PAYLOAD_HEADER: &str = "X-GEMINI-PAYLOAD";
pub const SIGNATURE_HEADER: &str = "X-GEMINI-SIGNATURE";

/// Header values for one authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    pub api_key: String,
    pub payload: String,
    pub signature: String,
}

impl SignedPayload {
    pub fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(APIKEY_HEADER, HeaderValue::from_str(&self.api_key)?);
        headers.insert(PAYLOAD_HEADER, HeaderValue::from_str(&self.payload)?);
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&self.signature)?);
        Ok(headers)
    }
}

#[derive(Debug, Clone)]
pub struct Signer {
    credentials: Credentials,
}

impl Signer {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn sign(&self, envelope: &RequestEnvelope) -> Result<SignedPayload> {
        let payload = BASE64_STANDARD.encode(envelope.to_json()?);
        let signature = sign_payload(&payload, &self.credentials.api_secret)?;
        Ok(SignedPayload {
            api_key: self.credentials.api_key.clone(),
            payload,
            signature,
        })
    }
}

/// Lowercase hex HMAC-SHA384 of the base64 payload.
pub fn sign_payload(payload_base64: &str, secret_key: &str) -> Result<String> {
    let mut mac = HmacSha384::new_from_slice(secret_key.as_bytes())
        .map_err(|err| GeminiError::Signature(err.to_string()))?;
    mac.update(payload_base64.as_bytes());
    Ok(format!("{:x}", mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn signer() -> Signer {
        Signer::new(Credentials::new("mykey", "1234abcd"))
    }

    fn envelope(nonce: u64, amount: &str) -> RequestEnvelope {
        let params = params! {
            "symbol" => "btcusd",
            "amount" => amount,
            "side" => "buy",
        };
        RequestEnvelope::build("/v1/order/new", nonce, Some(params)).unwrap()
    }

    #[test]
    fn signing_is_deterministic() {
        let first = signer().sign(&envelope(1, "5")).unwrap();
        let second = signer().sign(&envelope(1, "5")).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.api_key, "mykey");
        assert_eq!(first.signature.len(), 96);
        assert!(first
            .signature
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn payload_decodes_to_envelope_json() {
        let signed = signer().sign(&envelope(77, "5")).unwrap();
        let raw = BASE64_STANDARD.decode(&signed.payload).unwrap();
        let decoded: Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(
            decoded,
            json!({
                "request": "/v1/order/new",
                "nonce": 77,
                "symbol": "btcusd",
                "amount": "5",
                "side": "buy",
            })
        );
    }

    #[test]
    fn every_field_change_moves_the_signature() {
        let base = signer().sign(&envelope(1, "5")).unwrap().signature;

        let other_nonce = signer().sign(&envelope(2, "5")).unwrap().signature;
        let other_amount = signer().sign(&envelope(1, "6")).unwrap().signature;
        let other_path = signer()
            .sign(&RequestEnvelope::build("/v1/order/cancel", 1, None).unwrap())
            .unwrap()
            .signature;
        let other_secret = Signer::new(Credentials::new("mykey", "abcd1234"))
            .sign(&envelope(1, "5"))
            .unwrap()
            .signature;

        for changed in [other_nonce, other_amount, other_path, other_secret] {
            assert_ne!(base, changed);
        }
    }

    #[test]
    fn signature_matches_known_hmac_sha384_vector() {
        // RFC 4231 test case 2.
        let mut mac = HmacSha384::new_from_slice(b"Jefe").unwrap();
        mac.update(b"what do ya want for nothing?");
        let expected = format!("{:x}", mac.finalize().into_bytes());
        assert_eq!(
            expected,
            "af45d2e376484031617f78d2b58a6b1b9c7ef464f5a01b47e42ec3736322445e\
             8e2240ca5e69e2c78b3239ecfab21649"
        );
        assert_eq!(
            sign_payload("what do ya want for nothing?", "Jefe").unwrap(),
            expected
        );
    }

    #[test]
    fn headers_carry_three_signing_values() {
        let signed = signer().sign(&envelope(3, "1")).unwrap();
        let headers = signed.headers().unwrap();
        assert_eq!(headers[APIKEY_HEADER], "mykey");
        assert_eq!(headers[PAYLOAD_HEADER], signed.payload.as_str());
        assert_eq!(headers[SIGNATURE_HEADER], signed.signature.as_str());
    }
}
