//! Verification of signed mini-app init data.
//!
//! The client sends the raw init data string it received from the chat
//! platform. It is a form-encoded list of fields plus a `hash` field holding
//! `hex(HMAC_SHA256(secret_key, data_check_string))`, where
//! `secret_key = HMAC_SHA256(key = "WebAppData", message = bot_token)` and the
//! data-check string is every other field, sorted by key, rendered as
//! `key=value` and joined with `\n`.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use url::form_urlencoded;

use crate::error::CoreError;
use crate::types::ChatId;

type HmacSha256 = Hmac<Sha256>;

const SECRET_KEY_LABEL: &[u8] = b"WebAppData";
const HASH_FIELD: &str = "hash";
const USER_FIELD: &str = "user";

/// End-user identity embedded in verified init data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebAppUser {
    pub id: ChatId,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

/// Decode init data into its fields. Later duplicates win.
pub fn parse_fields(raw: &str) -> BTreeMap<String, String> {
    form_urlencoded::parse(raw.trim().as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Canonical data-check string: every field except `hash`, sorted by key.
pub fn data_check_string(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .filter(|(k, _)| k.as_str() != HASH_FIELD)
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| s.get(i..i + 2).and_then(|b| u8::from_str_radix(b, 16).ok()))
        .collect()
}

fn encode_hex(bytes: impl AsRef<[u8]>) -> String {
    bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
}

/// Verifies init data signed for one bot token.
#[derive(Clone)]
pub struct InitDataVerifier {
    secret_key: Vec<u8>,
}

impl std::fmt::Debug for InitDataVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitDataVerifier").finish_non_exhaustive()
    }
}

impl InitDataVerifier {
    pub fn new(bot_token: &str) -> Self {
        let mut mac =
            HmacSha256::new_from_slice(SECRET_KEY_LABEL).expect("HMAC accepts any key length");
        mac.update(bot_token.as_bytes());
        Self {
            secret_key: mac.finalize().into_bytes().to_vec(),
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret_key).expect("HMAC accepts any key length")
    }

    /// Hex signature of a data-check string.
    pub fn sign(&self, data_check_string: &str) -> String {
        let mut mac = self.mac();
        mac.update(data_check_string.as_bytes());
        encode_hex(mac.finalize().into_bytes())
    }

    /// Encode `fields` as init data and append a valid `hash`.
    pub fn sign_fields(&self, fields: &[(&str, &str)]) -> String {
        let map: BTreeMap<String, String> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let hash = self.sign(&data_check_string(&map));

        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (k, v) in fields {
            serializer.append_pair(k, v);
        }
        serializer.append_pair(HASH_FIELD, &hash);
        serializer.finish()
    }

    /// Check the signature and return the embedded user.
    ///
    /// Missing, malformed or mis-signed data is `Unauthorized`; a verified
    /// user flagged as a bot is `Forbidden`.
    pub fn verify(&self, raw: &str) -> Result<WebAppUser, CoreError> {
        if raw.trim().is_empty() {
            return Err(CoreError::Unauthorized("Init data is missing".to_string()));
        }
        let fields = parse_fields(raw);
        let provided = fields
            .get(HASH_FIELD)
            .and_then(|h| decode_hex(h))
            .ok_or_else(|| CoreError::Unauthorized("Init data hash is missing".to_string()))?;

        let mut mac = self.mac();
        mac.update(data_check_string(&fields).as_bytes());
        mac.verify_slice(&provided)
            .map_err(|_| CoreError::Unauthorized("Init data signature mismatch".to_string()))?;

        let user: WebAppUser = fields
            .get(USER_FIELD)
            .and_then(|json| serde_json::from_str(json).ok())
            .ok_or_else(|| CoreError::Unauthorized("Init data has no valid user".to_string()))?;

        if user.is_bot {
            return Err(CoreError::Forbidden(format!("User {} is a bot", user.id)));
        }
        Ok(user)
    }
}
