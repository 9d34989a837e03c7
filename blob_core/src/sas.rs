//! Service SAS tokens for single blobs.
//!
//! Only the fields this worker needs are supported: permissions, start,
//! expiry and protocol. Identifier, IP range, snapshot, encryption scope and
//! response header overrides are always empty.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const SAS_VERSION: &str = "2020-12-06";

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Everything that goes into one blob SAS.
#[derive(Debug, Clone)]
pub struct BlobSas<'a> {
    pub account: &'a str,
    pub container: &'a str,
    pub blob: &'a str,
    /// Azure permission letters in canonical order, e.g. `"r"` or `"cw"`.
    pub permissions: &'a str,
    pub start: Option<DateTime<Utc>>,
    pub expiry: DateTime<Utc>,
    /// `"https"` or `"https,http"`.
    pub protocol: Option<&'a str>,
}

impl BlobSas<'_> {
    pub fn string_to_sign(&self) -> String {
        let start = self.start.map(fmt_time).unwrap_or_default();
        let expiry = fmt_time(self.expiry);
        let resource = format!("/blob/{}/{}/{}", self.account, self.container, self.blob);

        [
            self.permissions,
            start.as_str(),
            expiry.as_str(),
            resource.as_str(),
            "", // signedIdentifier
            "", // signedIP
            self.protocol.unwrap_or(""),
            SAS_VERSION,
            "b", // signedResource
            "", // signedSnapshotTime
            "", // signedEncryptionScope
            "", // rscc
            "", // rscd
            "", // rsce
            "", // rscl
            "", // rsct
        ]
        .join("\n")
    }

    /// HMAC-SHA256 of the string-to-sign, base64 encoded.
    pub fn signature(&self, account_key: &[u8]) -> anyhow::Result<String> {
        let mut mac = Hmac::<Sha256>::new_from_slice(account_key)
            .map_err(|e| anyhow::anyhow!("invalid account key: {e}"))?;
        mac.update(self.string_to_sign().as_bytes());
        Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Query string to append to the blob URL (no leading `?`).
    pub fn query(&self, account_key: &[u8]) -> anyhow::Result<String> {
        let signature = self.signature(account_key)?;
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("sv", SAS_VERSION);
        query.append_pair("sr", "b");
        query.append_pair("sp", self.permissions);
        if let Some(start) = self.start {
            query.append_pair("st", &fmt_time(start));
        }
        query.append_pair("se", &fmt_time(self.expiry));
        if let Some(protocol) = self.protocol {
            query.append_pair("spr", protocol);
        }
        query.append_pair("sig", &signature);
        Ok(query.finish())
    }
}

fn fmt_time(t: DateTime<Utc>) -> String {
    t.format(TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> BlobSas<'static> {
        BlobSas {
            account: "ttsout",
            container: "tts-output",
            blob: "job-1_1700000000000.wav",
            permissions: "r",
            start: Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
            expiry: Utc.with_ymd_and_hms(2026, 1, 1, 1, 0, 0).unwrap(),
            protocol: Some("https"),
        }
    }

    #[test]
    fn test_string_to_sign_layout() {
        let expected = "r\n2026-01-01T00:00:00Z\n2026-01-01T01:00:00Z\n/blob/ttsout/tts-output/job-1_1700000000000.wav\n\n\nhttps\n2020-12-06\nb\n\n\n\n\n\n\n";
        assert_eq!(sample().string_to_sign(), expected);
    }

    #[test]
    fn test_signature_is_hmac_sha256() {
        let sig = sample().signature(b"keykeykey").unwrap();
        assert_eq!(sig, "Ypo47sgXNWQiQVjtkcCq30OAWkkvSbkRYmI/m/7zkC8=");
    }

    #[test]
    fn test_query_encodes_signature() {
        let query = sample().query(b"keykeykey").unwrap();
        assert!(query.starts_with("sv=2020-12-06&sr=b&sp=r&st=2026-01-01T00%3A00%3A00Z"));
        assert!(query.contains("&spr=https&"));
        assert!(query.ends_with("sig=Ypo47sgXNWQiQVjtkcCq30OAWkkvSbkRYmI%2Fm%2F7zkC8%3D"));
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let mut sas = sample();
        sas.start = None;
        sas.protocol = None;
        let query = sas.query(b"k").unwrap();
        assert!(!query.contains("st="));
        assert!(!query.contains("spr="));
        assert!(sas.string_to_sign().starts_with("r\n\n2026"));
    }
}
