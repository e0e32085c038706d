//! TC3-HMAC-SHA256 request signing for the Tencent Cloud API.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use time::macros::format_description;
use time::OffsetDateTime;

use crate::config::Credentials;
use crate::error::{DnsPodError, DnsPodResult};

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "TC3-HMAC-SHA256";
pub const CONTENT_TYPE: &str = "application/json; charset=utf-8";
const SERVICE: &str = "dnspod";
const SIGNED_HEADERS: &str = "content-type;host;x-tc-action";

/// Build the `Authorization` header value for one API call.
///
/// `host` must be the exact value sent in the `Host` header and `payload`
/// the exact request body.
pub fn authorization(
    credentials: &Credentials,
    host: &str,
    action: &str,
    payload: &str,
    timestamp: i64,
) -> DnsPodResult<String> {
    let date = utc_date(timestamp)?;
    let scope = format!("{}/{}/tc3_request", date, SERVICE);

    let canonical_request = format!(
        "POST\n/\n\ncontent-type:{}\nhost:{}\nx-tc-action:{}\n\n{}\n{}",
        CONTENT_TYPE,
        host,
        action.to_lowercase(),
        SIGNED_HEADERS,
        hex::encode(Sha256::digest(payload.as_bytes()))
    );

    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        timestamp,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let secret_date = hmac_sha256(format!("TC3{}", credentials.secret_key).as_bytes(), &date)?;
    let secret_service = hmac_sha256(&secret_date, SERVICE)?;
    let secret_signing = hmac_sha256(&secret_service, "tc3_request")?;
    let signature = hex::encode(hmac_sha256(&secret_signing, &string_to_sign)?);

    Ok(format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, credentials.secret_id, scope, SIGNED_HEADERS, signature
    ))
}

fn hmac_sha256(key: &[u8], message: &str) -> DnsPodResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| DnsPodError::Signing(format!("HMAC error: {}", e)))?;
    mac.update(message.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

fn utc_date(timestamp: i64) -> DnsPodResult<String> {
    let datetime = OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|e| DnsPodError::Signing(format!("Invalid timestamp {}: {}", timestamp, e)))?;
    datetime
        .format(format_description!("[year]-[month]-[day]"))
        .map_err(|e| DnsPodError::Signing(format!("Failed to format date: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials::new("AKIDEXAMPLE", "Gu5t9xGARNpq86cd98joQYCN3EXAMPLE")
    }

    #[test]
    fn test_utc_date() {
        assert_eq!(utc_date(0).unwrap(), "1970-01-01");
        assert_eq!(utc_date(1_700_000_000).unwrap(), "2023-11-14");
    }

    #[test]
    fn test_authorization_known_signature() {
        let header = authorization(
            &credentials(),
            "dnspod.tencentcloudapi.com",
            "DescribeDomainList",
            r#"{"Offset":0,"Limit":3000}"#,
            1_700_000_000,
        )
        .unwrap();

        assert_eq!(
            header,
            "TC3-HMAC-SHA256 Credential=AKIDEXAMPLE/2023-11-14/dnspod/tc3_request, \
             SignedHeaders=content-type;host;x-tc-action, \
             Signature=86fa2ea9abd7352405b47092ce3e65fdac3dd5cee64fbb95de55d2a8e026b948"
        );
    }

    #[test]
    fn test_signature_depends_on_payload_and_action() {
        let creds = credentials();
        let host = "dnspod.tencentcloudapi.com";
        let base = authorization(&creds, host, "CreateTXTRecord", "{}", 1_700_000_000).unwrap();

        let other_payload =
            authorization(&creds, host, "CreateTXTRecord", r#"{"TTL":600}"#, 1_700_000_000).unwrap();
        let other_action =
            authorization(&creds, host, "DeleteRecord", "{}", 1_700_000_000).unwrap();

        assert_ne!(base, other_payload);
        assert_ne!(base, other_action);
        assert_eq!(
            base,
            authorization(&creds, host, "CreateTXTRecord", "{}", 1_700_000_000).unwrap()
        );
    }
}
