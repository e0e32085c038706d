use log::{debug, info, warn};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::signer;
use super::zones::{subdomain_label, Zone, ZoneMap};
use crate::config::{ApiOptions, Credentials};
use crate::error::{DnsPodError, DnsPodResult};

const DNSPOD_API_VERSION: &str = "2021-03-23";
const DOMAIN_PAGE_LIMIT: u64 = 3000;
const RECORD_PAGE_LIMIT: u64 = 3000;
/// DNSPod's name for the default resolution line
pub const DEFAULT_RECORD_LINE: &str = "默认";
pub const RECORD_REMARK: &str = "dnspod-dns01 certificate validation";

/// Client for the DNSPod API holding a snapshot of the account's zones.
///
/// The zone list is fetched once in [`DnsPodClient::connect`] and never
/// refreshed; build a new client to see zone changes.
#[derive(Debug)]
pub struct DnsPodClient {
    client: Client,
    credentials: Credentials,
    endpoint: Url,
    region: Option<String>,
    zones: ZoneMap,
}

impl DnsPodClient {
    pub async fn connect(credentials: Credentials, options: &ApiOptions) -> DnsPodResult<Self> {
        debug!("Creating DNSPod client for {}", options.endpoint);

        let endpoint = Url::parse(&options.endpoint).map_err(|e| DnsPodError::InvalidResponse {
            action: "connect",
            message: format!("invalid endpoint '{}': {}", options.endpoint, e),
        })?;
        let client = Client::builder().timeout(options.timeout()).build()?;

        let mut dnspod = Self {
            client,
            credentials,
            endpoint,
            region: options.region.clone().filter(|r| !r.is_empty()),
            zones: ZoneMap::default(),
        };
        dnspod.zones = ZoneMap::new(dnspod.list_zones().await?);
        if dnspod.zones.is_empty() {
            warn!("DNSPod account has no domains, every zone lookup will fail");
        }

        Ok(dnspod)
    }

    pub fn zones(&self) -> &ZoneMap {
        &self.zones
    }

    /// Create the TXT record `validation_name` in the zone that holds `domain`.
    ///
    /// Returns the new record id.
    pub async fn add_txt_record(
        &self,
        domain: &str,
        validation_name: &str,
        value: &str,
        ttl: u32,
    ) -> DnsPodResult<u64> {
        let zone = self.zones.find(domain)?;

        let request = TxtRecordRequest {
            zone_id: zone.id,
            zone_name: zone.name.clone(),
            subdomain_label: subdomain_label(validation_name, &zone.name),
            value: value.to_string(),
            ttl,
            line_type: DEFAULT_RECORD_LINE.to_string(),
            remark: RECORD_REMARK.to_string(),
        };

        debug!(
            "Creating TXT record {:?} in zone {} ({})",
            request.subdomain_label, zone.name, zone.id
        );

        let response: CreateRecordResponse = self
            .call("CreateTXTRecord", &zone.name, &request)
            .await?;

        info!(
            "Created TXT record {} in zone {} (record id {})",
            validation_name, zone.name, response.record_id
        );

        Ok(response.record_id)
    }

    /// Delete every TXT record named `record_name` whose value is `value`.
    ///
    /// Returns how many records were removed; finding none is not an error.
    pub async fn del_txt_record(
        &self,
        domain: &str,
        record_name: &str,
        value: &str,
    ) -> DnsPodResult<usize> {
        let zone = self.zones.find(domain)?;
        let label = subdomain_label(record_name, &zone.name);

        debug!(
            "Deleting TXT domain: {}; record name: {}; record content: {}",
            domain, record_name, value
        );

        let records = self.find_txt_records(zone, &label).await?;
        let matching: Vec<&TxtRecord> = records.iter().filter(|r| r.value == value).collect();

        if matching.is_empty() {
            warn!(
                "No TXT record {} with the expected value found in zone {}, nothing to delete",
                record_name, zone.name
            );
            return Ok(0);
        }

        for record in &matching {
            let request = DeleteRecordRequest {
                domain: zone.name.clone(),
                domain_id: zone.id,
                record_id: record.record_id,
            };
            let _: serde_json::Value = self.call("DeleteRecord", &zone.name, &request).await?;
            info!(
                "Deleted TXT record {} from zone {} (record id {})",
                record_name, zone.name, record.record_id
            );
        }

        Ok(matching.len())
    }

    async fn list_zones(&self) -> DnsPodResult<Vec<Zone>> {
        let mut zones = Vec::new();
        let mut offset = 0;

        loop {
            let request = DescribeDomainListRequest {
                offset,
                limit: DOMAIN_PAGE_LIMIT,
            };
            let page: DomainListResponse =
                match self.call("DescribeDomainList", "account", &request).await {
                    Err(e) if is_no_data(&e) => break,
                    other => other?,
                };

            let count = page.domain_list.len() as u64;
            zones.extend(page.domain_list.into_iter().map(|d| Zone {
                id: d.domain_id,
                name: d.name,
            }));
            offset += count;

            let total = page.domain_count_info.map(|c| c.all_total);
            if count < DOMAIN_PAGE_LIMIT || total.is_some_and(|t| offset >= t) {
                break;
            }
        }

        Ok(zones)
    }

    /// All TXT records named `label` in `zone`, paged like [`Self::list_zones`].
    async fn find_txt_records(&self, zone: &Zone, label: &str) -> DnsPodResult<Vec<TxtRecord>> {
        let mut records = Vec::new();
        let mut offset = 0;

        loop {
            let request = DescribeRecordListRequest {
                domain: zone.name.clone(),
                domain_id: zone.id,
                subdomain: if label.is_empty() { "@".to_string() } else { label.to_string() },
                record_type: "TXT".to_string(),
                offset,
                limit: RECORD_PAGE_LIMIT,
            };
            let page: RecordListResponse =
                match self.call("DescribeRecordList", &zone.name, &request).await {
                    Err(e) if is_no_data(&e) => break,
                    other => other?,
                };

            let count = page.record_list.len() as u64;
            records.extend(
                page.record_list
                    .into_iter()
                    .filter(|r| r.record_type.eq_ignore_ascii_case("TXT")),
            );
            offset += count;

            let total = page.record_count_info.map(|c| c.total_count);
            if count < RECORD_PAGE_LIMIT || total.is_some_and(|t| offset >= t) {
                break;
            }
        }

        Ok(records)
    }

    /// Send one signed API call and unwrap the `Response` envelope.
    async fn call<Req, Resp>(&self, action: &'static str, target: &str, body: &Req) -> DnsPodResult<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_string(body).map_err(|e| DnsPodError::InvalidResponse {
            action,
            message: format!("failed to encode request: {}", e),
        })?;
        let host = self.host();
        let timestamp = OffsetDateTime::now_utc().unix_timestamp();
        let authorization =
            signer::authorization(&self.credentials, &host, action, &payload, timestamp)?;

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header("Authorization", authorization)
            .header("Content-Type", signer::CONTENT_TYPE)
            .header("Host", &host)
            .header("X-TC-Action", action)
            .header("X-TC-Timestamp", timestamp.to_string())
            .header("X-TC-Version", DNSPOD_API_VERSION);
        if let Some(region) = &self.region {
            request = request.header("X-TC-Region", region);
        }

        let body = request.body(payload).send().await?.text().await?;
        let envelope: Envelope =
            serde_json::from_str(&body).map_err(|e| DnsPodError::InvalidResponse {
                action,
                message: format!("{}: {}", e, body),
            })?;
        let response = envelope.response;

        if let Some(error) = response.get("Error") {
            let error: ApiError =
                serde_json::from_value(error.clone()).map_err(|e| DnsPodError::InvalidResponse {
                    action,
                    message: format!("malformed Error object {}: {}", error, e),
                })?;
            debug!("{} error: {} ({})", action, error.message, error.code);
            return Err(DnsPodError::RemoteApi {
                action,
                target: target.to_string(),
                code: error.code,
                message: error.message,
            });
        }

        serde_json::from_value(response).map_err(|e| DnsPodError::InvalidResponse {
            action,
            message: e.to_string(),
        })
    }

    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }
}

fn is_no_data(err: &DnsPodError) -> bool {
    err.code().is_some_and(|code| code.starts_with("ResourceNotFound.NoDataOf"))
}

/// Parameters of one CreateTXTRecord call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxtRecordRequest {
    #[serde(rename = "DomainId")]
    pub zone_id: u64,
    #[serde(rename = "Domain")]
    pub zone_name: String,
    // Omitted at the apex, DNSPod then uses "@"
    #[serde(rename = "SubDomain", skip_serializing_if = "String::is_empty")]
    pub subdomain_label: String,
    #[serde(rename = "Value")]
    pub value: String,
    #[serde(rename = "TTL")]
    pub ttl: u32,
    #[serde(rename = "RecordLine")]
    pub line_type: String,
    #[serde(rename = "Remark")]
    pub remark: String,
}

// DNSPod API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeDomainListRequest {
    offset: u64,
    limit: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeRecordListRequest {
    domain: String,
    domain_id: u64,
    subdomain: String,
    record_type: String,
    offset: u64,
    limit: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteRecordRequest {
    domain: String,
    domain_id: u64,
    record_id: u64,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Response")]
    response: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiError {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DomainListResponse {
    #[serde(default)]
    domain_list: Vec<DomainListItem>,
    domain_count_info: Option<DomainCountInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DomainListItem {
    domain_id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DomainCountInfo {
    all_total: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateRecordResponse {
    record_id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecordListResponse {
    #[serde(default)]
    record_list: Vec<TxtRecord>,
    record_count_info: Option<RecordCountInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecordCountInfo {
    total_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TxtRecord {
    record_id: u64,
    #[serde(rename = "Type")]
    record_type: String,
    value: String,
}
