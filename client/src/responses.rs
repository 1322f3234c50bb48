use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Enrichment data returned by `GET /lookup/ip/{ip}`.
///
/// Every field falls back to its empty value when the API leaves it out
/// or sends `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpLookup {
    #[serde(deserialize_with = "null_as_default")]
    pub ip: String,
    #[serde(deserialize_with = "null_as_default")]
    pub network: Network,
    #[serde(deserialize_with = "null_as_default")]
    pub location: Location,
    #[serde(deserialize_with = "null_as_default")]
    pub ip_data: IpData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Network {
    #[serde(deserialize_with = "null_as_default")]
    pub asn: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub isp: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub network_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub org: String,
    #[serde(deserialize_with = "null_as_default")]
    pub abuse_email: String,
    #[serde(deserialize_with = "null_as_default")]
    pub abuse_phone: String,
    #[serde(deserialize_with = "null_as_default")]
    pub domain: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    #[serde(deserialize_with = "null_as_default")]
    pub country: String,
    #[serde(deserialize_with = "null_as_default")]
    pub state: String,
    #[serde(deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(deserialize_with = "null_as_default")]
    pub timezone: String,
    #[serde(deserialize_with = "null_as_default")]
    pub longitude: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub latitude: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub geo_hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpData {
    #[serde(deserialize_with = "null_as_default")]
    pub devices: Vec<Device>,
    #[serde(deserialize_with = "null_as_default")]
    pub device_count: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub behavior: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub categories: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub enriched: Vec<Enrichment>,
    /// Risk score assigned to the address.
    #[serde(deserialize_with = "null_as_default")]
    pub ip_risk: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    #[serde(deserialize_with = "null_as_default")]
    pub os: String,
    #[serde(deserialize_with = "null_as_default")]
    pub version: String,
}

/// A third-party sighting of the address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Enrichment {
    #[serde(deserialize_with = "null_as_default")]
    pub provider: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub enrichment_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub last_seen: String,
}

// The API sends `null` for fields it has no data for.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
