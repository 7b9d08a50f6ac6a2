use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use crate::collector::get_text;
use crate::error::PoolError;
use crate::models::{PoolDescriptor, ResponseShape};

#[derive(Deserialize, Debug)]
struct DescriptorDocument {
    pools: Vec<RawDescriptor>,
}

#[derive(Deserialize, Debug)]
struct RawDescriptor {
    url: String,
    api: String,
    #[serde(rename = "type")]
    shape: ResponseShape,
}

/// Downloads and parses the pool list.
pub async fn fetch_descriptors(
    client: &Client,
    url: &str,
) -> Result<Vec<PoolDescriptor>, PoolError> {
    let body = get_text(client, url).await?;
    let descriptors = parse_descriptors(&body)?;
    info!("Fetched {} pool descriptors from {}", descriptors.len(), url);
    Ok(descriptors)
}

pub fn parse_descriptors(body: &str) -> Result<Vec<PoolDescriptor>, PoolError> {
    let doc: DescriptorDocument = serde_json::from_str(body)?;
    Ok(doc
        .pools
        .into_iter()
        .map(|raw| PoolDescriptor {
            display_name: normalize_name(&raw.url),
            api_base: normalize_api(&raw.api),
            shape: raw.shape,
        })
        .collect())
}

/// Strips a leading `https://` or `http://` and one trailing `/`.
pub fn normalize_name(url: &str) -> String {
    let url = url.trim();
    let url = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    url.strip_suffix('/').unwrap_or(url).to_string()
}

fn normalize_api(api: &str) -> String {
    let api = api.trim();
    if api.ends_with('/') {
        api.to_string()
    } else {
        format!("{}/", api)
    }
}
