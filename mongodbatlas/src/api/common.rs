//! Common types and utilities for the Atlas API

use serde::{Deserialize, Deserializer};

pub const API_V1: &str = "/api/atlas/v1.0";
pub const API_V1_5: &str = "/api/atlas/v1.5";

/// Error body returned by Atlas on failed requests
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtlasErrorResponse {
    pub detail: Option<String>,
    pub error: Option<u16>,
    pub error_code: Option<String>,
    pub reason: Option<String>,
}

/// Paginated listing envelope
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub total_count: u64,
}

/// Treats a missing or empty string as `None`
pub fn deserialize_non_empty<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|s| !s.is_empty())
        .map(T::from))
}

#[derive(Debug, Clone, Default)]
pub struct ApiQueryParams {
    params: Vec<(String, String)>,
}

impl ApiQueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn add_optional<K: Into<String>, V: ToString>(mut self, key: K, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.params.push((key.into(), v.to_string()));
        }
        self
    }

    pub fn to_query_string(&self) -> String {
        if self.params.is_empty() {
            String::new()
        } else {
            format!(
                "?{}",
                self.params
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                    .collect::<Vec<_>>()
                    .join("&")
            )
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PageParams {
    pub page_num: Option<u32>,
    pub items_per_page: Option<u32>,
}

impl PageParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page_num: u32) -> Self {
        self.page_num = Some(page_num);
        self
    }

    pub fn with_items_per_page(mut self, items_per_page: u32) -> Self {
        self.items_per_page = Some(items_per_page);
        self
    }

    pub fn to_query_params(&self) -> ApiQueryParams {
        ApiQueryParams::new()
            .add_optional("pageNum", self.page_num)
            .add_optional("itemsPerPage", self.items_per_page)
    }
}

/// Percent-encodes one path segment
pub fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
