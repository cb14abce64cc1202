// ABOUTME: USDA FoodData Central client exposed as a catalog search source
// ABOUTME: Maps FDC foods to per-100 g catalog records with caching and request rate limiting
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

//! USDA `FoodData` Central catalog source
//!
//! Search results already carry per-100 g nutrient values, so one search request yields
//! complete [`CatalogRecord`]s. Record ids are derived from the FDC id, so the same food
//! always maps to the same record and is stored once however often it is matched.
//!
//! API reference: <https://fdc.nal.usda.gov/api-guide.html>
//!
//! ```rust,no_run
//! use platewise::external::usda_client::{UsdaClient, UsdaClientConfig};
//! use platewise::nutrition::CatalogSearch;
//!
//! # async fn example() -> platewise::errors::AppResult<()> {
//! let client = UsdaClient::new(UsdaClientConfig {
//!     api_key: "your_api_key".to_owned(),
//!     ..UsdaClientConfig::default()
//! });
//! let candidates = client.search("chicken breast", 5).await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{CatalogRecord, Nutrient, NutrientSet, Provenance};
use crate::nutrition::collaborators::{CatalogCandidate, CatalogSearch};
use crate::nutrition::quality::capped_score;
use crate::nutrition::search::{name_similarity, rank_candidates};
use crate::units::normalize_unit_name;

const SERVICE: &str = "USDA FoodData Central";

/// FDC nutrient values are reported per 100 g
const FDC_REFERENCE_GRAMS: f64 = 100.0;

const MAX_PAGE_SIZE: u32 = 200;

/// Energy ids in preference order: kcal, then the Atwater general and specific factors
const ENERGY_IDS: [u32; 3] = [1008, 2047, 2048];

/// FDC nutrient id for every tracked nutrient other than energy
const NUTRIENT_IDS: [(u32, Nutrient); 7] = [
    (1003, Nutrient::Protein),
    (1005, Nutrient::Carbohydrate),
    (1004, Nutrient::Fat),
    (1079, Nutrient::Fiber),
    (2000, Nutrient::Sugar),
    (1258, Nutrient::SaturatedFat),
    (1093, Nutrient::Sodium),
];

/// USDA API client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsdaClientConfig {
    /// API key from <https://fdc.nal.usda.gov/api-key-signup.html>
    pub api_key: String,
    /// Base URL, normally <https://api.nal.usda.gov/fdc/v1>
    pub base_url: String,
    /// How long search and detail responses are cached
    pub cache_ttl_secs: u64,
    /// Maximum requests per rolling minute
    pub rate_limit_per_minute: u32,
}

impl Default for UsdaClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.nal.usda.gov/fdc/v1".to_owned(),
            cache_ttl_secs: 86_400,
            rate_limit_per_minute: 30,
        }
    }
}

/// One nutrient value on a search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FdcNutrientValue {
    /// FDC nutrient id (1008 = energy in kcal)
    pub nutrient_id: u32,
    /// Display name
    #[serde(default)]
    pub nutrient_name: String,
    /// Unit ("KCAL", "G", "MG")
    #[serde(default)]
    pub unit_name: String,
    /// Amount per 100 g
    #[serde(default)]
    pub value: Option<f64>,
}

/// A food returned by `/foods/search` or `/food/{fdcId}`, normalized to one shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FdcFood {
    /// `FoodData` Central id
    pub fdc_id: u64,
    /// Food description
    pub description: String,
    /// "Foundation", "SR Legacy", "Branded", ...
    #[serde(default)]
    pub data_type: Option<String>,
    /// Brand owner for branded foods
    #[serde(default)]
    pub brand_owner: Option<String>,
    /// Label serving size
    #[serde(default)]
    pub serving_size: Option<f64>,
    /// Label serving size unit ("g", "GRM", "ml")
    #[serde(default)]
    pub serving_size_unit: Option<String>,
    /// Label household serving ("1 slice", "2 tbsp")
    #[serde(default)]
    pub household_serving_full_text: Option<String>,
    /// Nutrients per 100 g
    #[serde(default)]
    pub food_nutrients: Vec<FdcNutrientValue>,
}

impl FdcFood {
    fn nutrient_value(&self, id: u32) -> Option<f64> {
        self.food_nutrients
            .iter()
            .find(|n| n.nutrient_id == id)
            .and_then(|n| n.value)
            .filter(|v| v.is_finite())
    }

    /// Deterministic record id for this FDC food
    #[must_use]
    pub fn record_id(&self) -> Uuid {
        Uuid::new_v5(
            &Uuid::NAMESPACE_URL,
            format!("https://fdc.nal.usda.gov/food/{}", self.fdc_id).as_bytes(),
        )
    }

    /// Household unit from the label serving, when it is stated in grams
    fn household_unit(&self) -> Option<(String, f64)> {
        let grams = self.serving_size.filter(|g| g.is_finite() && *g > 0.0)?;
        let unit = self.serving_size_unit.as_deref()?.to_lowercase();
        if !matches!(unit.as_str(), "g" | "grm" | "gram" | "grams") {
            return None;
        }
        let name = self
            .household_serving_full_text
            .as_deref()
            .and_then(|text| {
                text.split_whitespace()
                    .find(|word| word.chars().all(char::is_alphabetic))
            })
            .map(normalize_unit_name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "serving".to_owned());
        Some((name, grams))
    }

    /// Convert to a per-100 g catalog record
    ///
    /// Returns `None` when energy or any macronutrient is missing.
    #[must_use]
    pub fn to_record(&self) -> Option<CatalogRecord> {
        let calories = ENERGY_IDS.iter().find_map(|id| self.nutrient_value(*id))?;
        let mut nutrients = NutrientSet::zero().with(Nutrient::Calories, calories);
        for (id, nutrient) in NUTRIENT_IDS {
            match self.nutrient_value(id) {
                Some(value) => nutrients.set(nutrient, value),
                None if Nutrient::MACROS.contains(&nutrient) => return None,
                None => {}
            }
        }

        let mut record = CatalogRecord::new(self.description.trim(), FDC_REFERENCE_GRAMS, nutrients)
            .with_provenance(Provenance::External);
        record.id = self.record_id();
        if let Some(brand) = self.brand_owner.as_deref().filter(|b| !b.trim().is_empty()) {
            record = record.with_brand(brand.trim());
        }
        if let Some((name, grams)) = self.household_unit() {
            record = record.with_household_unit(name, grams);
        }
        record.quality_score = capped_score(&record);
        Some(record)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    foods: Vec<FdcFood>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FoodDetailsResponse {
    fdc_id: u64,
    description: String,
    #[serde(default)]
    data_type: Option<String>,
    #[serde(default)]
    brand_owner: Option<String>,
    #[serde(default)]
    serving_size: Option<f64>,
    #[serde(default)]
    serving_size_unit: Option<String>,
    #[serde(default)]
    household_serving_full_text: Option<String>,
    #[serde(default)]
    food_nutrients: Vec<DetailNutrient>,
}

#[derive(Debug, Deserialize)]
struct DetailNutrient {
    nutrient: Option<DetailNutrientInfo>,
    amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailNutrientInfo {
    id: u32,
    #[serde(default)]
    name: String,
    #[serde(default)]
    unit_name: String,
}

impl From<FoodDetailsResponse> for FdcFood {
    fn from(details: FoodDetailsResponse) -> Self {
        Self {
            fdc_id: details.fdc_id,
            description: details.description,
            data_type: details.data_type,
            brand_owner: details.brand_owner,
            serving_size: details.serving_size,
            serving_size_unit: details.serving_size_unit,
            household_serving_full_text: details.household_serving_full_text,
            food_nutrients: details
                .food_nutrients
                .into_iter()
                .filter_map(|n| {
                    let info = n.nutrient?;
                    Some(FdcNutrientValue {
                        nutrient_id: info.id,
                        nutrient_name: info.name,
                        unit_name: info.unit_name,
                        value: n.amount,
                    })
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    data: T,
    expires_at: Instant,
}

/// Rolling-window request limiter
#[derive(Debug)]
struct RateLimiter {
    requests: Vec<Instant>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    const fn new(limit: u32, window: Duration) -> Self {
        Self {
            requests: Vec::new(),
            limit,
            window,
        }
    }

    fn can_request(&mut self) -> bool {
        let now = Instant::now();
        self.requests.retain(|&t| now.duration_since(t) < self.window);
        self.requests.len() < self.limit as usize
    }

    async fn acquire(&mut self) {
        while !self.can_request() {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        self.requests.push(Instant::now());
    }
}

/// USDA `FoodData` Central client
pub struct UsdaClient {
    config: UsdaClientConfig,
    http_client: reqwest::Client,
    search_cache: Arc<RwLock<HashMap<String, CacheEntry<Vec<FdcFood>>>>>,
    details_cache: Arc<RwLock<HashMap<u64, CacheEntry<FdcFood>>>>,
    rate_limiter: Arc<RwLock<RateLimiter>>,
}

impl UsdaClient {
    /// Create a client
    #[must_use]
    pub fn new(config: UsdaClientConfig) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limit_per_minute, Duration::from_secs(60));
        Self {
            config,
            http_client: reqwest::Client::new(),
            search_cache: Arc::new(RwLock::new(HashMap::new())),
            details_cache: Arc::new(RwLock::new(HashMap::new())),
            rate_limiter: Arc::new(RwLock::new(rate_limiter)),
        }
    }

    fn expiry(&self) -> Instant {
        Instant::now() + Duration::from_secs(self.config.cache_ttl_secs)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> AppResult<T> {
        self.rate_limiter.write().await.acquire().await;

        let response = self
            .http_client
            .get(url)
            .query(query)
            .query(&[("api_key", self.config.api_key.as_str())])
            .send()
            .await
            .map_err(|e| AppError::external_service(SERVICE, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::external_service(SERVICE, format!("HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::external_service(SERVICE, format!("JSON parse error: {e}")))
    }

    /// Search foods by description
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty query or a page size outside 1..=200
    /// - `ExternalServiceError` if the request fails or the response cannot be parsed
    pub async fn search_foods(&self, query: &str, page_size: u32) -> AppResult<Vec<FdcFood>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::invalid_input("Search query cannot be empty"));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(AppError::invalid_input(format!(
                "Page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        let cache_key = format!("{}:{page_size}", query.to_lowercase());
        if let Some(entry) = self.search_cache.read().await.get(&cache_key) {
            if Instant::now() < entry.expires_at {
                return Ok(entry.data.clone());
            }
        }

        let url = format!("{}/foods/search", self.config.base_url);
        let page_size = page_size.to_string();
        let response: SearchResponse = self
            .get_json(&url, &[("query", query), ("pageSize", &page_size)])
            .await?;
        debug!(query, results = response.foods.len(), "USDA search complete");

        self.search_cache.write().await.insert(
            cache_key,
            CacheEntry {
                data: response.foods.clone(),
                expires_at: self.expiry(),
            },
        );
        Ok(response.foods)
    }

    /// Fetch one food by FDC id
    ///
    /// # Errors
    ///
    /// Returns `ExternalServiceError` if the request fails or the food does not exist
    pub async fn get_food(&self, fdc_id: u64) -> AppResult<FdcFood> {
        if let Some(entry) = self.details_cache.read().await.get(&fdc_id) {
            if Instant::now() < entry.expires_at {
                return Ok(entry.data.clone());
            }
        }

        let url = format!("{}/food/{fdc_id}", self.config.base_url);
        let details: FoodDetailsResponse = self.get_json(&url, &[]).await?;
        let food = FdcFood::from(details);

        self.details_cache.write().await.insert(
            fdc_id,
            CacheEntry {
                data: food.clone(),
                expires_at: self.expiry(),
            },
        );
        Ok(food)
    }

    /// Fetch one food as a catalog record
    ///
    /// # Errors
    ///
    /// - `ExternalServiceError` if the request fails
    /// - `InvalidCatalogRecord` if the food lacks energy or macronutrient values
    pub async fn fetch_record(&self, fdc_id: u64) -> AppResult<CatalogRecord> {
        let food = self.get_food(fdc_id).await?;
        food.to_record().ok_or_else(|| {
            AppError::invalid_catalog_record(format!(
                "FDC food {fdc_id} '{}' is missing energy or macronutrients",
                food.description
            ))
        })
    }
}

#[async_trait]
impl CatalogSearch for UsdaClient {
    async fn search(&self, text: &str, limit: u32) -> AppResult<Vec<CatalogCandidate>> {
        let foods = self
            .search_foods(text, limit.clamp(1, MAX_PAGE_SIZE))
            .await?;
        let mut candidates: Vec<CatalogCandidate> = foods
            .iter()
            .filter_map(|food| {
                let record = food.to_record();
                if record.is_none() {
                    warn!(fdc.id = food.fdc_id, "USDA food skipped: incomplete nutrients");
                }
                record
            })
            .map(|record| CatalogCandidate {
                similarity: name_similarity(text, &record.name),
                record,
            })
            .collect();
        rank_candidates(&mut candidates);
        Ok(candidates)
    }

    fn source_name(&self) -> &'static str {
        "usda"
    }
}
