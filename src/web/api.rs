use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::error;

use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::{AppState, api_error};
use crate::analytics::{
    Distributions, Frequency, KpiTile, LeaderboardEntry, MarketOverview, PropertyDetails, TopProperty, Trends,
    distributions, kpi_tiles, leaderboard, market_overview, price_trends, property_details, top_properties,
};
use crate::analytics::properties::TOP_PROPERTY_COUNT;
use crate::data::DashboardFilter;
use crate::models::Property;
use crate::spatial::choropleth::{LINE_COLOR, MAP_STYLE, TOOLTIP};
use crate::spatial::{ChoroplethMap, MapMetric, ViewState, build_choropleth};
use crate::valuation::roi::{self, HOLD_PERIODS, MAX_GROWTH_RATE, MIN_PURCHASE_PRICE};
use crate::valuation::{Estimate, GrowthSuggestion, PredictionInput, RoiInput, RoiResult, historical_growth};
use crate::{HousingError, Result};

type ApiResult<T> = std::result::Result<Json<T>, HousingError>;

impl IntoResponse for HousingError {
    fn into_response(self) -> Response {
        let status = match &self {
            HousingError::Validation { .. } => StatusCode::BAD_REQUEST,
            HousingError::NotFound { .. } => StatusCode::NOT_FOUND,
            HousingError::ModelNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
            _ => {
                error!("Request failed: {self}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        api_error(status, &self.user_message())
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/filters", get(get_filters))
        .route("/settings", get(get_settings))
        .route("/kpis", get(get_kpis))
        .route("/map", get(get_map))
        .route("/leaderboard", get(get_leaderboard))
        .route("/top-properties", get(get_top_properties))
        .route("/properties/{id}", get(get_property))
        .route("/trends", get(get_trends))
        .route("/distributions", get(get_distributions))
        .route("/overview", get(get_overview))
        .route("/predict", post(predict))
        .route("/roi/growth", get(get_growth))
        .route("/roi", post(calculate_roi))
}

/// Sidebar filter as sent in the query string
#[derive(Debug, Default, Deserialize)]
pub struct FilterQuery {
    /// Comma-separated borough names
    pub boroughs: Option<String>,
    /// `YYYY-MM-DD`
    pub from: Option<String>,
    pub to: Option<String>,
}

impl FilterQuery {
    pub fn to_filter(&self) -> Result<DashboardFilter> {
        DashboardFilter::new(
            self.boroughs.as_deref().map(DashboardFilter::parse_boroughs).unwrap_or_default(),
            parse_query_date("from", self.from.as_deref())?,
            parse_query_date("to", self.to.as_deref())?,
        )
    }
}

fn parse_query_date(name: &str, value: Option<&str>) -> Result<Option<NaiveDate>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| HousingError::validation(format!("'{name}' must be a YYYY-MM-DD date, got '{text}'"))),
    }
}

fn filtered_rows<'a>(state: &'a AppState, query: &FilterQuery) -> Result<Vec<&'a Property>> {
    Ok(query.to_filter()?.apply(&state.dataset))
}

#[derive(Debug, Default, Deserialize)]
pub struct FrequencyQuery {
    pub freq: Option<String>,
}

impl FrequencyQuery {
    fn frequency(&self) -> Result<Frequency> {
        self.freq.as_deref().map_or(Ok(Frequency::default()), str::parse)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MetricQuery {
    pub metric: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BoroughQuery {
    pub borough: String,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": crate::VERSION }))
}

#[derive(Debug, Serialize)]
struct FilterOptions {
    boroughs: Vec<String>,
    property_types: Vec<String>,
    min_date: Option<NaiveDate>,
    max_date: Option<NaiveDate>,
    metrics: Vec<&'static str>,
    frequencies: Vec<Frequency>,
    hold_periods: [u32; 4],
    min_purchase_price: f64,
    max_growth_rate: f64,
    rows: usize,
}

async fn get_filters(State(state): State<AppState>) -> Json<FilterOptions> {
    let bounds = state.dataset.date_bounds();
    Json(FilterOptions {
        boroughs: state.dataset.borough_options(),
        property_types: state.dataset.property_type_options(),
        min_date: bounds.map(|(min, _)| min),
        max_date: bounds.map(|(_, max)| max),
        metrics: MapMetric::ALL.iter().map(|m| m.label()).collect(),
        frequencies: Frequency::ALL.to_vec(),
        hold_periods: HOLD_PERIODS,
        min_purchase_price: MIN_PURCHASE_PRICE,
        max_growth_rate: MAX_GROWTH_RATE,
        rows: state.dataset.len(),
    })
}

#[derive(Debug, Serialize)]
struct Settings<'a> {
    mapbox_key: Option<&'a str>,
    map_style: &'static str,
    view_state: ViewState,
    line_color: [u8; 3],
    tooltip: &'static str,
    street_view_enabled: bool,
    model_loaded: bool,
}

async fn get_settings(State(state): State<AppState>) -> Response {
    Json(Settings {
        mapbox_key: state.secrets.mapbox_key.as_deref(),
        map_style: MAP_STYLE,
        view_state: ViewState::default(),
        line_color: LINE_COLOR,
        tooltip: TOOLTIP,
        street_view_enabled: state.google_key().is_some(),
        model_loaded: state.estimator.is_some(),
    })
    .into_response()
}

async fn get_kpis(State(state): State<AppState>, ApiQuery(filter): ApiQuery<FilterQuery>) -> ApiResult<Vec<KpiTile>> {
    Ok(Json(kpi_tiles(&filtered_rows(&state, &filter)?)))
}

async fn get_map(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<FilterQuery>,
    ApiQuery(query): ApiQuery<MetricQuery>,
) -> ApiResult<ChoroplethMap> {
    let metric: MapMetric = query.metric.as_deref().map_or(Ok(MapMetric::default()), str::parse)?;
    let rows = filtered_rows(&state, &filter)?;
    Ok(Json(build_choropleth(&state.atlas, &rows, metric)))
}

async fn get_leaderboard(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<FilterQuery>,
) -> ApiResult<Vec<LeaderboardEntry>> {
    Ok(Json(leaderboard(&filtered_rows(&state, &filter)?)))
}

async fn get_top_properties(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<FilterQuery>,
) -> ApiResult<Vec<TopProperty>> {
    let rows = filtered_rows(&state, &filter)?;
    Ok(Json(top_properties(&rows, TOP_PROPERTY_COUNT, state.google_key())))
}

async fn get_property(State(state): State<AppState>, ApiPath(id): ApiPath<usize>) -> ApiResult<PropertyDetails> {
    Ok(Json(property_details(&state.dataset, id, state.google_key())?))
}

async fn get_trends(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<FilterQuery>,
    ApiQuery(query): ApiQuery<FrequencyQuery>,
) -> ApiResult<Trends> {
    let frequency = query.frequency()?;
    Ok(Json(price_trends(&filtered_rows(&state, &filter)?, frequency)))
}

async fn get_distributions(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<FilterQuery>,
) -> ApiResult<Distributions> {
    Ok(Json(distributions(&filtered_rows(&state, &filter)?)))
}

async fn get_overview(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<FilterQuery>,
    ApiQuery(query): ApiQuery<FrequencyQuery>,
) -> ApiResult<MarketOverview> {
    let frequency = query.frequency()?;
    let rows = filtered_rows(&state, &filter)?;
    Ok(Json(market_overview(&rows, frequency, state.google_key())))
}

async fn predict(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<FilterQuery>,
    ApiJson(input): ApiJson<PredictionInput>,
) -> Response {
    let Some(estimator) = state.estimator.as_ref() else {
        return HousingError::ModelNotLoaded.into_response();
    };
    let estimate: Result<Estimate> =
        filtered_rows(&state, &filter).and_then(|rows| estimator.estimate(&rows, &input));
    match estimate {
        Ok(estimate) => Json(estimate).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn get_growth(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<FilterQuery>,
    ApiQuery(query): ApiQuery<BoroughQuery>,
) -> ApiResult<GrowthSuggestion> {
    let rows = filtered_rows(&state, &filter)?;
    Ok(Json(historical_growth(&rows, &query.borough)))
}

async fn calculate_roi(ApiJson(input): ApiJson<RoiInput>) -> ApiResult<RoiResult> {
    Ok(Json(roi::calculate(&input)?))
}
