//! Dataset loading and cleaning
//!
//! The raw CSV holds one row per property per sale-history entry and
//! ingestion. Cleaning sorts the rows, assigns every property to a borough
//! and keeps the most recently ingested row per address and history date.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, UNIX_EPOCH};

use anyhow::Context;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::cache::PersistentCache;
use crate::config::DataConfig;
use crate::models::Property;
use crate::spatial::BoroughAtlas;
use crate::{HousingError, Result};

const ADDRESS_COLUMN: &str = "fullAddress";

/// One CSV row as found on disk
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "fullAddress")]
    full_address: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    postcode: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    outcode: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    longitude: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    bathrooms: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    bedrooms: Option<f64>,
    #[serde(rename = "floorAreaSqM", default, deserialize_with = "csv::invalid_option")]
    floor_area_sqm: Option<f64>,
    #[serde(rename = "livingRooms", default, deserialize_with = "csv::invalid_option")]
    living_rooms: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    tenure: Option<String>,
    #[serde(rename = "propertyType", default, deserialize_with = "csv::invalid_option")]
    property_type: Option<String>,
    #[serde(rename = "currentEnergyRating", default, deserialize_with = "csv::invalid_option")]
    current_energy_rating: Option<String>,
    #[serde(
        rename = "rentEstimate_currentPrice",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    rent_estimate_current_price: Option<f64>,
    #[serde(
        rename = "saleEstimate_lowerPrice",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    sale_estimate_lower_price: Option<f64>,
    #[serde(
        rename = "saleEstimate_currentPrice",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    sale_estimate_current_price: Option<f64>,
    #[serde(
        rename = "saleEstimate_upperPrice",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    sale_estimate_upper_price: Option<f64>,
    #[serde(
        rename = "saleEstimate_confidenceLevel",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    sale_estimate_confidence_level: Option<String>,
    #[serde(
        rename = "saleEstimate_ingestedAt",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    sale_estimate_ingested_at: Option<String>,
    #[serde(
        rename = "saleEstimate_valueChange.numericChange",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    value_change_numeric: Option<f64>,
    #[serde(
        rename = "saleEstimate_valueChange.percentageChange",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    value_change_percentage: Option<f64>,
    #[serde(
        rename = "saleEstimate_valueChange.saleDate",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    value_change_sale_date: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    history_date: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    history_price: Option<f64>,
    #[serde(
        rename = "history_percentageChange",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    history_percentage_change: Option<f64>,
    #[serde(
        rename = "history_numericChange",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    history_numeric_change: Option<f64>,
}

impl From<RawRecord> for Property {
    fn from(raw: RawRecord) -> Self {
        Property {
            id: 0,
            full_address: raw.full_address,
            postcode: raw.postcode,
            outcode: raw.outcode,
            latitude: finite(raw.latitude),
            longitude: finite(raw.longitude),
            bathrooms: finite(raw.bathrooms),
            bedrooms: finite(raw.bedrooms),
            floor_area_sqm: finite(raw.floor_area_sqm),
            living_rooms: finite(raw.living_rooms),
            tenure: raw.tenure,
            property_type: raw.property_type,
            current_energy_rating: raw.current_energy_rating,
            rent_estimate_current_price: finite(raw.rent_estimate_current_price),
            sale_estimate_lower_price: finite(raw.sale_estimate_lower_price),
            sale_estimate_current_price: finite(raw.sale_estimate_current_price),
            sale_estimate_upper_price: finite(raw.sale_estimate_upper_price),
            sale_estimate_confidence_level: raw.sale_estimate_confidence_level,
            sale_estimate_ingested_at: raw.sale_estimate_ingested_at.as_deref().and_then(parse_timestamp),
            value_change_numeric: finite(raw.value_change_numeric),
            value_change_percentage: finite(raw.value_change_percentage),
            value_change_sale_date: raw.value_change_sale_date.as_deref().and_then(parse_date),
            history_date: raw.history_date.as_deref().and_then(parse_date),
            history_price: finite(raw.history_price),
            history_percentage_change: finite(raw.history_percentage_change),
            history_numeric_change: finite(raw.history_numeric_change),
            borough: None,
        }
    }
}

/// `NaN` and infinities read from the CSV count as missing
fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Parse an RFC 3339 timestamp, `YYYY-MM-DD HH:MM:SS[.fff]` (taken as UTC)
/// or a bare `YYYY-MM-DD` date (midnight UTC)
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Calendar date of any timestamp accepted by [`parse_timestamp`]
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    parse_timestamp(text).map(|ts| ts.date_naive())
}

/// Ascending, with missing values after every present one
fn cmp_missing_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Descending, with missing values still after every present one
fn cmp_desc_missing_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        _ => cmp_missing_last(a, b),
    }
}

/// Read the raw rows of a CSV file
pub fn read_properties(csv_path: &Path) -> Result<Vec<Property>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(csv_path)?;

    if !reader.headers()?.iter().any(|h| h == ADDRESS_COLUMN) {
        return Err(HousingError::data(format!(
            "{} has no {ADDRESS_COLUMN} column",
            csv_path.display()
        )));
    }

    let mut properties = Vec::new();
    let mut skipped = 0usize;
    for record in reader.deserialize::<RawRecord>() {
        match record {
            Ok(raw) => properties.push(Property::from(raw)),
            Err(e) => {
                warn!("Skipping unreadable row in {}: {e}", csv_path.display());
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        warn!("Skipped {skipped} unreadable rows");
    }
    Ok(properties)
}

/// Sort, assign boroughs and de-duplicate already parsed rows
#[instrument(skip_all, fields(rows = properties.len()))]
pub fn clean(mut properties: Vec<Property>, atlas: &BoroughAtlas) -> Dataset {
    properties.sort_by(|a, b| {
        a.full_address
            .cmp(&b.full_address)
            .then_with(|| cmp_missing_last(&a.history_date, &b.history_date))
            .then_with(|| cmp_desc_missing_last(&a.sale_estimate_ingested_at, &b.sale_estimate_ingested_at))
    });

    let mut unassigned = 0usize;
    for property in &mut properties {
        property.borough = property
            .location()
            .and_then(|loc| atlas.assign(loc.latitude, loc.longitude))
            .map(str::to_string);
        if property.borough.is_none() {
            unassigned += 1;
        }
    }
    debug!("{unassigned} rows lie outside every borough");

    let before = properties.len();
    properties.dedup_by(|later, kept| {
        later.full_address == kept.full_address && later.history_date == kept.history_date
    });
    debug!("Dropped {} duplicate rows", before - properties.len());

    Dataset::from_properties(properties)
}

/// Read and clean the CSV at `csv_path`
#[instrument(skip(atlas))]
pub fn load_and_clean(csv_path: &Path, atlas: &BoroughAtlas) -> Result<Dataset> {
    let raw = read_properties(csv_path)?;
    info!("Read {} rows from {}", raw.len(), csv_path.display());
    let dataset = clean(raw, atlas);
    info!("Cleaned dataset has {} rows", dataset.len());
    Ok(dataset)
}

fn modified_secs(path: &Path) -> u64 {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_secs())
}

/// Cache key that changes whenever the CSV or the borough files change
#[must_use]
pub fn dataset_cache_key(config: &DataConfig) -> String {
    format!(
        "dataset:v{}:{}:{}:{}",
        crate::VERSION,
        config.csv_path.display(),
        modified_secs(&config.csv_path),
        modified_secs(&config.boroughs_dir),
    )
}

/// Load the cleaned dataset, reusing a cached copy when the source files
/// are unchanged. Cache failures only cost a rebuild.
pub async fn load_dataset(
    config: &DataConfig,
    atlas: Arc<BoroughAtlas>,
    cache: Option<&PersistentCache>,
    ttl: Duration,
) -> anyhow::Result<Dataset> {
    let key = dataset_cache_key(config);

    if let Some(cache) = cache {
        match cache.get::<Dataset>(&key).await {
            Ok(Some(dataset)) => {
                info!("Using cached dataset ({} rows)", dataset.len());
                return Ok(dataset);
            }
            Ok(None) => debug!("No cached dataset for {key}"),
            Err(e) => warn!("Failed to read cached dataset: {e}"),
        }
    }

    let csv_path = config.csv_path.clone();
    let started = Instant::now();
    let dataset = tokio::task::spawn_blocking(move || load_and_clean(&csv_path, &atlas))
        .await
        .context("dataset loading task panicked")?
        .with_context(|| format!("failed to load {}", config.csv_path.display()))?;
    info!("Dataset built in {:.1}s", started.elapsed().as_secs_f64());

    if let Some(cache) = cache {
        if let Err(e) = cache.put(&key, &dataset, ttl).await {
            warn!("Failed to cache dataset: {e}");
        }
    }

    Ok(dataset)
}

/// The cleaned, borough-tagged dataset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    properties: Vec<Property>,
}

impl Dataset {
    /// Wrap rows, numbering them by position
    #[must_use]
    pub fn from_properties(mut properties: Vec<Property>) -> Self {
        for (id, property) in properties.iter_mut().enumerate() {
            property.id = id;
        }
        Self { properties }
    }

    #[must_use]
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn get(&self, id: usize) -> Result<&Property> {
        self.properties
            .get(id)
            .ok_or_else(|| HousingError::not_found(format!("property {id}")))
    }

    /// Sorted distinct borough names
    #[must_use]
    pub fn borough_options(&self) -> Vec<String> {
        let mut boroughs: Vec<String> = self
            .properties
            .iter()
            .filter_map(|p| p.borough.clone())
            .collect();
        boroughs.sort();
        boroughs.dedup();
        boroughs
    }

    /// Sorted distinct property types
    #[must_use]
    pub fn property_type_options(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .properties
            .iter()
            .filter_map(|p| p.property_type.clone())
            .collect();
        types.sort();
        types.dedup();
        types
    }

    /// Earliest and latest history date
    #[must_use]
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = self.properties.iter().filter_map(|p| p.history_date);
        let first = dates.next()?;
        Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::BoroughShape;
    use geo::{LineString, MultiPolygon, Polygon};
    use rstest::rstest;
    use std::io::Write;

    const HEADER: &str = "fullAddress,latitude,longitude,floorAreaSqM,propertyType,saleEstimate_currentPrice,saleEstimate_ingestedAt,history_date,history_price,extraColumn";

    fn atlas() -> BoroughAtlas {
        let square = |x0: f64| {
            MultiPolygon::new(vec![Polygon::new(
                LineString::from(vec![(x0, 51.0), (x0 + 1.0, 51.0), (x0 + 1.0, 52.0), (x0, 52.0), (x0, 51.0)]),
                vec![],
            )])
        };
        BoroughAtlas::from_shapes(vec![
            BoroughShape::new("Westminster", square(-1.0)),
            BoroughShape::new("Hackney", square(0.0)),
        ])
    }

    fn write_csv(rows: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        file
    }

    #[rstest]
    #[case("2024-10-07T14:19:27.431Z", Some((2024, 10, 7)))]
    #[case("2024-10-07 14:19:27", Some((2024, 10, 7)))]
    #[case("1995-01-03", Some((1995, 1, 3)))]
    #[case("not a date", None)]
    #[case("", None)]
    fn test_parse_date(#[case] text: &str, #[case] expected: Option<(i32, u32, u32)>) {
        let expected = expected.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap());
        assert_eq!(parse_date(text), expected);
    }

    #[test]
    fn test_load_sorts_assigns_and_deduplicates() {
        let file = write_csv(&[
            "2 High St,51.5,0.5,80,Flat,500000,2024-01-01T00:00:00Z,2020-05-01,450000,x",
            "1 Low Rd,51.5,-0.5,60,Terraced,400000,2023-01-01T00:00:00Z,2019-01-01,300000,x",
            "1 Low Rd,51.5,-0.5,60,Terraced,420000,2024-06-01T00:00:00Z,2019-01-01,300000,x",
            "1 Low Rd,51.5,-0.5,60,Terraced,410000,,2021-03-01,350000,x",
            "3 Far Away,40.0,2.0,,Flat,abc,,,,x",
        ]);

        let dataset = load_and_clean(file.path(), &atlas()).unwrap();
        let rows = dataset.properties();
        assert_eq!(rows.len(), 4);

        assert_eq!(rows[0].full_address, "1 Low Rd");
        // the most recently ingested duplicate survives
        assert_eq!(rows[0].sale_estimate_current_price, Some(420_000.0));
        assert_eq!(rows[0].borough.as_deref(), Some("Westminster"));
        assert_eq!(rows[1].history_date, NaiveDate::from_ymd_opt(2021, 3, 1));
        assert_eq!(rows[2].borough.as_deref(), Some("Hackney"));

        assert_eq!(rows[3].borough, None);
        assert_eq!(rows[3].sale_estimate_current_price, None);
        assert_eq!(rows[3].floor_area_sqm, None);
        assert_eq!(rows[3].history_date, None);

        assert_eq!(rows.iter().map(|p| p.id).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert_eq!(dataset.borough_options(), vec!["Hackney", "Westminster"]);
        assert_eq!(dataset.property_type_options(), vec!["Flat", "Terraced"]);
        assert_eq!(
            dataset.date_bounds(),
            Some((
                NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2021, 3, 1).unwrap()
            ))
        );
    }

    #[test]
    fn test_missing_ingestion_time_sorts_last() {
        let file = write_csv(&[
            "1 Low Rd,51.5,-0.5,60,Flat,100,,2019-01-01,1,x",
            "1 Low Rd,51.5,-0.5,60,Flat,200,2020-01-01T00:00:00Z,2019-01-01,1,x",
        ]);
        let dataset = load_and_clean(file.path(), &atlas()).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.properties()[0].sale_estimate_current_price, Some(200.0));
    }

    #[test]
    fn test_undecodable_row_is_skipped() {
        let mut file = write_csv(&["1 Low Rd,51.5,-0.5,60,Flat,100,,2019-01-01,1,x"]);
        file.write_all(b"\xff\xfe Bad St,51.5,0.5,60,Flat,200,,2019-01-01,1,x\n").unwrap();
        writeln!(file, "2 High St,51.5,0.5,80,Flat,300,,2020-01-01,1,x").unwrap();

        let dataset = load_and_clean(file.path(), &atlas()).unwrap();
        let addresses: Vec<&str> = dataset.properties().iter().map(|p| p.full_address.as_str()).collect();
        assert_eq!(addresses, vec!["1 Low Rd", "2 High St"]);
    }

    #[test]
    fn test_missing_address_column_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "latitude,longitude").unwrap();
        writeln!(file, "51.5,-0.1").unwrap();
        assert!(matches!(
            load_and_clean(file.path(), &atlas()),
            Err(HousingError::Data { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_and_clean(Path::new("/definitely/not/here.csv"), &atlas()).is_err());
    }

    #[test]
    fn test_get_unknown_id() {
        let dataset = Dataset::default();
        assert!(matches!(dataset.get(3), Err(HousingError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_load_dataset_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let boroughs_dir = dir.path().join("boroughs");
        fs::create_dir(&boroughs_dir).unwrap();
        let csv_path = dir.path().join("data.csv");
        fs::write(
            &csv_path,
            format!("{HEADER}\n1 Low Rd,51.5,-0.5,60,Flat,100,,2019-01-01,1,x\n"),
        )
        .unwrap();
        let config = DataConfig {
            csv_path: csv_path.clone(),
            boroughs_dir,
            ..DataConfig::default()
        };
        let cache = PersistentCache::open(dir.path().join("cache")).unwrap();
        let atlas = Arc::new(atlas());
        let ttl = Duration::from_secs(60);

        let first = load_dataset(&config, atlas.clone(), Some(&cache), ttl).await.unwrap();
        assert_eq!(first.len(), 1);

        let cached: Option<Dataset> = cache.get(&dataset_cache_key(&config)).await.unwrap();
        assert_eq!(cached.map(|d| d.len()), Some(1));

        let second = load_dataset(&config, atlas, Some(&cache), ttl).await.unwrap();
        assert_eq!(second.properties(), first.properties());
    }
}
