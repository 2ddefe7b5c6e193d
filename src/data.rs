//! Dataset loading and per-customer records using Polars

use std::collections::BTreeSet;
use std::path::Path;

use polars::prelude::*;
use tracing::{debug, info};

use crate::error::Result;

/// Column names of the shopping trends CSV after header trimming
pub mod columns {
    pub const CUSTOMER_ID: &str = "Customer ID";
    pub const AGE: &str = "Age";
    pub const GENDER: &str = "Gender";
    pub const CATEGORY: &str = "Category";
    pub const PURCHASE_AMOUNT: &str = "Purchase Amount (USD)";
    pub const SEASON: &str = "Season";
    pub const REVIEW_RATING: &str = "Review Rating";
    pub const SUBSCRIPTION_STATUS: &str = "Subscription Status";
    pub const DISCOUNT_APPLIED: &str = "Discount Applied";
    pub const PROMO_CODE_USED: &str = "Promo Code Used";
    pub const PREVIOUS_PURCHASES: &str = "Previous Purchases";
    pub const FREQUENCY: &str = "Frequency of Purchases";

    pub const ALL: [&str; 12] = [
        CUSTOMER_ID,
        AGE,
        GENDER,
        CATEGORY,
        PURCHASE_AMOUNT,
        SEASON,
        REVIEW_RATING,
        SUBSCRIPTION_STATUS,
        DISCOUNT_APPLIED,
        PROMO_CODE_USED,
        PREVIOUS_PURCHASES,
        FREQUENCY,
    ];
}

/// Previous purchases assumed for a row without a value
pub const DEFAULT_PREVIOUS_PURCHASES: f64 = 0.0;
/// Review rating assumed for a row without a value
pub const DEFAULT_REVIEW_RATING: f64 = 3.0;
/// Frequency score for unknown or missing purchase frequencies
pub const DEFAULT_FREQUENCY_SCORE: f64 = 3.0;

/// A yes/no cell as it appeared in the source frame
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FlagValue {
    Text(String),
    Bool(bool),
    Number(f64),
    #[default]
    Missing,
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        FlagValue::Bool(value)
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        FlagValue::Text(value.to_string())
    }
}

/// Coerce a flag cell to a boolean.
///
/// Text counts only when it is exactly `"Yes"`; booleans and numbers use
/// truthiness; a missing cell is false.
pub fn to_boolean(value: &FlagValue) -> bool {
    match value {
        FlagValue::Text(text) => text == "Yes",
        FlagValue::Bool(flag) => *flag,
        FlagValue::Number(number) => *number != 0.0,
        FlagValue::Missing => false,
    }
}

/// Map a purchase frequency label to a 1-5 score
pub fn frequency_score(label: Option<&str>) -> f64 {
    match label {
        Some("Weekly") => 5.0,
        Some("Bi-Weekly") | Some("Fortnightly") => 4.0,
        Some("Monthly") => 3.0,
        Some("Quarterly") => 2.0,
        Some("Annually") => 1.0,
        _ => DEFAULT_FREQUENCY_SCORE,
    }
}

/// One row of the shopping trends dataset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerRecord {
    pub customer_id: Option<i64>,
    pub age: Option<f64>,
    pub gender: Option<String>,
    pub category: Option<String>,
    pub season: Option<String>,
    pub purchase_amount: Option<f64>,
    pub previous_purchases: Option<f64>,
    pub review_rating: Option<f64>,
    pub discount_applied: FlagValue,
    pub promo_code_used: FlagValue,
    pub subscription_status: FlagValue,
    pub frequency_of_purchases: Option<String>,
}

impl CustomerRecord {
    pub fn discount(&self) -> bool {
        to_boolean(&self.discount_applied)
    }

    pub fn subscribed(&self) -> bool {
        to_boolean(&self.subscription_status)
    }

    pub fn promo(&self) -> bool {
        to_boolean(&self.promo_code_used)
    }

    pub fn previous_purchases_or_default(&self) -> f64 {
        self.previous_purchases.unwrap_or(DEFAULT_PREVIOUS_PURCHASES)
    }

    pub fn review_rating_or_default(&self) -> f64 {
        self.review_rating.unwrap_or(DEFAULT_REVIEW_RATING)
    }

    pub fn frequency_score(&self) -> f64 {
        frequency_score(self.frequency_of_purchases.as_deref())
    }
}

/// Immutable in-memory snapshot of the dataset
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<CustomerRecord>,
    columns: BTreeSet<String>,
}

impl Dataset {
    /// Build a dataset from records that carry the full column set
    pub fn from_records(records: Vec<CustomerRecord>) -> Self {
        Self {
            records,
            columns: columns::ALL.iter().map(|name| name.to_string()).collect(),
        }
    }

    /// Build a dataset from a frame, trimming whitespace around column names
    pub fn from_frame(mut frame: DataFrame) -> Result<Self> {
        let raw_names: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        for name in &raw_names {
            let trimmed = name.trim();
            if trimmed != name {
                frame.rename(name, trimmed)?;
            }
        }

        let present: BTreeSet<String> = frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        for expected in columns::ALL {
            if !present.contains(expected) {
                debug!(column = expected, "dataset column missing");
            }
        }

        let customer_ids = int_column(&frame, columns::CUSTOMER_ID)?;
        let ages = float_column(&frame, columns::AGE)?;
        let mut genders = text_column(&frame, columns::GENDER)?;
        let mut categories = text_column(&frame, columns::CATEGORY)?;
        let mut seasons = text_column(&frame, columns::SEASON)?;
        let amounts = float_column(&frame, columns::PURCHASE_AMOUNT)?;
        let previous = float_column(&frame, columns::PREVIOUS_PURCHASES)?;
        let ratings = float_column(&frame, columns::REVIEW_RATING)?;
        let mut discounts = flag_column(&frame, columns::DISCOUNT_APPLIED)?;
        let mut promos = flag_column(&frame, columns::PROMO_CODE_USED)?;
        let mut subscriptions = flag_column(&frame, columns::SUBSCRIPTION_STATUS)?;
        let mut frequencies = text_column(&frame, columns::FREQUENCY)?;

        let n_rows = frame.height();
        let mut records = Vec::with_capacity(n_rows);
        for i in 0..n_rows {
            records.push(CustomerRecord {
                customer_id: customer_ids[i],
                age: ages[i],
                gender: genders[i].take(),
                category: categories[i].take(),
                season: seasons[i].take(),
                purchase_amount: amounts[i],
                previous_purchases: previous[i],
                review_rating: ratings[i],
                discount_applied: std::mem::take(&mut discounts[i]),
                promo_code_used: std::mem::take(&mut promos[i]),
                subscription_status: std::mem::take(&mut subscriptions[i]),
                frequency_of_purchases: frequencies[i].take(),
            });
        }

        Ok(Self {
            records,
            columns: present,
        })
    }

    pub fn records(&self) -> &[CustomerRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the source carried the named column
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    /// Distinct non-missing categories in order of first appearance
    pub fn categories(&self) -> Vec<String> {
        distinct(self.records.iter().map(|r| r.category.as_deref()))
    }

    /// Distinct non-missing seasons in order of first appearance
    pub fn seasons(&self) -> Vec<String> {
        distinct(self.records.iter().map(|r| r.season.as_deref()))
    }
}

fn distinct<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut ordered = Vec::new();
    for value in values.flatten() {
        if seen.insert(value) {
            ordered.push(value.to_string());
        }
    }
    ordered
}

/// Load the shopping trends CSV into a dataset snapshot
///
/// # Arguments
/// * `path` - Path to the CSV file
///
/// # Returns
/// * `Dataset` holding one `CustomerRecord` per row
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    let frame = LazyCsvReader::new(path)
        .with_has_header(true)
        .finish()?
        .collect()?;

    let dataset = Dataset::from_frame(frame)?;
    info!(
        path = %path.display(),
        rows = dataset.len(),
        "dataset loaded"
    );
    Ok(dataset)
}

fn float_column(frame: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let Ok(series) = frame.column(name) else {
        return Ok(vec![None; frame.height()]);
    };
    let values = series.cast(&DataType::Float64)?;
    let values: Vec<Option<f64>> = values.f64()?.into_iter().collect();
    Ok(values)
}

fn int_column(frame: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let Ok(series) = frame.column(name) else {
        return Ok(vec![None; frame.height()]);
    };
    let values = series.cast(&DataType::Int64)?;
    let values: Vec<Option<i64>> = values.i64()?.into_iter().collect();
    Ok(values)
}

fn text_column(frame: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let Ok(series) = frame.column(name) else {
        return Ok(vec![None; frame.height()]);
    };
    let values = series.cast(&DataType::String)?;
    let values: Vec<Option<String>> = values
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_owned))
        .collect();
    Ok(values)
}

fn flag_column(frame: &DataFrame, name: &str) -> Result<Vec<FlagValue>> {
    let Ok(series) = frame.column(name) else {
        return Ok(vec![FlagValue::Missing; frame.height()]);
    };

    let values: Vec<FlagValue> = match series.dtype() {
        DataType::Boolean => series
            .bool()?
            .into_iter()
            .map(|value| value.map_or(FlagValue::Missing, FlagValue::Bool))
            .collect(),
        dtype if dtype.is_numeric() => {
            let numbers = series.cast(&DataType::Float64)?;
            let numbers: Vec<FlagValue> = numbers
                .f64()?
                .into_iter()
                .map(|value| value.map_or(FlagValue::Missing, FlagValue::Number))
                .collect();
            numbers
        }
        _ => {
            let text = series.cast(&DataType::String)?;
            let text: Vec<FlagValue> = text
                .str()?
                .into_iter()
                .map(|value| value.map_or(FlagValue::Missing, |t| FlagValue::Text(t.to_owned())))
                .collect();
            text
        }
    };
    Ok(values)
}
