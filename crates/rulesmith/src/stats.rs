//! Statistical analyzers: pure descriptive-statistics functions over a
//! column of values.
//!
//! All functions tolerate degenerate inputs (empty slices, single values,
//! zero variance) by returning 0.0 or an empty result instead of panicking.

use polars::prelude::*;
use std::collections::HashMap;

use crate::error::Result;

/// Quartile summary of a numeric column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quartiles {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
}

impl Quartiles {
    /// Interquartile range.
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }
}

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n - 1 denominator); 0.0 with fewer than two values.
pub fn variance(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if n <= 1.0 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1.0)
}

/// Sample standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Quartiles by sorted index; `None` with fewer than four values.
pub fn quartiles(values: &[f64]) -> Option<Quartiles> {
    let n = values.len();
    if n < 4 {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let q1_idx = (n as f64 * 0.25) as usize;
    let q2_idx = (n as f64 * 0.50) as usize;
    let q3_idx = (n as f64 * 0.75) as usize;

    Some(Quartiles {
        q1: sorted[q1_idx],
        median: sorted[q2_idx],
        q3: sorted[q3_idx],
    })
}

/// Skewness of the distribution; 0.0 when the standard deviation is zero.
pub fn skewness(values: &[f64]) -> f64 {
    let std = std_dev(values);
    if std == 0.0 || values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let n = values.len() as f64;
    values.iter().map(|v| ((v - m) / std).powi(3)).sum::<f64>() / n
}

/// Excess kurtosis; 0.0 when the standard deviation is zero.
pub fn kurtosis(values: &[f64]) -> f64 {
    let std = std_dev(values);
    if std == 0.0 || values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let n = values.len() as f64;
    values.iter().map(|v| ((v - m) / std).powi(4)).sum::<f64>() / n - 3.0
}

/// Shannon entropy (bits) of a frequency table; 0.0 when empty.
pub fn shannon_entropy(frequencies: &HashMap<String, usize>) -> f64 {
    let total: usize = frequencies.values().sum();
    if total == 0 {
        return 0.0;
    }
    frequencies
        .values()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / total as f64;
            -p * p.log2()
        })
        .sum()
}

/// Frequency table over string values.
pub fn frequency_table<'a>(values: impl Iterator<Item = &'a str>) -> HashMap<String, usize> {
    let mut table = HashMap::new();
    for value in values {
        *table.entry(value.to_string()).or_insert(0) += 1;
    }
    table
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Extract the non-null numeric values of a series as f64.
///
/// Non-numeric series yield an empty vector rather than an error so numeric
/// analyzers can simply skip them.
pub fn numeric_values(series: &Series) -> Result<Vec<f64>> {
    if !is_numeric_dtype(series.dtype()) {
        return Ok(Vec::new());
    }
    let float_series = series.cast(&DataType::Float64)?;
    Ok(float_series.f64()?.into_iter().flatten().collect())
}
