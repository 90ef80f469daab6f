//! Dataset access and staged sampling.
//!
//! Sources load eagerly so row counts and repeated samples are cheap.
//! Sampling is uniform without replacement and fully determined by the seed,
//! which is what makes checkpoint resume reproduce a workflow's trajectory.

use crate::error::{DiscoveryError, Result};
use polars::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use std::path::Path;
use tracing::info;

/// Provides the rows the workflow samples and, in the final stage, the full
/// dataset.
pub trait DatasetSource: Send + Sync {
    fn path(&self) -> &str;
    fn row_count(&self) -> usize;
    /// Uniform random sample of `ratio` of the rows, without replacement.
    fn sample(&self, ratio: f64, seed: u64) -> Result<DataFrame>;
    fn full(&self) -> Result<DataFrame>;
}

/// Seeded uniform row sample. Ratios at or above 1.0 return the whole frame.
pub fn sample_rows(df: &DataFrame, ratio: f64, seed: u64) -> Result<DataFrame> {
    let rows = df.height();
    if rows == 0 {
        return Err(DiscoveryError::EmptySample { ratio });
    }
    if ratio >= 1.0 {
        return Ok(df.clone());
    }

    let sample_size = ((rows as f64 * ratio).ceil() as usize).clamp(1, rows);
    let mut rng = StdRng::seed_from_u64(seed);
    let chosen = index::sample(&mut rng, rows, sample_size);

    let mut mask = vec![false; rows];
    for idx in chosen.iter() {
        mask[idx] = true;
    }
    let mask = BooleanChunked::from_slice("mask".into(), &mask);
    let sampled = df.filter(&mask)?;

    if sampled.height() == 0 {
        return Err(DiscoveryError::EmptySample { ratio });
    }
    Ok(sampled)
}

/// CSV-backed source using the polars reader.
#[derive(Debug)]
pub struct CsvSource {
    path: String,
    df: DataFrame,
}

impl CsvSource {
    /// Read the CSV up front. Any read or parse failure becomes a
    /// `DatasetLoad` error carrying the path and cause.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(|e| DiscoveryError::DatasetLoad {
                path: path_str.clone(),
                reason: e.to_string(),
            })?;
        info!(path = %path_str, rows = df.height(), columns = df.width(), "dataset loaded");
        Ok(Self { path: path_str, df })
    }
}

impl DatasetSource for CsvSource {
    fn path(&self) -> &str {
        &self.path
    }

    fn row_count(&self) -> usize {
        self.df.height()
    }

    fn sample(&self, ratio: f64, seed: u64) -> Result<DataFrame> {
        sample_rows(&self.df, ratio, seed)
    }

    fn full(&self) -> Result<DataFrame> {
        Ok(self.df.clone())
    }
}

/// In-memory source for tests and embedding callers that already hold a
/// DataFrame.
pub struct InMemorySource {
    name: String,
    df: DataFrame,
}

impl InMemorySource {
    pub fn new(name: impl Into<String>, df: DataFrame) -> Self {
        Self {
            name: name.into(),
            df,
        }
    }
}

impl DatasetSource for InMemorySource {
    fn path(&self) -> &str {
        &self.name
    }

    fn row_count(&self) -> usize {
        self.df.height()
    }

    fn sample(&self, ratio: f64, seed: u64) -> Result<DataFrame> {
        sample_rows(&self.df, ratio, seed)
    }

    fn full(&self) -> Result<DataFrame> {
        Ok(self.df.clone())
    }
}
