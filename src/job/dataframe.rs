use chrono::NaiveDate;
use geo::Geometry;
use geozero::ToWkt;
use serde_json::Value;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use super::{TileJobTable, bbox_value, csv_error};
use crate::{BoundingBox, Result, TilerError};

/// Processing chain a job table is prepared for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingType {
    FeatureGeneration,
    EunisHabitatProbabilities,
}

impl ProcessingType {
    /// Product label used in output file names
    pub fn product_label(&self) -> &'static str {
        match self {
            Self::FeatureGeneration => "feature-cube",
            Self::EunisHabitatProbabilities => "EUNIS-habitat-proba-cube",
        }
    }

    /// Whether jobs of this type carry model URLs and band names
    pub fn uses_models(&self) -> bool {
        matches!(self, Self::EunisHabitatProbabilities)
    }
}

impl FromStr for ProcessingType {
    type Err = TilerError;

    fn from_str(value: &str) -> Result<Self> {
        if value == "feature_generation" {
            Ok(Self::FeatureGeneration)
        } else if value.eq_ignore_ascii_case("eunis_habitat_probabilities") {
            Ok(Self::EunisHabitatProbabilities)
        } else {
            Err(TilerError::Config(format!(
                "Unknown processing type '{}': expected feature_generation or EUNIS_habitat_probabilities",
                value
            )))
        }
    }
}

impl fmt::Display for ProcessingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FeatureGeneration => write!(f, "feature_generation"),
            Self::EunisHabitatProbabilities => write!(f, "EUNIS_habitat_probabilities"),
        }
    }
}

/// Optional settings for [`TileJobTable::to_job_dataframe`]
#[derive(Debug, Clone, Default)]
pub struct JobDataFrameOptions {
    /// Merged AOI column appended to job names and file prefixes
    pub discriminator: Option<String>,
    /// Output EPSG for every job instead of the tile's own bbox CRS
    pub target_epsg: Option<u32>,
    /// Product version appended to file prefixes
    pub version: Option<String>,
    pub model_urls: Vec<String>,
    pub output_band_names: Vec<String>,
    /// Export prefix relative to the bucket
    pub s3_prefix: Option<String>,
    /// Organization the processing costs are booked on
    pub organization_id: Option<u16>,
}

impl JobDataFrameOptions {
    pub fn with_discriminator(mut self, column: impl Into<String>) -> Self {
        self.discriminator = Some(column.into());
        self
    }

    pub fn with_target_epsg(mut self, epsg: u32) -> Self {
        self.target_epsg = Some(epsg);
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_models(mut self, model_urls: Vec<String>, output_band_names: Vec<String>) -> Self {
        self.model_urls = model_urls;
        self.output_band_names = output_band_names;
        self
    }

    pub fn with_s3_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.s3_prefix = Some(prefix.into());
        self
    }

    pub fn with_organization_id(mut self, id: u16) -> Self {
        self.organization_id = Some(id);
        self
    }
}

/// One processing job for one tile and year
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    /// Unique job name: tile, year and discriminator
    pub name: String,
    pub tile_id: String,
    pub target_epsg: u32,
    pub bbox: BoundingBox,
    pub file_prefix: String,
    pub start_date: NaiveDate,
    /// Exclusive end of the processing period
    pub end_date: NaiveDate,
    pub s3_prefix: Option<String>,
    pub organization_id: Option<u16>,
    pub model_urls: Option<Vec<String>>,
    pub output_band_names: Option<Vec<String>>,
    pub geometry: Geometry<f64>,
}

/// The job manager's input table
#[derive(Debug, Clone)]
pub struct JobDataFrame {
    pub processing_type: ProcessingType,
    pub records: Vec<JobRecord>,
}

impl JobDataFrame {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = vec![
            "name",
            "tileID",
            "target_epsg",
            "bbox",
            "file_prefix",
            "start_date",
            "end_date",
            "s3_prefix",
            "organization_id",
        ];
        if self.processing_type.uses_models() {
            columns.extend(["model_urls", "output_band_names"]);
        }
        columns.push("geometry");
        columns
    }

    /// Write the table as CSV, geometry as WKT and lists as JSON arrays
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(self.columns()).map_err(csv_error)?;

        for record in &self.records {
            let mut fields = vec![
                record.name.clone(),
                record.tile_id.clone(),
                record.target_epsg.to_string(),
                bbox_value(&record.bbox)?.to_string(),
                record.file_prefix.clone(),
                record.start_date.format("%Y-%m-%d").to_string(),
                record.end_date.format("%Y-%m-%d").to_string(),
                record.s3_prefix.clone().unwrap_or_default(),
                record.organization_id.map(|id| id.to_string()).unwrap_or_default(),
            ];
            if self.processing_type.uses_models() {
                fields.push(json_list(record.model_urls.as_deref()));
                fields.push(json_list(record.output_band_names.as_deref()));
            }
            let wkt = record
                .geometry
                .to_wkt()
                .map_err(|e| TilerError::Geometry(format!("Cannot encode job {}: {}", record.name, e)))?;
            fields.push(wkt);
            csv_writer.write_record(&fields).map_err(csv_error)?;
        }

        csv_writer.flush().map_err(|e| TilerError::io("job dataframe csv", e))?;
        Ok(())
    }
}

impl TileJobTable {
    /// Turn the tiling result into the job manager's table for one processing year
    ///
    /// `tileID` is the resolved tile identifier (`grid20id`, then `name`, then the
    /// grid row index). Jobs cover `year-01-01` up to, but excluding, the next
    /// January first.
    pub fn to_job_dataframe(
        &self,
        year: i32,
        file_name_base: &str,
        processing_type: ProcessingType,
        options: &JobDataFrameOptions,
    ) -> Result<JobDataFrame> {
        let start_date = january_first(year)?;
        let end_date = january_first(year + 1)?;
        let version = options
            .version
            .as_deref()
            .map(|v| format!("_{}", v))
            .unwrap_or_default();

        let records = self
            .rows
            .iter()
            .map(|row| {
                let discriminator = options
                    .discriminator
                    .as_deref()
                    .map(|column| match row.attributes.get(column) {
                        None | Some(Value::Null) => Err(TilerError::Config(format!(
                            "Tile {} has no value for discriminator column '{}'",
                            row.tile_id, column
                        ))),
                        Some(Value::String(text)) => Ok(format!("_{}", text)),
                        Some(other) => Ok(format!("_{}", other)),
                    })
                    .transpose()?
                    .unwrap_or_default();

                let models = processing_type.uses_models();
                Ok(JobRecord {
                    name: format!("{}_{}{}", row.tile_id, year, discriminator),
                    tile_id: row.tile_id.clone(),
                    target_epsg: options.target_epsg.unwrap_or(row.bbox_dict.crs.code()),
                    bbox: row.bbox_dict,
                    file_prefix: format!(
                        "{}_{}_year{}_{}{}{}",
                        file_name_base,
                        processing_type.product_label(),
                        year,
                        row.tile_id,
                        discriminator,
                        version
                    ),
                    start_date,
                    end_date,
                    s3_prefix: options.s3_prefix.clone(),
                    organization_id: options.organization_id,
                    model_urls: models.then(|| options.model_urls.clone()),
                    output_band_names: models.then(|| options.output_band_names.clone()),
                    geometry: row.geometry.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            "Prepared {} {} jobs for {}",
            records.len(),
            processing_type,
            year
        );
        Ok(JobDataFrame {
            processing_type,
            records,
        })
    }
}

fn january_first(year: i32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| TilerError::Config(format!("Year {} is out of range", year)))
}

fn json_list(values: Option<&[String]>) -> String {
    Value::from(values.unwrap_or_default().to_vec()).to_string()
}
