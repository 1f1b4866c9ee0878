//! Matcher model entity and its enumerations

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse_timestamp, Entity, EntityKind, StoredMeta};
use crate::error::{SereneError, SereneResult};

/// Classifier used by the schema matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelType {
    #[default]
    #[serde(rename = "randomForest")]
    RandomForest,
}

impl ModelType {
    pub const ALL: [ModelType; 1] = [ModelType::RandomForest];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::RandomForest => "randomForest",
        }
    }
}

impl FromStr for ModelType {
    type Err = SereneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                SereneError::validation(format!(
                    "Model type {} is invalid, use one of {:?}",
                    s,
                    ModelType::ALL.map(|t| t.as_str())
                ))
            })
    }
}

/// Class-balancing strategy applied to training data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SamplingStrategy {
    UpsampleToMax,
    ResampleToMean,
    UpsampleToMean,
    ResampleToMedian,
    UpsampleToMedian,
    CreateBoots,
    #[default]
    NoResampling,
    Bagging,
    BaggingToMax,
    BaggingToMean,
}

impl SamplingStrategy {
    pub const ALL: [SamplingStrategy; 10] = [
        SamplingStrategy::UpsampleToMax,
        SamplingStrategy::ResampleToMean,
        SamplingStrategy::UpsampleToMean,
        SamplingStrategy::ResampleToMedian,
        SamplingStrategy::UpsampleToMedian,
        SamplingStrategy::CreateBoots,
        SamplingStrategy::NoResampling,
        SamplingStrategy::Bagging,
        SamplingStrategy::BaggingToMax,
        SamplingStrategy::BaggingToMean,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SamplingStrategy::UpsampleToMax => "UpsampleToMax",
            SamplingStrategy::ResampleToMean => "ResampleToMean",
            SamplingStrategy::UpsampleToMean => "UpsampleToMean",
            SamplingStrategy::ResampleToMedian => "ResampleToMedian",
            SamplingStrategy::UpsampleToMedian => "UpsampleToMedian",
            SamplingStrategy::CreateBoots => "CreateBoots",
            SamplingStrategy::NoResampling => "NoResampling",
            SamplingStrategy::Bagging => "Bagging",
            SamplingStrategy::BaggingToMax => "BaggingToMax",
            SamplingStrategy::BaggingToMean => "BaggingToMean",
        }
    }
}

impl FromStr for SamplingStrategy {
    type Err = SereneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SamplingStrategy::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                SereneError::validation(format!(
                    "Resampling strategy type {} is invalid, use one of {:?}",
                    s,
                    SamplingStrategy::ALL.map(|t| t.as_str())
                ))
            })
    }
}

/// Training status reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Untrained,
    Busy,
    Complete,
    Error,
}

impl Status {
    /// `Complete` and `Error` are absorbing: training never leaves them
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Complete | Status::Error)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Untrained => "untrained",
            Status::Busy => "busy",
            Status::Complete => "complete",
            Status::Error => "error",
        };
        f.write_str(s)
    }
}

/// Snapshot of a model's training state
#[derive(Debug, Clone, PartialEq)]
pub struct ModelState {
    pub status: Status,
    pub message: String,
    pub date_changed: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateBlob {
    status: Status,
    #[serde(default)]
    message: String,
    #[serde(default)]
    date_changed: Option<String>,
}

impl ModelState {
    pub fn from_json(json: &Value) -> SereneResult<Self> {
        let blob = StateBlob::deserialize(json)?;
        let date_changed = blob.date_changed.as_deref().map(parse_timestamp).transpose()?;
        Ok(ModelState {
            status: blob.status,
            message: blob.message,
            date_changed,
        })
    }
}

/// A schema-matcher model ("lobster" on the server)
#[derive(Debug, Clone)]
pub struct Model {
    meta: Option<StoredMeta>,
    description: String,
    features: Value,
    model_type: ModelType,
    resampling_strategy: SamplingStrategy,
    num_bags: u32,
    bag_size: u32,
    classes: Vec<String>,
    ref_datasets: Vec<i64>,
    state: Option<ModelState>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelBlob {
    #[serde(default)]
    description: String,
    #[serde(default)]
    features: Value,
    #[serde(default)]
    model_type: ModelType,
    #[serde(default)]
    resampling_strategy: SamplingStrategy,
    #[serde(default = "default_bagging")]
    num_bags: u32,
    #[serde(default = "default_bagging")]
    bag_size: u32,
    #[serde(default)]
    classes: Vec<String>,
    #[serde(default, rename = "refDataSets")]
    ref_datasets: Vec<i64>,
    state: Value,
}

pub(crate) fn default_bagging() -> u32 {
    10
}

impl Model {
    pub fn from_json(json: &Value) -> SereneResult<Self> {
        let blob = ModelBlob::deserialize(json)?;
        Ok(Model {
            meta: Some(StoredMeta::from_json(json)?),
            description: blob.description,
            features: blob.features,
            model_type: blob.model_type,
            resampling_strategy: blob.resampling_strategy,
            num_bags: blob.num_bags,
            bag_size: blob.bag_size,
            classes: blob.classes,
            ref_datasets: blob.ref_datasets,
            state: Some(ModelState::from_json(&blob.state)?),
        })
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Feature configuration as sent to the matcher
    pub fn features(&self) -> &Value {
        &self.features
    }

    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    pub fn resampling_strategy(&self) -> SamplingStrategy {
        self.resampling_strategy
    }

    pub fn num_bags(&self) -> u32 {
        self.num_bags
    }

    pub fn bag_size(&self) -> u32 {
        self.bag_size
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn ref_datasets(&self) -> &[i64] {
        &self.ref_datasets
    }

    pub fn state(&self) -> Option<&ModelState> {
        self.state.as_ref()
    }
}

impl Entity for Model {
    const KIND: EntityKind = EntityKind::Model;

    fn meta(&self) -> Option<&StoredMeta> {
        self.meta.as_ref()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            Some(id) => write!(f, "Model({}, {})", id, self.model_type.as_str()),
            None => write!(f, "Model(local)"),
        }
    }
}
