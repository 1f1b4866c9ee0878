//! DataSet and Column entities

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Entity, EntityKind, StoredMeta};
use crate::error::SereneResult;

/// A column of an uploaded dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: i64,
    pub index: u32,
    pub name: String,
    #[serde(rename = "datasetID")]
    pub dataset_id: i64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub logical_type: String,
    #[serde(default)]
    pub sample: Vec<String>,
    #[serde(default)]
    pub path: String,
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Column({}, {})", self.id, self.name)
    }
}

/// A CSV dataset known to the server
#[derive(Debug, Clone, Default)]
pub struct DataSet {
    meta: Option<StoredMeta>,
    description: String,
    filename: String,
    path: String,
    type_map: IndexMap<String, String>,
    columns: Vec<Column>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataSetBlob {
    #[serde(default)]
    description: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    type_map: IndexMap<String, String>,
    #[serde(default)]
    columns: Vec<Column>,
}

impl DataSet {
    /// An empty local dataset. Datasets normally come from
    /// [`DatasetEndpoint::upload`](crate::endpoints::DatasetEndpoint::upload).
    pub fn new() -> Self {
        Self::default()
    }

    /// Hydrate a dataset from a server response
    pub fn from_json(json: &Value) -> SereneResult<Self> {
        let mut ds = Self::new();
        ds.update(json)?;
        Ok(ds)
    }

    /// Replace every field with the contents of `json`
    pub fn update(&mut self, json: &Value) -> SereneResult<&mut Self> {
        let meta = StoredMeta::from_json(json)?;
        let blob = DataSetBlob::deserialize(json)?;

        self.meta = Some(meta);
        self.description = blob.description;
        self.filename = blob.filename;
        self.path = blob.path;
        self.type_map = blob.type_map;
        self.columns = blob.columns;
        Ok(self)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn type_map(&self) -> &IndexMap<String, String> {
        &self.type_map
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look a column up by its header name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

impl Entity for DataSet {
    const KIND: EntityKind = EntityKind::DataSet;

    fn meta(&self) -> Option<&StoredMeta> {
        self.meta.as_ref()
    }
}

impl fmt::Display for DataSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            Some(id) => write!(f, "DataSet({}, {})", id, self.filename),
            None => write!(f, "DataSet(local)"),
        }
    }
}

/// Read-only view of every known column, keyed by column id
#[derive(Debug, Clone, Default)]
pub struct ColumnIndex {
    columns: Arc<HashMap<i64, Column>>,
}

impl ColumnIndex {
    pub fn from_datasets<'a>(datasets: impl IntoIterator<Item = &'a DataSet>) -> Self {
        let columns = datasets
            .into_iter()
            .flat_map(|ds| ds.columns().iter().cloned())
            .map(|c| (c.id, c))
            .collect();
        ColumnIndex {
            columns: Arc::new(columns),
        }
    }

    pub fn get(&self, id: i64) -> Option<&Column> {
        self.columns.get(&id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.columns.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&i64, &Column)> {
        self.columns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset_blob(id: i64) -> Value {
        json!({
            "id": id,
            "description": "people",
            "filename": "people.csv",
            "path": "/storage/datasets/people.csv",
            "typeMap": {},
            "dateCreated": "2017-04-19T05:37:48.417Z",
            "dateModified": "2017-04-19T05:37:48.417Z",
            "columns": [
                {"id": id * 10, "index": 0, "name": "name", "datasetID": id,
                 "size": 2, "logicalType": "string", "sample": ["Ann", "Bob"], "path": ""},
                {"id": id * 10 + 1, "index": 1, "name": "city", "datasetID": id,
                 "size": 2, "logicalType": "string", "sample": ["Oslo", "Rome"], "path": ""}
            ]
        })
    }

    #[test]
    fn test_new_is_local() {
        let ds = DataSet::new();
        assert!(!ds.stored());
        assert_eq!(ds.id(), None);
        assert_eq!(ds.date_created(), None);
    }

    #[test]
    fn test_update_hydrates() {
        let ds = DataSet::from_json(&dataset_blob(3)).unwrap();

        assert!(ds.stored());
        assert_eq!(ds.id(), Some(3));
        assert_eq!(ds.filename(), "people.csv");
        assert_eq!(ds.columns().len(), 2);
        assert_eq!(ds.column("city").unwrap().id, 31);
        assert_eq!(ds.to_string(), "DataSet(3, people.csv)");
    }

    #[test]
    fn test_failed_update_leaves_local() {
        let mut ds = DataSet::new();
        assert!(ds.update(&json!({"id": 1})).is_err());
        assert!(!ds.stored());
    }

    #[test]
    fn test_column_index() {
        let a = DataSet::from_json(&dataset_blob(1)).unwrap();
        let b = DataSet::from_json(&dataset_blob(2)).unwrap();
        let index = ColumnIndex::from_datasets([&a, &b]);

        assert_eq!(index.len(), 4);
        assert_eq!(index.get(21).unwrap().name, "city");
        assert!(!index.contains(99));
    }
}
