//! Dataset endpoint

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::info;

use super::Target;
use crate::cache::{EndpointCache, Memo};
use crate::elements::{Column, ColumnIndex, ColumnLookup, DataSet, EntityKind, Lookup};
use crate::error::{SereneError, SereneResult};
use crate::transport::{Payload, Transport};

/// View, upload and remove datasets
pub struct DatasetEndpoint {
    transport: Arc<dyn Transport>,
    cache: Arc<EndpointCache<DataSet>>,
    columns: Arc<Memo<ColumnIndex>>,
}

impl DatasetEndpoint {
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<EndpointCache<DataSet>>) -> Self {
        let columns = Arc::new(Memo::new());
        cache.add_downstream(columns.clone());
        Self {
            transport,
            cache,
            columns,
        }
    }

    /// Upload a CSV file
    pub fn upload(
        &self,
        path: impl AsRef<Path>,
        description: &str,
        type_map: &IndexMap<String, String>,
    ) -> SereneResult<DataSet> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SereneError::validation(format!("No such file: {}", path.display())));
        }
        let payload = Payload::file(path)
            .field("description", description)
            .field("typeMap", serde_json::to_string(type_map)?);

        let json = self.cache.mutate(|| self.transport.post(EntityKind::DataSet, payload))?;
        let dataset = DataSet::from_json(&json)?;
        info!("Uploaded {}", dataset);
        Ok(dataset)
    }

    pub fn remove<'a>(&self, dataset: impl Into<Target<'a, DataSet>>) -> SereneResult<()> {
        let key = dataset.into().resolve()?;
        self.cache.mutate(|| self.transport.delete(EntityKind::DataSet, key))?;
        info!("Removed dataset {}", key);
        Ok(())
    }

    pub fn get(&self, key: i64) -> SereneResult<Arc<DataSet>> {
        self.cache
            .lookup(key, || DataSet::from_json(&self.transport.item(EntityKind::DataSet, key)?))
    }

    /// Every dataset on the server, in server order
    pub fn items(&self) -> SereneResult<Arc<[Arc<DataSet>]>> {
        self.cache.listing(|| {
            self.transport
                .keys(EntityKind::DataSet)?
                .into_iter()
                .map(|key| self.get(key))
                .collect()
        })
    }

    /// Every column of every dataset, keyed by column id
    pub fn columns(&self) -> SereneResult<ColumnIndex> {
        self.columns.get_or_fetch(|| {
            let items = self.items()?;
            Ok(ColumnIndex::from_datasets(items.iter().map(|ds| ds.as_ref())))
        })
    }

    /// Drop all cached datasets (and everything derived from them)
    pub fn invalidate(&self) {
        self.cache.clear();
    }
}

impl Lookup<DataSet> for DatasetEndpoint {
    fn lookup(&self, key: i64) -> SereneResult<Arc<DataSet>> {
        self.get(key)
    }
}

impl ColumnLookup for DatasetEndpoint {
    fn column(&self, id: i64) -> SereneResult<Column> {
        self.columns()?
            .get(id)
            .cloned()
            .ok_or(SereneError::NotFound { kind: "Column", key: id })
    }
}
