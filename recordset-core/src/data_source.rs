use crate::{Connection, Dataset, MasterLink, Result, Value};
use futures::{FutureExt, future::BoxFuture};
use std::{
    fmt::{self, Debug},
    sync::{Arc, PoisonError, RwLock},
};

/// Object safe view of a dataset used as the master of a master-detail relation.
pub trait LinkedDataset: Send + Sync {
    fn linked_active(&self) -> bool;
    fn open_linked(&mut self) -> BoxFuture<'_, Result<()>>;
    /// Value of `column` in the current record.
    fn linked_value(&self, column: &str) -> Option<Value>;
}

impl<D: Dataset + Sync> LinkedDataset for D {
    fn linked_active(&self) -> bool {
        self.cursor().is_active()
    }
    fn open_linked(&mut self) -> BoxFuture<'_, Result<()>> {
        self.open().boxed()
    }
    fn linked_value(&self, column: &str) -> Option<Value> {
        self.field_by_name(column).cloned()
    }
}

pub type SharedDataset = Arc<tokio::sync::Mutex<dyn LinkedDataset>>;

/// Late bound handle to a master dataset.
///
/// A detail is configured with a `DataSource` that may still be empty, the
/// master gets attached later (and can be swapped) by whoever owns it.
#[derive(Clone, Default)]
pub struct DataSource {
    dataset: Arc<RwLock<Option<SharedDataset>>>,
}

impl DataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(dataset: SharedDataset) -> Self {
        let result = Self::new();
        result.set_dataset(dataset);
        result
    }

    pub fn set_dataset(&self, dataset: SharedDataset) {
        *self.dataset.write().unwrap_or_else(PoisonError::into_inner) = Some(dataset);
    }

    pub fn clear(&self) {
        *self.dataset.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn dataset(&self) -> Option<SharedDataset> {
        self.dataset
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_bound(&self) -> bool {
        self.dataset().is_some()
    }
}

impl Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// Conditions restricting a detail to the current master record.
///
/// The master is opened when inactive, it is never moved.
pub async fn master_conditions<C: Connection>(
    link: Option<&MasterLink>,
    connection: &C,
) -> Result<Vec<String>> {
    let Some(link) = link else {
        return Ok(Vec::new());
    };
    let Some(master) = link.source.dataset() else {
        log::warn!(
            "The master data source is not bound to any dataset, no master condition applied"
        );
        return Ok(Vec::new());
    };
    let mut master = master.lock().await;
    if !master.linked_active() {
        master.open_linked().await?;
    }
    Ok(link
        .fields
        .iter()
        .map(|(detail, column)| {
            let value = master.linked_value(column).unwrap_or_default();
            format!(
                "{} = {}",
                connection.quote_identifier(detail),
                connection.quote_value(&value)
            )
        })
        .collect())
}
