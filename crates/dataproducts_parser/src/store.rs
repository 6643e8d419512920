//! Directory-backed catalog of data-product definitions.
//!
//! The store walks its base directory on every lookup, so an edited or newly
//! added definition is visible to the very next call. Reloading can be traded
//! for a bounded staleness window with [`CatalogStore::with_cache_ttl`].

use crate::{ParserError, Result, detect_format, parse_file};
use dataproducts_core::DataProductDefinition;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Definitions indexed by their declared id.
pub type CatalogIndex = BTreeMap<String, DataProductDefinition>;

/// What to do when two catalog files declare the same id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Keep the file that sorts last and log a warning naming both files
    #[default]
    Warn,
    /// Fail the whole load
    Reject,
}

/// Resolves data-product definitions from a directory tree of YAML files.
///
/// # Example
///
/// ```no_run
/// use dataproducts_parser::CatalogStore;
///
/// let store = CatalogStore::new("/defs/data-products-definitions/dev");
/// let definition = store.get_by_id("75d44fdc-dffd-42ea-af06-06fa4cb6fdbd").unwrap();
/// println!("{} has {} data points", definition.fqn, definition.data_points.len());
/// ```
#[derive(Debug, Clone)]
pub struct CatalogStore {
    base_dir: PathBuf,
    duplicates: DuplicatePolicy,
    cache: Option<Arc<IndexCache>>,
}

impl CatalogStore {
    /// Creates a store rooted at `base_dir` that reloads on every lookup.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            duplicates: DuplicatePolicy::default(),
            cache: None,
        }
    }

    /// Sets how duplicate ids are handled.
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }

    /// Reuses a loaded catalog for up to `ttl` before reading the tree again.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = Some(Arc::new(IndexCache::new(ttl)));
        self
    }

    /// Returns the catalog's base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolves one definition by id.
    ///
    /// # Errors
    ///
    /// Returns [`ParserError::NotFound`] when no file declares `id`, or the
    /// load error of the first unreadable or malformed file in the tree.
    pub fn get_by_id(&self, id: &str) -> Result<DataProductDefinition> {
        let index = self.load()?;
        index
            .get(id)
            .cloned()
            .ok_or_else(|| ParserError::NotFound(id.to_string()))
    }

    /// Loads every definition in the catalog.
    pub fn load_all(&self) -> Result<CatalogIndex> {
        Ok(self.load()?.as_ref().clone())
    }

    /// Lists the ids of every definition in the catalog, sorted.
    pub fn ids(&self) -> Result<Vec<String>> {
        Ok(self.load()?.keys().cloned().collect())
    }

    fn load(&self) -> Result<Arc<CatalogIndex>> {
        if let Some(cache) = &self.cache {
            if let Some(index) = cache.fresh() {
                debug!("Serving catalog from cache ({} definitions)", index.len());
                return Ok(index);
            }
        }

        let index = Arc::new(load_dir(&self.base_dir, self.duplicates)?);
        info!(
            "Loaded {} data product definitions from {}",
            index.len(),
            self.base_dir.display()
        );

        if let Some(cache) = &self.cache {
            cache.store(Arc::clone(&index));
        }
        Ok(index)
    }
}

#[derive(Debug)]
struct IndexCache {
    ttl: Duration,
    entry: Mutex<Option<(Instant, Arc<CatalogIndex>)>>,
}

impl IndexCache {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    fn fresh(&self) -> Option<Arc<CatalogIndex>> {
        let entry = self.entry.lock().unwrap_or_else(|e| e.into_inner());
        match entry.as_ref() {
            Some((loaded_at, index)) if loaded_at.elapsed() < self.ttl => Some(Arc::clone(index)),
            _ => None,
        }
    }

    fn store(&self, index: Arc<CatalogIndex>) {
        let mut entry = self.entry.lock().unwrap_or_else(|e| e.into_inner());
        *entry = Some((Instant::now(), index));
    }
}

/// Parses every definition file below `base_dir`, in lexical path order.
fn load_dir(base_dir: &Path, duplicates: DuplicatePolicy) -> Result<CatalogIndex> {
    let mut files = Vec::new();
    collect_definition_files(base_dir, &mut files)?;
    files.sort();

    let mut index = CatalogIndex::new();
    let mut origins: HashMap<String, PathBuf> = HashMap::new();

    for path in files {
        debug!("Parsing definition file {}", path.display());
        let definition = parse_file(&path)?;

        if let Some(first) = origins.get(&definition.id) {
            match duplicates {
                DuplicatePolicy::Warn => warn!(
                    "Data product id '{}' declared in both {} and {}; keeping the latter",
                    definition.id,
                    first.display(),
                    path.display()
                ),
                DuplicatePolicy::Reject => {
                    return Err(ParserError::DuplicateId {
                        id: definition.id,
                        first: first.clone(),
                        second: path,
                    });
                }
            }
        }

        origins.insert(definition.id.clone(), path);
        index.insert(definition.id.clone(), definition);
    }

    Ok(index)
}

fn collect_definition_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let read_err = |source| ParserError::Read {
        path: dir.to_path_buf(),
        source,
    };

    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();

        if entry.file_type().map_err(read_err)?.is_dir() {
            collect_definition_files(&path, files)?;
        } else if detect_format(&path).is_ok() {
            files.push(path);
        } else {
            debug!("Skipping non-definition file {}", path.display());
        }
    }

    Ok(())
}
