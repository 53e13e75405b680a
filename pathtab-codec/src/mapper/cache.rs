//! Memoized mapper resolution
//!
//! Resolution picks a base mapper, applies the configuration's toggles and
//! filters as a mutation chain, and attaches the current registry capabilities.
//! The chain works on an `Arc<Mapper>` through [`Arc::make_mut`]: the first
//! change copies the shared base and later changes reuse that copy, so bases
//! and caller-supplied mappers are never modified.

use super::config::MapperConfig;
use super::filter::FieldFilter;
use super::registry::{CapabilityRegistry, RegistrySnapshot};
use super::{DateMode, Mapper, OutputFormat};
use ahash::AHashMap;
use pathtab_format::{PathTabError, Result};
use std::sync::{Arc, OnceLock, RwLock};

type BaseKey = (OutputFormat, bool, bool);

/// Cache of resolved mappers keyed by [`MapperConfig::cache_key`]
pub struct MapperCache {
    registry: Arc<CapabilityRegistry>,
    mappers: RwLock<AHashMap<String, Arc<Mapper>>>,
    bases: RwLock<AHashMap<BaseKey, Arc<Mapper>>>,
}

impl MapperCache {
    /// Empty cache over `registry`
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            registry,
            mappers: RwLock::new(AHashMap::new()),
            bases: RwLock::new(AHashMap::new()),
        }
    }

    /// Process-wide cache over [`CapabilityRegistry::global`]
    pub fn global() -> &'static MapperCache {
        static INSTANCE: OnceLock<MapperCache> = OnceLock::new();
        INSTANCE.get_or_init(|| MapperCache::new(CapabilityRegistry::global()))
    }

    /// Registry backing this cache
    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Mapper for `config`
    ///
    /// Cacheable configurations return the same instance until the registry
    /// version changes. Registrations wait while a mapper is being built.
    ///
    /// # Errors
    ///
    /// Returns [`PathTabError::UnknownGraph`] if the configuration names a graph
    /// that is not registered.
    pub fn resolve(&self, config: &MapperConfig) -> Result<Arc<Mapper>> {
        let snapshot = self.registry.snapshot();
        let version = snapshot.version();

        if !config.is_cacheable() {
            tracing::debug!("mapper configuration is not cacheable, building a fresh mapper");
            return self.build(config, &snapshot);
        }

        let key = config.cache_key();
        if let Some(hit) = self.mappers.read().unwrap().get(&key) {
            if hit.version() == version {
                return Ok(hit.clone());
            }
            tracing::debug!(
                cached = hit.version(),
                current = version,
                "cached mapper is stale, rebuilding"
            );
        }

        let built = self.build(config, &snapshot)?;
        let mut mappers = self.mappers.write().unwrap();
        match mappers.get(&key) {
            Some(existing) if existing.version() == version => Ok(existing.clone()),
            _ => {
                mappers.insert(key, built.clone());
                Ok(built)
            }
        }
    }

    /// Drop the cached mapper for `config`; returns whether one was present
    pub fn evict(&self, config: &MapperConfig) -> bool {
        self.mappers
            .write()
            .unwrap()
            .remove(&config.cache_key())
            .is_some()
    }

    /// Drop every cached mapper and base
    pub fn clear(&self) {
        self.mappers.write().unwrap().clear();
        self.bases.write().unwrap().clear();
    }

    /// Number of cached mappers
    pub fn len(&self) -> usize {
        self.mappers.read().unwrap().len()
    }

    /// Whether no mappers are cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn build(&self, config: &MapperConfig, snapshot: &RegistrySnapshot<'_>) -> Result<Arc<Mapper>> {
        let mut mapper = match config.base() {
            Some(base) => {
                let mut mapper = base.clone();
                if let Some(enabled) = config.include_type_metadata() {
                    if mapper.include_type_metadata() != enabled {
                        Arc::make_mut(&mut mapper).set_include_type_metadata(enabled);
                    }
                }
                if let Some(enabled) = config.pretty() {
                    if mapper.pretty() != enabled {
                        Arc::make_mut(&mut mapper).set_pretty(enabled);
                    }
                }
                mapper
            }
            None => self.base_mapper(
                (
                    config.format(),
                    config.include_type_metadata().unwrap_or(false),
                    config.pretty().unwrap_or(false),
                ),
                snapshot,
            ),
        };

        if let Some(enabled) = config.quote_field_names() {
            Arc::make_mut(&mut mapper).set_quote_field_names(enabled);
        }
        if let Some(enabled) = config.order_keys() {
            Arc::make_mut(&mut mapper).set_order_keys(enabled);
        }
        if let Some(enabled) = config.html_encode_strings() {
            Arc::make_mut(&mut mapper).set_html_encode_strings(enabled);
        }
        match config.dates_as_strings() {
            Some(true) => Arc::make_mut(&mut mapper)
                .set_date_mode(DateMode::Text(config.date_format().map(str::to_string))),
            Some(false) => Arc::make_mut(&mut mapper).set_date_mode(DateMode::Timestamps),
            None => {}
        }
        if let Some(digits) = config.significant_figures() {
            Arc::make_mut(&mut mapper).set_significant_figures(Some(digits));
        }

        if !config.inclusion_predicates().is_empty() {
            Arc::make_mut(&mut mapper)
                .merge_filter(FieldFilter::predicates(config.inclusion_predicates().clone()));
        }
        if !config.whitelist().is_empty() || !config.blacklist().is_empty() {
            Arc::make_mut(&mut mapper).merge_filter(FieldFilter::patterns(
                config.whitelist().to_vec(),
                config.blacklist().to_vec(),
            ));
        }
        if !config.only_fields().is_empty() {
            Arc::make_mut(&mut mapper).merge_filter(FieldFilter::only(config.only_fields().clone()));
        }
        if !config.skip_fields().is_empty() || !config.skip_fields_by_type().is_empty() {
            Arc::make_mut(&mut mapper).merge_filter(FieldFilter::skip(
                config.skip_fields().clone(),
                config.skip_fields_by_type().clone(),
            ));
        }
        if let Some(name) = config.graph() {
            let paths = snapshot.graph(name).ok_or_else(|| PathTabError::UnknownGraph {
                name: name.to_string(),
            })?;
            Arc::make_mut(&mut mapper).merge_filter(FieldFilter::graph(&paths));
        }

        if mapper.version() != snapshot.version() {
            Arc::make_mut(&mut mapper).attach(snapshot);
        }

        tracing::debug!(version = mapper.version(), "resolved mapper");
        Ok(mapper)
    }

    fn base_mapper(&self, key: BaseKey, snapshot: &RegistrySnapshot<'_>) -> Arc<Mapper> {
        if let Some(base) = self.bases.read().unwrap().get(&key) {
            if base.version() == snapshot.version() {
                return base.clone();
            }
        }

        let (format, include_type_metadata, pretty) = key;
        let mut base = Mapper::new(format);
        base.set_include_type_metadata(include_type_metadata);
        base.set_pretty(pretty);
        base.attach(snapshot);
        let base = Arc::new(base);
        self.bases.write().unwrap().insert(key, base.clone());
        base
    }
}
