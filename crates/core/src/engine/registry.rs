use crate::core::TargetKind;
use crate::engine::EngineAdapter;
use std::sync::Arc;

/// Ordered collection of registered engine adapters.
///
/// Registration order is load-bearing: the deduplicator breaks description
/// ties by it, and evidence lists follow it, so the same engine set always
/// yields the same merged output.
pub struct EngineRegistry {
    engines: Vec<Arc<dyn EngineAdapter>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self {
            engines: Vec::new(),
        }
    }

    pub fn register<E: EngineAdapter + 'static>(&mut self, engine: E) {
        self.register_arc(Arc::new(engine));
    }

    pub fn register_arc(&mut self, engine: Arc<dyn EngineAdapter>) {
        if self.get(engine.name()).is_some() {
            return; // First registration wins; names are unique.
        }
        self.engines.push(engine);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn EngineAdapter>> {
        self.engines.iter().find(|e| e.name() == name).cloned()
    }

    pub fn all(&self) -> Vec<Arc<dyn EngineAdapter>> {
        self.engines.clone()
    }

    /// Engines whose underlying tool is actually reachable.
    pub fn available(&self) -> Vec<Arc<dyn EngineAdapter>> {
        self.engines
            .iter()
            .filter(|e| e.available())
            .cloned()
            .collect()
    }

    pub fn for_kind(&self, kind: TargetKind) -> Vec<Arc<dyn EngineAdapter>> {
        self.engines
            .iter()
            .filter(|e| e.accepts(kind))
            .cloned()
            .collect()
    }

    pub fn list_names(&self) -> Vec<String> {
        self.engines.iter().map(|e| e.name().to_string()).collect()
    }

    /// Position of an engine in registration order; unregistered names sort
    /// last.
    pub fn rank(&self, name: &str) -> usize {
        self.engines
            .iter()
            .position(|e| e.name() == name)
            .unwrap_or(usize::MAX)
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub struct EngineRegistryBuilder {
    registry: EngineRegistry,
}

impl EngineRegistryBuilder {
    pub fn new() -> Self {
        Self {
            registry: EngineRegistry::new(),
        }
    }

    pub fn with_engine<E: EngineAdapter + 'static>(mut self, engine: E) -> Self {
        self.registry.register(engine);
        self
    }

    pub fn build(self) -> EngineRegistry {
        self.registry
    }
}

impl Default for EngineRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
