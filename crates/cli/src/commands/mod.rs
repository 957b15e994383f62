pub mod baseline;
pub mod engines;
pub mod scan;

use anyhow::{anyhow, Result};
use kansa_core::engine::process::{ProcessEngine, ProcessEngineConfig};
use kansa_core::{EngineRegistry, EngineRegistryBuilder, SeverityMap, TargetKind};
use std::path::PathBuf;

/// Parse repeated `--engine name=/path/to/binary` specs into a registry.
/// Registration order follows the command line, which makes dedup
/// tie-breaking predictable for the user.
pub fn build_registry(engine_specs: &[String], with_llm: bool) -> Result<EngineRegistry> {
    let mut builder = EngineRegistryBuilder::new();

    for spec in engine_specs {
        let (name, program) = spec
            .split_once('=')
            .ok_or_else(|| anyhow!("engine spec '{spec}' is not of the form name=program"))?;
        builder = builder.with_engine(ProcessEngine::new(ProcessEngineConfig {
            name: name.to_string(),
            program: PathBuf::from(program),
            args: Vec::new(),
            kinds: vec![TargetKind::McpConfig, TargetKind::ModelFile],
            severity_map: SeverityMap::canonical(),
        }));
    }

    #[cfg(feature = "llm")]
    if with_llm {
        use kansa_core::engine::llm::{LlmEngine, LlmEngineConfig};
        match LlmEngine::new(LlmEngineConfig::default()) {
            Ok(engine) => builder = builder.with_engine(engine),
            Err(_) => eprintln!("warning: OPENAI_API_KEY not set, llm engine skipped"),
        }
    }
    #[cfg(not(feature = "llm"))]
    if with_llm {
        return Err(anyhow!("this build was compiled without the llm feature"));
    }

    Ok(builder.build())
}
