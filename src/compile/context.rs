use rhai::packages::{
    BasicArrayPackage, BasicMapPackage, BasicMathPackage, CorePackage, MoreStringPackage, Package,
};
use rhai::Engine;
use serde::{Deserialize, Serialize};

/// Resource limits applied to every compiled template.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineLimits {
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_expr_depth: usize,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_operations: 5_000_000,
            max_call_levels: 32,
            max_expr_depth: 64,
            max_string_size: 10 * 1024 * 1024, // 10MB
            max_array_size: 100_000,
            max_map_size: 10_000,
        }
    }
}

/// Everything compilation and execution need, created explicitly by the caller.
///
/// Holds two engines built from the same limits: a strict one that compiles
/// and runs templates, and a lenient one used only to syntax-check code
/// fragments in isolation when a whole program fails to compile.
pub struct CompileContext {
    engine: Engine,
    syntax_engine: Engine,
}

impl CompileContext {
    pub fn new(limits: EngineLimits) -> Self {
        Self {
            engine: create_engine(&limits, true),
            syntax_engine: create_engine(&limits, false),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub(crate) fn syntax_engine(&self) -> &Engine {
        &self.syntax_engine
    }
}

impl Default for CompileContext {
    fn default() -> Self {
        Self::new(EngineLimits::default())
    }
}

/// Create a sandboxed engine exposing only string, number and collection basics.
fn create_engine(limits: &EngineLimits, strict: bool) -> Engine {
    let mut engine = Engine::new_raw();

    engine.register_global_module(CorePackage::new().as_shared_module());
    engine.register_global_module(MoreStringPackage::new().as_shared_module());
    engine.register_global_module(BasicMathPackage::new().as_shared_module());
    engine.register_global_module(BasicArrayPackage::new().as_shared_module());
    engine.register_global_module(BasicMapPackage::new().as_shared_module());

    engine.disable_symbol("eval");
    engine.on_print(|_| {});
    engine.on_debug(|_, _, _| {});

    engine.set_strict_variables(strict);
    engine.set_fail_on_invalid_map_property(true);

    engine.set_max_operations(limits.max_operations);
    engine.set_max_call_levels(limits.max_call_levels);
    engine.set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth);
    engine.set_max_string_size(limits.max_string_size);
    engine.set_max_array_size(limits.max_array_size);
    engine.set_max_map_size(limits.max_map_size);

    engine
}
