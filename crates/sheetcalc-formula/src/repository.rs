//! Function repository
//!
//! Maps function names to implementations and, optionally, to a custom
//! compiler. The repository is owned by a calculation engine and handed to the
//! [`Compiler`](crate::Compiler) by reference; there is no global registry.
//!
//! Functions arrive either one at a time through
//! [`FunctionRepository::register`] or in bundles through
//! [`FunctionRepository::load_module`]. Registering a name that already
//! exists replaces both the implementation and the compiler.

use crate::compiler::FunctionCompiler;
use crate::context::EvaluationContext;
use crate::error::{FormulaError, FormulaResult};
use crate::value::FormulaValue;
use ahash::AHashMap;
use std::fmt;
use std::sync::Arc;

/// A callable spreadsheet function
pub trait Function: Send + Sync {
    fn evaluate(
        &self,
        args: &[FormulaValue],
        ctx: &EvaluationContext<'_>,
    ) -> FormulaResult<FormulaValue>;
}

impl<F> Function for F
where
    F: Fn(&[FormulaValue], &EvaluationContext<'_>) -> FormulaResult<FormulaValue> + Send + Sync,
{
    fn evaluate(
        &self,
        args: &[FormulaValue],
        ctx: &EvaluationContext<'_>,
    ) -> FormulaResult<FormulaValue> {
        self(args, ctx)
    }
}

/// Function implementation signature used by the built-in library
///
/// Functions can consult the evaluation context (date system, current cell) to
/// match spreadsheet semantics.
pub type FunctionImpl = fn(&[FormulaValue], &EvaluationContext<'_>) -> FormulaResult<FormulaValue>;

/// Function definition
#[derive(Clone)]
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: String,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Is volatile (recalculates every time)
    pub volatile: bool,
    /// Implementation
    pub implementation: Arc<dyn Function>,
}

impl FunctionDef {
    pub fn new(
        name: &str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) -> Self {
        Self::from_arc(name, min_args, max_args, Arc::new(implementation))
    }

    /// Definition backed by an already shared implementation
    pub fn from_arc(
        name: &str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: Arc<dyn Function>,
    ) -> Self {
        Self {
            name: name.to_ascii_uppercase(),
            min_args,
            max_args,
            volatile: false,
            implementation,
        }
    }

    /// Mark the function volatile
    pub fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }

    /// Check an argument count against the declared arity
    pub fn check_arity(&self, actual: usize) -> FormulaResult<()> {
        let expected = match self.max_args {
            Some(max) if max == self.min_args => max.to_string(),
            Some(max) => format!("{} to {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        };
        let too_many = self.max_args.map_or(false, |max| actual > max);
        if actual < self.min_args || too_many {
            return Err(FormulaError::ArgumentCount {
                function: self.name.clone(),
                expected,
                actual,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("volatile", &self.volatile)
            .finish_non_exhaustive()
    }
}

/// Identity of one registration
///
/// Every call to [`FunctionRepository::register`] that changes an entry hands
/// out a fresh id, so a replaced function never shares an id with its
/// predecessor. Custom compilers are keyed by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(u32);

impl FunctionId {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// A function as stored in the repository
#[derive(Debug)]
pub struct RegisteredFunction {
    pub id: FunctionId,
    pub def: FunctionDef,
}

impl RegisteredFunction {
    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn is_volatile(&self) -> bool {
        self.def.volatile
    }

    /// Invoke the implementation on evaluated arguments
    pub fn call(
        &self,
        args: &[FormulaValue],
        ctx: &EvaluationContext<'_>,
    ) -> FormulaResult<FormulaValue> {
        self.def.implementation.evaluate(args, ctx)
    }
}

/// One function of a [`FunctionModule`]
#[derive(Clone)]
pub struct ModuleEntry {
    pub def: FunctionDef,
    pub compiler: Option<Arc<dyn FunctionCompiler>>,
}

/// A named bundle of functions and their custom compilers
#[derive(Clone)]
pub struct FunctionModule {
    name: String,
    entries: Vec<ModuleEntry>,
}

impl FunctionModule {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[ModuleEntry] {
        &self.entries
    }

    /// Add a function compiled the default way
    pub fn add(&mut self, def: FunctionDef) -> &mut Self {
        self.entries.push(ModuleEntry {
            def,
            compiler: None,
        });
        self
    }

    /// Add a function with a custom compiler
    pub fn add_with_compiler(
        &mut self,
        def: FunctionDef,
        compiler: Arc<dyn FunctionCompiler>,
    ) -> &mut Self {
        self.entries.push(ModuleEntry {
            def,
            compiler: Some(compiler),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for FunctionModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionModule")
            .field("name", &self.name)
            .field("functions", &self.entries.len())
            .finish()
    }
}

/// Function repository
#[derive(Default)]
pub struct FunctionRepository {
    functions: AHashMap<String, Arc<RegisteredFunction>>,
    compilers: AHashMap<FunctionId, Arc<dyn FunctionCompiler>>,
    next_id: u32,
}

impl FunctionRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository with all built-in functions
    pub fn with_builtins() -> Self {
        let mut repository = Self::new();
        repository.load_module(&crate::functions::builtin_module());
        repository
    }

    /// Register a function, replacing any entry with the same name
    ///
    /// Re-registering the exact same implementation, arity and compiler is a
    /// no-op and keeps the existing id.
    pub fn register(
        &mut self,
        def: FunctionDef,
        compiler: Option<Arc<dyn FunctionCompiler>>,
    ) -> FunctionId {
        let key = def.name.to_ascii_uppercase();

        if let Some(existing) = self.functions.get(&key) {
            if self.is_same_registration(existing, &def, compiler.as_ref()) {
                return existing.id;
            }
            tracing::debug!(function = %key, "replacing function");
            self.compilers.remove(&existing.id);
        }

        let id = FunctionId(self.next_id);
        self.next_id += 1;

        if let Some(compiler) = compiler {
            self.compilers.insert(id, compiler);
        }
        self.functions
            .insert(key, Arc::new(RegisteredFunction { id, def }));
        id
    }

    /// Register every function of a module
    pub fn load_module(&mut self, module: &FunctionModule) {
        tracing::debug!(module = module.name(), functions = module.len(), "loading function module");
        for entry in module.entries() {
            self.register(entry.def.clone(), entry.compiler.clone());
        }
    }

    /// Look up a function by name (case-insensitive)
    pub fn lookup(&self, name: &str) -> Option<&Arc<RegisteredFunction>> {
        self.functions.get(&name.to_ascii_uppercase())
    }

    /// Whether `name` is a registered function
    pub fn is_function_name(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Custom compiler attached to a registration
    pub fn compiler(&self, id: FunctionId) -> Option<&Arc<dyn FunctionCompiler>> {
        self.compilers.get(&id)
    }

    /// Custom compiler of the function currently registered as `name`
    pub fn compiler_for(&self, name: &str) -> Option<&Arc<dyn FunctionCompiler>> {
        self.lookup(name).and_then(|f| self.compiler(f.id))
    }

    /// All registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn is_same_registration(
        &self,
        existing: &RegisteredFunction,
        def: &FunctionDef,
        compiler: Option<&Arc<dyn FunctionCompiler>>,
    ) -> bool {
        let old = &existing.def;
        let same_impl = Arc::as_ptr(&old.implementation) as *const ()
            == Arc::as_ptr(&def.implementation) as *const ();
        let same_compiler = match (self.compilers.get(&existing.id), compiler) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const (),
            _ => false,
        };
        same_impl
            && same_compiler
            && old.min_args == def.min_args
            && old.max_args == def.max_args
            && old.volatile == def.volatile
    }
}

impl fmt::Debug for FunctionRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRepository")
            .field("functions", &self.functions.len())
            .field("compilers", &self.compilers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompiledExpr, WithEvaluator};
    use pretty_assertions::assert_eq;

    fn fn_one(_args: &[FormulaValue], _ctx: &EvaluationContext<'_>) -> FormulaResult<FormulaValue> {
        Ok(FormulaValue::Number(1.0))
    }

    fn fn_two(_args: &[FormulaValue], _ctx: &EvaluationContext<'_>) -> FormulaResult<FormulaValue> {
        Ok(FormulaValue::Number(2.0))
    }

    struct Folding;

    impl FunctionCompiler for Folding {
        fn compile(
            &self,
            _function: &Arc<RegisteredFunction>,
            _args: Vec<CompiledExpr>,
        ) -> FormulaResult<CompiledExpr> {
            Ok(CompiledExpr::Value(FormulaValue::Number(42.0)))
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut repo = FunctionRepository::new();
        repo.register(FunctionDef::new("myFunc", 0, Some(0), fn_one), None);
        assert!(repo.is_function_name("MYFUNC"));
        assert!(repo.is_function_name("myfunc"));
        assert!(!repo.is_function_name("OTHER"));
        assert_eq!(repo.lookup("MyFunc").unwrap().name(), "MYFUNC");
    }

    #[test]
    fn test_replacement_swaps_implementation_and_compiler() {
        let mut repo = FunctionRepository::new();
        let compiler: Arc<dyn FunctionCompiler> = Arc::new(Folding);
        let first = repo.register(
            FunctionDef::new("MYFUNC", 0, None, fn_one),
            Some(compiler.clone()),
        );
        assert!(Arc::ptr_eq(repo.compiler(first).unwrap(), &compiler));

        let second = repo.register(FunctionDef::new("MYFUNC", 0, None, fn_two), None);
        assert_ne!(first, second);
        assert!(repo.compiler(first).is_none());
        assert!(repo.compiler(second).is_none());
        assert_eq!(repo.len(), 1);

        let value = repo
            .lookup("MYFUNC")
            .unwrap()
            .call(&[], &EvaluationContext::detached())
            .unwrap();
        assert_eq!(value, FormulaValue::Number(2.0));
    }

    #[test]
    fn test_module_reload_is_idempotent() {
        let mut module = FunctionModule::new("extras");
        module
            .add(FunctionDef::new("ONE", 0, Some(0), fn_one))
            .add_with_compiler(
                FunctionDef::new("TWO", 0, Some(0), fn_two),
                Arc::new(WithEvaluator::eager()),
            );

        let mut repo = FunctionRepository::new();
        repo.load_module(&module);
        let ids: Vec<_> = ["ONE", "TWO"].iter().map(|n| repo.lookup(n).unwrap().id).collect();
        repo.load_module(&module);
        let again: Vec<_> = ["ONE", "TWO"].iter().map(|n| repo.lookup(n).unwrap().id).collect();

        assert_eq!(ids, again);
        assert_eq!(repo.len(), 2);
        assert!(repo.compiler_for("TWO").is_some());
    }

    #[test]
    fn test_check_arity() {
        let def = FunctionDef::new("ROUND", 1, Some(2), fn_one);
        assert!(def.check_arity(1).is_ok());
        assert!(def.check_arity(2).is_ok());
        match def.check_arity(3) {
            Err(FormulaError::ArgumentCount {
                function,
                expected,
                actual,
            }) => {
                assert_eq!(function, "ROUND");
                assert_eq!(expected, "1 to 2");
                assert_eq!(actual, 3);
            }
            other => panic!("expected ArgumentCount, got {other:?}"),
        }
        assert!(FunctionDef::new("SUM", 1, None, fn_one).check_arity(0).is_err());
    }

    #[test]
    fn test_builtins_are_loaded() {
        let repo = FunctionRepository::with_builtins();
        for name in ["SUM", "IF", "DAYS360", "ROMAN", "VLOOKUP", "DSUM", "NOW"] {
            assert!(repo.is_function_name(name), "{name} missing");
        }
        assert!(repo.lookup("NOW").unwrap().is_volatile());
        assert!(!repo.lookup("SUM").unwrap().is_volatile());
        assert!(repo.compiler_for("IF").is_some());
        assert!(repo.compiler_for("SUM").is_none());
    }
}
