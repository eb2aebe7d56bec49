//! Workbook calculation engine
//!
//! [`CalculationEngine`] keeps a [`DependencyChain`] between passes. A full
//! pass rebuilds the chain from the store and evaluates every formula in
//! calculation order. A partial pass evaluates only the formulas reachable from
//! a set of dirty cells, rebuilding first if any dirty cell gained, lost or
//! changed its formula.
//!
//! # Example
//!
//! ```rust
//! use sheetcalc::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 10.0).unwrap();
//! sheet.set_cell_value("A2", 20.0).unwrap();
//! sheet.set_cell_formula("A3", "=A1+A2").unwrap();
//!
//! let mut engine = CalculationEngine::default();
//! let stats = engine.calculate_all(&mut workbook).unwrap();
//! assert_eq!(stats.cells_calculated, 1);
//!
//! workbook.worksheet_mut(0).unwrap().set_cell_value("A1", 15.0).unwrap();
//! engine.calculate_dirty(&mut workbook, &[CellId::new(0, 0, 0)]).unwrap();
//! assert_eq!(workbook.value(CellId::new(0, 2, 0)), CellValue::Number(35.0));
//! ```

use crate::error::{Error, Result};
use ahash::AHashMap;
use sheetcalc_core::{CellError, CellId, CellStore, Workbook};
use sheetcalc_formula::{
    parse_formula, Compiler, DependencyChain, EvaluationContext, FormulaCell, FormulaError,
    FormulaLogger, FormulaResult, FormulaValue, FunctionDiagnostics, FunctionModule,
    FunctionRepository, DEFAULT_MAX_RANGE_CELLS,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Options for workbook calculation
#[derive(Debug, Clone)]
pub struct CalculationOptions {
    /// Evaluate every formula even when only some cells are dirty
    pub force_full_calculation: bool,
    /// Include volatile functions in every partial pass (NOW, TODAY, RAND, etc.)
    pub calculate_volatile: bool,
    /// Count function calls while a logger is attached
    pub collect_diagnostics: bool,
    /// Ranges with more cells than this are tracked whole instead of cell by
    /// cell, and clamped to the sheet's used area when read
    pub max_range_cells: u64,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self {
            force_full_calculation: false,
            calculate_volatile: true,
            collect_diagnostics: true,
            max_range_cells: DEFAULT_MAX_RANGE_CELLS,
        }
    }
}

/// Statistics from a calculation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculationStats {
    /// Total number of formula cells
    pub formula_count: usize,
    /// Number of cells calculated
    pub cells_calculated: usize,
    /// Number of cells that are part of a reference cycle
    pub circular_references: usize,
    /// Number of cells calling a volatile function
    pub volatile_cells: usize,
    /// Parse, compile and evaluation failures
    pub errors: usize,
    /// Whether the dependency chain was rebuilt
    pub rebuilt: bool,
}

/// Shared flag for stopping a pass between cells
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the running (or next) pass to stop
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Extension trait for Workbook to add calculation methods
pub trait WorkbookCalculationExt {
    /// Calculate all formulas in the workbook with default options
    fn calculate(&mut self) -> Result<CalculationStats>;

    /// Calculate all formulas with custom options
    fn calculate_with_options(&mut self, options: &CalculationOptions) -> Result<CalculationStats>;
}

impl WorkbookCalculationExt for Workbook {
    fn calculate(&mut self) -> Result<CalculationStats> {
        self.calculate_with_options(&CalculationOptions::default())
    }

    fn calculate_with_options(&mut self, options: &CalculationOptions) -> Result<CalculationStats> {
        let mut engine = CalculationEngine::new(options.clone());
        engine.calculate_all(self)
    }
}

/// The calculation engine
pub struct CalculationEngine {
    options: CalculationOptions,
    repository: FunctionRepository,
    chain: DependencyChain,
    /// Formulas that failed to parse or compile: text and stored error
    rejected: AHashMap<CellId, (String, CellError)>,
    /// Cells a cancelled pass did not reach
    pending: Vec<CellId>,
    built: bool,
    diagnostics: FunctionDiagnostics,
    logger: Option<Arc<dyn FormulaLogger>>,
    cancel: CancellationToken,
}

impl Default for CalculationEngine {
    fn default() -> Self {
        Self::new(CalculationOptions::default())
    }
}

impl CalculationEngine {
    /// Engine with the built-in function library
    pub fn new(options: CalculationOptions) -> Self {
        Self::with_repository(FunctionRepository::with_builtins(), options)
    }

    /// Engine resolving functions through `repository`
    pub fn with_repository(repository: FunctionRepository, options: CalculationOptions) -> Self {
        Self {
            options,
            repository,
            chain: DependencyChain::new(),
            rejected: AHashMap::new(),
            pending: Vec::new(),
            built: false,
            diagnostics: FunctionDiagnostics::new(),
            logger: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn options(&self) -> &CalculationOptions {
        &self.options
    }

    /// Replace the options; the next pass rebuilds the chain
    pub fn set_options(&mut self, options: CalculationOptions) {
        self.options = options;
        self.invalidate();
    }

    pub fn repository(&self) -> &FunctionRepository {
        &self.repository
    }

    /// Mutable access to the function repository
    ///
    /// Compiled formulas may refer to replaced functions, so the next pass
    /// rebuilds the chain.
    pub fn repository_mut(&mut self) -> &mut FunctionRepository {
        self.invalidate();
        &mut self.repository
    }

    /// Load a function module, replacing same-named functions
    pub fn load_module(&mut self, module: &FunctionModule) {
        self.repository.load_module(module);
        self.invalidate();
    }

    /// The dependency chain built by the last full or structural pass
    pub fn chain(&self) -> &DependencyChain {
        &self.chain
    }

    /// Send cell errors and per-function totals to `logger`
    pub fn attach_logger(&mut self, logger: Arc<dyn FormulaLogger>) {
        self.logger = Some(logger);
    }

    pub fn detach_logger(&mut self) {
        self.logger = None;
    }

    /// Token that stops a pass before the next cell is evaluated
    ///
    /// A cancelled pass clears the flag when it returns
    /// [`Error::Cancelled`], and the cells it skipped are evaluated by the
    /// next partial pass.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Force the next pass to rebuild the chain
    pub fn invalidate(&mut self) {
        self.built = false;
    }

    /// Rebuild the chain and evaluate every formula
    pub fn calculate_all<S: CellStore>(&mut self, store: &mut S) -> Result<CalculationStats> {
        let mut stats = CalculationStats::default();
        self.rebuild(store, &mut stats)?;
        let order = self.chain.calc_order().to_vec();
        tracing::debug!(cells = order.len(), "full recalculation");
        self.run(store, &order, &mut stats)?;
        Ok(stats)
    }

    /// Evaluate the formulas affected by changes to `dirty`
    ///
    /// Falls back to [`Self::calculate_all`] before the first pass or when
    /// [`CalculationOptions::force_full_calculation`] is set.
    pub fn calculate_dirty<S: CellStore>(
        &mut self,
        store: &mut S,
        dirty: &[CellId],
    ) -> Result<CalculationStats> {
        if !self.built || self.options.force_full_calculation {
            return self.calculate_all(store);
        }

        let mut stats = CalculationStats::default();
        // Cells a cancelled pass skipped survive a rebuild as seeds
        let pending = std::mem::take(&mut self.pending);
        let prepared = if dirty.iter().any(|&id| self.formula_changed(&*store, id)) {
            self.rebuild(store, &mut stats)
        } else {
            self.chain.ensure_order().map_err(Error::from)
        };
        if let Err(err) = prepared {
            self.pending = pending;
            return Err(err);
        }

        let mut seeds = dirty.to_vec();
        seeds.extend(pending);
        if self.options.calculate_volatile {
            seeds.extend(self.chain.volatile_cells());
        }
        let positions = self.chain.reachable_from(&seeds);
        tracing::debug!(
            dirty = dirty.len(),
            cells = positions.len(),
            "partial recalculation"
        );
        self.run(store, &positions, &mut stats)?;
        Ok(stats)
    }

    /// Whether the formula stored at `id` differs from the one compiled
    fn formula_changed<S: CellStore>(&self, store: &S, id: CellId) -> bool {
        let compiled = match self.chain.position_of(id) {
            Some(pos) => self.chain.get(pos).map(FormulaCell::formula),
            None => self.rejected.get(&id).map(|(text, _)| text.as_str()),
        };
        store.formula_text(id) != compiled
    }

    fn compile_cell<S: CellStore>(
        &self,
        store: &S,
        id: CellId,
        text: &str,
    ) -> FormulaResult<FormulaCell> {
        let ast = parse_formula(text)?;
        let expr = Compiler::new(&self.repository, store, id.sheet()).compile(&ast)?;
        Ok(FormulaCell::new(id, text, expr, self.options.max_range_cells))
    }

    /// Recreate the chain from the formulas in `store`
    ///
    /// Formulas that do not parse or compile stay out of the chain and get
    /// their error code written immediately.
    fn rebuild<S: CellStore>(&mut self, store: &mut S, stats: &mut CalculationStats) -> Result<()> {
        self.chain.clear();
        self.rejected.clear();
        self.pending.clear();

        for id in store.formula_cells() {
            let Some(text) = store.formula_text(id) else {
                continue;
            };
            match self.compile_cell(&*store, id, text) {
                Ok(cell) => {
                    self.chain.add(cell)?;
                }
                Err(err) => {
                    tracing::warn!(cell = %id, formula = text, error = %err, "formula rejected");
                    self.report_error(id, &err);
                    stats.errors += 1;
                    self.rejected
                        .insert(id, (text.to_string(), err.cell_error()));
                }
            }
        }

        self.chain.compute_order()?;
        for (&id, (_, error)) in &self.rejected {
            store.set_computed_value(id, (*error).into())?;
        }

        self.built = true;
        stats.rebuilt = true;
        tracing::debug!(
            formulas = self.chain.len(),
            rejected = self.rejected.len(),
            "rebuilt dependency chain"
        );
        Ok(())
    }

    /// Evaluate `positions` in order and commit each result
    fn run<S: CellStore>(
        &mut self,
        store: &mut S,
        positions: &[usize],
        stats: &mut CalculationStats,
    ) -> Result<()> {
        let collect = self.options.collect_diagnostics && self.logger.is_some();

        for (done, &pos) in positions.iter().enumerate() {
            if self.cancel.is_cancelled() {
                self.cancel.reset();
                self.pending = positions[done..]
                    .iter()
                    .filter_map(|&p| self.chain.get(p))
                    .map(FormulaCell::id)
                    .collect();
                self.flush_diagnostics();
                tracing::debug!(evaluated = done, "calculation cancelled");
                return Err(Error::Cancelled { evaluated: done });
            }

            let cell = self.chain.get(pos).ok_or_else(|| {
                FormulaError::ChainCorrupted(format!("no cell at position {pos}"))
            })?;
            let id = cell.id();

            let value = if self.chain.is_circular(pos) {
                FormulaValue::Error(CellError::Circular)
            } else {
                let mut ctx = EvaluationContext::new(&*store, id)
                    .with_max_range_cells(self.options.max_range_cells);
                if collect {
                    ctx = ctx.with_diagnostics(&self.diagnostics);
                }
                match cell.expr().evaluate(&ctx) {
                    Ok(value) => value,
                    Err(err) if err.is_structural() => return Err(err.into()),
                    Err(err) => {
                        tracing::warn!(cell = %id, error = %err, "evaluation failed");
                        self.report_error(id, &err);
                        stats.errors += 1;
                        FormulaValue::Error(err.cell_error())
                    }
                }
            };

            tracing::trace!(cell = %id, ?value, "calculated");
            store.set_computed_value(id, value.into())?;
            stats.cells_calculated += 1;
        }

        self.flush_diagnostics();
        stats.formula_count = self.chain.len() + self.rejected.len();
        stats.circular_references = self.chain.circular_cells().len();
        if self.options.calculate_volatile {
            stats.volatile_cells = self.chain.volatile_cells().len();
        }
        Ok(())
    }

    fn report_error(&self, id: CellId, err: &FormulaError) {
        if let Some(logger) = &self.logger {
            logger.log_error(&id.to_string(), err);
        }
    }

    fn flush_diagnostics(&self) {
        if let Some(logger) = &self.logger {
            if !self.diagnostics.is_empty() {
                self.diagnostics.flush(logger.as_ref());
            }
        }
    }
}
