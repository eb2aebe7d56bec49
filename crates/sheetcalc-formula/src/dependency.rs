//! Dependency chain for formula calculation
//!
//! The chain holds every formula cell of a workbook in discovery order, an
//! index from [`CellId`] to chain position, and a calculation order in which
//! every cell comes after the cells it reads. Cells that are not formulas never
//! join the chain; they are leaves that formulas read.
//!
//! Ordering is Tarjan's strongly connected components algorithm run with an
//! explicit stack. Components are emitted dependencies-first, which is exactly
//! a valid calculation order. Every member of a component with more than one
//! cell, or of a single cell that reads itself, is marked circular. Cells that
//! merely read a circular cell are ordered after the cycle and evaluated
//! normally.

use crate::compiler::{CompiledExpr, Reference};
use crate::error::{FormulaError, FormulaResult};
use ahash::AHashMap;
use sheetcalc_core::{CellId, CellRange};
use std::collections::VecDeque;

/// One formula-bearing cell
#[derive(Debug)]
pub struct FormulaCell {
    id: CellId,
    formula: String,
    expr: CompiledExpr,
    position: Option<usize>,
    reads: Vec<CellId>,
    wide_ranges: Vec<(usize, CellRange)>,
    volatile: bool,
}

impl FormulaCell {
    /// Wrap a compiled formula
    ///
    /// Ranges of up to `max_range_cells` cells are expanded into individual
    /// reads. Larger ranges are kept whole and matched against chain members
    /// when the order is computed.
    pub fn new<S: Into<String>>(
        id: CellId,
        formula: S,
        expr: CompiledExpr,
        max_range_cells: u64,
    ) -> Self {
        let mut reads = Vec::new();
        let mut wide_ranges = Vec::new();

        for reference in expr.references() {
            match reference {
                Reference::Cell(cell) => reads.push(cell),
                Reference::Range { sheet, range } if range.cell_count() <= max_range_cells => {
                    reads.extend(range.cells().map(|addr| CellId::from_address(sheet, &addr)))
                }
                Reference::Range { sheet, range } => wide_ranges.push((sheet, range)),
            }
        }
        reads.sort_unstable();
        reads.dedup();

        let volatile = expr.is_volatile();
        Self {
            id,
            formula: formula.into(),
            expr,
            position: None,
            reads,
            wide_ranges,
            volatile,
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn sheet(&self) -> usize {
        self.id.sheet()
    }

    pub fn row(&self) -> u32 {
        self.id.row()
    }

    pub fn col(&self) -> u16 {
        self.id.col()
    }

    /// Formula text the expression was compiled from
    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn expr(&self) -> &CompiledExpr {
        &self.expr
    }

    /// Chain position, assigned by [`DependencyChain::add`]
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// Individual cells read, sorted
    pub fn reads(&self) -> &[CellId] {
        &self.reads
    }

    /// Ranges too large to expand into [`Self::reads`]
    pub fn wide_ranges(&self) -> &[(usize, CellRange)] {
        &self.wide_ranges
    }

    pub fn is_volatile(&self) -> bool {
        self.volatile
    }

    fn reads_wide(&self, id: CellId) -> bool {
        self.wide_ranges
            .iter()
            .any(|(sheet, range)| *sheet == id.sheet() && range.contains(id.row(), id.col()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Unvisited,
    OnStack,
    Done,
}

/// Ordered collection of formula cells with a calculation order
#[derive(Debug, Default)]
pub struct DependencyChain {
    cells: Vec<FormulaCell>,
    index: AHashMap<CellId, usize>,
    /// Member positions each member reads, sorted
    precedents: Vec<Vec<usize>>,
    /// Member positions reading each member, sorted
    dependents: Vec<Vec<usize>>,
    /// Non-member cells and the members that read them
    leaf_readers: AHashMap<CellId, Vec<usize>>,
    calc_order: Vec<usize>,
    circular: Vec<bool>,
    ordered: bool,
}

impl DependencyChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a formula cell and return its position
    ///
    /// Fails with [`FormulaError::DuplicateCell`] if the cell is already a
    /// member. Adding invalidates the calculation order.
    pub fn add(&mut self, mut cell: FormulaCell) -> FormulaResult<usize> {
        if self.index.contains_key(&cell.id) {
            return Err(FormulaError::DuplicateCell(cell.id));
        }
        let position = self.cells.len();
        cell.position = Some(position);
        self.index.insert(cell.id, position);
        self.cells.push(cell);
        self.ordered = false;
        Ok(position)
    }

    /// Remove every member
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Member at `position`
    pub fn get(&self, position: usize) -> Option<&FormulaCell> {
        self.cells.get(position)
    }

    /// Position of a member cell
    pub fn position_of(&self, id: CellId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn contains(&self, id: CellId) -> bool {
        self.index.contains_key(&id)
    }

    /// Members in insertion order
    pub fn cells(&self) -> impl Iterator<Item = &FormulaCell> {
        self.cells.iter()
    }

    /// Whether the calculation order reflects the current members
    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// Calculation order as member positions; empty until computed
    pub fn calc_order(&self) -> &[usize] {
        if self.ordered {
            self.calc_order.as_slice()
        } else {
            &[]
        }
    }

    /// Member positions read by the member at `position`
    pub fn precedents(&self, position: usize) -> &[usize] {
        self.precedents.get(position).map_or(&[][..], Vec::as_slice)
    }

    /// Whether the member at `position` is part of a reference cycle
    pub fn is_circular(&self, position: usize) -> bool {
        self.ordered && self.circular.get(position).copied().unwrap_or(false)
    }

    /// Cycle members, in calculation order
    pub fn circular_cells(&self) -> Vec<CellId> {
        self.calc_order()
            .iter()
            .filter(|&&pos| self.circular[pos])
            .map(|&pos| self.cells[pos].id)
            .collect()
    }

    /// Members whose formula calls a volatile function
    pub fn volatile_cells(&self) -> Vec<CellId> {
        self.cells
            .iter()
            .filter(|c| c.volatile)
            .map(|c| c.id)
            .collect()
    }

    /// Compute the order unless it is already current
    pub fn ensure_order(&mut self) -> FormulaResult<()> {
        if self.ordered {
            return Ok(());
        }
        self.compute_order()
    }

    /// Rebuild edges, calculation order and circular flags
    pub fn compute_order(&mut self) -> FormulaResult<()> {
        self.verify_index()?;
        self.build_edges();

        let n = self.cells.len();
        let mut state = vec![VisitState::Unvisited; n];
        let mut disc = vec![0usize; n];
        let mut low = vec![0usize; n];
        let mut counter = 0usize;
        let mut stack: Vec<usize> = Vec::new();
        let mut frames: Vec<(usize, usize)> = Vec::new();
        let mut order = Vec::with_capacity(n);
        let mut circular = vec![false; n];

        for root in 0..n {
            if state[root] != VisitState::Unvisited {
                continue;
            }

            state[root] = VisitState::OnStack;
            disc[root] = counter;
            low[root] = counter;
            counter += 1;
            stack.push(root);
            frames.push((root, 0));

            while let Some(&(v, edge)) = frames.last() {
                if let Some(&w) = self.precedents[v].get(edge) {
                    let top = frames.len() - 1;
                    frames[top].1 += 1;
                    match state[w] {
                        VisitState::Unvisited => {
                            state[w] = VisitState::OnStack;
                            disc[w] = counter;
                            low[w] = counter;
                            counter += 1;
                            stack.push(w);
                            frames.push((w, 0));
                        }
                        VisitState::OnStack => low[v] = low[v].min(disc[w]),
                        VisitState::Done => {}
                    }
                    continue;
                }

                frames.pop();
                if let Some(&(parent, _)) = frames.last() {
                    low[parent] = low[parent].min(low[v]);
                }
                if low[v] != disc[v] {
                    continue;
                }

                // v roots a component
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    state[w] = VisitState::Done;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                component.sort_unstable();

                let is_cycle = component.len() > 1 || self.precedents[v].binary_search(&v).is_ok();
                if is_cycle {
                    for &w in &component {
                        circular[w] = true;
                    }
                }
                order.extend(component);
            }
        }

        if order.len() != n {
            return Err(FormulaError::ChainCorrupted(format!(
                "ordered {} of {} cells",
                order.len(),
                n
            )));
        }

        let cycles = circular.iter().filter(|&&c| c).count();
        tracing::debug!(cells = n, circular = cycles, "computed calculation order");

        self.calc_order = order;
        self.circular = circular;
        self.ordered = true;
        Ok(())
    }

    /// Positions to re-evaluate after `dirty` changed, in calculation order
    ///
    /// A dirty cell reaches every member that reads it directly, through a
    /// range, or through a chain of other members. Dirty cells that are
    /// members themselves are included. Returns nothing until the order has
    /// been computed.
    pub fn reachable_from(&self, dirty: &[CellId]) -> Vec<usize> {
        if !self.ordered {
            return Vec::new();
        }

        let mut reached = vec![false; self.cells.len()];
        let mut queue = VecDeque::new();
        let mut seed = |pos: usize, queue: &mut VecDeque<usize>| {
            if !reached[pos] {
                reached[pos] = true;
                queue.push_back(pos);
            }
        };

        for &id in dirty {
            if let Some(pos) = self.position_of(id) {
                seed(pos, &mut queue);
                continue;
            }
            for &pos in self.leaf_readers.get(&id).into_iter().flatten() {
                seed(pos, &mut queue);
            }
            for (pos, cell) in self.cells.iter().enumerate() {
                if cell.reads_wide(id) {
                    seed(pos, &mut queue);
                }
            }
        }

        while let Some(pos) = queue.pop_front() {
            for &dependent in &self.dependents[pos] {
                seed(dependent, &mut queue);
            }
        }

        self.calc_order
            .iter()
            .copied()
            .filter(|&pos| reached[pos])
            .collect()
    }

    fn verify_index(&self) -> FormulaResult<()> {
        if self.index.len() != self.cells.len() {
            return Err(FormulaError::ChainCorrupted(format!(
                "index has {} entries for {} cells",
                self.index.len(),
                self.cells.len()
            )));
        }
        for (pos, cell) in self.cells.iter().enumerate() {
            if cell.position != Some(pos) || self.index.get(&cell.id) != Some(&pos) {
                return Err(FormulaError::ChainCorrupted(format!(
                    "cell {} is not indexed at position {pos}",
                    cell.id
                )));
            }
        }
        Ok(())
    }

    fn build_edges(&mut self) {
        let n = self.cells.len();
        let mut precedents = vec![Vec::new(); n];
        let mut dependents = vec![Vec::new(); n];
        let mut leaf_readers: AHashMap<CellId, Vec<usize>> = AHashMap::new();

        for (pos, cell) in self.cells.iter().enumerate() {
            for &id in &cell.reads {
                match self.index.get(&id) {
                    Some(&target) => precedents[pos].push(target),
                    None => leaf_readers.entry(id).or_default().push(pos),
                }
            }
            if !cell.wide_ranges.is_empty() {
                precedents[pos].extend(
                    self.cells
                        .iter()
                        .enumerate()
                        .filter(|(_, other)| cell.reads_wide(other.id))
                        .map(|(target, _)| target),
                );
            }
            precedents[pos].sort_unstable();
            precedents[pos].dedup();
        }

        for (pos, targets) in precedents.iter().enumerate() {
            for &target in targets {
                dependents[target].push(pos);
            }
        }

        self.precedents = precedents;
        self.dependents = dependents;
        self.leaf_readers = leaf_readers;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FormulaValue;
    use pretty_assertions::assert_eq;

    fn id(row: u32, col: u16) -> CellId {
        CellId::new(0, row, col)
    }

    /// Formula cell reading the given cells
    fn reader(cell: CellId, reads: &[CellId]) -> FormulaCell {
        let expr = reads
            .iter()
            .map(|&r| CompiledExpr::Cell(r))
            .reduce(|left, right| CompiledExpr::Binary {
                op: crate::ast::BinaryOperator::Add,
                left: Box::new(left),
                right: Box::new(right),
            })
            .unwrap_or(CompiledExpr::Value(FormulaValue::Number(0.0)));
        FormulaCell::new(cell, "=test", expr, 100)
    }

    fn order_ids(chain: &DependencyChain) -> Vec<CellId> {
        chain
            .calc_order()
            .iter()
            .map(|&p| chain.get(p).unwrap().id())
            .collect()
    }

    #[test]
    fn test_duplicate_cell_is_rejected() {
        let mut chain = DependencyChain::new();
        assert_eq!(chain.add(reader(id(0, 0), &[])).unwrap(), 0);
        assert!(matches!(
            chain.add(reader(id(0, 0), &[])),
            Err(FormulaError::DuplicateCell(c)) if c == id(0, 0)
        ));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_linear_chain_orders_dependencies_first() {
        // C1 = B1, B1 = A1, A1 = A5 (a leaf)
        let mut chain = DependencyChain::new();
        chain.add(reader(id(0, 2), &[id(0, 1)])).unwrap();
        chain.add(reader(id(0, 1), &[id(0, 0)])).unwrap();
        chain.add(reader(id(0, 0), &[id(4, 0)])).unwrap();
        chain.compute_order().unwrap();

        assert_eq!(order_ids(&chain), vec![id(0, 0), id(0, 1), id(0, 2)]);
        assert!(chain.circular_cells().is_empty());
    }

    #[test]
    fn test_independent_cells_keep_insertion_order() {
        let mut chain = DependencyChain::new();
        for col in [3, 1, 2] {
            chain.add(reader(id(0, col), &[])).unwrap();
        }
        chain.compute_order().unwrap();
        assert_eq!(chain.calc_order(), &[0, 1, 2]);
    }

    #[test]
    fn test_cycle_members_are_marked_but_not_dependents() {
        // A1 <-> B1 cycle, C1 reads B1, D1 reads itself
        let mut chain = DependencyChain::new();
        chain.add(reader(id(0, 0), &[id(0, 1)])).unwrap();
        chain.add(reader(id(0, 1), &[id(0, 0)])).unwrap();
        chain.add(reader(id(0, 2), &[id(0, 1)])).unwrap();
        chain.add(reader(id(0, 3), &[id(0, 3)])).unwrap();
        chain.compute_order().unwrap();

        assert_eq!(order_ids(&chain), vec![id(0, 0), id(0, 1), id(0, 2), id(0, 3)]);
        assert!(chain.is_circular(0));
        assert!(chain.is_circular(1));
        assert!(!chain.is_circular(2));
        assert!(chain.is_circular(3));
        assert_eq!(chain.circular_cells(), vec![id(0, 0), id(0, 1), id(0, 3)]);
    }

    #[test]
    fn test_wide_ranges_create_edges() {
        let mut chain = DependencyChain::new();
        let wide = CompiledExpr::Range {
            sheet: 0,
            range: CellRange::from_indices(0, 0, 999, 0),
        };
        chain
            .add(FormulaCell::new(id(0, 5), "=SUM(A1:A1000)", wide, 100))
            .unwrap();
        chain.add(reader(id(500, 0), &[id(2, 3)])).unwrap();
        chain.compute_order().unwrap();

        assert_eq!(chain.get(0).unwrap().wide_ranges().len(), 1);
        assert_eq!(chain.precedents(0), &[1]);
        assert_eq!(order_ids(&chain), vec![id(500, 0), id(0, 5)]);

        // A leaf inside the wide range reaches the reader
        assert_eq!(chain.reachable_from(&[id(10, 0)]), vec![0]);
        // The leaf read by A501 reaches both
        assert_eq!(chain.reachable_from(&[id(2, 3)]), vec![1, 0]);
    }

    #[test]
    fn test_reachable_from_skips_unrelated_cells() {
        // B1 = A1, C1 = B1, E1 = D1
        let mut chain = DependencyChain::new();
        chain.add(reader(id(0, 1), &[id(0, 0)])).unwrap();
        chain.add(reader(id(0, 2), &[id(0, 1)])).unwrap();
        chain.add(reader(id(0, 4), &[id(0, 3)])).unwrap();
        chain.compute_order().unwrap();

        assert_eq!(chain.reachable_from(&[id(0, 0)]), vec![0, 1]);
        assert_eq!(chain.reachable_from(&[id(0, 3)]), vec![2]);
        assert_eq!(chain.reachable_from(&[id(0, 1)]), vec![0, 1]);
        assert!(chain.reachable_from(&[id(9, 9)]).is_empty());
    }

    #[test]
    fn test_adding_invalidates_order() {
        let mut chain = DependencyChain::new();
        chain.add(reader(id(0, 0), &[])).unwrap();
        chain.ensure_order().unwrap();
        assert!(chain.is_ordered());
        chain.add(reader(id(0, 1), &[id(0, 0)])).unwrap();
        assert!(!chain.is_ordered());
        assert!(chain.calc_order().is_empty());
        chain.ensure_order().unwrap();
        assert_eq!(chain.calc_order(), &[0, 1]);
    }

    #[test]
    fn test_volatile_flag_comes_from_expression() {
        let cell = reader(id(0, 0), &[id(1, 1), id(1, 1), id(0, 5)]);
        assert!(!cell.is_volatile());
        assert_eq!(cell.reads(), &[id(0, 5), id(1, 1)]);
    }
}
