//! Ordering and recalculation properties over generated dependency graphs
//!
//! Formula `i` lives in column A at a shuffled row and adds `i` to the cells it
//! reads. Leaf values live in B1:B4.

use proptest::prelude::*;
use sheetcalc::prelude::*;
use std::collections::BTreeSet;

const LEAVES: usize = 4;
const CASES: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Leaf(usize),
    Formula(usize),
}

#[derive(Debug, Clone)]
struct Graph {
    leaves: Vec<f64>,
    reads: Vec<Vec<Target>>,
    rows: Vec<u32>,
}

impl Graph {
    fn formula_id(&self, i: usize) -> CellId {
        CellId::new(0, self.rows[i], 0)
    }

    fn leaf_id(leaf: usize) -> CellId {
        CellId::new(0, leaf as u32, 1)
    }

    fn formula_text(&self, i: usize) -> String {
        let mut terms: Vec<String> = self.reads[i]
            .iter()
            .map(|t| match *t {
                Target::Leaf(k) => format!("B{}", k + 1),
                Target::Formula(j) => format!("A{}", self.rows[j] + 1),
            })
            .collect();
        terms.push(i.to_string());
        format!("={}", terms.join("+"))
    }

    fn workbook(&self) -> Workbook {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        for (k, v) in self.leaves.iter().enumerate() {
            sheet.set_cell_value_at(k as u32, 1, *v).unwrap();
        }
        for i in 0..self.reads.len() {
            sheet
                .set_cell_formula_at(self.rows[i], 0, &self.formula_text(i))
                .unwrap();
        }
        wb
    }

    /// Values for an acyclic graph, where formulas only read lower indices
    fn expected(&self) -> Vec<f64> {
        let mut values: Vec<f64> = Vec::with_capacity(self.reads.len());
        for (i, reads) in self.reads.iter().enumerate() {
            let sum: f64 = reads
                .iter()
                .map(|t| match *t {
                    Target::Leaf(k) => self.leaves[k],
                    Target::Formula(j) => values[j],
                })
                .sum();
            values.push(sum + i as f64);
        }
        values
    }

    /// Formulas that can reach themselves through other formulas
    fn cycle_members(&self) -> BTreeSet<usize> {
        let n = self.reads.len();
        (0..n)
            .filter(|&start| {
                let mut seen = vec![false; n];
                let mut stack = vec![start];
                while let Some(i) = stack.pop() {
                    for t in &self.reads[i] {
                        if let Target::Formula(j) = *t {
                            if j == start {
                                return true;
                            }
                            if !seen[j] {
                                seen[j] = true;
                                stack.push(j);
                            }
                        }
                    }
                }
                false
            })
            .collect()
    }
}

/// Random graph with `n` formulas; `acyclic` restricts reads to lower indices
fn graph(acyclic: bool) -> impl Strategy<Value = Graph> {
    (1usize..16)
        .prop_flat_map(|n| {
            (
                prop::collection::vec(-50i32..50, LEAVES),
                prop::collection::vec(
                    prop::collection::vec((any::<bool>(), 0usize..64), 0..4),
                    n,
                ),
                Just((0..n as u32).collect::<Vec<_>>()).prop_shuffle(),
            )
        })
        .prop_map(move |(leaves, raw, rows)| {
            let n = raw.len();
            let reads = raw
                .into_iter()
                .enumerate()
                .map(|(i, targets)| {
                    targets
                        .into_iter()
                        .map(|(formula, k)| match (formula, acyclic) {
                            (true, false) => Target::Formula(k % n),
                            (true, true) if i > 0 => Target::Formula(k % i),
                            _ => Target::Leaf(k % LEAVES),
                        })
                        .collect()
                })
                .collect();
            Graph {
                leaves: leaves.into_iter().map(f64::from).collect(),
                reads,
                rows,
            }
        })
}

fn formula_values(graph: &Graph, wb: &Workbook) -> Vec<CellValue> {
    (0..graph.reads.len())
        .map(|i| wb.value(graph.formula_id(i)))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: CASES,
        .. ProptestConfig::default()
    })]

    #[test]
    fn calc_order_is_topological(graph in graph(true)) {
        let mut wb = graph.workbook();
        let mut engine = CalculationEngine::default();
        engine.calculate_all(&mut wb).unwrap();

        let chain = engine.chain();
        let order = chain.calc_order();
        prop_assert_eq!(order.len(), graph.reads.len());

        let mut rank = vec![usize::MAX; order.len()];
        for (r, &pos) in order.iter().enumerate() {
            rank[pos] = r;
        }
        for &pos in order {
            for &read in chain.precedents(pos) {
                prop_assert!(rank[read] < rank[pos]);
            }
        }

        let expected: Vec<CellValue> =
            graph.expected().into_iter().map(CellValue::Number).collect();
        prop_assert_eq!(formula_values(&graph, &wb), expected);
    }

    #[test]
    fn partial_matches_full(
        graph in graph(true),
        edits in prop::collection::vec((0usize..LEAVES, -50i32..50), 1..4),
    ) {
        let mut partial = graph.workbook();
        let mut engine = CalculationEngine::default();
        engine.calculate_all(&mut partial).unwrap();

        let mut edited = graph.clone();
        let mut dirty = Vec::new();
        for &(leaf, v) in &edits {
            edited.leaves[leaf] = f64::from(v);
            partial
                .worksheet_mut(0)
                .unwrap()
                .set_cell_value_at(leaf as u32, 1, f64::from(v))
                .unwrap();
            dirty.push(Graph::leaf_id(leaf));
        }
        let stats = engine.calculate_dirty(&mut partial, &dirty).unwrap();
        prop_assert!(!stats.rebuilt);

        let mut full = edited.workbook();
        full.calculate().unwrap();

        prop_assert_eq!(formula_values(&edited, &partial), formula_values(&edited, &full));
    }

    #[test]
    fn recalculating_clean_chain_changes_nothing(graph in graph(true)) {
        let mut wb = graph.workbook();
        let mut engine = CalculationEngine::default();
        engine.calculate_all(&mut wb).unwrap();
        let before = formula_values(&graph, &wb);

        let stats = engine.calculate_dirty(&mut wb, &[]).unwrap();
        prop_assert_eq!(stats.cells_calculated, 0);
        prop_assert_eq!(formula_values(&graph, &wb), before);
    }

    #[test]
    fn only_cycle_members_are_circular(graph in graph(false)) {
        let mut wb = graph.workbook();
        let mut engine = CalculationEngine::default();
        engine.calculate_all(&mut wb).unwrap();

        let members = graph.cycle_members();
        let expected: BTreeSet<CellId> = members.iter().map(|&i| graph.formula_id(i)).collect();
        let circular: BTreeSet<CellId> = engine.chain().circular_cells().into_iter().collect();
        prop_assert_eq!(&circular, &expected);

        for &i in &members {
            prop_assert_eq!(
                wb.value(graph.formula_id(i)),
                CellValue::Error(CellError::Circular)
            );
        }

        let first = formula_values(&graph, &wb);
        engine.calculate_all(&mut wb).unwrap();
        prop_assert_eq!(formula_values(&graph, &wb), first);
    }
}
