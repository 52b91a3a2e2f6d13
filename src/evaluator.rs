use crate::calculator::compute_leaf_total;
use crate::error::{Result, StatementError};
use crate::ingestion::BalanceRow;
use crate::schema::{FormulaTerm, LineItem, LineKind, StatementType, ValueKind};
use crate::statement::LineValue;
use log::debug;
use std::collections::HashMap;

/// Resolves statement lines against one trial balance.
///
/// Values are memoized for the lifetime of the evaluator, which is one statement build: a
/// total referenced by several formulas is computed once. Nothing is shared between builds.
pub struct FormulaEvaluator<'a> {
    statement: StatementType,
    kind: ValueKind,
    items: HashMap<&'a str, &'a LineItem>,
    rows: &'a [BalanceRow],
    cache: HashMap<String, LineValue>,
    in_progress: Vec<String>,
}

impl<'a> FormulaEvaluator<'a> {
    pub fn new(statement: StatementType, items: &'a [LineItem], rows: &'a [BalanceRow]) -> Self {
        let mut index = HashMap::with_capacity(items.len());
        for item in items {
            index.entry(item.reference.as_str()).or_insert(item);
        }

        Self {
            statement,
            kind: statement.value_kind(),
            items: index,
            rows,
            cache: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    /// The comparable figure of a line: `net` on the balance sheet, `montant` elsewhere.
    pub fn evaluate(&mut self, reference: &str) -> Result<f64> {
        Ok(self.value(reference)?.comparable())
    }

    pub fn value(&mut self, reference: &str) -> Result<LineValue> {
        if let Some(value) = self.cache.get(reference) {
            return Ok(*value);
        }

        if let Some(pos) = self.in_progress.iter().position(|r| r == reference) {
            let mut cycle = self.in_progress[pos..].to_vec();
            cycle.push(reference.to_string());
            return Err(StatementError::CircularFormula { cycle });
        }

        let item: &'a LineItem =
            self.items
                .get(reference)
                .copied()
                .ok_or_else(|| StatementError::UnknownReference {
                    statement: self.statement.to_string(),
                    reference: reference.to_string(),
                })?;

        let value = match &item.kind {
            LineKind::Accounts { prefixes } => compute_leaf_total(self.rows, prefixes, self.kind),
            LineKind::Formula { terms } => {
                self.in_progress.push(reference.to_string());
                let result = self.sum_terms(terms);
                self.in_progress.pop();
                result?
            }
        };

        debug!(
            "{} {} = {}",
            self.statement,
            reference,
            value.comparable()
        );
        self.cache.insert(reference.to_string(), value);
        Ok(value)
    }

    fn sum_terms(&mut self, terms: &[FormulaTerm]) -> Result<LineValue> {
        let mut total = LineValue::zero(self.kind);
        for term in terms {
            let value = self.value(&term.reference)?;
            total = total.add_scaled(value, term.sign.factor());
        }
        Ok(total)
    }

    pub fn evaluated_count(&self) -> usize {
        self.cache.len()
    }
}

/// One-shot evaluation of a single reference.
pub fn evaluate(
    statement: StatementType,
    reference: &str,
    items: &[LineItem],
    rows: &[BalanceRow],
) -> Result<f64> {
    FormulaEvaluator::new(statement, items, rows).evaluate(reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marge_items() -> Vec<LineItem> {
        vec![
            LineItem::accounts("TA", "Ventes de marchandises", &["701"]),
            LineItem::accounts("RA", "Achats de marchandises", &["601"]),
            LineItem::accounts("RB", "Variation de stocks de marchandises", &["6031"]),
            LineItem::formula(
                "XA",
                "MARGE COMMERCIALE",
                vec![
                    FormulaTerm::plus("TA"),
                    FormulaTerm::minus("RA"),
                    FormulaTerm::minus("RB"),
                ],
            ),
            LineItem::formula(
                "XB",
                "CHIFFRE D'AFFAIRES",
                vec![FormulaTerm::plus("TA")],
            ),
            LineItem::formula(
                "XC",
                "VALEUR AJOUTEE",
                vec![FormulaTerm::plus("XB"), FormulaTerm::minus("RA")],
            ),
            LineItem::formula(
                "XZ",
                "TOTAL",
                vec![FormulaTerm::plus("XA"), FormulaTerm::plus("XC")],
            ),
        ]
    }

    #[test]
    fn test_marge_commerciale() {
        let items = marge_items();
        let rows = vec![
            BalanceRow::new("701").with_solde(1000.0),
            BalanceRow::new("601").with_solde(400.0),
        ];
        let mut evaluator = FormulaEvaluator::new(StatementType::CompteResultat, &items, &rows);

        assert_eq!(evaluator.evaluate("TA").unwrap(), 1000.0);
        assert_eq!(evaluator.evaluate("RA").unwrap(), 400.0);
        assert_eq!(evaluator.evaluate("XA").unwrap(), 600.0);
    }

    #[test]
    fn test_subtracted_line_decreases_total() {
        let items = marge_items();
        let base = vec![
            BalanceRow::new("701").with_solde(1000.0),
            BalanceRow::new("601").with_solde(400.0),
        ];
        let mut more_purchases = base.clone();
        more_purchases.push(BalanceRow::new("6011").with_solde(150.0));

        let before = evaluate(StatementType::CompteResultat, "XA", &items, &base).unwrap();
        let after = evaluate(StatementType::CompteResultat, "XA", &items, &more_purchases).unwrap();
        assert_eq!(before - after, 150.0);
    }

    #[test]
    fn test_shared_totals_are_evaluated_once() {
        let items = marge_items();
        let rows = vec![BalanceRow::new("701").with_solde(10.0)];
        let mut evaluator = FormulaEvaluator::new(StatementType::CompteResultat, &items, &rows);

        assert_eq!(evaluator.evaluate("XZ").unwrap(), 20.0);
        // XZ, XA, XC, XB, TA, RA, RB: each once, although TA and RA are reached twice.
        assert_eq!(evaluator.evaluated_count(), 7);
    }

    #[test]
    fn test_cycle_is_reported_with_its_path() {
        let items = vec![
            LineItem::formula("XA", "A", vec![FormulaTerm::plus("XB")]),
            LineItem::formula("XB", "B", vec![FormulaTerm::plus("XC")]),
            LineItem::formula("XC", "C", vec![FormulaTerm::minus("XA")]),
        ];
        let result = evaluate(StatementType::CompteResultat, "XA", &items, &[]);

        match result {
            Err(StatementError::CircularFormula { cycle }) => {
                assert_eq!(cycle, vec!["XA", "XB", "XC", "XA"]);
            }
            other => panic!("expected a circular formula error, got {:?}", other),
        }
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let items = vec![LineItem::formula("XA", "A", vec![FormulaTerm::plus("XA")])];
        let result = evaluate(StatementType::FluxTresorerie, "XA", &items, &[]);
        assert!(matches!(result, Err(StatementError::CircularFormula { .. })));
    }

    #[test]
    fn test_unknown_reference() {
        let items = vec![LineItem::formula("XA", "A", vec![FormulaTerm::plus("TA")])];
        let result = evaluate(StatementType::CompteResultat, "XA", &items, &[]);
        assert!(matches!(
            result,
            Err(StatementError::UnknownReference { ref reference, .. }) if reference == "TA"
        ));
    }

    #[test]
    fn test_bilan_totals_keep_all_columns() {
        let items = vec![
            LineItem::accounts("AJ", "Terrains", &["22"]),
            LineItem::accounts("AN", "Matériel de transport", &["245"]),
            LineItem::formula(
                "AI",
                "IMMOBILISATIONS CORPORELLES",
                vec![FormulaTerm::plus("AJ"), FormulaTerm::plus("AN")],
            ),
        ];
        let rows = vec![
            BalanceRow::new("221").with_debits(8000.0).with_solde(8000.0),
            BalanceRow::new("2451")
                .with_debits(3000.0)
                .with_credits(1000.0)
                .with_solde(2000.0),
        ];
        let mut evaluator = FormulaEvaluator::new(StatementType::BilanActif, &items, &rows);

        assert_eq!(
            evaluator.value("AI").unwrap(),
            LineValue::Bilan {
                brut: 11000.0,
                amort: 1000.0,
                net: 10000.0
            }
        );
        assert_eq!(evaluator.evaluate("AI").unwrap(), 10000.0);
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let items = marge_items();
        let rows = vec![
            BalanceRow::new("701").with_solde(0.1),
            BalanceRow::new("7011").with_solde(0.2),
            BalanceRow::new("601").with_solde(0.3),
        ];
        let first = evaluate(StatementType::CompteResultat, "XZ", &items, &rows).unwrap();
        let second = evaluate(StatementType::CompteResultat, "XZ", &items, &rows).unwrap();
        assert_eq!(first.to_bits(), second.to_bits());
    }
}
