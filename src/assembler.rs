use crate::calculator::is_member;
use crate::error::Result;
use crate::evaluator::FormulaEvaluator;
use crate::ingestion::BalanceRow;
use crate::registry::Registry;
use crate::schema::{StatementSchema, StatementType};
use crate::statement::{LineResult, SectionResult, StatementResult, UnclassifiedRow};
use log::{debug, info, warn};
use std::collections::BTreeSet;

/// Turns a trial balance into evaluated statements, following the schemas of a registry.
pub struct StatementAssembler<'r> {
    registry: &'r Registry,
}

impl<'r> StatementAssembler<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Builds one statement. Every line goes through a single evaluator pass, so totals shared
    /// by several sections are computed once.
    pub fn build(&self, statement: StatementType, rows: &[BalanceRow]) -> Result<StatementResult> {
        let schema = self.registry.get_schema(statement)?;
        let deducted = schema.subtracted_refs();
        let mut evaluator = FormulaEvaluator::new(statement, schema.line_items(), rows);

        let mut sections = Vec::with_capacity(schema.sections().len());
        for section in schema.sections() {
            let mut lines = Vec::with_capacity(section.lines.len());
            for line in &section.lines {
                lines.push(LineResult {
                    reference: line.reference.clone(),
                    label: line.label.clone(),
                    note: line.note.clone(),
                    computed: line.formula.is_some(),
                    deducted: deducted.contains(&line.reference),
                    value: evaluator.value(&line.reference)?,
                });
            }

            sections.push(SectionResult {
                reference: section.reference.clone(),
                label: section.label.clone(),
                note: section.note.clone(),
                lines,
                total: evaluator.value(&section.reference)?,
            });
        }

        let grand_total = grand_total_line(schema, &mut evaluator, &deducted)?;
        let unclassified = unclassified_rows(schema, rows);

        if !unclassified.is_empty() {
            warn!(
                "{}: {} balance row(s) match no line and were left out",
                statement,
                unclassified.len()
            );
        }

        info!(
            "Built {} ({} sections, {} = {:.2})",
            statement,
            sections.len(),
            grand_total.reference,
            grand_total.value.comparable()
        );

        Ok(StatementResult {
            statement_type: statement,
            title: statement.title().to_string(),
            revision: schema.revision().to_string(),
            sections,
            grand_total,
            unclassified,
        })
    }

    /// Builds the four statements in their conventional order.
    pub fn build_all(&self, rows: &[BalanceRow]) -> Result<Vec<StatementResult>> {
        StatementType::ALL
            .iter()
            .map(|statement| self.build(*statement, rows))
            .collect()
    }
}

fn grand_total_line(
    schema: &StatementSchema,
    evaluator: &mut FormulaEvaluator<'_>,
    deducted: &BTreeSet<String>,
) -> Result<LineResult> {
    let reference = schema.grand_total();
    let value = evaluator.value(reference)?;
    let item = schema.find(reference);

    Ok(LineResult {
        reference: reference.to_string(),
        label: item.map(|i| i.label.clone()).unwrap_or_default(),
        note: item.and_then(|i| i.note.clone()),
        computed: item.map(|i| i.is_computed()).unwrap_or(true),
        deducted: deducted.contains(reference),
        value,
    })
}

fn unclassified_rows(schema: &StatementSchema, rows: &[BalanceRow]) -> Vec<UnclassifiedRow> {
    rows.iter()
        .filter(|row| {
            !schema
                .line_items()
                .iter()
                .any(|item| is_member(row, item.prefixes()))
        })
        .map(|row| {
            debug!(
                "{}: account {} is not mapped",
                schema.statement_type(),
                row.account_number
            );
            UnclassifiedRow {
                account_number: row.account_number.clone(),
                account: row.account.clone(),
                solde: row.net_amount(),
            }
        })
        .collect()
}
