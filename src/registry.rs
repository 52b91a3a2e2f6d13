//! Statement schema registry.
//!
//! Schemas are plain JSON documents; the SYSCOHADA (révisé 2017) set ships embedded in the
//! crate and any other revision can be loaded with [`Registry::from_json_sources`]. Every
//! definition is validated once, at load time, so the assembler never meets a dangling
//! reference or a cycle on a real balance.

use crate::error::{Result, StatementError};
use crate::schema::{LineItem, LineKind, StatementDefinition, StatementSchema, StatementType};
use log::{info, warn};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;
use thiserror::Error;

const SYSCOHADA_SOURCES: [&str; 4] = [
    include_str!("../schemas/syscohada/bilan_actif.json"),
    include_str!("../schemas/syscohada/bilan_passif.json"),
    include_str!("../schemas/syscohada/compte_resultat.json"),
    include_str!("../schemas/syscohada/flux_tresorerie.json"),
];

static BUILTIN: OnceLock<Registry> = OnceLock::new();

const BALANCE_SHEET_KEY: &str = "BilanActif/BilanPassif";

/// A structural problem found while validating a statement definition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaViolation {
    #[error("reference '{reference}' is defined more than once")]
    DuplicateReference { reference: String },

    #[error("line '{line}' refers to undefined reference '{reference}'")]
    UnknownReference { line: String, reference: String },

    #[error("circular reference {}", .cycle.join(" -> "))]
    CircularReference { cycle: Vec<String> },

    #[error("line '{line}' has no account prefixes")]
    MissingAccounts { line: String },

    #[error("lines '{first}' ({first_prefix}) and '{second}' ({second_prefix}) claim the same accounts")]
    OverlappingPrefixes {
        first: String,
        first_prefix: String,
        second: String,
        second_prefix: String,
    },

    #[error("grand total '{reference}' is not defined")]
    UnknownGrandTotal { reference: String },

    #[error("line '{line}' reaches the grand total with coefficient {coefficient} instead of +1 or -1")]
    GrandTotalCoverage { line: String, coefficient: f64 },

    #[error("Actif line '{actif_line}' ({actif_prefix}) and Passif line '{passif_line}' ({passif_prefix}) claim the same accounts")]
    SharedBalanceSheetAccounts {
        actif_line: String,
        actif_prefix: String,
        passif_line: String,
        passif_prefix: String,
    },
}

/// The validated statement schemas of one revision, keyed by statement type.
#[derive(Debug, Clone)]
pub struct Registry {
    schemas: BTreeMap<StatementType, StatementSchema>,
}

impl Registry {
    /// The embedded SYSCOHADA registry, parsed and validated on first use.
    pub fn builtin() -> Result<&'static Registry> {
        if let Some(registry) = BUILTIN.get() {
            return Ok(registry);
        }
        let registry = Self::from_json_sources(&SYSCOHADA_SOURCES)?;
        Ok(BUILTIN.get_or_init(|| registry))
    }

    pub fn from_json_sources(sources: &[&str]) -> Result<Self> {
        let definitions = sources
            .iter()
            .map(|source| serde_json::from_str::<StatementDefinition>(source))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::from_definitions(definitions)
    }

    /// Validates every definition and fails with the violations of all of them at once.
    pub fn from_definitions(definitions: Vec<StatementDefinition>) -> Result<Self> {
        let mut schemas = BTreeMap::new();
        let mut failures = BTreeMap::new();

        for definition in definitions {
            let statement = definition.statement;
            let schema = StatementSchema::new(definition);

            let violations = validate_schema(&schema);
            if !violations.is_empty() {
                failures.insert(statement.to_string(), violations);
                continue;
            }

            info!(
                "Loaded {} schema ({}, {} lines)",
                statement,
                schema.revision(),
                schema.line_items().len()
            );
            if schemas.insert(statement, schema).is_some() {
                warn!("{} schema defined twice; keeping the last definition", statement);
            }
        }

        if let (Some(actif), Some(passif)) = (
            schemas.get(&StatementType::BilanActif),
            schemas.get(&StatementType::BilanPassif),
        ) {
            let shared = shared_balance_sheet_accounts(actif, passif);
            if !shared.is_empty() {
                failures.insert(BALANCE_SHEET_KEY.to_string(), shared);
            }
        }

        if !failures.is_empty() {
            return Err(StatementError::InvalidSchema { failures });
        }

        Ok(Self { schemas })
    }

    pub fn get_schema(&self, statement: StatementType) -> Result<&StatementSchema> {
        self.schemas
            .get(&statement)
            .ok_or(StatementError::UnknownStatement(statement))
    }

    pub fn statement_types(&self) -> impl Iterator<Item = StatementType> + '_ {
        self.schemas.keys().copied()
    }
}

/// Checks a schema and returns every violation found, in a stable order.
pub fn validate_schema(schema: &StatementSchema) -> Vec<SchemaViolation> {
    let items = schema.line_items();
    let mut violations = Vec::new();

    let mut index: HashMap<&str, &LineItem> = HashMap::with_capacity(items.len());
    let mut reported = HashSet::new();
    for item in items {
        if index.contains_key(item.reference.as_str()) {
            if reported.insert(item.reference.as_str()) {
                violations.push(SchemaViolation::DuplicateReference {
                    reference: item.reference.clone(),
                });
            }
        } else {
            index.insert(item.reference.as_str(), item);
        }
    }

    for item in items {
        match &item.kind {
            LineKind::Formula { terms } => {
                for term in terms {
                    if !index.contains_key(term.reference.as_str()) {
                        violations.push(SchemaViolation::UnknownReference {
                            line: item.reference.clone(),
                            reference: term.reference.clone(),
                        });
                    }
                }
            }
            LineKind::Accounts { prefixes } => {
                if prefixes.iter().all(|p| p.trim().is_empty()) {
                    violations.push(SchemaViolation::MissingAccounts {
                        line: item.reference.clone(),
                    });
                }
            }
        }
    }

    let cycles = find_cycles(items, &index);
    let acyclic = cycles.is_empty();
    violations.extend(
        cycles
            .into_iter()
            .map(|cycle| SchemaViolation::CircularReference { cycle }),
    );

    violations.extend(overlapping_prefixes(items));

    let grand_total = schema.grand_total();
    if !index.contains_key(grand_total) {
        violations.push(SchemaViolation::UnknownGrandTotal {
            reference: grand_total.to_string(),
        });
    } else if acyclic {
        violations.extend(coverage_violations(items, &index, grand_total));
    }

    violations
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Visiting,
    Done,
}

fn find_cycles<'a>(items: &'a [LineItem], index: &HashMap<&str, &'a LineItem>) -> Vec<Vec<String>> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut stack = Vec::new();
    let mut cycles = Vec::new();

    for item in items {
        visit(&item.reference, index, &mut marks, &mut stack, &mut cycles);
    }
    cycles
}

fn visit<'a>(
    reference: &'a str,
    index: &HashMap<&str, &'a LineItem>,
    marks: &mut HashMap<&'a str, Mark>,
    stack: &mut Vec<&'a str>,
    cycles: &mut Vec<Vec<String>>,
) {
    match marks.get(reference) {
        Some(Mark::Done) => return,
        Some(Mark::Visiting) => {
            if let Some(pos) = stack.iter().position(|r| *r == reference) {
                let mut cycle: Vec<String> = stack[pos..].iter().map(|r| r.to_string()).collect();
                cycle.push(reference.to_string());
                cycles.push(cycle);
            }
            return;
        }
        None => {}
    }

    let Some(item) = index.get(reference).copied() else {
        return;
    };

    marks.insert(reference, Mark::Visiting);
    stack.push(reference);
    for term in item.terms() {
        visit(&term.reference, index, marks, stack, cycles);
    }
    stack.pop();
    marks.insert(reference, Mark::Done);
}

fn prefix_claims(items: &[LineItem]) -> Vec<(&str, &str)> {
    items
        .iter()
        .flat_map(|item| {
            item.prefixes()
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .map(move |p| (item.reference.as_str(), p))
        })
        .collect()
}

fn prefixes_overlap(first: &str, second: &str) -> bool {
    first.starts_with(second) || second.starts_with(first)
}

/// Two leaves overlap when one prefix starts with the other: a row under both would be
/// counted twice in the grand total.
fn overlapping_prefixes(items: &[LineItem]) -> Vec<SchemaViolation> {
    let claims = prefix_claims(items);

    let mut violations = Vec::new();
    for (i, (first, first_prefix)) in claims.iter().enumerate() {
        for (second, second_prefix) in &claims[i + 1..] {
            if first == second {
                continue;
            }
            if prefixes_overlap(first_prefix, second_prefix) {
                violations.push(SchemaViolation::OverlappingPrefixes {
                    first: first.to_string(),
                    first_prefix: first_prefix.to_string(),
                    second: second.to_string(),
                    second_prefix: second_prefix.to_string(),
                });
            }
        }
    }
    violations
}

/// A row feeding both `BZ` and `DZ` would break Actif = Passif on a balanced trial balance.
fn shared_balance_sheet_accounts(
    actif: &StatementSchema,
    passif: &StatementSchema,
) -> Vec<SchemaViolation> {
    let passif_claims = prefix_claims(passif.line_items());

    let mut violations = Vec::new();
    for (actif_line, actif_prefix) in prefix_claims(actif.line_items()) {
        for (passif_line, passif_prefix) in &passif_claims {
            if prefixes_overlap(actif_prefix, passif_prefix) {
                violations.push(SchemaViolation::SharedBalanceSheetAccounts {
                    actif_line: actif_line.to_string(),
                    actif_prefix: actif_prefix.to_string(),
                    passif_line: passif_line.to_string(),
                    passif_prefix: passif_prefix.to_string(),
                });
            }
        }
    }
    violations
}

/// Every leaf must reach the grand total exactly once, added or subtracted.
fn coverage_violations(
    items: &[LineItem],
    index: &HashMap<&str, &LineItem>,
    grand_total: &str,
) -> Vec<SchemaViolation> {
    let mut memo = HashMap::new();
    let coefficients = leaf_coefficients(grand_total, index, &mut memo);

    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| !item.is_computed() && seen.insert(item.reference.as_str()))
        .filter_map(|item| {
            let coefficient = coefficients
                .get(item.reference.as_str())
                .copied()
                .unwrap_or(0.0);
            ((coefficient.abs() - 1.0).abs() > f64::EPSILON).then(|| {
                SchemaViolation::GrandTotalCoverage {
                    line: item.reference.clone(),
                    coefficient,
                }
            })
        })
        .collect()
}

// Only called on acyclic graphs.
fn leaf_coefficients<'a>(
    reference: &'a str,
    index: &HashMap<&str, &'a LineItem>,
    memo: &mut HashMap<&'a str, HashMap<&'a str, f64>>,
) -> HashMap<&'a str, f64> {
    if let Some(known) = memo.get(reference) {
        return known.clone();
    }

    let mut coefficients = HashMap::new();
    match index.get(reference).copied().map(|item| &item.kind) {
        Some(LineKind::Accounts { .. }) => {
            coefficients.insert(reference, 1.0);
        }
        Some(LineKind::Formula { terms }) => {
            for term in terms {
                let factor = term.sign.factor();
                for (leaf, coefficient) in leaf_coefficients(&term.reference, index, memo) {
                    *coefficients.entry(leaf).or_insert(0.0) += factor * coefficient;
                }
            }
        }
        None => {}
    }

    memo.insert(reference, coefficients.clone());
    coefficients
}
