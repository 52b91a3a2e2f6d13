use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The four statements of a SYSCOHADA financial pack.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema,
)]
#[serde(rename_all = "PascalCase")]
pub enum StatementType {
    #[schemars(description = "Balance sheet, assets side (Bilan Actif)")]
    BilanActif,

    #[schemars(description = "Balance sheet, liabilities and equity side (Bilan Passif)")]
    BilanPassif,

    #[schemars(description = "Income statement (Compte de Résultat)")]
    CompteResultat,

    #[schemars(description = "Cash-flow statement (Tableau des Flux de Trésorerie)")]
    FluxTresorerie,
}

impl StatementType {
    pub const ALL: [StatementType; 4] = [
        StatementType::BilanActif,
        StatementType::BilanPassif,
        StatementType::CompteResultat,
        StatementType::FluxTresorerie,
    ];

    pub fn value_kind(&self) -> ValueKind {
        match self {
            StatementType::BilanActif | StatementType::BilanPassif => ValueKind::Bilan,
            StatementType::CompteResultat | StatementType::FluxTresorerie => ValueKind::Montant,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            StatementType::BilanActif => "Bilan Actif",
            StatementType::BilanPassif => "Bilan Passif",
            StatementType::CompteResultat => "Compte de Résultat",
            StatementType::FluxTresorerie => "Flux de Trésorerie",
        }
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementType::BilanActif => "BilanActif",
            StatementType::BilanPassif => "BilanPassif",
            StatementType::CompteResultat => "CompteResultat",
            StatementType::FluxTresorerie => "FluxTresorerie",
        };
        f.write_str(name)
    }
}

/// Shape of the figures carried by every line of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Three columns: gross value, depreciation/contra value, net.
    Bilan,
    /// A single amount.
    Montant,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Sign {
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "-")]
    Minus,
}

impl Sign {
    pub fn factor(&self) -> f64 {
        match self {
            Sign::Plus => 1.0,
            Sign::Minus => -1.0,
        }
    }
}

/// One operand of a computed line. Written in schema files as `"+XB"` or `"-RA"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FormulaTerm {
    pub reference: String,
    pub sign: Sign,
}

impl FormulaTerm {
    pub fn plus(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            sign: Sign::Plus,
        }
    }

    pub fn minus(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            sign: Sign::Minus,
        }
    }
}

impl TryFrom<String> for FormulaTerm {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        let (sign, reference) = match trimmed.chars().next() {
            Some('+') => (Sign::Plus, &trimmed[1..]),
            Some('-') => (Sign::Minus, &trimmed[1..]),
            _ => (Sign::Plus, trimmed),
        };
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(format!("formula term '{}' has no line reference", value));
        }
        Ok(Self {
            reference: reference.to_string(),
            sign,
        })
    }
}

impl From<FormulaTerm> for String {
    fn from(term: FormulaTerm) -> Self {
        match term.sign {
            Sign::Plus => format!("+{}", term.reference),
            Sign::Minus => format!("-{}", term.reference),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    /// Aggregates every trial-balance row whose account number starts with one of the prefixes.
    Accounts { prefixes: Vec<String> },
    /// Signed sum of other lines of the same statement.
    Formula { terms: Vec<FormulaTerm> },
}

/// A statement line as seen by the calculator and the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub reference: String,
    pub label: String,
    pub note: Option<String>,
    pub kind: LineKind,
}

impl LineItem {
    pub fn accounts(reference: &str, label: &str, prefixes: &[&str]) -> Self {
        Self {
            reference: reference.to_string(),
            label: label.to_string(),
            note: None,
            kind: LineKind::Accounts {
                prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
            },
        }
    }

    pub fn formula(reference: &str, label: &str, terms: Vec<FormulaTerm>) -> Self {
        Self {
            reference: reference.to_string(),
            label: label.to_string(),
            note: None,
            kind: LineKind::Formula { terms },
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self.kind, LineKind::Formula { .. })
    }

    pub fn prefixes(&self) -> &[String] {
        match &self.kind {
            LineKind::Accounts { prefixes } => prefixes,
            LineKind::Formula { .. } => &[],
        }
    }

    pub fn terms(&self) -> &[FormulaTerm] {
        match &self.kind {
            LineKind::Accounts { .. } => &[],
            LineKind::Formula { terms } => terms,
        }
    }
}

/// A member line as authored inside a section of a schema file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineDefinition {
    #[serde(rename = "ref")]
    pub reference: String,
    pub label: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub formula: Option<Vec<FormulaTerm>>,
}

impl LineDefinition {
    fn to_line_item(&self) -> LineItem {
        let kind = match &self.formula {
            Some(terms) => LineKind::Formula {
                terms: terms.clone(),
            },
            None => LineKind::Accounts {
                prefixes: self.accounts.clone(),
            },
        };
        LineItem {
            reference: self.reference.clone(),
            label: self.label.clone(),
            note: self.note.clone(),
            kind,
        }
    }
}

/// A section as authored in a schema file.
///
/// - with `lines`, the section total is `formula` when given, else the sum of its lines;
/// - with `accounts` and no lines, the section is itself a leaf (e.g. `AP`, `BB`);
/// - with only a `formula`, it is a pure total row (e.g. `AZ`, `XG`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionDefinition {
    #[serde(rename = "ref")]
    pub reference: String,
    pub label: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub lines: Vec<LineDefinition>,
    #[serde(default)]
    pub formula: Option<Vec<FormulaTerm>>,
}

impl SectionDefinition {
    pub fn total_item(&self) -> LineItem {
        let kind = if let Some(terms) = &self.formula {
            LineKind::Formula {
                terms: terms.clone(),
            }
        } else if !self.lines.is_empty() {
            LineKind::Formula {
                terms: self
                    .lines
                    .iter()
                    .map(|l| FormulaTerm::plus(l.reference.clone()))
                    .collect(),
            }
        } else {
            LineKind::Accounts {
                prefixes: self.accounts.clone(),
            }
        };
        LineItem {
            reference: self.reference.clone(),
            label: self.label.clone(),
            note: self.note.clone(),
            kind,
        }
    }

    pub fn line_items(&self) -> Vec<LineItem> {
        self.lines.iter().map(LineDefinition::to_line_item).collect()
    }
}

/// One statement of a schema revision, as stored in `schemas/<revision>/*.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementDefinition {
    pub statement: StatementType,
    pub revision: String,
    pub grand_total: String,
    pub sections: Vec<SectionDefinition>,
}

/// A statement definition together with its flattened, ordered line items.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementSchema {
    definition: StatementDefinition,
    items: Vec<LineItem>,
}

impl StatementSchema {
    pub fn new(definition: StatementDefinition) -> Self {
        let mut items = Vec::new();
        for section in &definition.sections {
            items.extend(section.line_items());
            items.push(section.total_item());
        }
        Self { definition, items }
    }

    pub fn statement_type(&self) -> StatementType {
        self.definition.statement
    }

    pub fn revision(&self) -> &str {
        &self.definition.revision
    }

    pub fn grand_total(&self) -> &str {
        &self.definition.grand_total
    }

    pub fn sections(&self) -> &[SectionDefinition] {
        &self.definition.sections
    }

    pub fn definition(&self) -> &StatementDefinition {
        &self.definition
    }

    /// Every line in rendering order: each section's member lines, then its total line.
    pub fn line_items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn find(&self, reference: &str) -> Option<&LineItem> {
        self.items.iter().find(|item| item.reference == reference)
    }

    pub fn subtracted_refs(&self) -> BTreeSet<String> {
        self.items
            .iter()
            .flat_map(|item| item.terms())
            .filter(|term| term.sign == Sign::Minus)
            .map(|term| term.reference.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formula_term_parsing() {
        let term = FormulaTerm::try_from("-RA".to_string()).unwrap();
        assert_eq!(term, FormulaTerm::minus("RA"));

        let term = FormulaTerm::try_from(" +XB ".to_string()).unwrap();
        assert_eq!(term, FormulaTerm::plus("XB"));

        let term = FormulaTerm::try_from("TA".to_string()).unwrap();
        assert_eq!(term.sign, Sign::Plus);

        assert!(FormulaTerm::try_from("-".to_string()).is_err());
    }

    #[test]
    fn test_formula_term_serialization() {
        let json = serde_json::to_string(&vec![FormulaTerm::plus("XB"), FormulaTerm::minus("RA")])
            .unwrap();
        assert_eq!(json, r#"["+XB","-RA"]"#);
    }

    #[test]
    fn test_section_flattening_order() {
        let json = r#"{
            "statement": "CompteResultat",
            "revision": "test",
            "grand_total": "XA",
            "sections": [
                {
                    "ref": "XA",
                    "label": "MARGE COMMERCIALE",
                    "lines": [
                        { "ref": "TA", "label": "Ventes de marchandises", "accounts": ["701"] },
                        { "ref": "RA", "label": "Achats de marchandises", "accounts": ["601"] }
                    ],
                    "formula": ["+TA", "-RA"]
                }
            ]
        }"#;
        let definition: StatementDefinition = serde_json::from_str(json).unwrap();
        let schema = StatementSchema::new(definition);

        let refs: Vec<&str> = schema
            .line_items()
            .iter()
            .map(|i| i.reference.as_str())
            .collect();
        assert_eq!(refs, vec!["TA", "RA", "XA"]);
        assert!(schema.find("XA").unwrap().is_computed());
        assert!(!schema.find("TA").unwrap().is_computed());
        assert!(schema.subtracted_refs().contains("RA"));
    }

    #[test]
    fn test_section_total_defaults_to_sum_of_lines() {
        let section = SectionDefinition {
            reference: "AD".to_string(),
            label: "IMMOBILISATIONS INCORPORELLES".to_string(),
            note: Some("3".to_string()),
            accounts: vec![],
            lines: vec![
                LineDefinition {
                    reference: "AE".to_string(),
                    label: "Frais de développement".to_string(),
                    note: None,
                    accounts: vec!["211".to_string()],
                    formula: None,
                },
                LineDefinition {
                    reference: "AF".to_string(),
                    label: "Brevets, licences".to_string(),
                    note: None,
                    accounts: vec!["212".to_string()],
                    formula: None,
                },
            ],
            formula: None,
        };

        let total = section.total_item();
        assert_eq!(
            total.terms(),
            &[FormulaTerm::plus("AE"), FormulaTerm::plus("AF")]
        );
    }

    #[test]
    fn test_leaf_section_carries_accounts() {
        let section = SectionDefinition {
            reference: "BB".to_string(),
            label: "STOCKS ET ENCOURS".to_string(),
            note: None,
            accounts: vec!["3".to_string()],
            lines: vec![],
            formula: None,
        };
        let total = section.total_item();
        assert!(!total.is_computed());
        assert_eq!(total.prefixes(), &["3".to_string()]);
    }
}
