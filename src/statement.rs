use crate::error::Result;
use crate::schema::{StatementType, ValueKind};
use crate::utils::format_amount;
use csv::WriterBuilder;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Figures of one statement line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum LineValue {
    #[schemars(description = "Balance sheet columns: gross, depreciation and net")]
    Bilan { brut: f64, amort: f64, net: f64 },

    #[schemars(description = "Single amount of an income or cash-flow statement line")]
    Montant { montant: f64 },
}

impl LineValue {
    pub fn zero(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Bilan => LineValue::Bilan {
                brut: 0.0,
                amort: 0.0,
                net: 0.0,
            },
            ValueKind::Montant => LineValue::Montant { montant: 0.0 },
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            LineValue::Bilan { .. } => ValueKind::Bilan,
            LineValue::Montant { .. } => ValueKind::Montant,
        }
    }

    /// The single number formulas compare on: `net` for the balance sheet, `montant` otherwise.
    pub fn comparable(&self) -> f64 {
        match self {
            LineValue::Bilan { net, .. } => *net,
            LineValue::Montant { montant } => *montant,
        }
    }

    /// Column-wise `self + factor * other`. The result keeps the shape of `self`.
    pub fn add_scaled(self, other: LineValue, factor: f64) -> LineValue {
        match (self, other) {
            (
                LineValue::Bilan { brut, amort, net },
                LineValue::Bilan {
                    brut: b,
                    amort: a,
                    net: n,
                },
            ) => LineValue::Bilan {
                brut: brut + factor * b,
                amort: amort + factor * a,
                net: net + factor * n,
            },
            (LineValue::Bilan { brut, amort, net }, other) => LineValue::Bilan {
                brut,
                amort,
                net: net + factor * other.comparable(),
            },
            (LineValue::Montant { montant }, other) => LineValue::Montant {
                montant: montant + factor * other.comparable(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineResult {
    #[serde(rename = "ref")]
    #[schemars(description = "Statement reference code, e.g. 'TA' or 'BZ'")]
    pub reference: String,

    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Reference of the explanatory note (notes annexes)")]
    pub note: Option<String>,

    #[schemars(description = "True when the line is a total computed from other lines")]
    pub computed: bool,

    #[schemars(description = "True when the line is deducted in some total; rendered in parentheses")]
    pub deducted: bool,

    pub value: LineValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SectionResult {
    #[serde(rename = "ref")]
    pub reference: String,

    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    #[serde(rename = "accounts", alias = "lines")]
    #[schemars(description = "Member lines, in schema order")]
    pub lines: Vec<LineResult>,

    #[schemars(description = "Section total, rendered right after the member lines")]
    pub total: LineValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnclassifiedRow {
    pub account_number: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    pub solde: f64,
}

/// A fully evaluated statement. Built fresh from a trial balance, never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatementResult {
    pub statement_type: StatementType,

    pub title: String,

    #[schemars(description = "Revision of the statement schema the figures were computed with")]
    pub revision: String,

    pub sections: Vec<SectionResult>,

    pub grand_total: LineResult,

    #[serde(default)]
    #[schemars(
        description = "Trial-balance rows that matched no line of this statement and were left out of every total"
    )]
    pub unclassified: Vec<UnclassifiedRow>,
}

impl StatementResult {
    pub fn section(&self, reference: &str) -> Option<&SectionResult> {
        self.sections.iter().find(|s| s.reference == reference)
    }

    pub fn line(&self, reference: &str) -> Option<&LineResult> {
        self.sections
            .iter()
            .flat_map(|s| s.lines.iter())
            .find(|l| l.reference == reference)
    }

    /// Value of a member line or of a section total.
    pub fn value(&self, reference: &str) -> Option<LineValue> {
        self.line(reference)
            .map(|l| l.value)
            .or_else(|| self.section(reference).map(|s| s.total))
    }

    pub fn amount(&self, reference: &str) -> Option<f64> {
        self.value(reference).map(|v| v.comparable())
    }

    pub fn grand_total_amount(&self) -> f64 {
        self.grand_total.value.comparable()
    }

    fn is_deducted(&self, reference: &str) -> bool {
        self.line(reference).map(|l| l.deducted).unwrap_or(false)
            || self.grand_total.reference == reference && self.grand_total.deducted
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(StatementResult)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();
        let kind = self.statement_type.value_kind();

        output.push_str(&format!("# {}\n\n", self.title));
        output.push_str(&format!("**Référentiel :** {}\n\n", self.revision));

        match kind {
            ValueKind::Bilan => {
                output.push_str("| Réf | Libellé | Note | Brut | Amort. et dépréc. | Net |\n");
                output.push_str("|---|---|---|---:|---:|---:|\n");
            }
            ValueKind::Montant => {
                output.push_str("| Réf | Libellé | Note | Montant |\n");
                output.push_str("|---|---|---|---:|\n");
            }
        }

        for section in &self.sections {
            for line in &section.lines {
                output.push_str(&self.markdown_row(
                    &line.reference,
                    &line.label,
                    line.note.as_deref(),
                    &line.value,
                    false,
                ));
            }
            output.push_str(&self.markdown_row(
                &section.reference,
                &section.label,
                section.note.as_deref(),
                &section.total,
                true,
            ));
        }

        if !self.unclassified.is_empty() {
            output.push_str("\n## Comptes non classés\n\n");
            for row in &self.unclassified {
                output.push_str(&format!(
                    "- {} {} : {}\n",
                    row.account_number,
                    row.account.as_deref().unwrap_or(""),
                    format_amount(row.solde)
                ));
            }
        }

        output
    }

    fn markdown_row(
        &self,
        reference: &str,
        label: &str,
        note: Option<&str>,
        value: &LineValue,
        emphasized: bool,
    ) -> String {
        let wrap = |text: &str| {
            if emphasized {
                format!("**{}**", text)
            } else {
                text.to_string()
            }
        };

        let deducted = self.is_deducted(reference);
        let figure = |amount: f64| {
            if deducted {
                wrap(&format!("({})", format_amount(amount)))
            } else {
                wrap(&format_amount(amount))
            }
        };

        let figures = match value {
            LineValue::Bilan { brut, amort, net } => {
                format!("{} | {} | {}", figure(*brut), figure(*amort), figure(*net))
            }
            LineValue::Montant { montant } => figure(*montant),
        };

        format!(
            "| {} | {} | {} | {} |\n",
            wrap(reference),
            wrap(label),
            note.unwrap_or(""),
            figures
        )
    }

    /// One CSV record per rendered row (member lines, then each section total), with raw
    /// two-decimal amounts.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = WriterBuilder::new().from_writer(Vec::new());

        match self.statement_type.value_kind() {
            ValueKind::Bilan => {
                writer.write_record(["Ref", "Libelle", "Note", "Total", "Brut", "Amort", "Net"])?
            }
            ValueKind::Montant => {
                writer.write_record(["Ref", "Libelle", "Note", "Total", "Montant"])?
            }
        }

        for section in &self.sections {
            for line in &section.lines {
                writer.write_record(csv_record(
                    &line.reference,
                    &line.label,
                    line.note.as_deref(),
                    false,
                    &line.value,
                ))?;
            }
            writer.write_record(csv_record(
                &section.reference,
                &section.label,
                section.note.as_deref(),
                true,
                &section.total,
            ))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn csv_record(
    reference: &str,
    label: &str,
    note: Option<&str>,
    is_total: bool,
    value: &LineValue,
) -> Vec<String> {
    let mut record = vec![
        reference.to_string(),
        label.to_string(),
        note.unwrap_or("").to_string(),
        is_total.to_string(),
    ];
    match value {
        LineValue::Bilan { brut, amort, net } => {
            record.push(format!("{:.2}", brut));
            record.push(format!("{:.2}", amort));
            record.push(format!("{:.2}", net));
        }
        LineValue::Montant { montant } => record.push(format!("{:.2}", montant)),
    }
    record
}
