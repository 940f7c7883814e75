//! Field schemas: which values to ask the model for, and how to read them back.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Signed number with `.`/`,` separators, e.g. `-1.234,56`.
static AMOUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-?\d[\d.,]*").unwrap());

/// A dot followed by exactly three digits groups thousands (`12.500` is twelve thousand five hundred).
static THOUSANDS_DOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d{1,3}(\.\d{3})+$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Euro amount, written the Italian way.
    Money,
    Number,
    Integer,
    Text,
}

impl FieldKind {
    fn prompt_hint(&self) -> &'static str {
        match self {
            Self::Money => "amount in euro, as written on the document",
            Self::Number => "number",
            Self::Integer => "whole number",
            Self::Text => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub description: String,
}

impl FieldSpec {
    pub fn new(name: &str, kind: FieldKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
        }
    }

    pub fn prompt_line(&self) -> String {
        format!(
            "- \"{}\" ({}): {}",
            self.name,
            self.kind.prompt_hint(),
            self.description
        )
    }
}

/// A typed field value after coercion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Decimal(Decimal),
    Integer(i64),
    Text(String),
}

impl FieldValue {
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(d) => Some(*d),
            Self::Integer(i) => Some(Decimal::from(*i)),
            Self::Text(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub fields: Vec<FieldSpec>,
}

impl FieldSchema {
    pub fn payslip() -> Self {
        Self {
            fields: vec![
                FieldSpec::new("netto_a_pagare", FieldKind::Money, "net pay (Netto a pagare / Netto in busta)"),
                FieldSpec::new("totale_competenze", FieldKind::Money, "gross total of earnings (Totale competenze)"),
                FieldSpec::new("totale_trattenute", FieldKind::Money, "total deductions (Totale trattenute)"),
                FieldSpec::new("ferie_residue", FieldKind::Number, "remaining holiday balance (Ferie residue)"),
                FieldSpec::new("permessi_residui", FieldKind::Number, "remaining leave hours (Permessi/ROL residui)"),
                FieldSpec::new("periodo", FieldKind::Text, "pay period as printed, e.g. Giugno 2025"),
            ],
        }
    }

    pub fn attendance() -> Self {
        Self {
            fields: vec![
                FieldSpec::new("giorni_lavorati", FieldKind::Integer, "number of days actually worked in the month"),
                FieldSpec::new("note", FieldKind::Text, "short note on absences, holidays or anomalies, or null"),
            ],
        }
    }

    /// Read every schema field out of `raw`. Fields that are missing, null or
    /// of the wrong shape are left out.
    pub fn coerce(&self, raw: &Map<String, Value>) -> BTreeMap<String, FieldValue> {
        self.fields
            .iter()
            .filter_map(|spec| {
                let value = raw.get(&spec.name)?;
                let coerced = coerce_value(spec.kind, value);
                if coerced.is_none() && !value.is_null() {
                    tracing::debug!(field = %spec.name, value = %value, "field does not match its kind");
                }
                coerced.map(|v| (spec.name.clone(), v))
            })
            .collect()
    }
}

fn coerce_value(kind: FieldKind, value: &Value) -> Option<FieldValue> {
    match kind {
        FieldKind::Money | FieldKind::Number => amount_of(value).map(FieldValue::Decimal),
        FieldKind::Integer => {
            let amount = amount_of(value)?;
            if !amount.fract().is_zero() {
                return None;
            }
            amount.to_i64().map(FieldValue::Integer)
        }
        FieldKind::Text => match value {
            Value::String(s) if !s.trim().is_empty() => Some(FieldValue::Text(s.trim().to_string())),
            Value::Number(n) => Some(FieldValue::Text(n.to_string())),
            Value::Bool(b) => Some(FieldValue::Text(b.to_string())),
            _ => None,
        },
    }
}

fn amount_of(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => parse_italian_amount(s),
        _ => None,
    }
}

/// Parse an amount such as `€ 1.234,56`, `1234.56`, `-12,5` or `12.500`.
/// English grouping (`1,234.56`) is recognised by the comma coming first.
pub fn parse_italian_amount(text: &str) -> Option<Decimal> {
    let raw = AMOUNT.find(text)?.as_str().trim_end_matches(['.', ',']);
    let normalized = if let (Some(comma), Some(dot)) = (raw.find(','), raw.rfind('.')) {
        if comma < dot {
            raw.replace(',', "")
        } else {
            raw.replace('.', "").replace(',', ".")
        }
    } else if raw.contains(',') {
        // Italian: dots group thousands, comma is the decimal mark.
        raw.replace('.', "").replace(',', ".")
    } else if raw.matches('.').count() > 1 || THOUSANDS_DOT.is_match(raw) {
        raw.replace('.', "")
    } else {
        raw.to_string()
    };
    Decimal::from_str(&normalized).ok()
}
