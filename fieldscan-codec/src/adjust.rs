use std::collections::BTreeMap;

use thiserror::Error;

use crate::value::Value;

/// One step of a point's adjustment chain, parsed once at configuration
/// load.
///
/// The configuration dialect writes a step as a single-entry mapping from
/// operator to operand: `{"+": "1"}`, `{"*": 0.1}`, `{"7": "FAULT"}`. A
/// digit-only key is an equality match that replaces the running result
/// with an opaque string and ends the chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Adjust {
    /// Add the operand.
    Add(f64),
    /// Subtract the operand.
    Sub(f64),
    /// Multiply by the operand.
    Mul(f64),
    /// Divide by the operand.
    Div(f64),
    /// Raise to the operand.
    Pow(f64),
    /// If the running result equals the literal, yield the replacement and
    /// stop.
    Replace(i64, String),
}

/// Rejected adjustment entries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdjustParseError {
    /// The YAML entry was not a single `operator: operand` mapping.
    #[error("adjustment must be a single `operator: operand` mapping")]
    NotSingleEntry,
    /// The operator is neither arithmetic nor a decimal literal.
    #[error("unknown adjustment operator `{0}`")]
    UnknownOperator(String),
    /// An arithmetic operand did not parse as a number.
    #[error("adjustment operand `{0}` is not numeric")]
    BadOperand(String),
    /// Division by a zero operand can never produce a useful sample.
    #[error("adjustment divides by zero")]
    DivisionByZero,
}

/// Run the chain over a decoded sample, left to right.
///
/// String and null samples pass through untouched. A numeric sample is
/// widened to `f64` for the whole chain; an equality replacement
/// short-circuits the remaining steps.
pub fn apply(chain: &[Adjust], value: Value) -> Value {
    if chain.is_empty() {
        return value;
    }
    let mut result = match value.as_f64() {
        Some(x) => x,
        None => return value,
    };
    for step in chain {
        match *step {
            Adjust::Add(operand) => result += operand,
            Adjust::Sub(operand) => result -= operand,
            Adjust::Mul(operand) => result *= operand,
            Adjust::Div(operand) => result /= operand,
            Adjust::Pow(operand) => result = result.powf(operand),
            Adjust::Replace(literal, ref replacement) => {
                if result == literal as f64 {
                    return Value::Text(replacement.clone());
                }
            }
        }
    }
    Value::Float(result)
}

/// Undo the chain, right to left, for the encode path.
///
/// Equality replacements carry no arithmetic and are skipped, matching the
/// forward chain's treatment of non-matching literals.
pub fn apply_reverse(chain: &[Adjust], mut value: f64) -> f64 {
    for step in chain.iter().rev() {
        match *step {
            Adjust::Add(operand) => value -= operand,
            Adjust::Sub(operand) => value += operand,
            Adjust::Mul(operand) => value /= operand,
            Adjust::Div(operand) => value *= operand,
            Adjust::Pow(operand) => value = value.powf(1.0 / operand),
            Adjust::Replace(..) => {}
        }
    }
    value
}

/// Raw YAML shape: a one-entry map with a scalar operand. YAML spells a
/// digit-only operator as a bare integer key, so both key shapes are
/// accepted.
#[derive(serde::Deserialize)]
#[serde(transparent)]
struct RawAdjust(BTreeMap<RawKey, RawOperand>);

#[derive(serde::Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[serde(untagged)]
enum RawKey {
    Int(i64),
    Text(String),
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum RawOperand {
    Num(f64),
    Text(String),
}

impl RawOperand {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    fn into_string(self) -> String {
        match self {
            Self::Num(n) if n.fract() == 0.0 => format!("{}", n as i64),
            Self::Num(n) => format!("{n}"),
            Self::Text(s) => s,
        }
    }
}

impl TryFrom<RawAdjust> for Adjust {
    type Error = AdjustParseError;

    fn try_from(raw: RawAdjust) -> Result<Self, Self::Error> {
        let mut entries = raw.0.into_iter();
        let (operator, operand) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => return Err(AdjustParseError::NotSingleEntry),
        };

        let arithmetic = |operand: &RawOperand| {
            operand.as_f64().ok_or_else(|| match operand {
                RawOperand::Text(s) => AdjustParseError::BadOperand(s.clone()),
                RawOperand::Num(n) => AdjustParseError::BadOperand(n.to_string()),
            })
        };

        let operator = match operator {
            RawKey::Int(literal) if literal >= 0 => {
                return Ok(Self::Replace(literal, operand.into_string()));
            }
            RawKey::Int(negative) => {
                return Err(AdjustParseError::UnknownOperator(negative.to_string()));
            }
            RawKey::Text(op) => op,
        };

        match operator.as_str() {
            "+" => Ok(Self::Add(arithmetic(&operand)?)),
            "-" => Ok(Self::Sub(arithmetic(&operand)?)),
            "*" => Ok(Self::Mul(arithmetic(&operand)?)),
            "/" => {
                let divisor = arithmetic(&operand)?;
                if divisor == 0.0 {
                    return Err(AdjustParseError::DivisionByZero);
                }
                Ok(Self::Div(divisor))
            }
            "^" => Ok(Self::Pow(arithmetic(&operand)?)),
            digits if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
                let literal = digits
                    .parse()
                    .map_err(|_| AdjustParseError::UnknownOperator(digits.to_owned()))?;
                Ok(Self::Replace(literal, operand.into_string()))
            }
            _ => Err(AdjustParseError::UnknownOperator(operator)),
        }
    }
}

impl<'de> serde::Deserialize<'de> for Adjust {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawAdjust::deserialize(deserializer)?;
        Self::try_from(raw).map_err(serde::de::Error::custom)
    }
}
