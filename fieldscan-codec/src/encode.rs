use crate::error::CodecError;
use crate::format::{RegisterFormat, WireLayout, WordOrder};
use crate::value::Value;

/// Encode a typed sample back into its raw register image.
///
/// The inverse of [`crate::decode`]: for every numeric format `F` and every
/// value `v` representable in `F`, `decode(F, encode(F, v))` returns `v`.
/// [`Value::Null`] has no wire image and is rejected.
pub fn encode(format: RegisterFormat, value: &Value) -> Result<Vec<u16>, CodecError> {
    use RegisterFormat::*;
    match format {
        Signed => Ok(vec![numeric(format, value)? as i16 as u16]),
        Unsigned => Ok(vec![numeric(format, value)? as u16]),
        HexAscii => {
            let literal = textual(format, value)?;
            let word = u16::from_str_radix(literal, 16).map_err(|_| {
                CodecError::BadLiteral {
                    format,
                    literal: literal.to_owned(),
                }
            })?;
            Ok(vec![word])
        }
        Binary => {
            let literal = textual(format, value)?;
            let word = u16::from_str_radix(literal, 2).map_err(|_| {
                CodecError::BadLiteral {
                    format,
                    literal: literal.to_owned(),
                }
            })?;
            Ok(vec![word])
        }
        LongAbCd | LongCdAb | LongBaDc | LongDcBa => {
            let raw = (numeric(format, value)? as i32).to_be_bytes();
            Ok(scatter(&raw, format.layout().expect("two-word format")))
        }
        FloatAbCd | FloatCdAb | FloatBaDc | FloatDcBa => {
            let raw = (numeric(format, value)? as f32).to_be_bytes();
            Ok(scatter(&raw, format.layout().expect("two-word format")))
        }
        DoubleAbCdEfGh | DoubleGhEfCdAb | DoubleBaDcFeHg | DoubleHgFeDcBa => {
            let raw = numeric(format, value)?.to_be_bytes();
            Ok(scatter(&raw, format.layout().expect("four-word format")))
        }
    }
}

fn numeric(format: RegisterFormat, value: &Value) -> Result<f64, CodecError> {
    value.as_f64().ok_or(CodecError::ValueKind {
        format,
        kind: kind_name(value),
    })
}

fn textual<'v>(format: RegisterFormat, value: &'v Value) -> Result<&'v str, CodecError> {
    match value {
        Value::Text(s) => Ok(s),
        other => Err(CodecError::ValueKind {
            format,
            kind: kind_name(other),
        }),
    }
}

const fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Int(_) => "integer",
        Value::Float(_) => "float",
        Value::Text(_) => "string",
        Value::Null => "null",
    }
}

/// Spread a big-endian byte image across wire words per the format layout.
/// Exact inverse of the gather step in [`crate::decode`].
fn scatter(raw: &[u8], layout: WireLayout) -> Vec<u16> {
    let half = raw.len() / 2;
    let mut words = vec![0u16; half];
    for (i, pair) in raw.chunks_exact(2).enumerate() {
        let word = if layout.swapped_bytes {
            u16::from_be_bytes([pair[1], pair[0]])
        } else {
            u16::from_be_bytes([pair[0], pair[1]])
        };
        let slot = match layout.words {
            WordOrder::HighFirst => i,
            WordOrder::LowFirst => half - 1 - i,
        };
        words[slot] = word;
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_has_no_wire_image() {
        let err = encode(RegisterFormat::Unsigned, &Value::Null).unwrap_err();
        assert_eq!(
            err,
            CodecError::ValueKind {
                format: RegisterFormat::Unsigned,
                kind: "null",
            }
        );
    }

    #[test]
    fn hex_literal_must_parse() {
        let err = encode(RegisterFormat::HexAscii, &Value::from("G1")).unwrap_err();
        assert!(matches!(err, CodecError::BadLiteral { .. }));
    }
}
