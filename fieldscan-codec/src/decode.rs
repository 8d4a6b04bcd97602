use crate::error::CodecError;
use crate::format::{RegisterFormat, WireLayout, WordOrder};
use crate::value::Value;

/// Decode one raw register window into a typed sample.
///
/// `words` must be exactly [`RegisterFormat::word_len`] entries long. A
/// `None` anywhere in the window means the point was unreadable this cycle
/// and the whole sample decays to [`Value::Null`].
pub fn decode(format: RegisterFormat, words: &[Option<u16>]) -> Result<Value, CodecError> {
    if words.len() != format.word_len() {
        return Err(CodecError::WrongWordCount {
            format,
            expected: format.word_len(),
            got: words.len(),
        });
    }

    let mut present = [0u16; 4];
    for (slot, word) in present.iter_mut().zip(words) {
        match word {
            Some(w) => *slot = *w,
            None => return Ok(Value::Null),
        }
    }
    let present = &present[..words.len()];

    use RegisterFormat::*;
    Ok(match format {
        Signed => Value::Int(i64::from(present[0] as i16)),
        Unsigned => Value::Int(i64::from(present[0])),
        HexAscii => Value::Text(format!("{:04X}", present[0])),
        Binary => Value::Text(format!("{:016b}", present[0])),
        LongAbCd | LongCdAb | LongBaDc | LongDcBa => {
            let raw = be_bytes::<4>(present, format.layout().expect("two-word format"));
            Value::Int(i64::from(i32::from_be_bytes(raw)))
        }
        FloatAbCd | FloatCdAb | FloatBaDc | FloatDcBa => {
            let raw = be_bytes::<4>(present, format.layout().expect("two-word format"));
            Value::Float(f64::from(f32::from_be_bytes(raw)))
        }
        DoubleAbCdEfGh | DoubleGhEfCdAb | DoubleBaDcFeHg | DoubleHgFeDcBa => {
            let raw = be_bytes::<8>(present, format.layout().expect("four-word format"));
            Value::Float(f64::from_be_bytes(raw))
        }
    })
}

/// Gather the value bytes of a multi-word window into big-endian order.
fn be_bytes<const N: usize>(words: &[u16], layout: WireLayout) -> [u8; N] {
    debug_assert_eq!(words.len() * 2, N);
    let mut out = [0u8; N];
    for i in 0..words.len() {
        let word = match layout.words {
            WordOrder::HighFirst => words[i],
            WordOrder::LowFirst => words[words.len() - 1 - i],
        };
        let [hi, lo] = word.to_be_bytes();
        if layout.swapped_bytes {
            out[2 * i] = lo;
            out[2 * i + 1] = hi;
        } else {
            out[2 * i] = hi;
            out[2 * i + 1] = lo;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_missing_word_nulls_the_sample() {
        let value =
            decode(RegisterFormat::FloatAbCd, &[Some(0x4048), None]).unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn window_length_is_checked() {
        let err = decode(RegisterFormat::DoubleAbCdEfGh, &[Some(1); 2]).unwrap_err();
        assert_eq!(
            err,
            CodecError::WrongWordCount {
                format: RegisterFormat::DoubleAbCdEfGh,
                expected: 4,
                got: 2,
            }
        );
    }
}
