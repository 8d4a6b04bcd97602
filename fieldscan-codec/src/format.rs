use core::fmt;

use crate::value::ValueClass;

/// Closed set of register interpretation formats.
///
/// The serde names are the exact tag strings accepted in device
/// configuration files. Each two-letter pair in a multi-word tag names one
/// source word; within a pair the letters give the byte order inside that
/// word, and pairs read left to right from most to least significant.
/// `AB CD` is therefore the network-standard layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum RegisterFormat {
    /// Single word as a 16-bit two's-complement integer.
    Signed,
    /// Single word as a 16-bit unsigned integer.
    Unsigned,
    /// Single word rendered as four uppercase hex digits.
    #[serde(rename = "Hex - ASCII")]
    HexAscii,
    /// Single word rendered as sixteen `0`/`1` characters.
    Binary,
    /// 32-bit integer, big-endian words, big-endian bytes.
    #[serde(rename = "Long AB CD")]
    LongAbCd,
    /// 32-bit integer with the word order swapped.
    #[serde(rename = "Long CD AB")]
    LongCdAb,
    /// 32-bit integer with the bytes inside each word swapped.
    #[serde(rename = "Long BA DC")]
    LongBaDc,
    /// 32-bit integer with both word order and bytes swapped.
    #[serde(rename = "Long DC BA")]
    LongDcBa,
    /// IEEE-754 binary32, big-endian words, big-endian bytes.
    #[serde(rename = "Float AB CD")]
    FloatAbCd,
    /// IEEE-754 binary32 with the word order swapped.
    #[serde(rename = "Float CD AB")]
    FloatCdAb,
    /// IEEE-754 binary32 with the bytes inside each word swapped.
    #[serde(rename = "Float BA DC")]
    FloatBaDc,
    /// IEEE-754 binary32 with both word order and bytes swapped.
    #[serde(rename = "Float DC BA")]
    FloatDcBa,
    /// IEEE-754 binary64, big-endian words, big-endian bytes.
    #[serde(rename = "Double AB CD EF GH")]
    DoubleAbCdEfGh,
    /// IEEE-754 binary64 with the word order reversed.
    #[serde(rename = "Double GH EF CD AB")]
    DoubleGhEfCdAb,
    /// IEEE-754 binary64 with the bytes inside each word swapped.
    #[serde(rename = "Double BA DC FE HG")]
    DoubleBaDcFeHg,
    /// IEEE-754 binary64 with both word order and bytes swapped.
    #[serde(rename = "Double HG FE DC BA")]
    DoubleHgFeDcBa,
}

/// Word significance order of a multi-word format on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WordOrder {
    /// The first word on the wire holds the most significant bytes.
    HighFirst,
    /// The first word on the wire holds the least significant bytes.
    LowFirst,
}

/// How a multi-word format scatters the value bytes across its words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WireLayout {
    pub words: WordOrder,
    /// The two bytes inside every word are stored low-before-high.
    pub swapped_bytes: bool,
}

impl RegisterFormat {
    /// Number of consecutive 16-bit registers this format occupies.
    pub const fn word_len(&self) -> usize {
        use RegisterFormat::*;
        match self {
            Signed | Unsigned | HexAscii | Binary => 1,
            LongAbCd | LongCdAb | LongBaDc | LongDcBa => 2,
            FloatAbCd | FloatCdAb | FloatBaDc | FloatDcBa => 2,
            DoubleAbCdEfGh | DoubleGhEfCdAb | DoubleBaDcFeHg | DoubleHgFeDcBa => 4,
        }
    }

    /// The class of value the format decodes to.
    ///
    /// Drives SQL parameter typing: a NULL sample must still be bound with
    /// the type its column expects.
    pub const fn class(&self) -> ValueClass {
        use RegisterFormat::*;
        match self {
            Signed | Unsigned | LongAbCd | LongCdAb | LongBaDc | LongDcBa => {
                ValueClass::Int
            }
            FloatAbCd | FloatCdAb | FloatBaDc | FloatDcBa | DoubleAbCdEfGh
            | DoubleGhEfCdAb | DoubleBaDcFeHg | DoubleHgFeDcBa => ValueClass::Float,
            HexAscii | Binary => ValueClass::Text,
        }
    }

    /// Formats decoding to strings never take part in the adjustment chain.
    pub const fn is_textual(&self) -> bool {
        matches!(self.class(), ValueClass::Text)
    }

    /// Canonical tag string, identical to the serde name.
    pub const fn as_str(&self) -> &'static str {
        use RegisterFormat::*;
        match self {
            Signed => "Signed",
            Unsigned => "Unsigned",
            HexAscii => "Hex - ASCII",
            Binary => "Binary",
            LongAbCd => "Long AB CD",
            LongCdAb => "Long CD AB",
            LongBaDc => "Long BA DC",
            LongDcBa => "Long DC BA",
            FloatAbCd => "Float AB CD",
            FloatCdAb => "Float CD AB",
            FloatBaDc => "Float BA DC",
            FloatDcBa => "Float DC BA",
            DoubleAbCdEfGh => "Double AB CD EF GH",
            DoubleGhEfCdAb => "Double GH EF CD AB",
            DoubleBaDcFeHg => "Double BA DC FE HG",
            DoubleHgFeDcBa => "Double HG FE DC BA",
        }
    }

    /// Wire layout of a multi-word format; `None` for single-word formats.
    pub(crate) const fn layout(&self) -> Option<WireLayout> {
        use RegisterFormat::*;
        let (words, swapped_bytes) = match self {
            Signed | Unsigned | HexAscii | Binary => return None,
            LongAbCd | FloatAbCd | DoubleAbCdEfGh => (WordOrder::HighFirst, false),
            LongCdAb | FloatCdAb | DoubleGhEfCdAb => (WordOrder::LowFirst, false),
            LongBaDc | FloatBaDc | DoubleBaDcFeHg => (WordOrder::HighFirst, true),
            LongDcBa | FloatDcBa | DoubleHgFeDcBa => (WordOrder::LowFirst, true),
        };
        Some(WireLayout {
            words,
            swapped_bytes,
        })
    }
}

impl fmt::Display for RegisterFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn tag_set_is_closed_and_round_trips_through_serde() {
        let mut seen = 0usize;
        for format in RegisterFormat::iter() {
            let tag = serde_yaml::to_string(&format).unwrap();
            let back: RegisterFormat = serde_yaml::from_str(&tag).unwrap();
            assert_eq!(format, back);
            assert_eq!(tag.trim(), format.as_str());
            seen += 1;
        }
        assert_eq!(seen, 16);
    }

    #[test]
    fn word_lengths_match_the_tag_families() {
        for format in RegisterFormat::iter() {
            let expected = match format.as_str() {
                s if s.starts_with("Double") => 4,
                s if s.starts_with("Long") || s.starts_with("Float") => 2,
                _ => 1,
            };
            assert_eq!(format.word_len(), expected, "{format}");
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!(serde_yaml::from_str::<RegisterFormat>("Float DC AB").is_err());
    }
}
