//! # Symbologies
//!
//! The linear barcode formats the optical decoder may be asked to read.
//!
//! Names accept both the short form used in scanner.toml (`ean13`) and the
//! reader names camera decoding libraries commonly use (`ean_reader`), so a
//! decoder config copied from a browser setup keeps working.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// A supported linear barcode format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbology {
    Code128,
    Ean13,
    Ean8,
    Code39,
    Code39Vin,
    Code93,
    UpcA,
    UpcE,
    Codabar,
    Interleaved2of5,
    Standard2of5,
}

impl Symbology {
    /// Every format the decoder configuration accepts.
    pub const ALL: [Symbology; 11] = [
        Symbology::Code128,
        Symbology::Ean13,
        Symbology::Ean8,
        Symbology::Code39,
        Symbology::Code39Vin,
        Symbology::Code93,
        Symbology::UpcA,
        Symbology::UpcE,
        Symbology::Codabar,
        Symbology::Interleaved2of5,
        Symbology::Standard2of5,
    ];

    /// Readers enabled when no `decoder.readers` list is configured.
    ///
    /// Retail stock in the shop is labelled EAN-13/UPC, internal labels
    /// are Code 128.
    pub fn default_readers() -> Vec<Symbology> {
        vec![
            Symbology::Code128,
            Symbology::Ean13,
            Symbology::Ean8,
            Symbology::Code39,
            Symbology::Code93,
            Symbology::UpcA,
            Symbology::UpcE,
            Symbology::Codabar,
            Symbology::Interleaved2of5,
        ]
    }

    /// Short config name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Symbology::Code128 => "code128",
            Symbology::Ean13 => "ean13",
            Symbology::Ean8 => "ean8",
            Symbology::Code39 => "code39",
            Symbology::Code39Vin => "code39_vin",
            Symbology::Code93 => "code93",
            Symbology::UpcA => "upc_a",
            Symbology::UpcE => "upc_e",
            Symbology::Codabar => "codabar",
            Symbology::Interleaved2of5 => "i2of5",
            Symbology::Standard2of5 => "2of5",
        }
    }

    /// Reader name as camera decoding libraries spell it.
    pub fn reader_name(&self) -> &'static str {
        match self {
            Symbology::Code128 => "code_128_reader",
            Symbology::Ean13 => "ean_reader",
            Symbology::Ean8 => "ean_8_reader",
            Symbology::Code39 => "code_39_reader",
            Symbology::Code39Vin => "code_39_vin_reader",
            Symbology::Code93 => "code_93_reader",
            Symbology::UpcA => "upc_reader",
            Symbology::UpcE => "upc_e_reader",
            Symbology::Codabar => "codabar_reader",
            Symbology::Interleaved2of5 => "i2of5_reader",
            Symbology::Standard2of5 => "2of5_reader",
        }
    }

    /// Fixed payload length for GTIN formats, `None` for variable-length ones.
    pub fn fixed_length(&self) -> Option<usize> {
        match self {
            Symbology::Ean13 => Some(13),
            Symbology::Ean8 => Some(8),
            Symbology::UpcA => Some(12),
            Symbology::UpcE => Some(8),
            _ => None,
        }
    }
}

impl std::fmt::Display for Symbology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Symbology {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        let name = normalized
            .strip_suffix("_reader")
            .unwrap_or(normalized.as_str());

        match name {
            "code128" | "code_128" => Ok(Symbology::Code128),
            "ean13" | "ean_13" | "ean" => Ok(Symbology::Ean13),
            "ean8" | "ean_8" => Ok(Symbology::Ean8),
            "code39" | "code_39" => Ok(Symbology::Code39),
            "code39_vin" | "code_39_vin" => Ok(Symbology::Code39Vin),
            "code93" | "code_93" => Ok(Symbology::Code93),
            "upc_a" | "upca" | "upc" => Ok(Symbology::UpcA),
            "upc_e" | "upce" => Ok(Symbology::UpcE),
            "codabar" => Ok(Symbology::Codabar),
            "i2of5" | "itf" | "interleaved_2_of_5" => Ok(Symbology::Interleaved2of5),
            "2of5" | "standard_2_of_5" => Ok(Symbology::Standard2of5),
            _ => Err(CoreError::UnknownSymbology(s.to_string())),
        }
    }
}

impl Serialize for Symbology {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Symbology {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
