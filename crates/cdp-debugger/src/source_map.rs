//! Source map v3 decoding and position translation.
//!
//! Lines are one-based inside this module and columns are zero-based, as in
//! the source map format. Callers convert from the runtime's zero-based
//! lines exactly once on the way in and once on the way out.

use std::cmp::Ordering;

use serde::Deserialize;

use crate::error::SourceMapError;

/// Tie-breaking rule when a lookup falls between two mapped positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    /// Nearest mapping at or before the needle.
    GreatestLowerBound,
    /// Nearest mapping at or after the needle.
    LeastUpperBound,
}

/// Position in an original source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition {
    /// Source path as listed in the map (with `sourceRoot` applied).
    pub source: String,
    /// One-based.
    pub line: u32,
    /// Zero-based.
    pub column: u32,
}

/// Position in the generated script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratedPosition {
    /// One-based.
    pub line: u32,
    /// Zero-based.
    pub column: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSourceMap {
    #[serde(default)]
    version: u64,
    #[serde(default)]
    sources: Vec<Option<String>>,
    #[serde(default)]
    source_root: Option<String>,
    #[serde(default)]
    mappings: String,
    #[serde(default)]
    sections: Option<serde_json::Value>,
}

/// One decoded `mappings` segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Mapping {
    generated_line: u32,
    generated_column: u32,
    /// `None` for segments that map to no source.
    source: Option<usize>,
    original_line: u32,
    original_column: u32,
}

/// A parsed source map that translates positions in both directions.
#[derive(Debug, Clone)]
pub struct PositionMapper {
    sources: Vec<String>,
    /// Sorted by generated position.
    by_generated: Vec<Mapping>,
    /// Sourced segments only, sorted by (source, original position).
    by_original: Vec<Mapping>,
}

impl PositionMapper {
    /// Parse a source map JSON document.
    pub fn parse(json: &str) -> Result<Self, SourceMapError> {
        let raw: RawSourceMap =
            serde_json::from_str(json).map_err(|e| SourceMapError::Json(e.to_string()))?;
        if raw.sections.is_some() {
            return Err(SourceMapError::IndexMap);
        }
        if raw.version != 3 {
            return Err(SourceMapError::UnsupportedVersion(raw.version));
        }

        let root = raw.source_root.as_deref().unwrap_or_default();
        let sources = raw
            .sources
            .iter()
            .map(|s| apply_source_root(root, s.as_deref().unwrap_or_default()))
            .collect::<Vec<_>>();

        let mut by_generated = decode_mappings(&raw.mappings, sources.len())?;
        by_generated.sort_by(compare_generated);

        let mut by_original: Vec<Mapping> = by_generated
            .iter()
            .filter(|m| m.source.is_some())
            .copied()
            .collect();
        by_original.sort_by(compare_original);

        Ok(Self {
            sources,
            by_generated,
            by_original,
        })
    }

    /// Every source the map refers to, in declaration order.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Map a generated position to its original position using one bias.
    ///
    /// Returns `None` when the nearest segment lies on another generated
    /// line or maps to no source.
    pub fn original_position_for(
        &self,
        line: u32,
        column: u32,
        bias: Bias,
    ) -> Option<OriginalPosition> {
        let index = search(&self.by_generated, &(line, column), bias, |m| {
            (m.generated_line, m.generated_column)
        })?;
        let mapping = self.by_generated[index];
        if mapping.generated_line != line {
            return None;
        }
        let source = mapping.source?;
        Some(OriginalPosition {
            source: self.sources[source].clone(),
            line: mapping.original_line,
            column: mapping.original_column,
        })
    }

    /// Map an original position to the generated script using one bias.
    ///
    /// Returns `None` when the nearest segment belongs to another source.
    pub fn generated_position_for(
        &self,
        source: &str,
        line: u32,
        column: u32,
        bias: Bias,
    ) -> Option<GeneratedPosition> {
        let source_index = self.sources.iter().position(|s| s == source)?;
        let needle = (Some(source_index), line, column);
        let index = search(&self.by_original, &needle, bias, |m| {
            (m.source, m.original_line, m.original_column)
        })?;
        let mapping = self.by_original[index];
        if mapping.source != Some(source_index) {
            return None;
        }
        Some(GeneratedPosition {
            line: mapping.generated_line,
            column: mapping.generated_column,
        })
    }

    /// Generated → original, least-upper-bound first, then greatest-lower-bound.
    pub fn to_original(&self, line: u32, column: u32) -> Option<OriginalPosition> {
        self.original_position_for(line, column, Bias::LeastUpperBound)
            .or_else(|| self.original_position_for(line, column, Bias::GreatestLowerBound))
    }

    /// Original → generated, least-upper-bound first, then greatest-lower-bound.
    pub fn to_generated(&self, source: &str, line: u32, column: u32) -> Option<GeneratedPosition> {
        self.generated_position_for(source, line, column, Bias::LeastUpperBound)
            .or_else(|| self.generated_position_for(source, line, column, Bias::GreatestLowerBound))
    }
}

fn apply_source_root(root: &str, source: &str) -> String {
    if root.is_empty() || source.starts_with('/') || source.contains("://") {
        return source.to_string();
    }
    format!("{}/{}", root.trim_end_matches('/'), source)
}

fn compare_generated(a: &Mapping, b: &Mapping) -> Ordering {
    (a.generated_line, a.generated_column).cmp(&(b.generated_line, b.generated_column))
}

fn compare_original(a: &Mapping, b: &Mapping) -> Ordering {
    (a.source, a.original_line, a.original_column)
        .cmp(&(b.source, b.original_line, b.original_column))
        .then_with(|| compare_generated(a, b))
}

/// Binary search over a slice sorted by `key`, honouring `bias` when there
/// is no exact match. Within a run of equal keys the first index wins.
fn search<K, F>(items: &[Mapping], needle: &K, bias: Bias, key: F) -> Option<usize>
where
    K: Ord,
    F: Fn(&Mapping) -> K,
{
    let lower = items.partition_point(|m| key(m) < *needle);
    if lower < items.len() && key(&items[lower]) == *needle {
        return Some(lower);
    }
    match bias {
        Bias::LeastUpperBound => (lower < items.len()).then_some(lower),
        Bias::GreatestLowerBound => {
            let prev = key(&items[lower.checked_sub(1)?]);
            Some(items.partition_point(|m| key(m) < prev))
        }
    }
}

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn base64_digit(byte: u8) -> Option<i64> {
    BASE64_ALPHABET
        .iter()
        .position(|&b| b == byte)
        .map(|p| p as i64)
}

/// Decode one comma-separated segment into its signed VLQ fields.
fn decode_vlq(segment: &str) -> Result<Vec<i64>, SourceMapError> {
    let vlq_error = |reason: &str| SourceMapError::Vlq {
        segment: segment.to_string(),
        reason: reason.to_string(),
    };

    let mut values = Vec::with_capacity(5);
    let mut shift = 0u32;
    let mut accumulator = 0i64;
    for byte in segment.bytes() {
        let digit = base64_digit(byte).ok_or_else(|| vlq_error("not a base64 digit"))?;
        if shift > 60 {
            return Err(vlq_error("value overflows"));
        }
        accumulator += (digit & 0b1_1111) << shift;
        if digit & 0b10_0000 != 0 {
            shift += 5;
            continue;
        }
        let magnitude = accumulator >> 1;
        values.push(if accumulator & 1 == 1 { -magnitude } else { magnitude });
        accumulator = 0;
        shift = 0;
    }
    if shift != 0 {
        return Err(vlq_error("truncated value"));
    }
    Ok(values)
}

fn decode_mappings(mappings: &str, source_count: usize) -> Result<Vec<Mapping>, SourceMapError> {
    let mut decoded = Vec::new();
    let mut source = 0i64;
    let mut original_line = 0i64;
    let mut original_column = 0i64;

    for (line_index, line) in mappings.split(';').enumerate() {
        let mut generated_column = 0i64;
        for segment in line.split(',').filter(|s| !s.is_empty()) {
            let fields = decode_vlq(segment)?;
            let invalid = |reason: &str| SourceMapError::Vlq {
                segment: segment.to_string(),
                reason: reason.to_string(),
            };

            generated_column += fields[0];
            let mut mapping = Mapping {
                generated_line: line_index as u32 + 1,
                generated_column: u32::try_from(generated_column)
                    .map_err(|_| invalid("negative generated column"))?,
                source: None,
                original_line: 0,
                original_column: 0,
            };

            match fields.len() {
                1 => {}
                4 | 5 => {
                    source += fields[1];
                    original_line += fields[2];
                    original_column += fields[3];
                    let index =
                        usize::try_from(source).map_err(|_| invalid("negative source index"))?;
                    if index >= source_count {
                        return Err(invalid("source index out of range"));
                    }
                    mapping.source = Some(index);
                    mapping.original_line = u32::try_from(original_line + 1)
                        .map_err(|_| invalid("negative original line"))?;
                    mapping.original_column = u32::try_from(original_column)
                        .map_err(|_| invalid("negative original column"))?;
                }
                _ => return Err(invalid("segment must have 1, 4 or 5 fields")),
            }
            decoded.push(mapping);
        }
    }
    Ok(decoded)
}
