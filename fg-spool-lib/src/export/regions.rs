//! Parsing of region-file text.
//!
//! Region files are free-form text scanned for `-L <chr>:<lo>-<hi>` tokens;
//! anything between tokens is ignored, so command fragments or notes may sit
//! alongside the regions themselves.

use crate::error::{Result, SpoolError};

/// One genomic region to query, zero-based bounds as written in the file.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub chr: String,
    pub lo: i64,
    pub hi: i64,
}

/// The token that introduces a region.
const REGION_FLAG: &str = "-L ";

/// Scans text for region tokens and returns them in order of appearance.
/// Incomplete tokens are skipped; numeric bounds too large to represent are
/// an error.
pub fn parse_regions(text: &str) -> Result<Vec<Region>> {
    let mut regions = Vec::new();
    let mut rest = text;
    while let Some(found) = rest.find(REGION_FLAG) {
        rest = &rest[found + REGION_FLAG.len()..];
        if let Some((region, consumed)) = match_region(rest)? {
            regions.push(region);
            rest = &rest[consumed..];
        }
    }
    Ok(regions)
}

/// Matches `<chr>:<lo>-<hi>` at the start of `text`, where the contig name is
/// everything up to the first colon (and may be empty). Returns the region
/// and how much of `text` the token consumed.
fn match_region(text: &str) -> Result<Option<(Region, usize)>> {
    let colon = match text.find(':') {
        Some(index) => index,
        None => return Ok(None),
    };
    let chr = &text[..colon];
    let after_chr = &text[colon + 1..];
    let lo_digits = leading_digits(after_chr);
    if lo_digits.is_empty() || !after_chr[lo_digits.len()..].starts_with('-') {
        return Ok(None);
    }
    let after_lo = &after_chr[lo_digits.len() + 1..];
    let hi_digits = leading_digits(after_lo);
    if hi_digits.is_empty() {
        return Ok(None);
    }
    let consumed = colon + 1 + lo_digits.len() + 1 + hi_digits.len();
    let token = &text[..consumed];
    let lo = parse_bound(lo_digits, token)?;
    let hi = parse_bound(hi_digits, token)?;
    Ok(Some((Region { chr: chr.to_string(), lo, hi }, consumed)))
}

fn leading_digits(text: &str) -> &str {
    let end = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
    &text[..end]
}

fn parse_bound(digits: &str, token: &str) -> Result<i64> {
    digits
        .parse::<i64>()
        .map_err(|_| SpoolError::InvalidRegion { text: token.to_string() })
}
