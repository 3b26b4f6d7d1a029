//! The metadata-license gate.
//!
//! Component metadata must be under a license permissive enough to be
//! aggregated and redistributed in a catalog. The gate evaluates SPDX
//! expressions without parentheses: `AND` requires every operand to
//! qualify, `OR` requires at least one, and a trailing `+` or an
//! `-or-later` suffix on an operand is ignored. Expressions containing
//! parentheses are rejected outright.

/// License identifiers acceptable for metainfo metadata. Trailing `+` and
/// `-or-later` are stripped from candidate tokens before the lookup, so
/// `GPL-3.0+` and `GPL-3.0-or-later` both match the `GPL-3.0` entry.
/// An `-only` suffix is not stripped and therefore never matches.
const METADATA_LICENSES: &[&str] = &[
    "0BSD",
    "AGPL-3.0",
    "Apache-2.0",
    "Artistic-2.0",
    "BSD-2-Clause",
    "BSD-3-Clause",
    "BSL-1.0",
    "CC-BY-3.0",
    "CC-BY-4.0",
    "CC-BY-SA-3.0",
    "CC-BY-SA-4.0",
    "CC0",
    "CC0-1.0",
    "EPL-1.0",
    "EPL-2.0",
    "FSFAP",
    "FSFUL",
    "FSFULLR",
    "FTL",
    "GFDL-1.1",
    "GFDL-1.2",
    "GFDL-1.3",
    "GPL-2.0",
    "GPL-3.0",
    "ISC",
    "LGPL-2.0",
    "LGPL-2.1",
    "LGPL-3.0",
    "MIT",
    "MPL-2.0",
    "Unlicense",
    "WTFPL",
    "X11",
    "Zlib",
    "public-domain",
];

/// Check whether an SPDX expression qualifies as a metadata license.
pub fn is_metadata_license(expression: &str) -> bool {
    let expression = expression.trim();
    if expression.is_empty() || expression.contains('(') || expression.contains(')') {
        return false;
    }

    let tokens: Vec<&str> = expression.split_whitespace().collect();
    let has_or = tokens.iter().any(|t| t.eq_ignore_ascii_case("OR"));
    let mut operands = tokens
        .iter()
        .filter(|t| !t.eq_ignore_ascii_case("OR") && !t.eq_ignore_ascii_case("AND"));

    if has_or {
        operands.any(token_allowed)
    } else {
        operands.all(token_allowed)
    }
}

fn token_allowed(token: &&str) -> bool {
    let token = token.strip_suffix('+').unwrap_or(token);
    let token = token.strip_suffix("-or-later").unwrap_or(token);
    METADATA_LICENSES.contains(&token)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_identifiers() {
        assert!(is_metadata_license("FSFAP"));
        assert!(is_metadata_license("MIT"));
        assert!(is_metadata_license("CC0-1.0"));
        assert!(!is_metadata_license("Proprietary"));
        assert!(!is_metadata_license(""));
    }

    #[test]
    fn trailing_plus_and_or_later_are_ignored() {
        assert!(is_metadata_license("GPL-3.0+"));
        assert!(is_metadata_license("GPL-3.0-or-later"));
        assert!(!is_metadata_license("GFDL-1.3-only"));
    }

    #[test]
    fn and_requires_all_operands() {
        assert!(!is_metadata_license("GPL-3.0+ AND GFDL-1.3-only"));
        assert!(is_metadata_license("MIT AND FSFAP"));
    }

    #[test]
    fn or_requires_one_operand() {
        assert!(is_metadata_license("GPL-3.0+ OR GFDL-1.3-only"));
        assert!(!is_metadata_license("Proprietary OR AllRightsReserved"));
    }

    #[test]
    fn parentheses_are_rejected() {
        assert!(!is_metadata_license("(MIT OR FSFAP)"));
        assert!(!is_metadata_license("MIT AND (FSFAP OR CC0-1.0)"));
    }
}
