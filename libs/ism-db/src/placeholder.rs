//! Parameter-placeholder normalisation (spec §4.1 / §10.4).
//!
//! Two caller-facing marker styles are recognised: `?` (qmark, embedded-backend
//! convention) and `%s` (pyformat, networked-backend convention). A statement must use
//! exactly one style throughout; mixed or absent markers are rejected.

use ism_errors::{IsmError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerStyle {
    QMark,
    PyFormat,
}

/// Scans `sql` left to right, classifying every placeholder it finds. Returns an error
/// if both styles appear, or if none do.
fn detect_style(sql: &str) -> Result<MarkerStyle> {
    let mut saw_qmark = false;
    let mut saw_pyformat = false;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'?' => {
                saw_qmark = true;
                i += 1;
            }
            b'%' if bytes.get(i + 1) == Some(&b's') => {
                saw_pyformat = true;
                i += 2;
            }
            _ => i += 1,
        }
    }
    match (saw_qmark, saw_pyformat) {
        (true, false) => Ok(MarkerStyle::QMark),
        (false, true) => Ok(MarkerStyle::PyFormat),
        _ => Err(IsmError::UnrecognisedParameterisationCharacter(
            sql.to_string(),
        )),
    }
}

fn rewrite(sql: &str, from: MarkerStyle, to: MarkerStyle) -> String {
    if from == to {
        return sql.to_string();
    }
    match (from, to) {
        (MarkerStyle::QMark, MarkerStyle::PyFormat) => sql.replace('?', "%s"),
        (MarkerStyle::PyFormat, MarkerStyle::QMark) => sql.replace("%s", "?"),
        _ => unreachable!(),
    }
}

/// Normalises `sql`'s placeholders to `target`'s native style. Fails with
/// `UnrecognisedParameterisationCharacter` if `sql` mixes styles or uses neither.
pub fn prepare_parameterised_statement(sql: &str, target: MarkerStyle) -> Result<String> {
    let found = detect_style(sql)?;
    Ok(rewrite(sql, found, target))
}

/// Rewrites any `%s` markers back to `?`, which is the only placeholder style the
/// underlying SQL driver understands for either backend. This is the boundary where the
/// contract-facing marker style (which may be `%s` for the networked backend) is
/// reconciled with the driver's own wire format.
pub fn to_driver_markers(sql: &str) -> String {
    sql.replace("%s", "?")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qmark_passthrough_for_qmark_target() {
        let sql = "SELECT * FROM actions WHERE action = ?";
        assert_eq!(
            prepare_parameterised_statement(sql, MarkerStyle::QMark).unwrap(),
            sql
        );
    }

    #[test]
    fn qmark_rewritten_to_pyformat() {
        let sql = "SELECT * FROM actions WHERE action = ? AND active = ?";
        let out = prepare_parameterised_statement(sql, MarkerStyle::PyFormat).unwrap();
        assert_eq!(out, "SELECT * FROM actions WHERE action = %s AND active = %s");
    }

    #[test]
    fn pyformat_rewritten_to_qmark() {
        let sql = "SELECT * FROM actions WHERE action = %s";
        let out = prepare_parameterised_statement(sql, MarkerStyle::QMark).unwrap();
        assert_eq!(out, "SELECT * FROM actions WHERE action = ?");
    }

    #[test]
    fn no_markers_rejected() {
        let err = prepare_parameterised_statement("SELECT 1", MarkerStyle::QMark).unwrap_err();
        assert!(matches!(
            err,
            IsmError::UnrecognisedParameterisationCharacter(_)
        ));
    }

    #[test]
    fn mixed_markers_rejected() {
        let err =
            prepare_parameterised_statement("SELECT * WHERE a = ? AND b = %s", MarkerStyle::QMark)
                .unwrap_err();
        assert!(matches!(
            err,
            IsmError::UnrecognisedParameterisationCharacter(_)
        ));
    }

    #[test]
    fn driver_markers_always_qmark() {
        assert_eq!(to_driver_markers("a = %s AND b = %s"), "a = ? AND b = ?");
        assert_eq!(to_driver_markers("a = ?"), "a = ?");
    }
}
