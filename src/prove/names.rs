//! Translation between decorated value names and prover atoms
//!
//! The prover cannot use `'` as a decorator (it quotes atoms), so the
//! decoration becomes `^` at the position it held in the surface form, a
//! scope prefix disambiguates fields from locals, and the whole name is
//! quoted: `'a` becomes `'^a'`, `a'` becomes `'a^'`, and `a'tag` becomes
//! `'a^tag'` — each with `this.` prepended inside the quotes when `a` is a
//! field.

use crate::scope::{ScopeId, ScopeMap};
use crate::tokens::{Token, TokenKind};

/// The prover atom for a decorated value name, or `None` for an undecorated
/// identifier (which is left untouched)
pub fn prover_atom(token: &Token, scopes: &ScopeMap, scope: ScopeId) -> Option<String> {
    let variable = token.variable_name();
    let prefix = scopes.scope_prefix(scope, variable);
    match token.kind {
        TokenKind::PreValueName => Some(format!("'{}^{}'", prefix, variable)),
        TokenKind::PostValueName => Some(format!("'{}{}^'", prefix, variable)),
        TokenKind::MidValueName => {
            let quote = token.src.find('\'').unwrap();
            let tag = &token.src[quote + 1..];
            Some(format!("'{}{}^{}'", prefix, variable, tag))
        }
        _ => None,
    }
}

/// The atom for the value a method returns, `'return^'` (with a scope
/// prefix if `return` were ever scoped, which it is not today)
pub fn return_atom(scopes: &ScopeMap, scope: ScopeId) -> String {
    format!("'{}return^'", scopes.scope_prefix(scope, "return"))
}

/// Extracts the variable name from a prover atom, keeping the quotes:
/// `'abc'` stays `'abc'`, `'^abc'` gives `'abc'`, and both `'abc^'` and
/// `'abc^de'` give `'abc'`. This is the inverse of translation up to the
/// scope prefix, used when carrying type information across.
pub fn var_name(val: &str) -> String {
    match val.find('^') {
        None => val.to_string(),
        Some(1) => format!("'{}", &val[2..]),
        Some(pos) => format!("{}'", &val[..pos]),
    }
}
