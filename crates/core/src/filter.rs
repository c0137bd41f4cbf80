use crate::{Error, Feature, Result};
use cql2::{ARITHOPS, Expr};
use serde_json::{Value, json};
use std::str::FromStr;

/// A boolean row filter, written in [CQL2 text](https://docs.ogc.org/is/21-065r2/21-065r2.html).
///
/// Column names are CQL2 properties, e.g. `"orbit > 10 AND mission = 'MRO'"`.
/// A row on which the expression cannot be evaluated (e.g. it lacks one of
/// the columns) does not match.
///
/// # Examples
///
/// ```
/// use pdssp::{Feature, Filter};
///
/// let filter: Filter = "orbit > 10".parse().unwrap();
/// assert!(filter.matches(&Feature::new().attribute("orbit", 11)));
/// assert!(!filter.matches(&Feature::new().attribute("orbit", 9)));
/// assert!(!filter.matches(&Feature::new()));
/// ```
#[derive(Debug, Clone)]
pub struct Filter {
    expr: Expr,
}

impl Filter {
    /// Returns true if this feature matches the filter.
    pub fn matches(&self, feature: &Feature) -> bool {
        let value = json!({
            "type": "Feature",
            "geometry": feature.geometry,
            "properties": Value::Object(feature.attributes.clone()),
        });
        match self.expr.clone().matches(Some(&value)) {
            Ok(matches) => matches,
            Err(err) => {
                tracing::trace!("filter could not be evaluated on a row, skipping: {err}");
                false
            }
        }
    }

    /// Returns the underlying CQL2 expression.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

impl FromStr for Filter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Filter> {
        if !balanced(s) {
            return Err(Error::InvalidFilter(s.to_string()));
        }
        // The text parser stops at the longest valid prefix. Wrapping the input
        // makes the closing parenthesis required, so trailing tokens fail.
        let expr: Expr = format!("({s})").parse()?;
        if !is_predicate(&expr) {
            return Err(Error::InvalidFilter(s.to_string()));
        }
        Ok(Filter { expr })
    }
}

impl From<Expr> for Filter {
    fn from(expr: Expr) -> Filter {
        Filter { expr }
    }
}

/// Parentheses outside quoted literals never close more than they open.
fn balanced(s: &str) -> bool {
    let mut depth = 0usize;
    let mut quote = None;
    for c in s.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            (None, _) => {}
        }
    }
    true
}

fn is_predicate(expr: &Expr) -> bool {
    match expr {
        Expr::Bool(_) => true,
        Expr::Operation { op, args } => {
            if ["and", "or", "not"]
                .iter()
                .any(|logical| op.eq_ignore_ascii_case(logical))
            {
                args.iter().all(|arg| is_predicate(arg))
            } else {
                !ARITHOPS.contains(&op.as_str()) && op != "casei" && op != "accenti"
            }
        }
        _ => false,
    }
}
