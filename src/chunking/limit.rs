//! Token budget configuration parsing.

use anyhow::{Context, Result};

/// How much of a model's context window a single chunk may use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BudgetLimit {
    /// Fraction of the model context length, in `(0, 1]`.
    Fraction(f64),
    /// Absolute token count.
    Absolute(usize),
}

impl BudgetLimit {
    /// Calculate the per-chunk token budget for a model context length.
    pub fn effective_budget(&self, context_length: usize) -> usize {
        match self {
            BudgetLimit::Fraction(f) => ((context_length as f64) * f).floor() as usize,
            BudgetLimit::Absolute(tokens) => *tokens,
        }
    }

    pub fn is_fraction(&self) -> bool {
        matches!(self, BudgetLimit::Fraction(_))
    }
}

impl Default for BudgetLimit {
    fn default() -> Self {
        BudgetLimit::Fraction(super::DEFAULT_MAX_TOKENS_FRACTION)
    }
}

impl std::fmt::Display for BudgetLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BudgetLimit::Fraction(frac) => write!(f, "{}%", frac * 100.0),
            BudgetLimit::Absolute(tokens) => write!(f, "{}", tokens),
        }
    }
}

/// Parse a budget limit string.
///
/// Accepts:
/// - Percentage of the model context: "80%", "50%"
/// - Fraction of the model context: "0.8"
/// - Absolute token count: "12000"
pub fn parse_budget_limit(s: &str) -> Result<BudgetLimit> {
    let s = s.trim();

    if s.is_empty() {
        anyhow::bail!("Budget limit cannot be empty");
    }

    if let Some(num_str) = s.strip_suffix('%') {
        let pct: f64 = num_str
            .trim()
            .parse()
            .with_context(|| format!("Invalid percentage in budget limit: {}", s))?;
        return fraction(pct / 100.0, s);
    }

    if s.contains('.') {
        let frac: f64 = s
            .parse()
            .with_context(|| format!("Invalid fraction in budget limit: {}", s))?;
        return fraction(frac, s);
    }

    let tokens: usize = s
        .parse()
        .with_context(|| format!("Invalid absolute budget limit: {}", s))?;
    if tokens == 0 {
        anyhow::bail!("Budget limit cannot be zero");
    }
    Ok(BudgetLimit::Absolute(tokens))
}

fn fraction(frac: f64, original: &str) -> Result<BudgetLimit> {
    if !(frac > 0.0 && frac <= 1.0) {
        anyhow::bail!(
            "Budget fraction must be greater than 0 and at most 100%, got {}",
            original
        );
    }
    Ok(BudgetLimit::Fraction(frac))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_percentage() {
        assert_eq!(
            parse_budget_limit("80%").unwrap(),
            BudgetLimit::Fraction(0.8)
        );
        assert_eq!(
            parse_budget_limit("100%").unwrap(),
            BudgetLimit::Fraction(1.0)
        );
    }

    #[test]
    fn test_parse_fraction() {
        assert_eq!(
            parse_budget_limit("0.5").unwrap(),
            BudgetLimit::Fraction(0.5)
        );
    }

    #[test]
    fn test_parse_absolute() {
        assert_eq!(
            parse_budget_limit(" 12000 ").unwrap(),
            BudgetLimit::Absolute(12000)
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_budget_limit("").is_err());
        assert!(parse_budget_limit("lots").is_err());
        assert!(parse_budget_limit("0%").is_err());
        assert!(parse_budget_limit("150%").is_err());
        assert!(parse_budget_limit("1.5").is_err());
        assert!(parse_budget_limit("0").is_err());
        assert!(parse_budget_limit("-10%").is_err());
    }

    #[test]
    fn test_effective_budget() {
        assert_eq!(BudgetLimit::Fraction(0.5).effective_budget(16_000), 8_000);
        assert_eq!(BudgetLimit::Absolute(500).effective_budget(16_000), 500);
        assert_eq!(BudgetLimit::Fraction(0.5).effective_budget(1), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(BudgetLimit::Fraction(0.5).to_string(), "50%");
        assert_eq!(BudgetLimit::Absolute(900).to_string(), "900");
    }
}
