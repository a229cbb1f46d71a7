//! # Topic Classifier
//! Maps a headline to one of the fixed routing categories via
//! case-insensitive keyword matching. Pure and total: any string
//! (including empty) classifies without a failure mode.

use serde::{Deserialize, Serialize};

/// Fixed topic routing tag, reused as the `ticker` column in the score store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Macro,
    Political,
    Equity,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Macro => "macro",
            Category::Political => "political",
            Category::Equity => "equity",
        }
    }

    /// All categories, in store-file order.
    pub fn all() -> [Category; 3] {
        [Category::Macro, Category::Political, Category::Equity]
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "macro" => Ok(Category::Macro),
            "political" => Ok(Category::Political),
            "equity" => Ok(Category::Equity),
            _ => Err(()),
        }
    }
}

const POLITICAL_KEYWORDS: &[&str] = &[
    "putin",
    "trump",
    "election",
    "senate",
    "vote",
    "white house",
    "parliament",
];

const MACRO_KEYWORDS: &[&str] = &[
    "inflation",
    "rate hike",
    "interest rate",
    "fed",
    "ecb",
    "central bank",
    "gdp",
    "unemployment",
    "trade agreement",
];

const EQUITY_KEYWORDS: &[&str] = &[
    "earnings",
    "ipo",
    "stock",
    "dividend",
    "guidance",
    "merger",
    "acquisition",
    "ceo",
    "layoffs",
];

/// Classify a headline by keyword lists, evaluated in fixed priority order
/// (political, then macro, then equity). First match wins. No match falls
/// back to `Macro` deterministically.
pub fn classify(headline: &str) -> Category {
    let h = headline.to_lowercase();
    if POLITICAL_KEYWORDS.iter().any(|kw| h.contains(kw)) {
        Category::Political
    } else if MACRO_KEYWORDS.iter().any(|kw| h.contains(kw)) {
        Category::Macro
    } else if EQUITY_KEYWORDS.iter().any(|kw| h.contains(kw)) {
        Category::Equity
    } else {
        Category::Macro
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macro_keywords_route_to_macro() {
        assert_eq!(
            classify("Fed hikes rates amid inflation fears"),
            Category::Macro
        );
        assert_eq!(classify("GDP surprise lifts futures"), Category::Macro);
    }

    #[test]
    fn political_wins_priority_over_macro() {
        // "senate" (political) and "trade agreement" (macro) both present;
        // political is evaluated first.
        assert_eq!(
            classify("Senate votes on new trade agreement"),
            Category::Political
        );
        assert_eq!(classify("Senate votes on new trade bill"), Category::Political);
    }

    #[test]
    fn equity_keywords_route_to_equity() {
        assert_eq!(classify("AAPL beats earnings guidance"), Category::Equity);
        assert_eq!(classify("Chipmaker announces IPO pricing"), Category::Equity);
    }

    #[test]
    fn no_match_falls_back_to_macro() {
        assert_eq!(classify("Quiet day across global markets"), Category::Macro);
        assert_eq!(classify(""), Category::Macro);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(classify("TRUMP COMMENTS ON TARIFF VOTE"), Category::Political);
    }
}
