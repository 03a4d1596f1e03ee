//! Well-known external actions
//!
//! Actions that live outside the catalog (registrations on partner registries) but must still
//! be completable. Only titles listed here resolve to a synthetic action, anything else is a
//! typed not found.

use std::str::FromStr;

pub use rdk_common::action::SYNTHETIC_PREFIX;
use rdk_common::{Action, Chain, Difficulty};

/// Category given to synthetic actions
pub const SYNTHETIC_CATEGORY: &str = "external";

/// Titles recognized out of the box
pub const DEFAULT_WELL_KNOWN: [&str; 4] = [
    "Register on Optimism",
    "Register on Base",
    "Register on Celo",
    "Register on Arbitrum",
];

/// Derive the synthetic id of a title: lowercased, whitespace runs replaced by `-`
pub fn synthetic_id(title: &str) -> String {
    let slug = title
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-");

    format!("{SYNTHETIC_PREFIX}{slug}")
}

/// Reviewable allow-list of well-known external actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WellKnownRegistry {
    titles: Vec<String>,
}

impl Default for WellKnownRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_WELL_KNOWN.iter().map(|title| title.to_string()))
    }
}

impl WellKnownRegistry {
    /// Create new [`WellKnownRegistry`] from a set of titles
    pub fn new<I>(titles: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut registry = Self { titles: Vec::new() };
        registry.extend(titles);
        registry
    }

    /// Add titles, skipping blanks and duplicates
    pub fn extend<I>(&mut self, titles: I)
    where
        I: IntoIterator<Item = String>,
    {
        for title in titles {
            let title = title.trim().to_string();
            if !title.is_empty() && self.canonical_title(&title).is_none() {
                self.titles.push(title);
            }
        }
    }

    /// Registered titles
    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    fn canonical_title(&self, title: &str) -> Option<&str> {
        let title = title.trim();
        self.titles
            .iter()
            .find(|known| known.eq_ignore_ascii_case(title))
            .map(String::as_str)
    }

    /// Synthetic action for a registered title
    pub fn lookup_title(&self, title: &str) -> Option<Action> {
        self.canonical_title(title).map(synthetic_action)
    }

    /// Synthetic action whose derived id is `id`
    pub fn lookup_id(&self, id: &str) -> Option<Action> {
        if !id.starts_with(SYNTHETIC_PREFIX) {
            return None;
        }

        self.titles
            .iter()
            .find(|title| synthetic_id(title) == id)
            .map(|title| synthetic_action(title))
    }
}

/// Chain named after the last `on` in a title, e.g. `Register on Celo`
fn chain_from_title(title: &str) -> Option<Chain> {
    let mut words = title.split_whitespace().rev();
    let candidate = words.next()?;
    match words.next() {
        Some(on) if on.eq_ignore_ascii_case("on") => Chain::from_str(candidate).ok(),
        _ => None,
    }
}

fn synthetic_action(title: &str) -> Action {
    Action {
        id: synthetic_id(title),
        title: title.to_string(),
        description: String::new(),
        category: SYNTHETIC_CATEGORY.to_string(),
        chain: chain_from_title(title)
            .map(|chain| chain.to_string())
            .unwrap_or_default(),
        difficulty: Difficulty::Beginner,
        prerequisites: Vec::new(),
        steps: Vec::new(),
        rewards: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_id() {
        assert_eq!(
            synthetic_id("Register on Optimism"),
            "synthetic-register-on-optimism"
        );
        assert_eq!(synthetic_id("  Register \t on  Base "), "synthetic-register-on-base");
    }

    #[test]
    fn test_registry_lookup() {
        let registry = WellKnownRegistry::default();

        let action = registry.lookup_title("register on optimism").unwrap();
        assert_eq!(action.id, "synthetic-register-on-optimism");
        assert_eq!(action.title, "Register on Optimism");
        assert_eq!(action.chain, "optimism");
        assert!(action.rewards.is_empty());

        assert_eq!(
            registry.lookup_id("synthetic-register-on-celo").unwrap().title,
            "Register on Celo"
        );

        assert!(registry.lookup_title("Register on Mars").is_none());
        assert!(registry.lookup_id("register-on-celo").is_none());
        assert!(registry.lookup_id("synthetic-anything-goes").is_none());
    }

    #[test]
    fn test_registry_extend() {
        let mut registry = WellKnownRegistry::default();
        registry.extend(vec![
            "Join the Guild".to_string(),
            "register on base".to_string(),
            "   ".to_string(),
        ]);

        assert_eq!(registry.titles().len(), DEFAULT_WELL_KNOWN.len() + 1);
        let guild = registry.lookup_title("Join the Guild").unwrap();
        assert_eq!(guild.id, "synthetic-join-the-guild");
        assert_eq!(guild.chain, "");
    }
}
