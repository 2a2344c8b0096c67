//! Structured extraction from the free-text `infos_client` column.
//!
//! The column is expected to hold `Clé: valeur` segments separated by
//! pipes, e.g. `Entreprise: Acme | Secteur: retail | Besoin: ...`.
//! Matching is case-insensitive; a missing label yields an empty string.
//! Partial extraction is normal and never an error — the verbatim text is
//! always kept as `contexte`.

use regex::Regex;
use std::sync::LazyLock;

static ENTREPRISE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)entreprise:\s*([^|]+)").unwrap());

static SECTEUR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)secteur:\s*([^|]+)").unwrap());

static BESOIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)besoin:\s*([^|]+)").unwrap());

/// Attributes pulled out of one `infos_client` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub entreprise: String,
    pub secteur: String,
    pub besoin: String,
    /// The original text, verbatim.
    pub contexte: String,
}

pub fn parse_client_info(infos_client: &str) -> ClientInfo {
    ClientInfo {
        entreprise: capture(&ENTREPRISE_RE, infos_client),
        secteur: capture(&SECTEUR_RE, infos_client),
        besoin: capture(&BESOIN_RE, infos_client),
        contexte: infos_client.to_string(),
    }
}

fn capture(re: &Regex, text: &str) -> String {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_extraction() {
        let info = parse_client_info(
            "Entreprise: Acme | Secteur: retail | Besoin: automatiser la facturation",
        );
        assert_eq!(info.entreprise, "Acme");
        assert_eq!(info.secteur, "retail");
        assert_eq!(info.besoin, "automatiser la facturation");
        assert_eq!(
            info.contexte,
            "Entreprise: Acme | Secteur: retail | Besoin: automatiser la facturation"
        );
    }

    #[test]
    fn test_labels_are_case_insensitive() {
        let info = parse_client_info("ENTREPRISE: Globex | secteur: finance");
        assert_eq!(info.entreprise, "Globex");
        assert_eq!(info.secteur, "finance");
    }

    #[test]
    fn test_missing_labels_yield_empty_strings() {
        let info = parse_client_info("Un appel sans structure particulière");
        assert_eq!(info.entreprise, "");
        assert_eq!(info.secteur, "");
        assert_eq!(info.besoin, "");
        assert_eq!(info.contexte, "Un appel sans structure particulière");
    }

    #[test]
    fn test_partial_extraction_is_normal() {
        let info = parse_client_info("Besoin: veille concurrentielle");
        assert_eq!(info.entreprise, "");
        assert_eq!(info.besoin, "veille concurrentielle");
    }

    #[test]
    fn test_value_stops_at_next_pipe() {
        let info = parse_client_info("Besoin: reporting mensuel | Notes: urgent");
        assert_eq!(info.besoin, "reporting mensuel");
    }

    #[test]
    fn test_values_are_trimmed() {
        let info = parse_client_info("Entreprise:   Initech   | Secteur: tech");
        assert_eq!(info.entreprise, "Initech");
    }
}
