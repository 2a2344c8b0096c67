//! Keyword-based context extraction from conversation history.
//!
//! Three fixed dictionaries map a category label to the substrings that
//! trigger it. The whole history is concatenated, lower-cased and tested
//! by plain containment. This is a heuristic, not a classifier: a keyword
//! that happens to be a substring of an unrelated word will match.

use crate::model::ChatMessage;

/// Sector labels and their trigger substrings.
const SECTEUR_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "énergie",
        &["énergie", "renouvelable", "solaire", "éolien", "électricité", "utilities"],
    ),
    (
        "retail",
        &["retail", "commerce", "vente", "magasin", "e-commerce", "boutique", "distribution"],
    ),
    (
        "finance",
        &["finance", "banque", "assurance", "fintech", "crédit", "investissement"],
    ),
    (
        "santé",
        &["santé", "médical", "hôpital", "pharma", "clinique", "cabinet"],
    ),
    (
        "tech",
        &["tech", "software", "saas", "it", "digital", "startup", "scale-up"],
    ),
    (
        "industrie",
        &["industrie", "manufacture", "production", "usine", "fabrication"],
    ),
    (
        "logistique",
        &["logistique", "transport", "supply chain", "livraison", "entrepôt"],
    ),
    (
        "rh",
        &["rh", "ressources humaines", "recrutement", "formation", "talent"],
    ),
    (
        "consulting",
        &["conseil", "consulting", "consultance", "cabinet de conseil"],
    ),
    (
        "immobilier",
        &["immobilier", "promotion", "foncier", "construction"],
    ),
    ("pme", &["pme", "tpe", "petite entreprise"]),
    (
        "corporate",
        &["corporate", "grande entreprise", "multinational", "groupe"],
    ),
];

/// Need labels and their trigger substrings.
const BESOIN_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "automatisation",
        &["automatisation", "automatiser", "automation", "on a besoin d'automatiser", "automatiquement"],
    ),
    (
        "veille",
        &["veille", "scouting", "monitoring", "surveillance", "tracker"],
    ),
    (
        "qualification",
        &["qualification", "qualifier", "leads", "prospects"],
    ),
    (
        "reporting",
        &["reporting", "rapport", "dashboard", "kpi", "tableau de bord", "suivi"],
    ),
    (
        "data",
        &["data", "données", "database", "analytics", "base de données"],
    ),
    (
        "facturation",
        &["facturation", "facture", "billing", "invoicing"],
    ),
    (
        "onboarding",
        &["onboarding", "intégration", "accueil", "nouvel arrivant"],
    ),
    (
        "workflow",
        &["workflow", "processus", "flux de travail", "étapes"],
    ),
    (
        "notification",
        &["notification", "alerte", "alert", "rappel"],
    ),
];

/// Role labels and their trigger substrings.
const ROLE_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "direction",
        &["ceo", "directeur", "dirigeant", "président", "dg", "fondateur"],
    ),
    (
        "finance",
        &["daf", "cfo", "comptable", "contrôleur financier"],
    ),
    ("ops", &["ops", "opérations", "responsable opérations", "coo"]),
    ("rh", &["drh", "responsable rh", "chro", "talent manager"]),
    ("it", &["cto", "cio", "responsable it", "tech lead"]),
];

/// Category labels detected in a conversation. Any or all may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextSignals {
    pub secteurs: Vec<String>,
    pub besoins: Vec<String>,
    pub roles: Vec<String>,
}

impl ContextSignals {
    pub fn is_empty(&self) -> bool {
        self.secteurs.is_empty() && self.besoins.is_empty() && self.roles.is_empty()
    }
}

/// Scan the full message history for sector/need/role signals.
pub fn extract_context(messages: &[ChatMessage]) -> ContextSignals {
    let all_text = messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    signals_from_text(&all_text)
}

/// Containment test against each dictionary. `text` must be lower-cased.
pub fn signals_from_text(text: &str) -> ContextSignals {
    ContextSignals {
        secteurs: detect(SECTEUR_KEYWORDS, text),
        besoins: detect(BESOIN_KEYWORDS, text),
        roles: detect(ROLE_KEYWORDS, text),
    }
}

fn detect(dictionary: &[(&str, &[&str])], text: &str) -> Vec<String> {
    dictionary
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| text.contains(kw)))
        .map(|(label, _)| label.to_string())
        .collect()
}
