//! Prompt enrichment from the discovery-call knowledge base.
//!
//! Two regimes, chosen by what the context extractor finds in the
//! conversation so far:
//!
//! - **cold start** (no signals): a handful of phase-1 openings, so the
//!   model can imitate how real discovery calls begin. No reference
//!   disclosure is returned — the visitor has said nothing identifying yet.
//! - **matched** (any signal): up to a few whole calls, sector-filtered
//!   when a sector was detected, with all four phases excerpted. The
//!   calls used are disclosed to the visitor as reference badges.
//!
//! Enrichment is never fatal: any storage failure or empty result set
//! degrades to the unmodified base prompt with an empty reference list.

use serde::Serialize;

use crate::config::EnrichmentConfig;
use crate::context::{extract_context, ContextSignals};
use crate::model::{ChatMessage, DiscoveryCall};
use crate::storage::SqliteStorage;

/// Character budgets for excerpts appended to the prompt.
const COLD_START_EXCERPT_CHARS: usize = 400;
const PHASE_EXCERPT_CHARS: usize = 350;
const NEXT_STEPS_EXCERPT_CHARS: usize = 200;
const BESOIN_SUMMARY_CHARS: usize = 100;

/// One disclosed reference call, shown to the end user.
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceCall {
    pub entreprise: String,
    pub secteur: String,
    pub phase: String,
}

/// An augmented prompt plus the disclosure list for the calls it used.
#[derive(Debug)]
pub struct EnrichedPrompt {
    pub prompt: String,
    pub reference_calls: Vec<ReferenceCall>,
}

impl EnrichedPrompt {
    fn unenriched(base_prompt: &str) -> Self {
        Self {
            prompt: base_prompt.to_string(),
            reference_calls: Vec::new(),
        }
    }
}

/// Build the prompt for the next model turn from the session history.
pub async fn enrich_prompt(
    storage: &SqliteStorage,
    messages: &[ChatMessage],
    base_prompt: &str,
    config: &EnrichmentConfig,
) -> EnrichedPrompt {
    let signals = extract_context(messages);

    if signals.is_empty() {
        tracing::debug!("no context detected, using cold-start examples");
        match storage.cold_start_calls(config.cold_start_limit).await {
            Ok(calls) if !calls.is_empty() => EnrichedPrompt {
                prompt: format!("{base_prompt}{}", build_cold_start_block(&calls)),
                reference_calls: Vec::new(),
            },
            Ok(_) => EnrichedPrompt::unenriched(base_prompt),
            Err(e) => {
                tracing::warn!(error = %e, "cold-start enrichment failed, using base prompt");
                EnrichedPrompt::unenriched(base_prompt)
            }
        }
    } else {
        tracing::debug!(
            secteurs = ?signals.secteurs,
            besoins = ?signals.besoins,
            roles = ?signals.roles,
            "context detected, matching discovery calls"
        );
        match storage
            .matching_calls(&signals.secteurs, config.matched_limit)
            .await
        {
            Ok(calls) if !calls.is_empty() => {
                let reference_calls = calls
                    .iter()
                    .map(|call| ReferenceCall {
                        entreprise: label_or(&call.entreprise, "Client"),
                        secteur: label_or(&call.secteur, "Non spécifié"),
                        phase: "toutes phases".to_string(),
                    })
                    .collect();
                EnrichedPrompt {
                    prompt: format!("{base_prompt}{}", build_matched_block(&calls, &signals)),
                    reference_calls,
                }
            }
            Ok(_) => EnrichedPrompt::unenriched(base_prompt),
            Err(e) => {
                tracing::warn!(error = %e, "matched enrichment failed, using base prompt");
                EnrichedPrompt::unenriched(base_prompt)
            }
        }
    }
}

/// Phase-1-only block for conversations with no detected context.
fn build_cold_start_block(calls: &[DiscoveryCall]) -> String {
    let mut out = String::from("\n\n## EXEMPLES D'APPROCHE INITIALE (appels de découverte réels)\n\n");
    out.push_str(
        "Voici comment les appels de découverte commencent typiquement. \
         Inspire-toi de ces techniques pour ton premier échange :\n\n",
    );

    for (idx, call) in calls.iter().enumerate() {
        if let Some(intro) = &call.phase_1_introduction {
            out.push_str(&format!(
                "### Exemple {} - {} ({})\n{}\n\n",
                idx + 1,
                label_or(&call.entreprise, "Client"),
                label_or(&call.secteur, "secteur"),
                truncate_chars(intro, COLD_START_EXCERPT_CHARS),
            ));
        }
    }

    out.push_str(
        "**INSTRUCTION:** Tu DOIS commencer par une question ouverte similaire. \
         Ne propose PAS de solution tout de suite. Écoute d'abord.\n",
    );
    out
}

/// All-phases block for conversations where context was detected.
fn build_matched_block(calls: &[DiscoveryCall], signals: &ContextSignals) -> String {
    let mut out = String::from("\n\n## MÉTHODE DE DÉCOUVERTE - Appels similaires détectés\n\n");

    out.push_str(&format!(
        "**Contexte identifié:** {}",
        signals.secteurs.join(", ")
    ));
    if !signals.besoins.is_empty() {
        out.push_str(&format!(" | {}", signals.besoins.join(", ")));
    }
    if !signals.roles.is_empty() {
        out.push_str(&format!(" | Rôle: {}", signals.roles.join(", ")));
    }
    out.push_str("\n\n");

    let phases = |call: &DiscoveryCall| {
        [
            (
                "Phase 1 - Introduction",
                call.phase_1_introduction.clone(),
                PHASE_EXCERPT_CHARS,
            ),
            (
                "Phase 2 - Exploration",
                call.phase_2_exploration.clone(),
                PHASE_EXCERPT_CHARS,
            ),
            (
                "Phase 3 - Affinage",
                call.phase_3_affinage.clone(),
                PHASE_EXCERPT_CHARS,
            ),
            (
                "Phase 4 - Next Steps",
                call.phase_4_next_steps.clone(),
                NEXT_STEPS_EXCERPT_CHARS,
            ),
        ]
    };

    for (idx, call) in calls.iter().enumerate() {
        out.push_str(&format!(
            "### Appel {}: {}\n",
            idx + 1,
            label_or(&call.entreprise, "Client")
        ));
        out.push_str(&format!(
            "**Secteur:** {} | **Besoin:** {}\n\n",
            label_or(&call.secteur, "Non spécifié"),
            if call.besoin.is_empty() {
                "Non spécifié".to_string()
            } else {
                truncate_chars(&call.besoin, BESOIN_SUMMARY_CHARS)
            },
        ));

        for (label, text, budget) in phases(call) {
            if let Some(text) = text {
                out.push_str(&format!(
                    "**{label}:**\n{}\n\n",
                    truncate_chars(&text, budget)
                ));
            }
        }

        out.push_str("---\n\n");
    }

    out.push_str(
        "**INSTRUCTION CLEF:** Utilise la progression des phases 1→2→3→4. \
         Adapte tes questions au secteur et au besoin détectés. \
         Pose UNE question à la fois.\n",
    );
    out
}

fn label_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// Cut `text` to at most `max_chars` characters (not bytes, so accented
/// text never splits mid-character), marking the cut with an ellipsis.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MessageRole;
    use uuid::Uuid;

    fn config() -> EnrichmentConfig {
        EnrichmentConfig {
            cold_start_limit: 7,
            matched_limit: 3,
        }
    }

    fn message(content: &str) -> ChatMessage {
        ChatMessage::new(Uuid::now_v7(), MessageRole::User, content)
    }

    fn call(entreprise: &str, secteur: &str, phase_1: &str) -> DiscoveryCall {
        DiscoveryCall::new(
            entreprise.into(),
            secteur.into(),
            "automatiser le reporting".into(),
            String::new(),
            Uuid::now_v7(),
        )
        .with_phases(
            Some(phase_1.into()),
            Some("exploration du processus".into()),
            Some("projection d'un agent".into()),
            Some("proposition de rendez-vous".into()),
        )
    }

    async fn seeded_storage(calls: &[DiscoveryCall]) -> SqliteStorage {
        let storage = SqliteStorage::open_in_memory().unwrap();
        for c in calls {
            storage.save_discovery_call(c).await.unwrap();
        }
        storage
    }

    #[tokio::test]
    async fn cold_start_has_no_reference_disclosure() {
        let storage = seeded_storage(&[
            call("Acme", "retail", "bonjour, racontez-moi votre quotidien"),
            call("Globex", "finance", "qu'est-ce qui vous prend du temps ?"),
        ])
        .await;

        let enriched = enrich_prompt(&storage, &[message("bonjour")], "BASE", &config()).await;
        assert!(enriched.reference_calls.is_empty());
        assert!(enriched.prompt.starts_with("BASE"));
        assert!(enriched.prompt.contains("EXEMPLES D'APPROCHE INITIALE"));
        assert!(enriched.prompt.contains("### Exemple 1 - Acme (retail)"));
        assert!(enriched
            .prompt
            .contains("Ne propose PAS de solution tout de suite"));
    }

    #[tokio::test]
    async fn matched_path_discloses_the_calls_used() {
        let storage = seeded_storage(&[
            call("Acme", "Retail & e-commerce", "intro retail"),
            call("Globex", "finance", "intro finance"),
        ])
        .await;

        let enriched = enrich_prompt(
            &storage,
            &[message("nous sommes dans le retail et je veux automatiser ma facturation")],
            "BASE",
            &config(),
        )
        .await;

        assert_eq!(enriched.reference_calls.len(), 1);
        let reference = &enriched.reference_calls[0];
        assert_eq!(reference.entreprise, "Acme");
        assert_eq!(reference.secteur, "Retail & e-commerce");
        assert_eq!(reference.phase, "toutes phases");

        assert!(enriched.prompt.contains("Appels similaires détectés"));
        assert!(enriched.prompt.contains("**Contexte identifié:** retail"));
        assert!(enriched.prompt.contains("**Phase 1 - Introduction:**"));
        assert!(enriched.prompt.contains("**Phase 4 - Next Steps:**"));
        assert!(enriched.prompt.contains("Pose UNE question à la fois"));
    }

    #[tokio::test]
    async fn matched_without_detected_sector_uses_any_calls() {
        let storage = seeded_storage(&[call("Acme", "immobilier", "intro")]).await;

        // A need signal but no sector signal: no sector filter applies.
        let enriched = enrich_prompt(
            &storage,
            &[message("je veux automatiser mes relances")],
            "BASE",
            &config(),
        )
        .await;

        assert_eq!(enriched.reference_calls.len(), 1);
        assert_eq!(enriched.reference_calls[0].entreprise, "Acme");
    }

    #[tokio::test]
    async fn empty_knowledge_base_degrades_to_base_prompt() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let enriched = enrich_prompt(&storage, &[message("bonjour")], "BASE", &config()).await;
        assert_eq!(enriched.prompt, "BASE");
        assert!(enriched.reference_calls.is_empty());
    }

    #[tokio::test]
    async fn storage_failure_degrades_to_base_prompt() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage
            .with_conn(|conn| {
                conn.execute("DROP TABLE discovery_calls_knowledge", [])
                    .map_err(|e| crate::error::ParritaError::Storage(e.to_string()))?;
                Ok(())
            })
            .await
            .unwrap();

        let enriched = enrich_prompt(&storage, &[message("bonjour")], "BASE", &config()).await;
        assert_eq!(enriched.prompt, "BASE");
        assert!(enriched.reference_calls.is_empty());
    }

    #[tokio::test]
    async fn cold_start_respects_the_limit() {
        let calls: Vec<DiscoveryCall> = (0..9)
            .map(|i| call(&format!("Client {i}"), "tech", "une introduction"))
            .collect();
        let storage = seeded_storage(&calls).await;

        let enriched = enrich_prompt(&storage, &[message("bonjour")], "BASE", &config()).await;
        let examples = enriched.prompt.matches("### Exemple").count();
        assert_eq!(examples, 7);
    }

    #[test]
    fn truncate_is_char_boundary_safe() {
        let text = "é".repeat(500);
        let cut = truncate_chars(&text, 400);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 403);
    }

    #[test]
    fn truncate_leaves_short_text_untouched() {
        assert_eq!(truncate_chars("court", 400), "court");
    }

    #[test]
    fn matched_block_skips_absent_phases() {
        let call = DiscoveryCall::new(
            "Acme".into(),
            "retail".into(),
            String::new(),
            String::new(),
            Uuid::now_v7(),
        )
        .with_phases(Some("intro".into()), None, None, None);

        let block = build_matched_block(
            &[call],
            &ContextSignals {
                secteurs: vec!["retail".into()],
                besoins: vec![],
                roles: vec![],
            },
        );
        assert!(block.contains("**Phase 1 - Introduction:**"));
        assert!(!block.contains("**Phase 2 - Exploration:**"));
        assert!(block.contains("**Besoin:** Non spécifié"));
    }
}
