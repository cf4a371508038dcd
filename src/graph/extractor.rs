//! LLM-driven entity and relationship extraction at ingestion time.
//!
//! One chat call per document. The reply is parsed leniently (JSON span,
//! missing fields defaulted) but the vocabulary is strict: labels and
//! relationship types outside the closed sets are dropped and counted.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{info, warn};

use super::{EntityKey, EntityLabel, GraphError, GraphStore, Properties, RelationType};
use crate::llm::{LlmProvider, ProviderError, json_object_span};
use crate::truncate_chars;
use crate::vectorstore::Metadata;

const EXTRACTION_INPUT_CHARS: usize = 3000;

const EXTRACTION_PROMPT: &str = r#"You are an entity and relationship extractor. Given the following text, extract:
1. **Entities**: Important nouns: people, organizations, systems, policies, concepts, technologies.
2. **Relationships**: How entities relate to each other.

Return ONLY valid JSON in this exact format (no markdown, no explanation):
{
  "entities": [
    {"name": "Entity Name", "label": "Category"}
  ],
  "relationships": [
    {"from": "Entity A", "to": "Entity B", "type": "RELATES_TO"}
  ]
}

Use these labels for entities: Person, Organization, Policy, System, Technology, Concept, Process, Document.
Use these relationship types: RELATES_TO, PART_OF, GOVERNS, USES, DEPENDS_ON, DEFINES, MENTIONS.

Text:
{text}
"#;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRelation {
    pub from: String,
    pub to: String,
    pub rel_type: RelationType,
}

/// Validated extraction result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub entities: Vec<EntityKey>,
    pub relationships: Vec<ExtractedRelation>,
    /// Items dropped for an unknown label or relationship type.
    pub rejected: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    pub entities: usize,
    pub relationships: usize,
    pub rejected: usize,
}

#[derive(Debug, Default, Deserialize)]
struct RawExtraction {
    #[serde(default)]
    entities: Vec<RawEntity>,
    #[serde(default)]
    relationships: Vec<RawRelation>,
}

// Fields are optional so one `null` rejects a single item, not the reply.
#[derive(Debug, Deserialize)]
struct RawEntity {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRelation {
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    to: Option<String>,
    #[serde(default, rename = "type")]
    rel_type: Option<String>,
}

/// Trimmed, non-blank value of an optional field.
fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Ask the model for entities and relationships in `text`.
///
/// Only a failed chat call is an error; an unparsable reply is an empty
/// extraction.
pub async fn extract_entities(llm: &LlmProvider, text: &str) -> Result<Extraction, ProviderError> {
    let prompt = EXTRACTION_PROMPT.replace("{text}", truncate_chars(text, EXTRACTION_INPUT_CHARS));
    let reply = llm.complete(&prompt, None, 0.0).await?;
    Ok(parse_extraction(&reply))
}

/// Validate a model reply into an [`Extraction`].
pub fn parse_extraction(reply: &str) -> Extraction {
    let raw: RawExtraction = match json_object_span(reply).map(serde_json::from_str::<RawExtraction>) {
        Some(Ok(raw)) => raw,
        Some(Err(e)) => {
            warn!(error = %e, "failed to parse extraction output, using empty result");
            return Extraction::default();
        }
        None => {
            warn!("extraction output has no JSON object, using empty result");
            return Extraction::default();
        }
    };

    let mut out = Extraction::default();
    for entity in &raw.entities {
        let Some(name) = present(&entity.name) else {
            warn!("rejected extracted entity without a name");
            out.rejected += 1;
            continue;
        };
        let label = match present(&entity.label) {
            Some(label) => label.parse::<EntityLabel>(),
            None => Ok(EntityLabel::Concept),
        };
        match label {
            Ok(label) => out.entities.push(EntityKey::new(label, name)),
            Err(e) => {
                warn!(entity = name, error = %e, "rejected extracted entity");
                out.rejected += 1;
            }
        }
    }
    for rel in &raw.relationships {
        let (Some(from), Some(to)) = (present(&rel.from), present(&rel.to)) else {
            warn!("rejected extracted relationship without both endpoints");
            out.rejected += 1;
            continue;
        };
        let rel_type = match present(&rel.rel_type) {
            Some(rel_type) => rel_type.parse::<RelationType>(),
            None => Ok(RelationType::RelatesTo),
        };
        match rel_type {
            Ok(rel_type) => out.relationships.push(ExtractedRelation {
                from: from.to_string(),
                to: to.to_string(),
                rel_type,
            }),
            Err(e) => {
                warn!(from, to, error = %e, "rejected extracted relationship");
                out.rejected += 1;
            }
        }
    }
    out
}

/// Extract from one document and merge the result into `graph`.
///
/// The document itself becomes a `Document` node named after its source,
/// with a `MENTIONS` edge to every accepted entity.
pub async fn extract_and_store(
    llm: &LlmProvider,
    graph: &GraphStore,
    text: &str,
    metadata: &Metadata,
) -> Result<ExtractionReport, ExtractError> {
    let extraction = extract_entities(llm, text).await?;
    let source = metadata.get("source").and_then(|v| v.as_str()).unwrap_or("unknown");
    let doc_type = metadata.get("type").and_then(|v| v.as_str()).unwrap_or("unknown");

    let document = EntityKey::new(EntityLabel::Document, source);
    let mut doc_props = Properties::new();
    doc_props.insert("type".into(), doc_type.into());
    graph.merge_entity(&document, &doc_props).await?;

    let empty = Properties::new();
    let mut labels: HashMap<&str, EntityLabel> = HashMap::new();
    for entity in &extraction.entities {
        labels.entry(entity.name.as_str()).or_insert(entity.label);
        graph.merge_entity(entity, &empty).await?;
        graph.merge_relationship(&document, entity, RelationType::Mentions, &empty).await?;
    }

    let endpoint = |name: &str| {
        EntityKey::new(labels.get(name).copied().unwrap_or(EntityLabel::Concept), name)
    };
    for rel in &extraction.relationships {
        graph
            .merge_relationship(&endpoint(&rel.from), &endpoint(&rel.to), rel.rel_type, &empty)
            .await?;
    }

    info!(
        source,
        entities = extraction.entities.len(),
        relationships = extraction.relationships.len(),
        rejected = extraction.rejected,
        "extracted graph facts"
    );
    Ok(ExtractionReport {
        entities: extraction.entities.len(),
        relationships: extraction.relationships.len(),
        rejected: extraction.rejected,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::embedded::EmbeddedGraph;
    use crate::llm::providers::scripted::ScriptedProvider;
    use tempfile::TempDir;

    #[test]
    fn parses_fenced_reply() {
        let reply = "```json\n{\"entities\":[{\"name\":\"GDPR\",\"label\":\"Policy\"}],\
                     \"relationships\":[{\"from\":\"GDPR\",\"to\":\"EU\",\"type\":\"governs\"}]}\n```";
        let e = parse_extraction(reply);
        assert_eq!(e.entities, vec![EntityKey::new(EntityLabel::Policy, "GDPR")]);
        assert_eq!(e.relationships[0].rel_type, RelationType::Governs);
        assert_eq!(e.rejected, 0);
    }

    #[test]
    fn unparsable_reply_is_empty() {
        assert_eq!(parse_extraction("I could not find anything."), Extraction::default());
        assert_eq!(parse_extraction("{not json}"), Extraction::default());
    }

    #[test]
    fn unknown_vocabulary_is_rejected_not_remapped() {
        let reply = r#"{"entities":[{"name":"Rex","label":"Animal"},{"name":"Ada"}],
                        "relationships":[{"from":"Ada","to":"Rex","type":"OWNS"},{"from":"Ada","to":""}]}"#;
        let e = parse_extraction(reply);
        assert_eq!(e.entities, vec![EntityKey::new(EntityLabel::Concept, "Ada")]);
        assert!(e.relationships.is_empty());
        assert_eq!(e.rejected, 3);
    }

    #[test]
    fn null_fields_reject_only_their_item() {
        let reply = r#"{"entities":[{"name":null,"label":"Policy"},{"name":"MFA","label":null},
                        {"name":"VPN","label":"Technology"}],
                        "relationships":[{"from":"MFA","to":null,"type":"GOVERNS"},
                        {"from":"MFA","to":"VPN","type":null}]}"#;
        let e = parse_extraction(reply);
        assert_eq!(
            e.entities,
            vec![EntityKey::new(EntityLabel::Concept, "MFA"), EntityKey::new(EntityLabel::Technology, "VPN")]
        );
        assert_eq!(e.relationships.len(), 1);
        assert_eq!(e.relationships[0].rel_type, RelationType::RelatesTo);
        assert_eq!(e.rejected, 2);
    }

    #[tokio::test]
    async fn store_links_document_and_uses_extracted_labels() {
        let temp = TempDir::new().unwrap();
        let graph = GraphStore::Embedded(EmbeddedGraph::open(&temp.path().join("g.db")).unwrap());
        let reply = r#"{"entities":[{"name":"Payroll","label":"System"}],
                        "relationships":[{"from":"Payroll","to":"PostgreSQL","type":"USES"}]}"#;
        let llm = LlmProvider::Scripted(ScriptedProvider::new().reply(reply));
        let mut meta = Metadata::new();
        meta.insert("source".into(), "docs/payroll.md".into());
        meta.insert("type".into(), "markdown".into());

        let report = extract_and_store(&llm, &graph, "Payroll runs on PostgreSQL.", &meta).await.unwrap();
        assert_eq!(report, ExtractionReport { entities: 1, relationships: 1, rejected: 0 });

        let n = graph.neighbors("Payroll", 1).await.unwrap();
        let names: Vec<&str> = n.iter().map(|x| x.name.as_str()).collect();
        assert_eq!(names, vec!["PostgreSQL", "docs/payroll.md"]);
        let pg = n.iter().find(|x| x.name == "PostgreSQL").unwrap();
        assert_eq!(pg.labels, vec!["Concept".to_string()]);
        let payroll = graph.search_by_name("payroll", 5).await.unwrap();
        assert!(payroll.iter().any(|e| e.labels == vec!["System".to_string()]));
    }

    #[tokio::test]
    async fn extraction_prompt_is_truncated_and_cold() {
        let llm = ScriptedProvider::new().reply("{}");
        let provider = LlmProvider::Scripted(llm.clone());
        let text = "x".repeat(5000);
        extract_entities(&provider, &text).await.unwrap();
        let call = &llm.calls()[0];
        assert_eq!(call.temperature, 0.0);
        assert!(call.content.ends_with(&format!("{}\n", "x".repeat(3000))));
        assert!(!call.content.contains(&"x".repeat(3001)));
    }
}
