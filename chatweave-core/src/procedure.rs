//! Procedure classification for agent thought traces
//!
//! Each reasoning step is labelled with a [`ShowType`] and given the content
//! the UI should display for it.

use crate::citation;
use crate::types::{AgentThought, Procedure, ShowType};

const STATUS_SUCCESS: &str = "success";
const DISPLAY_TYPE_SEARCH: i64 = 1;
const DISPLAY_TYPE_KNOWLEDGE: i64 = 2;

/// Label a procedure step with its display kind.
pub fn show_type(procedure: &Procedure) -> ShowType {
    if procedure.name == "thought" {
        return ShowType::Markdown;
    }
    if procedure.status != STATUS_SUCCESS {
        return ShowType::Json;
    }
    match procedure.debugging.as_ref().and_then(|d| d.display_type) {
        Some(DISPLAY_TYPE_SEARCH) => ShowType::SearchReference,
        Some(DISPLAY_TYPE_KNOWLEDGE) => ShowType::KnowledgeReference,
        _ => ShowType::Json,
    }
}

/// Classify a step in place, filling `show_type` and `display_content`.
///
/// Search references are keyed by their `index`, and their display content is
/// annotated with the step's own citation tags.
pub fn classify(procedure: &mut Procedure) {
    let kind = show_type(procedure);
    procedure.show_type = Some(kind);

    let Some(debugging) = procedure.debugging.as_mut() else {
        procedure.display_content = String::new();
        return;
    };
    let raw = debugging.display_content.clone().unwrap_or_default();

    if kind == ShowType::SearchReference {
        for reference in &mut debugging.references {
            if let Some(index) = reference.index {
                reference.id = index.to_string();
            }
        }
        procedure.display_content =
            citation::annotate(&raw, &debugging.quote_infos, &debugging.references).content;
    } else {
        procedure.display_content = raw;
    }
}

/// Classify every step of a thought trace.
pub fn classify_thought(thought: &mut AgentThought) {
    for procedure in &mut thought.procedures {
        classify(procedure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Debugging, QuoteInfo, Reference};

    fn step(name: &str, status: &str, display_type: Option<i64>) -> Procedure {
        Procedure {
            name: name.to_string(),
            status: status.to_string(),
            debugging: Some(Debugging {
                display_type,
                display_content: Some("Result text".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_thought_is_markdown_regardless_of_status() {
        assert_eq!(show_type(&step("thought", "processing", None)), ShowType::Markdown);
    }

    #[test]
    fn test_display_types() {
        assert_eq!(
            show_type(&step("search", "success", Some(1))),
            ShowType::SearchReference
        );
        assert_eq!(
            show_type(&step("kb", "success", Some(2))),
            ShowType::KnowledgeReference
        );
        assert_eq!(show_type(&step("tool", "success", Some(5))), ShowType::Json);
        assert_eq!(show_type(&step("search", "failed", Some(1))), ShowType::Json);
    }

    #[test]
    fn test_missing_debugging_falls_back_to_json() {
        let mut procedure = Procedure {
            name: "tool".to_string(),
            status: "success".to_string(),
            ..Default::default()
        };
        classify(&mut procedure);
        assert_eq!(procedure.show_type, Some(ShowType::Json));
        assert_eq!(procedure.display_content, "");
    }

    #[test]
    fn test_search_reference_is_annotated_with_all_tags() {
        let mut procedure = step("search", "success", Some(1));
        let debugging = procedure.debugging.as_mut().unwrap();
        debugging.display_content = Some("ABCDE".to_string());
        debugging.quote_infos = vec![
            QuoteInfo { position: 1, index: 1 },
            QuoteInfo { position: 4, index: 2 },
        ];
        debugging.references = vec![Reference {
            index: Some(1),
            url: Some("https://example.com".to_string()),
            ..Default::default()
        }];

        classify(&mut procedure);

        assert_eq!(procedure.display_content, "A[1](@ref)BCD[2](@ref)E");
        let debugging = procedure.debugging.as_ref().unwrap();
        assert_eq!(debugging.references[0].id, "1");
    }

    #[test]
    fn test_knowledge_reference_is_not_annotated() {
        let mut procedure = step("kb", "success", Some(2));
        procedure.debugging.as_mut().unwrap().quote_infos = vec![QuoteInfo {
            position: 0,
            index: 1,
        }];
        classify(&mut procedure);
        assert_eq!(procedure.display_content, "Result text");
    }
}
