use kb_core::db::open_db_in_memory;
use kb_core::{
    CaptureOptions, CaptureService, CaptureStep, Classifier, Embedder, EmbeddingRepository,
    EntryRepository, ErrorKind, LinkRepository, ProviderError, ProviderErrorKind,
    SqliteEmbeddingRepository, SqliteEntryRepository, SqliteLinkRepository, SqliteTagRepository,
    TagRepository, TagService, TagSuggestion,
};
use std::sync::Mutex;

struct ScriptedClassifier {
    suggestions: Vec<TagSuggestion>,
    seen_known_tags: Mutex<Vec<Vec<String>>>,
}

impl ScriptedClassifier {
    fn new(suggestions: Vec<TagSuggestion>) -> Self {
        Self {
            suggestions,
            seen_known_tags: Mutex::new(Vec::new()),
        }
    }
}

impl Classifier for ScriptedClassifier {
    fn classify(
        &self,
        _content: &str,
        known_tags: &[String],
    ) -> Result<Vec<TagSuggestion>, ProviderError> {
        self.seen_known_tags
            .lock()
            .unwrap()
            .push(known_tags.to_vec());
        Ok(self.suggestions.clone())
    }
}

struct FailingClassifier;

impl Classifier for FailingClassifier {
    fn classify(&self, _: &str, _: &[String]) -> Result<Vec<TagSuggestion>, ProviderError> {
        Err(ProviderError::new(
            "scripted",
            ProviderErrorKind::Timeout,
            "deadline exceeded",
        ))
    }
}

/// Embeds by keyword so related texts land close together.
struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn model(&self) -> &str {
        "keyword-test"
    }

    fn embed(&self, text: &str) -> Result<Vec<f64>, ProviderError> {
        let lowered = text.to_lowercase();
        Ok(["go", "channel", "bread"]
            .iter()
            .map(|word| if lowered.contains(word) { 1.0 } else { 0.0 })
            .chain(std::iter::once(0.1))
            .collect())
    }
}

struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn model(&self) -> &str {
        "failing"
    }

    fn embed(&self, _: &str) -> Result<Vec<f64>, ProviderError> {
        Err(ProviderError::new(
            "scripted",
            ProviderErrorKind::MissingCredentials,
            "no api key",
        ))
    }
}

#[test]
fn capture_classifies_links_and_builds_hierarchy() {
    let conn = open_db_in_memory().unwrap();
    let classifier = ScriptedClassifier::new(vec![
        TagSuggestion::new("golang", Some("programming"), 0.9),
        TagSuggestion::new("Concurrency", Some("Programming"), 0.8),
    ]);
    let service = CaptureService::new(&conn).with_classifier(&classifier);

    let report = service
        .capture("Go channels and goroutines", &CaptureOptions::default())
        .unwrap();

    assert!(!report.is_degraded());
    assert_eq!(report.applied_tags.len(), 2);
    assert!(report
        .applied_tags
        .iter()
        .all(|applied| applied.parent.as_deref() == Some("programming")));

    let entry_tags: Vec<&str> = report
        .entry
        .tags
        .iter()
        .map(|tag| tag.name.as_str())
        .collect();
    assert_eq!(entry_tags, vec!["concurrency", "golang"]);

    let tree = TagService::new(SqliteTagRepository::new(&conn))
        .tag_tree()
        .unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].name, "programming");
    let children: Vec<&str> = tree[0]
        .children
        .iter()
        .map(|node| node.name.as_str())
        .collect();
    assert_eq!(children, vec!["concurrency", "golang"]);

    let links = SqliteLinkRepository::new(&conn)
        .tag_links_of(report.entry.id)
        .unwrap();
    assert_eq!(links.len(), 2);
}

#[test]
fn capture_reuses_known_tags_across_entries() {
    let conn = open_db_in_memory().unwrap();
    let classifier =
        ScriptedClassifier::new(vec![TagSuggestion::new("rust", Some("programming"), 0.7)]);
    let service = CaptureService::new(&conn).with_classifier(&classifier);
    let options = CaptureOptions::default();

    let first = service.capture("ownership", &options).unwrap();
    let second = service.capture("borrowing", &options).unwrap();

    assert_eq!(first.applied_tags[0].tag.id, second.applied_tags[0].tag.id);
    let seen = classifier.seen_known_tags.lock().unwrap();
    assert!(seen[0].is_empty());
    assert_eq!(seen[1], vec!["programming".to_string(), "rust".to_string()]);
    assert_eq!(
        SqliteTagRepository::new(&conn).list_tags().unwrap().len(),
        2
    );
}

#[test]
fn capture_clamps_confidence_and_skips_blank_names() {
    let conn = open_db_in_memory().unwrap();
    let classifier = ScriptedClassifier::new(vec![
        TagSuggestion::new("!!!", None, 0.9),
        TagSuggestion::new("overconfident", Some("overconfident"), 3.0),
    ]);
    let service = CaptureService::new(&conn).with_classifier(&classifier);

    let report = service
        .capture("sure of itself", &CaptureOptions::default())
        .unwrap();

    assert!(!report.is_degraded());
    assert_eq!(report.applied_tags.len(), 1);
    assert_eq!(report.applied_tags[0].parent, None);
    assert_eq!(report.applied_tags[0].confidence, 1.0);
    assert_eq!(report.applied_tags[0].tag.parent_id, None);
}

#[test]
fn repeated_suggestions_report_one_tag_with_latest_confidence() {
    let conn = open_db_in_memory().unwrap();
    let classifier = ScriptedClassifier::new(vec![
        TagSuggestion::new("Machine Learning", None, 0.4),
        TagSuggestion::new("databases", None, 0.6),
        TagSuggestion::new("machine-learning", None, 0.8),
    ]);
    let service = CaptureService::new(&conn).with_classifier(&classifier);

    let report = service
        .capture("gradient descent notes", &CaptureOptions::default())
        .unwrap();

    let applied: Vec<(&str, f64)> = report
        .applied_tags
        .iter()
        .map(|applied| (applied.tag.name.as_str(), applied.confidence))
        .collect();
    assert_eq!(applied, vec![("machine-learning", 0.8), ("databases", 0.6)]);

    let stored = SqliteLinkRepository::new(&conn)
        .tag_links_of(report.entry.id)
        .unwrap();
    assert_eq!(stored.len(), 2);
    let learning = stored
        .iter()
        .find(|link| link.tag.name == "machine-learning")
        .unwrap();
    assert_eq!(learning.confidence, 0.8);
}

#[test]
fn capture_embeds_and_reports_similar_entries_without_itself() {
    let conn = open_db_in_memory().unwrap();
    let embedder = KeywordEmbedder;
    let service = CaptureService::new(&conn).with_embedder(&embedder);
    let options = CaptureOptions {
        classify: true,
        embed: true,
        similar_limit: 5,
    };

    let bread = service.capture("Sourdough bread", &options).unwrap();
    let channels = service.capture("Go channel patterns", &options).unwrap();
    let report = service.capture("Buffered go channel", &options).unwrap();

    assert!(!report.is_degraded());
    let ids: Vec<_> = report.similar.iter().map(|hit| hit.entry.id).collect();
    assert_eq!(ids, vec![channels.entry.id, bread.entry.id]);
    assert!(!ids.contains(&report.entry.id));

    let stored = SqliteEmbeddingRepository::new(&conn)
        .get_embedding(report.entry.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.model, "keyword-test");
    assert_eq!(stored.dimensions(), 4);
}

#[test]
fn collaborator_failures_degrade_without_losing_the_entry() {
    let conn = open_db_in_memory().unwrap();
    let classifier = FailingClassifier;
    let embedder = FailingEmbedder;
    let service = CaptureService::new(&conn)
        .with_classifier(&classifier)
        .with_embedder(&embedder);

    let report = service
        .capture("still worth keeping", &CaptureOptions::default())
        .unwrap();

    assert!(report.applied_tags.is_empty());
    assert!(report.similar.is_empty());
    let steps: Vec<(CaptureStep, ErrorKind)> = report
        .degradations
        .iter()
        .map(|degradation| (degradation.step, degradation.kind))
        .collect();
    assert_eq!(
        steps,
        vec![
            (CaptureStep::Classify, ErrorKind::ClassificationUnavailable),
            (CaptureStep::Embed, ErrorKind::EmbeddingUnavailable),
        ]
    );
    assert!(report.degradations[0].reason.contains("deadline exceeded"));

    let stored = SqliteEntryRepository::new(&conn)
        .get_entry(report.entry.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.content, "still worth keeping");
}

#[test]
fn disabled_steps_do_not_call_collaborators() {
    let conn = open_db_in_memory().unwrap();
    let classifier = FailingClassifier;
    let embedder = FailingEmbedder;
    let service = CaptureService::new(&conn)
        .with_classifier(&classifier)
        .with_embedder(&embedder);
    let options = CaptureOptions {
        classify: false,
        embed: false,
        similar_limit: 5,
    };

    let report = service.capture("quiet capture", &options).unwrap();
    assert!(!report.is_degraded());
}

#[test]
fn blank_content_fails_before_any_enrichment() {
    let conn = open_db_in_memory().unwrap();
    let classifier = ScriptedClassifier::new(vec![TagSuggestion::new("x", None, 0.5)]);
    let service = CaptureService::new(&conn).with_classifier(&classifier);

    let err = service
        .capture("   ", &CaptureOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(classifier.seen_known_tags.lock().unwrap().is_empty());
    assert!(SqliteTagRepository::new(&conn).list_tags().unwrap().is_empty());
}
