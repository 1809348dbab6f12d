//! End-to-end pipeline tests: fixture page → Extractor → store → Injector.
//!
//! These run without a browser; the Chromium-backed paths are covered by
//! the ignored tests next to the renderer.

use model_relay::{ModelRecord, Settings};
use relay_runtime::extraction::source::StaticDocument;
use relay_runtime::extraction::{ExtractOptions, Extractor};
use relay_runtime::injection::page::{ChoiceControl, FormField};
use relay_runtime::injection::scripted::ScriptedWizard;
use relay_runtime::injection::{GroupStatus, InjectOptions, Injector, WizardState};
use relay_runtime::store::{RecordStore, SqliteStore};
use relay_runtime::translate::{NoopTranslator, Translator};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const FIXTURE: &str = include_str!("fixtures/civitai_model.html");

fn extractor() -> Extractor {
    Extractor::new(ExtractOptions {
        title_timeout: Duration::from_millis(60),
        poll_interval: Duration::from_millis(10),
    })
}

fn injector() -> Injector {
    Injector::new(InjectOptions {
        step2_timeout: Duration::from_millis(200),
        step2_poll: Duration::from_millis(5),
        menu_settle: Duration::from_millis(1),
        group_poll_interval: Duration::from_millis(2),
        word_gap_min: Duration::from_millis(1),
        word_gap_max: Duration::from_millis(3),
        ..InjectOptions::default()
    })
}

async fn extract(html: &str) -> ModelRecord {
    let doc = StaticDocument::new(html);
    extractor()
        .extract(&doc, &NoopTranslator, &Settings::default(), &CancellationToken::new())
        .await
        .expect("extraction should not fail")
}

#[tokio::test]
async fn test_fixture_extraction() {
    let record = extract(FIXTURE).await;

    assert_eq!(record.title, "Nekomimi Style");
    assert_eq!(record.category, "concept");
    assert_eq!(record.version_name, "v3.1 Final");
    assert_eq!(record.model_type, "LORA");
    assert_eq!(record.base_model, "SD 1.5");
    assert_eq!(
        record.trigger_groups,
        vec![
            vec!["nekomimi".to_string(), "cat ears".to_string()],
            vec!["fluffy tail".to_string()],
        ]
    );
    assert_eq!(
        record.description,
        "Adds cat ears and a tail to any character.\n\n\
         Recommended settings:\n\n\
         weight: 0.7, support any sampler"
    );
}

#[tokio::test]
async fn test_extraction_is_idempotent() {
    let first = extract(FIXTURE).await;
    let second = extract(FIXTURE).await;
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn test_title_not_found_yields_empty_title_and_is_not_saved() {
    let record = extract("<html><body><div>Loading…</div></body></html>").await;
    assert_eq!(record.title, "");
    assert_eq!(record.model_type, "?");
    assert_eq!(record.base_model, "Unknown");

    let store = SqliteStore::open_in_memory().unwrap();
    assert!(store.save(&record).is_err());
    assert!(store.load().unwrap().is_none());
}

#[tokio::test]
async fn test_translation_applies_before_finalization() {
    struct Tagging;

    #[async_trait::async_trait]
    impl Translator for Tagging {
        async fn translate(&self, text: &str, target_lang: &str) -> anyhow::Result<String> {
            Ok(format!("[{target_lang}] translated_{}", text.chars().count()))
        }
    }

    let html = r#"<html><body>
        <h1>猫耳 LoRA</h1>
        <div data-testid="model-description">猫耳を追加します。</div>
    </body></html>"#;
    let doc = StaticDocument::new(html);
    let record = extractor()
        .extract(&doc, &Tagging, &Settings::default(), &CancellationToken::new())
        .await
        .unwrap();

    // Ignore words go before translation; underscores are normalized after.
    assert_eq!(record.title, "[en] translated 2");
    assert_eq!(record.description, "[en] translated 9");
}

#[tokio::test]
async fn test_copy_then_paste_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&dir.path().join("relay.db")).unwrap();

    let record = extract(FIXTURE).await;
    store.save(&record).unwrap();
    let loaded = store.load().unwrap().expect("record was saved");
    assert_eq!(loaded, record);

    let page = ScriptedWizard::new()
        .with_step2_after(Some(3))
        .with_choices(ChoiceControl::ModelType, &["Checkpoint", "LORA", "LyCORIS"])
        .with_choices(ChoiceControl::Category, &["Character", "Concept", "Style"])
        .with_choices(
            ChoiceControl::BaseModel,
            &["SDXL 1.0", "Stable Diffusion 1.5", "Pony", "Illustrious"],
        );
    let report = injector()
        .fill(&page, &loaded, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.state, WizardState::Done);
    assert_eq!(page.field(FormField::DisplayName).as_deref(), Some("Nekomimi Style"));
    assert_eq!(page.field(FormField::VersionName).as_deref(), Some("v3.1 Final"));
    assert_eq!(page.picked(ChoiceControl::ModelType).as_deref(), Some("LORA"));
    assert_eq!(page.picked(ChoiceControl::Category).as_deref(), Some("Concept"));
    assert_eq!(
        page.picked(ChoiceControl::BaseModel).as_deref(),
        Some("Stable Diffusion 1.5")
    );
    assert_eq!(
        page.word_fields(),
        vec!["nekomimi, cat ears".to_string(), "fluffy tail".to_string()]
    );
    assert!(report.groups.iter().all(GroupStatus::is_success));
}

#[tokio::test]
async fn test_cancel_mid_fill_stops_group_creation() {
    let page = ScriptedWizard::new()
        .with_step2_after(Some(0))
        .with_choices(ChoiceControl::BaseModel, &["Stable Diffusion 1.5"]);
    let record = ModelRecord {
        title: "Many Groups".into(),
        trigger_groups: (0..50)
            .map(|i| vec![format!("word{i}a"), format!("word{i}b"), format!("word{i}c")])
            .collect(),
        ..ModelRecord::default()
    };

    let slow = Injector::new(InjectOptions {
        word_gap_min: Duration::from_millis(20),
        word_gap_max: Duration::from_millis(20),
        menu_settle: Duration::from_millis(1),
        step2_poll: Duration::from_millis(1),
        ..InjectOptions::default()
    });
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = slow.fill(&page, &record, &cancel).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<model_relay::RelayError>(),
        Some(model_relay::RelayError::Cancelled)
    ));
    let created = page.trigger_inputs().len() / 2;
    assert!(created < 50, "created {created} groups after cancellation");
}
