//! End-to-end pipeline tests
//!
//! A tiny randomly initialized BERT is written to a temp directory together
//! with a WordLevel tokenizer, so the real loader and candle forward pass run
//! without any download. Generative collaborators are stubs.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use emodiary_engine::emotion::{Backend, BertEmotionModel, NUM_CLASSES};
use emodiary_engine::{
    DiaryRequest, Gender, Generation, ImageGenerator, ImagePrompt, InferenceContext,
    PipelineError, SequenceTransform, TextGenerator, Weather,
};
use tempfile::TempDir;

// ============================================================================
// Helper functions
// ============================================================================

const WORDS: &[&str] = &[
    "[UNK]", "[PAD]", "[CLS]", "[SEP]", "오늘", "친구", "와", "싸웠다", "행복", "했다",
];

const TINY_CONFIG: &str = r#"{
    "vocab_size": 16,
    "hidden_size": 8,
    "num_hidden_layers": 1,
    "num_attention_heads": 2,
    "intermediate_size": 16,
    "hidden_act": "gelu",
    "hidden_dropout_prob": 0.1,
    "max_position_embeddings": 64,
    "type_vocab_size": 2,
    "initializer_range": 0.02,
    "layer_norm_eps": 1e-12,
    "pad_token_id": 1,
    "position_embedding_type": "absolute",
    "use_cache": true,
    "classifier_dropout": null,
    "model_type": "bert"
}"#;

fn write_tokenizer(dir: &Path) {
    let vocab: serde_json::Map<String, serde_json::Value> = WORDS
        .iter()
        .enumerate()
        .map(|(id, word)| (word.to_string(), id.into()))
        .collect();
    let tokenizer = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": { "type": "WordLevel", "vocab": vocab, "unk_token": "[UNK]" }
    });
    std::fs::write(dir.join("tokenizer.json"), tokenizer.to_string()).unwrap();
}

fn write_model(dir: &Path) {
    std::fs::write(dir.join("config.json"), TINY_CONFIG).unwrap();
    let config = serde_json::from_str(TINY_CONFIG).unwrap();
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    BertEmotionModel::from_var_builder(vb, &config, Some(0.75), "tiny").unwrap();
    varmap.save(dir.join("best_model.safetensors")).unwrap();
}

#[derive(Default)]
struct CountingText(AtomicUsize);

#[async_trait]
impl TextGenerator for CountingText {
    async fn generate_text(&self, _instruction: &str, input: &str) -> Generation<String> {
        self.0.fetch_add(1, Ordering::SeqCst);
        let input: serde_json::Value = serde_json::from_str(input).unwrap();
        let emotion = input["감정"].as_str().unwrap_or_default().to_string();
        Generation::Produced(format!(
            "```json\n{{\"Action_Advice\": \"{emotion}\", \"Food_Recommendation\": \"죽. 속이 편해\"}}\n```"
        ))
    }
}

#[derive(Default)]
struct CountingImage(AtomicUsize);

#[async_trait]
impl ImageGenerator for CountingImage {
    async fn generate_image(&self, prompt: &ImagePrompt) -> Generation<Vec<u8>> {
        self.0.fetch_add(1, Ordering::SeqCst);
        if prompt.weather.is_some() {
            Generation::Produced(vec![1, 2, 3])
        } else {
            Generation::Empty
        }
    }
}

fn context(dir: &TempDir, text: Arc<CountingText>, image: Arc<CountingImage>) -> InferenceContext {
    write_tokenizer(dir.path());
    write_model(dir.path());
    let backend = Backend::from_family_id("kobert-diary-7", dir.path().join("best_model.safetensors"))
        .unwrap()
        .with_tokenizer_path(dir.path().join("tokenizer.json"))
        .with_config_path(dir.path().join("config.json"));
    let (classifier, vocab) = backend.load(&Device::Cpu).unwrap();
    InferenceContext::new(
        classifier,
        vocab,
        SequenceTransform::single(32).unwrap(),
        text,
        image,
    )
}

fn request(content: &str, weather: Option<Weather>) -> DiaryRequest {
    DiaryRequest {
        content: content.to_string(),
        weather,
        persona: "COUNSELOR".to_string(),
        gender: Gender::Male,
    }
}

// ============================================================================
// Pipeline tests (no download required)
// ============================================================================

#[test]
fn test_end_to_end_with_real_classifier() {
    let dir = TempDir::new().unwrap();
    let text = Arc::new(CountingText::default());
    let image = Arc::new(CountingImage::default());
    let ctx = context(&dir, text.clone(), image.clone());
    assert!(ctx.is_ready());
    assert_eq!(ctx.model_name(), Some("best_model.safetensors"));

    let classified = ctx.classify("오늘 친구 와 싸웠다").unwrap();
    assert_eq!(classified.probabilities.as_array().len(), NUM_CLASSES);
    assert!((classified.probabilities.sum() - 1.0).abs() < 1e-6);

    let response =
        tokio_test::block_on(ctx.analyze(&request("오늘 친구 와 싸웠다", Some(Weather::Cloudy))))
            .unwrap();
    assert_eq!(response.emotion, classified.emotion);
    // The stub echoes the emotion label it was sent
    assert_eq!(response.ai_comment, classified.emotion.label());
    assert_eq!(response.recommended_food.name, "죽");
    assert_eq!(response.recommended_food.reason, "속이 편해");
    assert_eq!(response.image.as_deref(), Some("AQID"));
    assert_eq!(text.0.load(Ordering::SeqCst), 1);
    assert_eq!(image.0.load(Ordering::SeqCst), 1);
}

#[test]
fn test_classification_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let ctx = context(
        &dir,
        Arc::new(CountingText::default()),
        Arc::new(CountingImage::default()),
    );
    let a = ctx.classify("오늘 행복 했다").unwrap();
    let b = ctx.classify("  오늘 행복 했다\n").unwrap();
    assert_eq!(a.emotion, b.emotion);
    assert_eq!(a.probabilities, b.probabilities);
}

#[test]
fn test_missing_image_serializes_as_null() {
    let dir = TempDir::new().unwrap();
    let ctx = context(
        &dir,
        Arc::new(CountingText::default()),
        Arc::new(CountingImage::default()),
    );
    let response = tokio_test::block_on(ctx.analyze(&request("오늘", None))).unwrap();
    let json = serde_json::to_value(&response).unwrap();
    assert!(json["image"].is_null());
    assert!(json["recommendedFood"].is_object());
}

#[test]
fn test_empty_content_never_reaches_collaborators() {
    let dir = TempDir::new().unwrap();
    let text = Arc::new(CountingText::default());
    let image = Arc::new(CountingImage::default());
    let ctx = context(&dir, text.clone(), image.clone());

    let err = tokio_test::block_on(ctx.analyze(&request("   ", None))).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyContent));
    assert_eq!(err.payload().error, "no content to analyze");
    assert_eq!(text.0.load(Ordering::SeqCst), 0);
    assert_eq!(image.0.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Pretrained tokenizer tests (require HuggingFace download)
// ============================================================================

#[test]
#[ignore = "downloads the pretrained tokenizer from HuggingFace"]
fn test_pretrained_tokenizer_fixed_length() {
    let dir = TempDir::new().unwrap();
    let backend =
        Backend::from_family_id("kobert-diary-7", dir.path().join("best_model.pt")).unwrap();
    let vocab = backend.load_vocab().unwrap();
    let transform = SequenceTransform::single(128).unwrap();
    let encoded = transform
        .encode(&vocab, Some("오늘은 친구와 싸워서 속상했다"), None)
        .unwrap();
    assert_eq!(encoded.token_ids.len(), 128);
    assert!(encoded.valid_length > 2);
    assert!(encoded.segment_ids.iter().all(|&s| s == 0));
}
