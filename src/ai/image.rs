//! Image generation for cover images and service illustrations
//!
//! The editor's choices are assembled into a small XML document that a text
//! model rewrites into one descriptive prompt wrapped in `<prompt>` tags.
//! If refinement fails or the tag is missing, a flattened version of the
//! same fields is sent to the image model instead.

use super::client::{AiError, GeneratedImage, ImageRequest, TextRequest};
use super::models::{AiTask, ModelManager};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const MAX_SUBJECT_CHARS: usize = 500;
pub const SUPPORTED_SIZES: [&str; 3] = ["1024x1024", "1792x1024", "1024x1792"];
pub const DEFAULT_SIZE: &str = "1024x1024";
const DEFAULT_CONSTRAINTS: &str = "No text, letters, logos or watermarks.";

static PROMPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<prompt>(.*?)</prompt>").expect("valid prompt regex"));

const REFINE_SYSTEM_PROMPT: &str = "You turn structured image briefs into a single vivid \
prompt for an image generation model. Reply with the prompt wrapped in <prompt></prompt> \
tags and nothing else.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBrief {
    pub subject: String,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub palette: Vec<String>,
    #[serde(default)]
    pub composition: Option<String>,
    #[serde(default)]
    pub constraints: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

impl ImageBrief {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Default::default()
        }
    }

    pub fn size(&self) -> &str {
        self.size.as_deref().unwrap_or(DEFAULT_SIZE)
    }

    pub fn validate(&self) -> Result<(), AiError> {
        let subject = self.subject.trim();
        if subject.is_empty() {
            return Err(AiError::Validation("subject is required".to_string()));
        }
        if subject.chars().count() > MAX_SUBJECT_CHARS {
            return Err(AiError::Validation(format!(
                "subject must be at most {} characters",
                MAX_SUBJECT_CHARS
            )));
        }
        if !SUPPORTED_SIZES.contains(&self.size()) {
            return Err(AiError::Validation(format!(
                "size must be one of {}",
                SUPPORTED_SIZES.join(", ")
            )));
        }
        Ok(())
    }

    fn constraints(&self) -> &str {
        self.constraints
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CONSTRAINTS)
    }
}

pub fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn xml_unescape(text: &str) -> String {
    // &amp; last so "&amp;lt;" stays "&lt;"
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element(out: &mut String, name: &str, value: Option<&str>) {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => out.push_str(&format!("  <{name}>{}</{name}>\n", xml_escape(v))),
        None => out.push_str(&format!("  <{name}/>\n")),
    }
}

/// The brief as an `<image_request>` document
pub fn build_xml_prompt(brief: &ImageBrief) -> String {
    let mut xml = String::from("<image_request>\n");
    element(&mut xml, "subject", Some(&brief.subject));
    element(&mut xml, "style", brief.style.as_deref());
    element(&mut xml, "mood", brief.mood.as_deref());

    let colors: Vec<&str> = brief
        .palette
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();
    if colors.is_empty() {
        xml.push_str("  <palette/>\n");
    } else {
        xml.push_str("  <palette>");
        for color in colors {
            xml.push_str(&format!("<color>{}</color>", xml_escape(color)));
        }
        xml.push_str("</palette>\n");
    }

    element(&mut xml, "composition", brief.composition.as_deref());
    element(&mut xml, "constraints", Some(brief.constraints()));
    xml.push_str("</image_request>");
    xml
}

/// The first non-empty `<prompt>` body, unescaped and on one line
pub fn extract_prompt(reply: &str) -> Option<String> {
    PROMPT_RE
        .captures_iter(reply)
        .filter_map(|caps| caps.get(1))
        .map(|m| collapse_whitespace(&xml_unescape(m.as_str())))
        .find(|p| !p.is_empty())
}

/// Deterministic prompt used when refinement is unavailable
pub fn fallback_prompt(brief: &ImageBrief) -> String {
    let mut parts = vec![brief.subject.trim().trim_end_matches('.').to_string()];
    let mut labelled = |label: &str, value: Option<&str>| {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            parts.push(format!("{}: {}", label, v.trim_end_matches('.')));
        }
    };
    labelled("Style", brief.style.as_deref());
    labelled("Mood", brief.mood.as_deref());
    let palette = brief
        .palette
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    labelled("Palette", Some(palette.as_str()));
    labelled("Composition", brief.composition.as_deref());
    labelled("Constraints", Some(brief.constraints()));
    collapse_whitespace(&format!("{}.", parts.join(". ")))
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageResult {
    /// Prompt sent to the image model
    pub prompt: String,
    /// Whether a text model rewrote the brief
    pub refined: bool,
    pub model: &'static str,
    pub image: GeneratedImage,
}

pub struct ImageGenerator {
    models: Arc<ModelManager>,
}

impl ImageGenerator {
    pub fn new(models: Arc<ModelManager>) -> Self {
        Self { models }
    }

    /// Prompt for the brief, refined by a text model when possible
    pub async fn prepare_prompt(&self, brief: &ImageBrief) -> (String, bool) {
        let request = TextRequest::new(build_xml_prompt(brief))
            .with_system(REFINE_SYSTEM_PROMPT)
            .with_max_tokens(600);
        match self.models.complete(AiTask::ImagePrompt, &request).await {
            Ok(completion) => match extract_prompt(&completion.text) {
                Some(prompt) => return (prompt, true),
                None => tracing::warn!(
                    "{} reply had no <prompt> tag, using fallback prompt",
                    completion.model
                ),
            },
            Err(e) => tracing::warn!("Image prompt refinement failed, using fallback: {}", e),
        }
        (fallback_prompt(brief), false)
    }

    pub async fn generate(&self, brief: &ImageBrief) -> Result<ImageResult, AiError> {
        brief.validate()?;
        let (prompt, refined) = self.prepare_prompt(brief).await;
        let output = self
            .models
            .generate_image(&ImageRequest {
                prompt: prompt.clone(),
                size: brief.size().to_string(),
            })
            .await?;
        tracing::info!("Generated image with {} (refined prompt: {})", output.model, refined);
        Ok(ImageResult {
            prompt,
            refined,
            model: output.model,
            image: output.image,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::client::Provider;
    use crate::ai::models::testing::{MockImageModel, MockTextModel};
    use proptest::prelude::*;

    fn brief() -> ImageBrief {
        ImageBrief {
            subject: "A café <counter> & espresso".to_string(),
            style: Some("watercolor".to_string()),
            mood: None,
            palette: vec!["teal".to_string(), " ".to_string(), "cream".to_string()],
            composition: Some("wide shot".to_string()),
            constraints: None,
            size: None,
        }
    }

    #[test]
    fn test_build_xml_prompt() {
        let xml = build_xml_prompt(&brief());
        assert_eq!(
            xml,
            "<image_request>\n\
             \x20 <subject>A café &lt;counter&gt; &amp; espresso</subject>\n\
             \x20 <style>watercolor</style>\n\
             \x20 <mood/>\n\
             \x20 <palette><color>teal</color><color>cream</color></palette>\n\
             \x20 <composition>wide shot</composition>\n\
             \x20 <constraints>No text, letters, logos or watermarks.</constraints>\n\
             </image_request>"
        );
    }

    #[test]
    fn test_extract_prompt() {
        assert_eq!(
            extract_prompt("Sure:\n<prompt>\n  A cozy   café &amp; bar,\n warm light\n</prompt>"),
            Some("A cozy café & bar, warm light".to_string())
        );
        assert_eq!(
            extract_prompt("<prompt> </prompt><prompt>second</prompt>"),
            Some("second".to_string())
        );
        assert_eq!(extract_prompt("A cozy café"), None);
        assert_eq!(extract_prompt("<prompt>unterminated"), None);
    }

    #[test]
    fn test_fallback_prompt() {
        assert_eq!(
            fallback_prompt(&brief()),
            "A café <counter> & espresso. Style: watercolor. Palette: teal, cream. \
             Composition: wide shot. Constraints: No text, letters, logos or watermarks."
        );
        assert_eq!(
            fallback_prompt(&ImageBrief {
                constraints: Some("Photorealistic".to_string()),
                ..ImageBrief::new("Sunrise.")
            }),
            "Sunrise. Constraints: Photorealistic."
        );
    }

    #[test]
    fn test_validate() {
        assert!(brief().validate().is_ok());
        assert!(ImageBrief::new("  ").validate().is_err());
        assert!(ImageBrief::new("x".repeat(501)).validate().is_err());
        let wide = ImageBrief {
            size: Some("1792x1024".to_string()),
            ..brief()
        };
        assert!(wide.validate().is_ok());
        let odd = ImageBrief {
            size: Some("512x512".to_string()),
            ..brief()
        };
        assert!(matches!(odd.validate(), Err(AiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_generate_uses_refined_prompt() {
        let text = Arc::new(MockTextModel::new(
            Provider::OpenAi,
            &["<prompt>Watercolor café counter, teal and cream</prompt>"],
        ));
        let images = Arc::new(MockImageModel::new());
        let manager = ModelManager::new()
            .with_text_model(text.clone())
            .with_image_model(images.clone());
        let generator = ImageGenerator::new(Arc::new(manager));

        let result = generator.generate(&brief()).await.unwrap();
        assert!(result.refined);
        assert_eq!(result.model, "gpt-image-1");
        assert_eq!(
            images.prompts.lock().await.as_slice(),
            ["Watercolor café counter, teal and cream"]
        );
        let calls = text.calls.lock().await;
        assert!(calls[0].1.prompt.starts_with("<image_request>"));
    }

    #[tokio::test]
    async fn test_generate_falls_back_without_tag_or_text_model() {
        let images = Arc::new(MockImageModel::new());
        let manager = ModelManager::new()
            .with_text_model(Arc::new(MockTextModel::new(
                Provider::Anthropic,
                &["Here is a nice prompt for you"],
            )))
            .with_image_model(images.clone());
        let generator = ImageGenerator::new(Arc::new(manager));
        let result = generator.generate(&brief()).await.unwrap();
        assert!(!result.refined);
        assert_eq!(result.prompt, fallback_prompt(&brief()));

        // no text model configured at all
        let manager = ModelManager::new().with_image_model(images.clone());
        let generator = ImageGenerator::new(Arc::new(manager));
        let result = generator.generate(&ImageBrief::new("Lighthouse")).await.unwrap();
        assert!(!result.refined);
        assert_eq!(images.prompts.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_generate_requires_image_model() {
        let generator = ImageGenerator::new(Arc::new(ModelManager::new()));
        assert!(matches!(
            generator.generate(&ImageBrief::new("Lighthouse")).await,
            Err(AiError::NoModelAvailable(_))
        ));
        assert!(matches!(
            generator.generate(&ImageBrief::new("")).await,
            Err(AiError::Validation(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_escape_roundtrips_through_extraction(subject in "[a-zA-Z<>&\"' ]{1,60}") {
            let reply = format!("<prompt>{}</prompt>", xml_escape(&subject));
            let expected = collapse_whitespace(&subject);
            prop_assert_eq!(extract_prompt(&reply), (!expected.is_empty()).then_some(expected));
        }
    }
}
