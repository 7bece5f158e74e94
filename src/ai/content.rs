//! AI-assisted writing for the post and service editors
//!
//! Each task is a prompt template plus a JSON response contract. Replies
//! are parsed leniently (code fences and chatter around the object are
//! ignored) and then checked before they reach the editor.

use super::client::{AiError, TextRequest};
use super::models::{AiTask, ModelManager};
use crate::services::markdown::plain_excerpt;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

pub const SEO_TITLE_MAX: usize = 60;
pub const SEO_DESCRIPTION_MAX: usize = 160;
pub const MAX_TAGS: usize = 8;
pub const DEFAULT_EXCERPT_MAX: usize = 200;
const MAX_SOURCE_CHARS: usize = 12_000;

const SYSTEM_PROMPT: &str = "You write clear, accurate marketing and blog copy for a small \
business website. Always answer with a single JSON object and nothing else.";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlogPostRequest {
    pub topic: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub word_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedPost {
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub seo_title: String,
    #[serde(default)]
    pub seo_description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceDescriptionRequest {
    pub name: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub audience: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedService {
    pub summary: String,
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeoRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoMetadata {
    pub seo_title: String,
    pub seo_description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExcerptRequest {
    pub content: String,
    #[serde(default)]
    pub max_chars: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedExcerpt {
    pub excerpt: String,
}

/// Output plus the model that wrote it
#[derive(Debug, Clone, Serialize)]
pub struct Generated<T> {
    pub model: &'static str,
    #[serde(flatten)]
    pub output: T,
}

fn require(value: &str, field: &str) -> Result<(), AiError> {
    if value.trim().is_empty() {
        return Err(AiError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .fold(String::new(), |mut out, item| {
            let _ = writeln!(out, "- {}", item);
            out
        })
}

pub fn blog_post_prompt(req: &BlogPostRequest) -> String {
    let mut prompt = format!("Write a blog post about: {}\n", req.topic.trim());
    if !req.keywords.is_empty() {
        let _ = writeln!(prompt, "Work in these keywords: {}", req.keywords.join(", "));
    }
    let _ = writeln!(
        prompt,
        "Tone: {}",
        req.tone.as_deref().unwrap_or("friendly and professional")
    );
    if let Some(audience) = &req.audience {
        let _ = writeln!(prompt, "Audience: {}", audience);
    }
    let _ = writeln!(
        prompt,
        "Length: about {} words of Markdown with ## headings.",
        req.word_count.unwrap_or(800)
    );
    prompt.push_str(&format!(
        "\nReturn JSON with keys: \"title\", \"excerpt\" (one or two sentences), \
\"content\" (Markdown), \"tags\" (up to {} short lowercase tags), \
\"seo_title\" (at most {} characters), \"seo_description\" (at most {} characters).",
        MAX_TAGS, SEO_TITLE_MAX, SEO_DESCRIPTION_MAX
    ));
    prompt
}

pub fn service_description_prompt(req: &ServiceDescriptionRequest) -> String {
    let mut prompt = format!("Describe the service \"{}\" for our website.\n", req.name.trim());
    if let Some(summary) = &req.summary {
        let _ = writeln!(prompt, "What it is: {}", summary);
    }
    if !req.features.is_empty() {
        let _ = write!(prompt, "Key features:\n{}", bullet_list(&req.features));
    }
    if let Some(audience) = &req.audience {
        let _ = writeln!(prompt, "Ideal customer: {}", audience);
    }
    prompt.push_str(
        "\nReturn JSON with keys: \"summary\" (one sentence), \"description\" \
(two to four Markdown paragraphs), \"features\" (a list of short benefit statements).",
    );
    prompt
}

pub fn seo_prompt(req: &SeoRequest) -> String {
    let mut prompt = format!(
        "Write search metadata for this page.\nTitle: {}\n",
        req.title.trim()
    );
    if !req.keywords.is_empty() {
        let _ = writeln!(prompt, "Target keywords: {}", req.keywords.join(", "));
    }
    let _ = write!(
        prompt,
        "Content:\n{}\n\nReturn JSON with keys: \"seo_title\" (at most {} characters), \
\"seo_description\" (at most {} characters), \"keywords\" (up to {} phrases).",
        truncate_chars(&req.content, MAX_SOURCE_CHARS),
        SEO_TITLE_MAX,
        SEO_DESCRIPTION_MAX,
        MAX_TAGS
    );
    prompt
}

/// Requested excerpt length, kept within 40..=1000 characters
pub fn excerpt_limit(req: &ExcerptRequest) -> usize {
    req.max_chars.unwrap_or(DEFAULT_EXCERPT_MAX).clamp(40, 1000)
}

pub fn excerpt_prompt(req: &ExcerptRequest) -> String {
    format!(
        "Summarize this article as a teaser of at most {} characters. Do not start with \
\"This article\".\n\nArticle:\n{}\n\nReturn JSON with key \"excerpt\".",
        excerpt_limit(req),
        truncate_chars(&req.content, MAX_SOURCE_CHARS)
    )
}

/// The first complete JSON object in a model reply. Braces and fences inside
/// string values do not count, so surrounding prose or a code fence is skipped.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + i]);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn parse_json_response<T: DeserializeOwned>(text: &str) -> Result<T, AiError> {
    let json = extract_json(text).ok_or_else(|| {
        AiError::InvalidResponse("Model reply did not contain a JSON object".to_string())
    })?;
    serde_json::from_str(json).map_err(|e| {
        tracing::warn!(
            "Failed to parse model JSON ({}): {}",
            e,
            json.chars().take(200).collect::<String>()
        );
        AiError::InvalidResponse(format!("Model reply was not the expected JSON: {}", e))
    })
}

/// Cut at a word boundary so the result fits in `max` characters
pub fn clamp_chars(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut = truncate_chars(text, max);
    match cut.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => cut[..idx].trim_end().to_string(),
        _ => cut.to_string(),
    }
}

/// Trim, lowercase, drop blanks and duplicates, keep at most `MAX_TAGS`
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().trim_start_matches('#').to_lowercase())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .take(MAX_TAGS)
        .collect()
}

fn non_empty_output(value: &str, field: &str) -> Result<(), AiError> {
    if value.trim().is_empty() {
        return Err(AiError::InvalidResponse(format!("Model returned an empty {}", field)));
    }
    Ok(())
}

pub struct ContentGenerator {
    models: Arc<ModelManager>,
}

impl ContentGenerator {
    pub fn new(models: Arc<ModelManager>) -> Self {
        Self { models }
    }

    async fn run<T: DeserializeOwned>(
        &self,
        task: AiTask,
        prompt: String,
        max_tokens: u32,
    ) -> Result<(&'static str, T), AiError> {
        let request = TextRequest::new(prompt)
            .with_system(SYSTEM_PROMPT)
            .with_max_tokens(max_tokens)
            .with_temperature(0.7);
        let completion = self.models.complete(task, &request).await?;
        let parsed = parse_json_response(&completion.text)?;
        Ok((completion.model, parsed))
    }

    pub async fn blog_post(&self, req: &BlogPostRequest) -> Result<Generated<GeneratedPost>, AiError> {
        require(&req.topic, "topic")?;
        let (model, mut post): (_, GeneratedPost) =
            self.run(AiTask::BlogPost, blog_post_prompt(req), 4096).await?;

        non_empty_output(&post.title, "title")?;
        non_empty_output(&post.content, "content")?;
        post.title = post.title.trim().to_string();
        if post.excerpt.trim().is_empty() {
            post.excerpt = plain_excerpt(&post.content, DEFAULT_EXCERPT_MAX);
        }
        if post.seo_title.trim().is_empty() {
            post.seo_title = post.title.clone();
        }
        post.seo_title = clamp_chars(&post.seo_title, SEO_TITLE_MAX);
        if post.seo_description.trim().is_empty() {
            post.seo_description = post.excerpt.clone();
        }
        post.seo_description = clamp_chars(&post.seo_description, SEO_DESCRIPTION_MAX);
        post.tags = normalize_tags(post.tags);

        Ok(Generated { model, output: post })
    }

    pub async fn service_description(
        &self,
        req: &ServiceDescriptionRequest,
    ) -> Result<Generated<GeneratedService>, AiError> {
        require(&req.name, "name")?;
        let (model, mut service): (_, GeneratedService) = self
            .run(AiTask::ServiceDescription, service_description_prompt(req), 2048)
            .await?;

        non_empty_output(&service.description, "description")?;
        if service.summary.trim().is_empty() {
            service.summary = plain_excerpt(&service.description, DEFAULT_EXCERPT_MAX);
        }
        service.features = service
            .features
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();

        Ok(Generated {
            model,
            output: service,
        })
    }

    pub async fn seo(&self, req: &SeoRequest) -> Result<Generated<SeoMetadata>, AiError> {
        require(&req.title, "title")?;
        require(&req.content, "content")?;
        let (model, mut seo): (_, SeoMetadata) =
            self.run(AiTask::Seo, seo_prompt(req), 512).await?;

        non_empty_output(&seo.seo_title, "SEO title")?;
        non_empty_output(&seo.seo_description, "SEO description")?;
        seo.seo_title = clamp_chars(&seo.seo_title, SEO_TITLE_MAX);
        seo.seo_description = clamp_chars(&seo.seo_description, SEO_DESCRIPTION_MAX);
        seo.keywords = normalize_tags(seo.keywords);

        Ok(Generated { model, output: seo })
    }

    pub async fn excerpt(&self, req: &ExcerptRequest) -> Result<Generated<GeneratedExcerpt>, AiError> {
        require(&req.content, "content")?;
        let max = excerpt_limit(req);
        let (model, mut out): (_, GeneratedExcerpt) =
            self.run(AiTask::Excerpt, excerpt_prompt(req), 512).await?;

        non_empty_output(&out.excerpt, "excerpt")?;
        out.excerpt = clamp_chars(&out.excerpt, max);
        Ok(Generated { model, output: out })
    }
}
