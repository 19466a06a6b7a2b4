//! LinkedIn content generation, analysis, and profile optimization.

use bson::doc;
use futures::TryStreamExt;
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::db::MongoStore;
use crate::error::{AppError, Result};
use crate::models::linkedin::{
    EngagementLevel, EngagementPrediction, GenerationParams as PostGenerationParams, LinkedInPost,
    OptimizationRecord,
};
use crate::services::gemini::{GeminiClient, GenerationParams, TokenUsage};

static VARIATION_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Variation\s+\d+:").expect("valid variation regex"));

/// Request to generate post variations.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct GeneratePostsRequest {
    pub topic: String,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default = "default_length")]
    pub length: String,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default = "default_count")]
    pub count: u8,
}

fn default_tone() -> String {
    "professional".to_string()
}

fn default_length() -> String {
    "medium".to_string()
}

fn default_count() -> u8 {
    3
}

pub const TONES: &[&str] = &["professional", "casual", "academic"];
pub const LENGTHS: &[&str] = &["short", "medium", "long"];

/// One generated variation with its stored post id.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct PostVariation {
    pub post_id: String,
    pub content: String,
    pub ai_engagement_prediction: EngagementPrediction,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct GeneratePostsResult {
    pub variations: Vec<PostVariation>,
    #[serde(skip)]
    pub usage: TokenUsage,
}

/// Structured post analysis. Every field defaults so a partial model reply
/// still parses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ContentAnalysis {
    #[serde(default)]
    pub engagement_score: i32,
    #[serde(default)]
    pub seo_score: i32,
    #[serde(default)]
    pub readability: Readability,
    #[serde(default)]
    pub sentiment: Sentiment,
    #[serde(default)]
    pub keywords: KeywordAnalysis,
    #[serde(default)]
    pub improvement_suggestions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Readability {
    #[serde(default)]
    pub score: i32,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Sentiment {
    #[serde(default)]
    pub overall: String,
    #[serde(default)]
    pub strength: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct KeywordAnalysis {
    #[serde(default)]
    pub present: Vec<String>,
    #[serde(default)]
    pub missing: Vec<String>,
    #[serde(default)]
    pub trending: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct OptimizeProfileRequest {
    #[schema(value_type = Object)]
    pub current_profile: serde_json::Map<String, serde_json::Value>,
    pub target_role: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub focus_areas: Option<Vec<String>>,
}

/// Suggestions for one profile section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SectionSuggestion {
    #[serde(default)]
    pub current: String,
    #[serde(default)]
    pub suggestion: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SkillsSuggestion {
    #[serde(default)]
    pub add: Vec<String>,
    #[serde(default)]
    pub remove: Vec<String>,
    #[serde(default)]
    pub prioritize: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ProfileOptimization {
    #[serde(default)]
    pub headline: SectionSuggestion,
    #[serde(default)]
    pub summary: SectionSuggestion,
    #[serde(default)]
    pub skills: SkillsSuggestion,
}

pub struct ContentService {
    mongo: MongoStore,
}

impl ContentService {
    pub fn new(mongo: MongoStore) -> Self {
        Self { mongo }
    }

    /// Generate `count` post variations, persist each as an unpublished
    /// AI-generated draft, and return them with engagement predictions.
    pub async fn generate_posts(
        &self,
        user_id: &str,
        gemini: &GeminiClient,
        req: GeneratePostsRequest,
    ) -> Result<GeneratePostsResult> {
        let topic = req.topic.trim();
        if topic.is_empty() {
            return Err(AppError::Validation("topic is required".to_string()));
        }
        if !TONES.contains(&req.tone.as_str()) {
            return Err(AppError::Validation(format!(
                "tone must be one of: {}",
                TONES.join(", ")
            )));
        }
        if !LENGTHS.contains(&req.length.as_str()) {
            return Err(AppError::Validation(format!(
                "length must be one of: {}",
                LENGTHS.join(", ")
            )));
        }
        if !(1..=5).contains(&req.count) {
            return Err(AppError::Validation(
                "count must be between 1 and 5".to_string(),
            ));
        }

        let prompt = build_generation_prompt(&req);
        tracing::info!(topic = %topic, count = req.count, "Generating LinkedIn post variations");

        // Higher temperature and a larger budget for multiple creative
        // variations.
        let generation = gemini
            .generate_text(
                &prompt,
                GenerationParams {
                    temperature: 0.8,
                    max_output_tokens: 2048,
                    ..Default::default()
                },
            )
            .await?;

        let params = PostGenerationParams {
            topic: topic.to_string(),
            tone: req.tone.clone(),
            length: req.length.clone(),
            keywords: req.keywords.clone(),
            audience: req.audience.clone(),
        };

        let mut variations = Vec::new();
        for content in parse_variations(&generation.text) {
            let prediction = predict_engagement();
            let post = LinkedInPost::generated(
                user_id.to_string(),
                content.clone(),
                prediction.clone(),
                params.clone(),
            );
            self.mongo.linkedin_posts().insert_one(&post).await?;
            variations.push(PostVariation {
                post_id: post.id,
                content,
                ai_engagement_prediction: prediction,
            });
        }

        tracing::info!(generated = variations.len(), "LinkedIn post variations stored");
        Ok(GeneratePostsResult {
            variations,
            usage: generation.usage,
        })
    }

    /// Analyze a post for engagement and SEO. The model is asked for JSON;
    /// unparseable replies fall back to a deterministic baseline.
    pub async fn analyze_post(
        &self,
        gemini: &GeminiClient,
        content: &str,
    ) -> Result<(ContentAnalysis, TokenUsage)> {
        if content.trim().is_empty() {
            return Err(AppError::Validation("content is required".to_string()));
        }

        let prompt = build_analysis_prompt(content);
        let generation = gemini
            .generate_text(
                &prompt,
                GenerationParams {
                    temperature: 0.3,
                    ..Default::default()
                },
            )
            .await?;

        let analysis = match parse_json_reply::<ContentAnalysis>(&generation.text) {
            Some(mut analysis) => {
                analysis.engagement_score = analysis.engagement_score.clamp(0, 100);
                analysis.seo_score = analysis.seo_score.clamp(0, 100);
                analysis
            }
            None => {
                tracing::warn!("analysis reply was not parseable JSON, using baseline");
                baseline_analysis(content)
            }
        };
        Ok((analysis, generation.usage))
    }

    /// Produce headline/summary/skills suggestions for a target role and
    /// record them on the stored profile when one exists.
    pub async fn optimize_profile(
        &self,
        user_id: &str,
        gemini: &GeminiClient,
        req: OptimizeProfileRequest,
    ) -> Result<(ProfileOptimization, TokenUsage)> {
        let target_role = req.target_role.trim();
        if target_role.is_empty() {
            return Err(AppError::Validation("target_role is required".to_string()));
        }

        let prompt = build_optimization_prompt(&req);
        tracing::info!(target_role = %target_role, "Optimizing LinkedIn profile");

        let generation = gemini
            .generate_text(
                &prompt,
                GenerationParams {
                    temperature: 0.3,
                    ..Default::default()
                },
            )
            .await?;

        let optimization = parse_json_reply::<ProfileOptimization>(&generation.text)
            .unwrap_or_else(|| {
                tracing::warn!("optimization reply was not parseable JSON, using baseline");
                baseline_optimization(&req)
            });

        // Append to the stored profile's optimization history, if any.
        let record = OptimizationRecord {
            target_role: target_role.to_string(),
            industry: req.industry.clone(),
            suggestions: serde_json::to_value(&optimization)?,
            created_at: bson::DateTime::now(),
        };
        self.mongo
            .linkedin_profiles()
            .update_one(
                doc! {"user_id": user_id},
                doc! {
                    "$push": {"ai_optimizations": bson::to_bson(&record).map_err(|e| AppError::Internal(e.to_string()))?},
                    "$set": {"updated_at": bson::DateTime::now()},
                },
            )
            .await?;

        Ok((optimization, generation.usage))
    }

    pub async fn list_posts(
        &self,
        user_id: &str,
        offset: u64,
        limit: i64,
        published: Option<bool>,
        ai_generated: Option<bool>,
    ) -> Result<(Vec<LinkedInPost>, u64)> {
        let mut filter = doc! {"user_id": user_id};
        if let Some(published) = published {
            filter.insert("is_published", published);
        }
        if let Some(ai_generated) = ai_generated {
            filter.insert("ai_generated", ai_generated);
        }

        let total = self
            .mongo
            .linkedin_posts()
            .count_documents(filter.clone())
            .await?;
        let cursor = self
            .mongo
            .linkedin_posts()
            .find(filter)
            .sort(doc! {"created_at": -1})
            .skip(offset)
            .limit(limit)
            .await?;
        Ok((cursor.try_collect().await?, total))
    }

    pub async fn get_post(&self, user_id: &str, id: &str) -> Result<LinkedInPost> {
        self.mongo
            .linkedin_posts()
            .find_one(doc! {"_id": id, "user_id": user_id})
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
    }

    pub async fn delete_post(&self, user_id: &str, id: &str) -> Result<()> {
        let result = self
            .mongo
            .linkedin_posts()
            .delete_one(doc! {"_id": id, "user_id": user_id})
            .await?;
        if result.deleted_count == 0 {
            return Err(AppError::NotFound("Post not found".to_string()));
        }
        Ok(())
    }
}

fn build_generation_prompt(req: &GeneratePostsRequest) -> String {
    let mut prompt = format!(
        "Generate {} LinkedIn posts about {} in {} length format.\n",
        req.tone, req.topic, req.length
    );
    if let Some(keywords) = req.keywords.as_deref().filter(|k| !k.is_empty()) {
        prompt.push_str(&format!(
            "Include these keywords if relevant: {}.\n",
            keywords.join(", ")
        ));
    }
    if let Some(audience) = req.audience.as_deref().filter(|a| !a.trim().is_empty()) {
        prompt.push_str(&format!("Target audience: {}.\n", audience));
    }
    prompt.push_str(&format!(
        "\nCreate {count} variations of LinkedIn posts, each with a different style and approach.\n\
         Each post should be engaging, professional, and optimized for LinkedIn's algorithm.\n\
         Include relevant hashtags at the end of each post.\n\n\
         Format the response as {count} distinct posts labeled as \"Variation 1:\", \"Variation 2:\", etc.\n",
        count = req.count
    ));
    prompt
}

fn build_analysis_prompt(content: &str) -> String {
    format!(
        "Analyze this LinkedIn post for SEO optimization and engagement potential:\n\n\
         \"{}\"\n\n\
         Respond with a single JSON object with these fields:\n\
         - engagement_score: integer 0-100\n\
         - seo_score: integer 0-100\n\
         - readability: {{score: integer 0-100, level: string, suggestions: [string]}}\n\
         - sentiment: {{overall: string, strength: string}}\n\
         - keywords: {{present: [string], missing: [string], trending: [string]}}\n\
         - improvement_suggestions: [string]\n\n\
         Return only the JSON object, no commentary.",
        content
    )
}

fn build_optimization_prompt(req: &OptimizeProfileRequest) -> String {
    let headline = req
        .current_profile
        .get("headline")
        .and_then(|v| v.as_str())
        .unwrap_or("Not provided");
    let summary = req
        .current_profile
        .get("summary")
        .and_then(|v| v.as_str())
        .unwrap_or("Not provided");
    let experience = req
        .current_profile
        .get("experience")
        .map(|v| v.to_string())
        .unwrap_or_else(|| "Not provided".to_string());
    let skills = req
        .current_profile
        .get("skills")
        .and_then(|v| v.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_else(|| "Not provided".to_string());

    let industry_clause = req
        .industry
        .as_deref()
        .map(|i| format!(" in the {} industry", i))
        .unwrap_or_default();

    format!(
        "Analyze this LinkedIn profile and provide optimization suggestions for the target role of {role}{industry}.\n\n\
         Current LinkedIn Profile:\n\
         - Headline: {headline}\n\
         - Summary: {summary}\n\
         - Experience: {experience}\n\
         - Skills: {skills}\n\n\
         Provide specific suggestions to improve:\n\
         1. The headline (make it more attention-grabbing and specific)\n\
         2. The summary (highlight relevant achievements and skills for {role})\n\
         3. Skills to add, remove, or prioritize for {role}\n\n\
         Respond with a single JSON object with fields \"headline\", \"summary\", \"skills\";\n\
         headline and summary each have {{current, suggestion, explanation}}, skills has {{add, remove, prioritize}}.\n\
         Return only the JSON object, no commentary.",
        role = req.target_role,
        industry = industry_clause,
        headline = headline,
        summary = truncate_chars(summary, 500),
        experience = truncate_chars(&experience, 500),
        skills = truncate_chars(&skills, 300),
    )
}

/// Split generated text on "Variation N:" labels. Text with no labels
/// becomes a single variation.
pub fn parse_variations(text: &str) -> Vec<String> {
    let labels: Vec<_> = VARIATION_LABEL_RE.find_iter(text).collect();
    if labels.is_empty() {
        let trimmed = text.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        };
    }

    let mut variations = Vec::new();
    for (i, label) in labels.iter().enumerate() {
        let start = label.end();
        let end = labels
            .get(i + 1)
            .map(|next| next.start())
            .unwrap_or(text.len());
        let body = text[start..end].trim();
        if !body.is_empty() {
            variations.push(body.to_string());
        }
    }
    variations
}

/// Placeholder engagement model: a uniform pick per metric, as shipped in
/// the original platform.
fn predict_engagement() -> EngagementPrediction {
    const LEVELS: &[EngagementLevel] = &[
        EngagementLevel::Low,
        EngagementLevel::Medium,
        EngagementLevel::High,
    ];
    let mut rng = rand::thread_rng();
    let pick = |rng: &mut rand::rngs::ThreadRng| *LEVELS.choose(rng).unwrap_or(&EngagementLevel::Medium);
    EngagementPrediction {
        likes: pick(&mut rng),
        comments: pick(&mut rng),
        shares: pick(&mut rng),
    }
}

/// Extract the first JSON object from a model reply, tolerating code fences
/// and surrounding prose.
pub fn parse_json_reply<T: serde::de::DeserializeOwned>(text: &str) -> Option<T> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Deterministic analysis derived from the content itself, used when the
/// model reply cannot be parsed.
fn baseline_analysis(content: &str) -> ContentAnalysis {
    let words = content.split_whitespace().count() as i32;
    let hashtags = content.matches('#').count() as i32;
    let has_question = content.contains('?');

    let engagement_score = (40 + words.min(200) / 4 + hashtags * 5 + if has_question { 10 } else { 0 }).clamp(0, 100);
    let seo_score = (35 + hashtags * 10 + words.min(150) / 5).clamp(0, 100);
    let readability_score = if words > 0 && words < 250 { 75 } else { 55 };

    let mut suggestions = Vec::new();
    if hashtags == 0 {
        suggestions.push("Add 2-3 relevant hashtags to increase discoverability".to_string());
    }
    if !has_question {
        suggestions.push("Add a call to action or question at the end of your post".to_string());
    }
    if words > 250 {
        suggestions.push("Consider shortening the post; long posts lose readers".to_string());
    }

    ContentAnalysis {
        engagement_score,
        seo_score,
        readability: Readability {
            score: readability_score,
            level: "Professional".to_string(),
            suggestions: Vec::new(),
        },
        sentiment: Sentiment {
            overall: "neutral".to_string(),
            strength: "moderate".to_string(),
        },
        keywords: KeywordAnalysis::default(),
        improvement_suggestions: suggestions,
    }
}

/// Deterministic optimization derived from the submitted profile, used when
/// the model reply cannot be parsed.
fn baseline_optimization(req: &OptimizeProfileRequest) -> ProfileOptimization {
    let current_headline = req
        .current_profile
        .get("headline")
        .and_then(|v| v.as_str())
        .unwrap_or("Not provided")
        .to_string();
    let current_summary = req
        .current_profile
        .get("summary")
        .and_then(|v| v.as_str())
        .unwrap_or("Not provided")
        .to_string();

    ProfileOptimization {
        headline: SectionSuggestion {
            current: current_headline,
            suggestion: format!("Senior {} specializing in measurable outcomes", req.target_role),
            explanation: format!(
                "A headline naming seniority and specialization ranks better for {} searches.",
                req.target_role
            ),
        },
        summary: SectionSuggestion {
            current: current_summary,
            suggestion: format!(
                "Results-driven professional with extensive experience in {} roles.",
                req.target_role
            ),
            explanation: format!(
                "Leading with achievements relevant to {} keeps recruiters reading.",
                req.target_role
            ),
        },
        skills: SkillsSuggestion {
            add: vec![req.target_role.clone()],
            remove: Vec::new(),
            prioritize: req.focus_areas.clone().unwrap_or_default(),
        },
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Variation parsing
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_labeled_variations() {
        let text = "Variation 1:\nFirst post body #ai\n\nVariation 2:\nSecond post body #ml";
        let variations = parse_variations(text);
        assert_eq!(variations.len(), 2);
        assert_eq!(variations[0], "First post body #ai");
        assert_eq!(variations[1], "Second post body #ml");
    }

    #[test]
    fn test_parse_ignores_preamble_before_first_label() {
        let text = "Here are your posts.\nVariation 1: only one post";
        let variations = parse_variations(text);
        assert_eq!(variations, vec!["only one post".to_string()]);
    }

    #[test]
    fn test_unlabeled_text_is_single_variation() {
        let variations = parse_variations("Just one unlabeled post about Rust.");
        assert_eq!(variations.len(), 1);
        assert_eq!(variations[0], "Just one unlabeled post about Rust.");
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        assert!(parse_variations("   \n ").is_empty());
    }

    #[test]
    fn test_empty_labeled_sections_skipped() {
        let text = "Variation 1:\n\nVariation 2:\nreal content";
        let variations = parse_variations(text);
        assert_eq!(variations, vec!["real content".to_string()]);
    }

    // -----------------------------------------------------------------------
    // JSON reply parsing
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_fenced_json_reply() {
        let text = "```json\n{\"engagement_score\": 85, \"seo_score\": 70}\n```";
        let analysis: ContentAnalysis = parse_json_reply(text).unwrap();
        assert_eq!(analysis.engagement_score, 85);
        assert_eq!(analysis.seo_score, 70);
        // Missing fields default
        assert!(analysis.improvement_suggestions.is_empty());
    }

    #[test]
    fn test_parse_json_with_surrounding_prose() {
        let text = "Sure! Here is the analysis: {\"engagement_score\": 42} Hope this helps.";
        let analysis: ContentAnalysis = parse_json_reply(text).unwrap();
        assert_eq!(analysis.engagement_score, 42);
    }

    #[test]
    fn test_parse_garbage_returns_none() {
        assert!(parse_json_reply::<ContentAnalysis>("no json here").is_none());
        assert!(parse_json_reply::<ContentAnalysis>("{broken json").is_none());
    }

    // -----------------------------------------------------------------------
    // Baselines
    // -----------------------------------------------------------------------

    #[test]
    fn test_baseline_analysis_scores_in_range() {
        for content in [
            "",
            "short",
            &"word ".repeat(500),
            "A post with #hashtags #everywhere #and #more #tags #again",
        ] {
            let analysis = baseline_analysis(content);
            assert!((0..=100).contains(&analysis.engagement_score));
            assert!((0..=100).contains(&analysis.seo_score));
        }
    }

    #[test]
    fn test_baseline_analysis_suggests_hashtags_when_absent() {
        let analysis = baseline_analysis("No tags in this post at all");
        assert!(analysis
            .improvement_suggestions
            .iter()
            .any(|s| s.contains("hashtag")));
    }

    #[test]
    fn test_baseline_optimization_uses_target_role() {
        let req = OptimizeProfileRequest {
            current_profile: serde_json::Map::new(),
            target_role: "Platform Engineer".to_string(),
            industry: None,
            focus_areas: Some(vec!["Kubernetes".to_string()]),
        };
        let optimization = baseline_optimization(&req);
        assert!(optimization.headline.suggestion.contains("Platform Engineer"));
        assert_eq!(optimization.skills.prioritize, vec!["Kubernetes".to_string()]);
    }

    // -----------------------------------------------------------------------
    // Prompt building
    // -----------------------------------------------------------------------

    #[test]
    fn test_generation_prompt_includes_optional_fields() {
        let req = GeneratePostsRequest {
            topic: "Rust async".to_string(),
            tone: "casual".to_string(),
            length: "short".to_string(),
            keywords: Some(vec!["tokio".to_string(), "axum".to_string()]),
            audience: Some("backend engineers".to_string()),
            count: 2,
        };
        let prompt = build_generation_prompt(&req);
        assert!(prompt.contains("casual LinkedIn posts about Rust async"));
        assert!(prompt.contains("tokio, axum"));
        assert!(prompt.contains("backend engineers"));
        assert!(prompt.contains("\"Variation 1:\""));
    }

    #[test]
    fn test_generation_prompt_omits_absent_fields() {
        let req = GeneratePostsRequest {
            topic: "Rust".to_string(),
            tone: "professional".to_string(),
            length: "medium".to_string(),
            keywords: None,
            audience: None,
            count: 3,
        };
        let prompt = build_generation_prompt(&req);
        assert!(!prompt.contains("keywords"));
        assert!(!prompt.contains("Target audience"));
    }
}
