//! LinkedIn profile and post documents.

use bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Predicted engagement level for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EngagementLevel {
    Low,
    Medium,
    High,
}

/// Model-predicted engagement for a generated post.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct EngagementPrediction {
    pub likes: EngagementLevel,
    pub comments: EngagementLevel,
    pub shares: EngagementLevel,
}

/// Observed engagement counters for a published post.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct EngagementStats {
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub comments: i64,
    #[serde(default)]
    pub shares: i64,
    #[serde(default)]
    pub impressions: i64,
    #[serde(default)]
    pub clicks: i64,
}

/// Parameters a post was generated with, kept for reproducibility.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GenerationParams {
    pub topic: String,
    pub tone: String,
    pub length: String,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInPost {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub content: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub ai_generated: bool,
    #[serde(default)]
    pub ai_engagement_prediction: Option<EngagementPrediction>,
    #[serde(default)]
    pub generation_params: Option<GenerationParams>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub published_at: Option<DateTime>,
    #[serde(default)]
    pub linkedin_post_id: Option<String>,
    #[serde(default)]
    pub engagement_stats: Option<EngagementStats>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl LinkedInPost {
    /// An AI-generated draft, not yet published.
    pub fn generated(
        user_id: String,
        content: String,
        prediction: EngagementPrediction,
        params: GenerationParams,
    ) -> Self {
        let now = DateTime::now();
        let tags = params.keywords.clone().unwrap_or_default();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            content,
            title: None,
            image_url: None,
            ai_generated: true,
            ai_engagement_prediction: Some(prediction),
            generation_params: Some(params),
            is_published: false,
            published_at: None,
            linkedin_post_id: None,
            engagement_stats: None,
            tags,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A profile-optimization record appended whenever suggestions are produced
/// for a stored profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRecord {
    pub target_role: String,
    #[serde(default)]
    pub industry: Option<String>,
    pub suggestions: serde_json::Value,
    pub created_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub linkedin_id: String,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub profile_data: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub ai_optimizations: Vec<OptimizationRecord>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}
