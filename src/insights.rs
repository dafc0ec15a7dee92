// 💡 Insights - Short natural-language notes attached to a reconciliation
// Static templates by default; hosted text generation when a generator is configured

use crate::money::{format_currency, format_percent};
use crate::reconciliation::Summary;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Characters of generated text kept for the performance insight
pub const PERFORMANCE_EXCERPT_CHARS: usize = 100;
/// Characters of generated text kept for a refreshed optimization tip
pub const OPTIMIZATION_EXCERPT_CHARS: usize = 200;

/// Tips served when no generator is configured
pub const STATIC_TIPS: [&str; 5] = [
    "Focus on high-margin products with 3x+ markup to maximize profit per sale.",
    "Optimize your product descriptions with trending keywords to improve conversion rates.",
    "Consider seasonal products and trending niches for higher demand and pricing power.",
    "Negotiate better shipping rates with suppliers to reduce your cost per order.",
    "Test different pricing strategies - sometimes higher prices increase perceived value.",
];

/// Tips served when the generator gave nothing usable
pub const FALLBACK_TIPS: [&str; 7] = [
    "Test trending products with high social media engagement for better conversion rates.",
    "Implement abandoned cart recovery emails to recapture 15-25% of lost sales.",
    "Use dynamic pricing based on competitor analysis and demand fluctuations.",
    "Focus on building relationships with 2-3 reliable suppliers for better terms and faster shipping.",
    "Create product bundles to increase average order value and improve profit margins.",
    "Optimize your checkout process - reduce steps to decrease cart abandonment rates.",
    "Invest in high-quality product images and videos to increase customer trust and conversions.",
];

// ============================================================================
// TEXT GENERATION CAPABILITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InsightError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("response was not JSON: {0}")]
    Decode(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl InsightError {
    /// The service answered, but not with anything we can use
    pub fn is_unusable_answer(&self) -> bool {
        matches!(self, InsightError::Status(_) | InsightError::InvalidResponse(_))
    }
}

/// Sampling knobs forwarded to the hosted model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_new_tokens: u32,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_sample: Option<bool>,
}

pub const UPLOAD_PARAMS: GenerationParams = GenerationParams {
    max_new_tokens: 200,
    temperature: 0.7,
    do_sample: None,
};

pub const REFRESH_PARAMS: GenerationParams = GenerationParams {
    max_new_tokens: 150,
    temperature: 0.8,
    do_sample: Some(true),
};

/// TextGenerator - prompt in, text out
///
/// Optional collaborator: callers always have a static fallback, so an
/// implementation never needs to retry.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, InsightError>;

    /// Name used in logs
    fn name(&self) -> &str {
        "text-generator"
    }
}

// ============================================================================
// UPLOAD INSIGHTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub performance: String,
    pub optimization: String,
    pub expenses: String,
    pub projections: String,
}

/// Insights with no generator configured
pub fn static_insights(summary: &Summary) -> Insights {
    let revenue = format_currency(summary.total_revenue);
    let costs = format_currency(summary.total_costs);

    Insights {
        performance: format!(
            "Your business generated {} in revenue with {} in costs, resulting in a {} profit margin.",
            revenue,
            costs,
            format_percent(summary.profit_margin)
        ),
        optimization: "Consider focusing on higher-margin products and reducing shipping costs to improve profitability.".to_string(),
        expenses: format!(
            "Product costs account for {} of your expenses. Monitor supplier pricing for cost optimization.",
            costs
        ),
        projections: format!(
            "Based on current trends, projected 3-month revenue could reach {}.",
            format_currency(summary.predicted_revenue)
        ),
    }
}

/// Insights built around an answer from the generator
fn generated_insights(summary: &Summary, text: &str) -> Insights {
    let performance = if text.is_empty() {
        format!(
            "Revenue of {} with {} margin shows solid performance.",
            format_currency(summary.total_revenue),
            format_percent(summary.profit_margin)
        )
    } else {
        format!("AI Analysis: {}...", excerpt(text, PERFORMANCE_EXCERPT_CHARS))
    };

    Insights {
        performance,
        optimization: "Focus on high-margin products and optimize shipping costs for better profitability.".to_string(),
        expenses: format!(
            "Monitor your {} in costs. Look for supplier optimization opportunities.",
            format_currency(summary.total_costs)
        ),
        projections: format!(
            "Based on current {} sales, projected quarterly revenue: {}.",
            summary.sales_count,
            format_currency(summary.predicted_revenue)
        ),
    }
}

/// Generator answered, but not usefully (bad status or shape)
fn unusable_answer_insights(summary: &Summary) -> Insights {
    Insights {
        performance: format!(
            "Your business generated {} in revenue with {} profit margin.",
            format_currency(summary.total_revenue),
            format_percent(summary.profit_margin)
        ),
        optimization: "Consider focusing on higher-margin products and reducing operational costs.".to_string(),
        expenses: format!(
            "Total costs of {} represent your main expense category.",
            format_currency(summary.total_costs)
        ),
        projections: format!(
            "Quarterly projection based on current performance: {}.",
            format_currency(summary.predicted_revenue)
        ),
    }
}

/// Generator could not be reached
fn failed_call_insights(summary: &Summary) -> Insights {
    let costs = format_currency(summary.total_costs);

    Insights {
        performance: format!(
            "Revenue: {}, Costs: {}, Margin: {}",
            format_currency(summary.total_revenue),
            costs,
            format_percent(summary.profit_margin)
        ),
        optimization: "Focus on cost reduction and high-margin product promotion.".to_string(),
        expenses: format!("Monitor {} in expenses for optimization opportunities.", costs),
        projections: format!(
            "Projected quarterly revenue: {}",
            format_currency(summary.predicted_revenue)
        ),
    }
}

pub fn insight_prompt(summary: &Summary) -> String {
    format!(
        "Analyze this e-commerce business data and provide insights:\n\n\
         Revenue: {}\n\
         Costs: {}\n\
         Profit Margin: {}\n\
         Sales Count: {}\n\n\
         Provide specific, actionable business insights for performance, optimization, expenses, and projections.",
        format_currency(summary.total_revenue),
        format_currency(summary.total_costs),
        format_percent(summary.profit_margin),
        summary.sales_count
    )
}

/// Insights for an upload; never fails
pub async fn generate_insights(generator: Option<&dyn TextGenerator>, summary: &Summary) -> Insights {
    let Some(generator) = generator else {
        return static_insights(summary);
    };

    match generator.generate(&insight_prompt(summary), &UPLOAD_PARAMS).await {
        Ok(text) => {
            debug!("{} returned {} characters", generator.name(), text.len());
            generated_insights(summary, &text)
        }
        Err(e) if e.is_unusable_answer() => {
            warn!("{} gave an unusable answer: {}", generator.name(), e);
            unusable_answer_insights(summary)
        }
        Err(e) => {
            warn!("{} call failed: {}", generator.name(), e);
            failed_call_insights(summary)
        }
    }
}

// ============================================================================
// OPTIMIZATION REFRESH
// ============================================================================

/// Figures the dashboard sends back when asking for a new tip
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OptimizationRequest {
    pub revenue: f64,
    pub costs: f64,
    pub margin: f64,
    pub sales_count: i64,
}

impl OptimizationRequest {
    /// Lenient read: numbers or numeric strings, missing keys are 0
    pub fn from_json(body: &Value) -> Result<Self, String> {
        let object = body
            .as_object()
            .ok_or_else(|| "request body is not a JSON object".to_string())?;

        let number = |key: &str| -> Result<f64, String> {
            match object.get(key) {
                None => Ok(0.0),
                Some(Value::Number(n)) => n
                    .as_f64()
                    .ok_or_else(|| format!("{} is out of range", key)),
                Some(Value::String(s)) => s
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| format!("{} is not a number: {:?}", key, s)),
                Some(other) => Err(format!("{} is not a number: {}", key, other)),
            }
        };

        let sales_count = match object.get("sales_count") {
            None => 0,
            Some(Value::Number(n)) => match n.as_i64() {
                Some(i) => i,
                None => n
                    .as_f64()
                    .map(|f| f.trunc() as i64)
                    .ok_or_else(|| "sales_count is out of range".to_string())?,
            },
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("sales_count is not an integer: {:?}", s))?,
            Some(other) => return Err(format!("sales_count is not an integer: {}", other)),
        };

        Ok(OptimizationRequest {
            revenue: number("revenue")?,
            costs: number("costs")?,
            margin: number("margin")?,
            sales_count,
        })
    }
}

pub fn optimization_prompts(request: &OptimizationRequest) -> Vec<String> {
    let revenue = format_currency(request.revenue);
    let costs = format_currency(request.costs);
    let margin = format_percent(request.margin);

    vec![
        format!("Based on {} revenue and {} margin, suggest 3 specific dropshipping optimization strategies for product selection, pricing, and supplier management.", revenue, margin),
        format!("Analyze this dropshipping business: {} sales, {} costs. Provide actionable tips for scaling and improving profit margins.", request.sales_count, costs),
        format!("For a dropshipping store with {} profit margin, recommend specific strategies to reduce costs, increase average order value, and optimize product mix.", margin),
        format!("Given {} in revenue from {} orders, suggest dropshipping-specific tactics for customer acquisition, retention, and upselling.", revenue, request.sales_count),
        format!("Dropshipping business analysis: {} revenue, {} costs. Recommend supplier negotiation tactics and inventory optimization strategies.", revenue, costs),
    ]
}

fn pick<R: Rng + ?Sized>(tips: &[&str], rng: &mut R) -> String {
    tips.choose(rng).copied().unwrap_or_default().to_string()
}

/// One fresh optimization tip; never fails
pub async fn refresh_optimization<R>(
    generator: Option<&dyn TextGenerator>,
    request: &OptimizationRequest,
    rng: &mut R,
) -> String
where
    R: Rng + Send + ?Sized,
{
    let Some(generator) = generator else {
        return pick(&STATIC_TIPS, rng);
    };

    let prompt = optimization_prompts(request)
        .choose(rng)
        .cloned()
        .unwrap_or_default();

    match generator.generate(&prompt, &REFRESH_PARAMS).await {
        Ok(text) if !text.is_empty() => {
            format!("AI Insight: {}...", excerpt(&text, OPTIMIZATION_EXCERPT_CHARS))
        }
        Ok(_) => pick(&FALLBACK_TIPS, rng),
        Err(e) => {
            warn!("{} call failed, serving a stock tip: {}", generator.name(), e);
            pick(&FALLBACK_TIPS, rng)
        }
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

// ============================================================================
// TESTS
// ============================================================================
