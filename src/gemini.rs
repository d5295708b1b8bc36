//! Text generation through the Gemini `generateContent` endpoint.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::GeminiError;
use crate::models::{GeneratedRecipe, RecipeDocument};
use crate::transform::{document_to_generated_recipe, normalize_recipe};

pub const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const TEXT_MODEL: &str = "gemini-2.5-flash";
pub const EVALUATION_TEMPERATURE: f64 = 0.3;
pub const GENERATION_TEMPERATURE: f64 = 0.6;

pub const EVALUATION_PROMPT: &str = concat!(
    "CRITICAL: Content preservation is the MOST IMPORTANT rule. Never suggest changes that would:\n",
    "  - Remove ingredients, steps, or cooking instructions\n",
    "  - Eliminate ingredient uses (e.g., if an ingredient appears in multiple steps, ensure all uses are preserved)\n",
    "  - Change the recipe's cooking method, timing, or essential instructions\n",
    "  - Remove or consolidate duplicate ingredient entries unless they are truly redundant (e.g., same ingredient with different notes/amounts for different uses should be preserved)\n",
    "  - Alter the logical flow or completeness of the recipe\n",
    "\n",
    "Evaluate the provided recipe YAML against these production rules (formatting rules are secondary to content preservation):\n",
    "- Use metric measurements with abbreviated units (g, ml, °C) plus tsp/tbsp where helpful. You may use descriptions such as \"1 medium\" or \"2 large\" for whole produce, but never revert to Fahrenheit, pounds, ounces, or cups.\n",
    " - Describe tiny amounts (a drizzle, a pinch) naturally so the instructions do not invent precise measurements for them.\n",
    " - Mention each ingredient in lowercase within instructions and wrap the first occurrence per step in *asterisks* (e.g., *olive oil*).\n",
    " - It's acceptable to use descriptive phrases in instructions (e.g., *trimmed green beans*, *minced garlic*) for clarity - you don't need to match ingredient list names exactly.\n",
    " - Ingredient amounts should not contain parenthetical notes; move contextual details into a `notes` field.\n",
    " - Instructions should be concise and practical. They should reference the ingredient list, except for common pantry staples (salt, pepper, oil, water, basic seasonings) which may be mentioned without explicit listing.\n",
    " - Keep ingredient names in the ingredients array lowercase so the UI can highlight them consistently.\n",
    "\n",
    "When suggesting fixes:\n",
    "  - ONLY suggest formatting and structural changes (case, asterisks, note placement)\n",
    "  - NEVER suggest removing ingredients, steps, or instruction content\n",
    "  - NEVER suggest changing descriptive phrases in instructions to match ingredient list names exactly (e.g., don't change '*trimmed green beans*' to '*green beans*' or '*minced garlic*' to '*garlic*')\n",
    "  - If an ingredient appears multiple times (e.g., frozen peas used in filling AND as side dish), preserve ALL uses\n",
    "  - If splitting or clarifying ingredient entries, ensure the total usage matches the original\n",
    "\n",
    "Assess the recipe and return one of:\n",
    " - If issues exist, list them as Markdown bullets detailing the required change (be specific about ingredient names, steps, or fields). Only suggest fixes that preserve all content.\n",
    " - If everything already complies, respond with the sentence: `All checks passed. No changes needed.`",
);

pub fn build_evaluation_prompt(yaml: &str) -> String {
    format!("{}\n\nCurrent recipe YAML:\n{}", EVALUATION_PROMPT, yaml)
}

const GENERATION_RULES: &str = concat!(
    "The dish must be achievable in 60 minutes or less using widely available, budget-friendly ingredients.\n",
    "Write the summary as one objective sentence about the main components and cooking method. ",
    "Leave out the dish name and subjective words such as delicious or authentic.\n",
    "\n",
    "Formatting rules:\n",
    "1. Ingredient names are lowercase. Amounts carry no parenthetical notes; put details in `notes`.\n",
    "2. In each instruction step, wrap only the first mention of an ingredient in *asterisks*.\n",
    "3. Use metric units (g, ml, °C) plus tsp/tbsp. Prefer fractions such as 1/2 for whole units. ",
    "Never use Fahrenheit, pounds, ounces, cups or inches.\n",
    "4. Pantry staples (salt, pepper, oil, water) may appear in steps without being listed.\n",
    "5. Include a quick complementary side when the main dish is usually served with one.\n",
    "6. Tags describe diet, cuisine or character, never single ingredients other than the main protein.\n",
    "\n",
    "Return JSON only, matching the response schema.",
);

/// Inputs for AI recipe generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOptions {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub user_comment: Option<String>,
    pub servings: Option<u32>,
    pub cuisine: Option<String>,
}

impl GenerateOptions {
    /// Trim every field and lowercase tags, dropping blanks. Title,
    /// description and at least one tag are required.
    pub fn cleaned(self) -> Option<Self> {
        let trimmed = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let options = Self {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            tags: self
                .tags
                .iter()
                .map(|tag| tag.trim().to_lowercase())
                .filter(|tag| !tag.is_empty())
                .collect(),
            user_comment: trimmed(self.user_comment),
            servings: self.servings.filter(|s| *s > 0),
            cuisine: trimmed(self.cuisine),
        };
        let complete =
            !options.title.is_empty() && !options.description.is_empty() && !options.tags.is_empty();
        complete.then_some(options)
    }
}

pub fn build_generation_prompt(options: &GenerateOptions) -> String {
    let mut lines = vec![
        format!("Develop a detailed recipe for \"{}\".", options.title),
        format!("Core description provided by the product team: {}", options.description),
        GENERATION_RULES.to_string(),
    ];
    if let Some(servings) = options.servings {
        lines.push(format!("Target servings: {}.", servings));
    }
    if let Some(cuisine) = &options.cuisine {
        lines.push(format!("Cuisine influence: {}.", cuisine));
    }
    lines.push(format!(
        "You must reference only the following tags when relevant (do not invent new tags): {}. \
         If a provided tag does not apply, omit it rather than creating alternatives.",
        options.tags.join(", ")
    ));
    if let Some(comment) = &options.user_comment {
        lines.push(format!("Incorporate these extra notes: {}.", comment));
    }
    lines.join("\n")
}

fn recipe_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "title": {"type": "string"},
            "summary": {"type": "string"},
            "servings": {"type": "integer"},
            "prepTimeMinutes": {"type": "integer"},
            "cookTimeMinutes": {"type": "integer"},
            "ingredients": {
                "type": "array",
                "minItems": 6,
                "items": {
                    "type": "object",
                    "required": ["name", "amount"],
                    "properties": {
                        "name": {"type": "string"},
                        "amount": {"type": "string"},
                        "notes": {"type": "string"}
                    }
                }
            },
            "instructions": {
                "type": "array",
                "minItems": 4,
                "items": {
                    "type": "object",
                    "required": ["step", "action"],
                    "properties": {
                        "step": {"type": "integer"},
                        "action": {"type": "string"}
                    }
                }
            },
            "tags": {"type": "array", "items": {"type": "string"}}
        },
        "required": ["title", "ingredients", "instructions"]
    })
}

/// Parse the model's JSON answer, tolerating a Markdown code fence around it.
pub fn parse_generated_document(text: &str) -> Result<RecipeDocument, GeminiError> {
    let body = text.trim();
    let body = body
        .strip_prefix("```json")
        .or_else(|| body.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(body);
    serde_json::from_str(body.trim()).map_err(|e| GeminiError::InvalidRecipe {
        message: e.to_string(),
        raw: text.to_string(),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
}

impl GenerationConfig {
    fn text(temperature: f64) -> Self {
        Self {
            temperature,
            response_mime_type: None,
            response_schema: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

/// Extract the generated text, treating a blocked prompt and an empty answer
/// as distinct failures.
pub fn ensure_text(response: &GenerateContentResponse, context: &str) -> Result<String, GeminiError> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_ref())
    {
        return Err(GeminiError::Blocked {
            context: context.to_string(),
            reason: reason.clone(),
        });
    }

    let text: String = response
        .candidates
        .iter()
        .filter_map(|candidate| candidate.content.as_ref())
        .flat_map(|content| content.parts.iter())
        .filter_map(|part| part.text.as_deref())
        .collect();
    let text = text.trim();

    if text.is_empty() {
        return Err(GeminiError::EmptyText {
            context: context.to_string(),
        });
    }
    Ok(text.to_string())
}

#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url: API_BASE_URL.to_string(),
            model: TEXT_MODEL.to_string(),
        }
    }

    /// Client for the configured key, or `MissingApiKey`.
    pub fn from_key(api_key: Option<&str>) -> Result<Self, GeminiError> {
        api_key.map(Self::new).ok_or(GeminiError::MissingApiKey)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub async fn generate_content(
        &self,
        prompt: &str,
        temperature: f64,
    ) -> Result<GenerateContentResponse, GeminiError> {
        self.send(prompt, GenerationConfig::text(temperature)).await
    }

    async fn send(
        &self,
        prompt: &str,
        generation_config: GenerationConfig,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config,
        };

        tracing::debug!(model = %self.model, "Calling Gemini");
        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    pub async fn generate_text(
        &self,
        prompt: &str,
        temperature: f64,
        context: &str,
    ) -> Result<String, GeminiError> {
        let response = self.generate_content(prompt, temperature).await?;
        ensure_text(&response, context)
    }

    /// Review a recipe document against the house formatting rules.
    pub async fn evaluate_recipe(&self, yaml: &str) -> Result<String, GeminiError> {
        self.generate_text(
            &build_evaluation_prompt(yaml),
            EVALUATION_TEMPERATURE,
            "Recipe evaluation",
        )
        .await
    }

    /// Generate a recipe from a title, description and tag list. The caller's
    /// title, description and tags replace whatever the model returned.
    pub async fn generate_recipe(
        &self,
        options: &GenerateOptions,
    ) -> Result<GeneratedRecipe, GeminiError> {
        let config = GenerationConfig {
            temperature: GENERATION_TEMPERATURE,
            response_mime_type: Some("application/json"),
            response_schema: Some(recipe_schema()),
        };
        let response = self.send(&build_generation_prompt(options), config).await?;
        let text = ensure_text(&response, "Recipe generation")?;

        let mut document = parse_generated_document(&text)?;
        document.title = options.title.clone();
        document.summary = Some(options.description.clone());
        document.tags = options.tags.clone();

        let recipe = document_to_generated_recipe(&normalize_recipe(document));
        tracing::info!(slug = %recipe.slug, ingredients = recipe.ingredients.len(), "Generated recipe");
        Ok(recipe)
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    fn response(json: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_build_evaluation_prompt() {
        let prompt = build_evaluation_prompt("title: Toast\n");
        assert!(prompt.starts_with("CRITICAL: Content preservation"));
        assert!(prompt.ends_with("No changes needed.`\n\nCurrent recipe YAML:\ntitle: Toast\n"));
    }

    #[test]
    fn test_ensure_text_joins_all_parts() {
        let r = response(serde_json::json!({
            "candidates": [
                {"content": {"parts": [{"text": "  All checks "}, {"text": "passed."}]}},
                {"content": {"parts": [{}]}}
            ]
        }));
        assert_eq!(ensure_text(&r, "ctx").unwrap(), "All checks passed.");
    }

    #[test]
    fn test_ensure_text_blocked_vs_empty() {
        let blocked = response(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "ignored"}]}}],
            "promptFeedback": {"blockReason": "SAFETY"}
        }));
        assert!(matches!(
            ensure_text(&blocked, "Recipe evaluation"),
            Err(GeminiError::Blocked { reason, .. }) if reason == "SAFETY"
        ));

        let empty = response(serde_json::json!({"candidates": [{"content": {"parts": [{"text": "   "}]}}]}));
        let err = ensure_text(&empty, "Recipe evaluation").unwrap_err();
        assert_eq!(err.to_string(), "Gemini did not return text for: Recipe evaluation");

        assert!(ensure_text(&GenerateContentResponse::default(), "x").is_err());
    }

    #[test]
    fn test_missing_key() {
        assert!(matches!(GeminiClient::from_key(None), Err(GeminiError::MissingApiKey)));
        assert!(GeminiClient::from_key(Some("k")).is_ok());
    }

    #[tokio::test]
    async fn test_evaluate_recipe_posts_prompt() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "secret".into()))
            .match_body(Matcher::PartialJson(serde_json::json!({
                "generationConfig": {"temperature": 0.3}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"All checks passed. No changes needed."}]}}]}"#)
            .expect(1)
            .create_async()
            .await;

        let client = GeminiClient::new("secret").with_base_url(server.url());
        let text = client.evaluate_recipe("title: Toast\n").await.unwrap();
        assert!(crate::transform::is_evaluation_passed(&text));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_failure_carries_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body("quota exceeded")
            .create_async()
            .await;

        let client = GeminiClient::new("k").with_base_url(server.url());
        match client.generate_text("hi", 0.5, "Greeting").await {
            Err(GeminiError::Http { status, body }) => {
                assert_eq!(status, 429);
                assert_eq!(body, "quota exceeded");
            }
            other => panic!("Expected Http error, got {:?}", other.map(|_| ())),
        }
    }

    fn stew_options() -> GenerateOptions {
        GenerateOptions {
            title: "Beef Stew".to_string(),
            description: "Slow-simmered beef with root vegetables".to_string(),
            tags: vec!["beef".to_string(), "winter".to_string()],
            servings: Some(4),
            ..GenerateOptions::default()
        }
    }

    #[test]
    fn test_generate_options_cleaned() {
        let options = GenerateOptions {
            title: "  Beef Stew ".to_string(),
            description: "Hearty".to_string(),
            tags: vec![" Beef ".to_string(), "".to_string()],
            cuisine: Some("   ".to_string()),
            servings: Some(0),
            ..GenerateOptions::default()
        }
        .cleaned()
        .unwrap();
        assert_eq!(options.title, "Beef Stew");
        assert_eq!(options.tags, vec!["beef"]);
        assert_eq!(options.cuisine, None);
        assert_eq!(options.servings, None);

        let no_tags = GenerateOptions {
            tags: vec!["  ".to_string()],
            ..stew_options()
        };
        assert!(no_tags.cleaned().is_none());
    }

    #[test]
    fn test_build_generation_prompt() {
        let prompt = build_generation_prompt(&GenerateOptions {
            user_comment: Some("no mushrooms".to_string()),
            ..stew_options()
        });
        assert!(prompt.starts_with("Develop a detailed recipe for \"Beef Stew\"."));
        assert!(prompt.contains("Target servings: 4."));
        assert!(prompt.contains("(do not invent new tags): beef, winter."));
        assert!(prompt.ends_with("Incorporate these extra notes: no mushrooms."));
        assert!(!prompt.contains("Cuisine influence"));
    }

    #[test]
    fn test_parse_generated_document_accepts_fenced_json() {
        let document =
            parse_generated_document("```json\n{\"title\":\"Toast\",\"ingredients\":[],\"instructions\":[]}\n```")
                .unwrap();
        assert_eq!(document.title, "Toast");

        let err = parse_generated_document("not json").unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse recipe JSON"));
        assert!(err.to_string().ends_with("Raw output:\nnot json"));
    }

    #[tokio::test]
    async fn test_generate_recipe_normalizes_model_output() {
        let model_json = serde_json::json!({
            "title": "Stew of Beef",
            "summary": "Model summary",
            "servings": 4,
            "cookTimeMinutes": 50,
            "ingredients": [
                {"name": "Beef Chuck", "amount": "800 g (cubed)"},
                {"name": "Carrots", "amount": "3 medium"},
                {"name": "Mystery", "amount": ""}
            ],
            "instructions": [
                {"step": 4, "action": " Brown the *beef chuck*. "},
                {"step": 9, "action": "Simmer with *carrots*."}
            ],
            "tags": ["stew", "comfort"]
        })
        .to_string();
        let body = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": model_json}]}}]
        });

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "secret".into()))
            .match_body(Matcher::PartialJson(serde_json::json!({
                "generationConfig": {"temperature": 0.6, "responseMimeType": "application/json"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .expect(1)
            .create_async()
            .await;

        let client = GeminiClient::new("secret").with_base_url(server.url());
        let recipe = client.generate_recipe(&stew_options()).await.unwrap();
        mock.assert_async().await;

        assert_eq!(recipe.slug, "beef-stew");
        assert_eq!(recipe.title, "Beef Stew");
        assert_eq!(recipe.summary.as_deref(), Some("Slow-simmered beef with root vegetables"));
        assert_eq!(recipe.tags, vec!["beef", "winter"]);
        assert_eq!(recipe.cook_time_minutes, Some(50));
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.ingredients[0].name, "beef chuck");
        assert_eq!(recipe.ingredients[0].amount, "800 g");
        assert_eq!(recipe.ingredients[0].notes.as_deref(), Some("cubed"));
        assert_eq!(recipe.instructions[0].step, Some(1));
        assert_eq!(recipe.instructions[0].action, "Brown the *beef chuck*.");
        assert_eq!(recipe.instructions[1].step, Some(2));
    }

    #[tokio::test]
    async fn test_generate_recipe_rejects_non_json_answer() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"Sorry, I cannot help."}]}}]}"#)
            .create_async()
            .await;

        let client = GeminiClient::new("k").with_base_url(server.url());
        assert!(matches!(
            client.generate_recipe(&stew_options()).await,
            Err(GeminiError::InvalidRecipe { .. })
        ));
    }
}
