//! Pure conversions between cache records, API records and view models.
//!
//! Nothing in here fails: malformed legacy data degrades to empty
//! structures so display code never has to handle a parse error.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::models::{
    FeedCardProps, GeneratedRecipe, Ingredient, Instruction, RecipeDocument, RecipeFull,
    RecipeListItem, RecipePartial,
};

static STEP_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s*").expect("static regex"));
static NON_SLUG_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex"));

/// Outcome of a defensive parse. `Fallback` always carries the empty value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed<T> {
    Structured(T),
    Fallback(T),
}

impl<T> Parsed<T> {
    pub fn into_inner(self) -> T {
        match self {
            Parsed::Structured(value) | Parsed::Fallback(value) => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Parsed::Fallback(_))
    }
}

pub fn partial_to_list_item(partial: &RecipePartial) -> RecipeListItem {
    RecipeListItem {
        slug: partial.slug.clone(),
        name: partial.name.clone(),
        description: partial.description.clone(),
        tags: partial.tags.clone(),
        image_url: partial.image_url.clone(),
        prep_time_minutes: partial.prep_time_minutes,
        cook_time_minutes: partial.cook_time_minutes,
    }
}

pub fn partials_to_list_items(partials: &[RecipePartial]) -> Vec<RecipeListItem> {
    partials.iter().map(partial_to_list_item).collect()
}

/// Overlay cached partial data onto freshly fetched list items.
///
/// Output has the same length and order as `recipes`. Items without a cache
/// hit are returned unchanged. Time fields prefer the fetched value, then the
/// cached one.
pub fn merge_cached_with_recipes<F>(recipes: &[RecipeListItem], lookup: F) -> Vec<RecipeListItem>
where
    F: Fn(&str) -> Option<RecipePartial>,
{
    recipes
        .iter()
        .map(|recipe| match lookup(&recipe.slug) {
            Some(cached) => {
                let mut merged = partial_to_list_item(&cached);
                merged.prep_time_minutes = recipe.prep_time_minutes.or(cached.prep_time_minutes);
                merged.cook_time_minutes = recipe.cook_time_minutes.or(cached.cook_time_minutes);
                merged
            }
            None => recipe.clone(),
        })
        .collect()
}

fn value_to_trimmed_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string().trim().to_string(),
    }
}

/// Parse the JSON ingredient list stored with a recipe. Entries without a
/// name are dropped; anything that is not a JSON array yields the fallback.
pub fn parse_ingredients(raw: &str) -> Parsed<Vec<Ingredient>> {
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(raw) else {
        return Parsed::Fallback(Vec::new());
    };

    let ingredients = items
        .iter()
        .map(|item| {
            let notes = value_to_trimmed_string(item.get("notes"));
            Ingredient {
                name: value_to_trimmed_string(item.get("name")),
                amount: value_to_trimmed_string(item.get("amount")),
                notes: (!notes.is_empty()).then_some(notes),
            }
        })
        .filter(|ingredient| !ingredient.name.is_empty())
        .collect();

    Parsed::Structured(ingredients)
}

/// Parse stored instructions. Accepts either a JSON array of
/// `{step?, action}` objects or numbered text lines (`"1. Do this"`).
pub fn parse_instructions(raw: &str) -> Parsed<Vec<Instruction>> {
    let trimmed = raw.trim();

    if trimmed.starts_with('[') {
        return match serde_json::from_str::<Vec<Instruction>>(trimmed) {
            Ok(steps) => Parsed::Structured(steps),
            Err(_) => Parsed::Fallback(Vec::new()),
        };
    }

    let steps = trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| Instruction {
            step: Some(index as u32 + 1),
            action: STEP_PREFIX.replace(line, "").trim().to_string(),
        })
        .collect();

    Parsed::Structured(steps)
}

/// Format instructions as numbered lines, keeping explicit step numbers.
pub fn build_instructions(instructions: &[Instruction]) -> String {
    instructions
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let step = entry.step.unwrap_or(index as u32 + 1);
            format!("{}. {}", step, entry.action)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn recipe_data_to_generated_recipe(recipe: &RecipeFull) -> GeneratedRecipe {
    let description = (!recipe.description.trim().is_empty()).then(|| recipe.description.clone());

    GeneratedRecipe {
        slug: recipe.slug.clone(),
        name: recipe.name.clone(),
        description: description.clone(),
        tags: recipe.tags.clone(),
        image_url: recipe.image_url.clone(),
        prep_time_minutes: recipe.prep_time_minutes,
        cook_time_minutes: recipe.cook_time_minutes,
        title: recipe.name.clone(),
        summary: description,
        ingredients: parse_ingredients(&recipe.ingredients).into_inner(),
        instructions: parse_instructions(&recipe.instructions).into_inner(),
        servings: None,
    }
}

pub fn generated_recipe_to_feed_card_props(recipe: &GeneratedRecipe) -> FeedCardProps {
    let name = if recipe.name.is_empty() {
        recipe.title.clone()
    } else {
        recipe.name.clone()
    };

    FeedCardProps {
        slug: recipe.slug.clone(),
        name,
        description: recipe.description.clone().or_else(|| recipe.summary.clone()),
        tags: recipe.tags.clone(),
        image_url: recipe.image_url.clone(),
        prep_time_minutes: recipe.prep_time_minutes,
        cook_time_minutes: recipe.cook_time_minutes,
    }
}

/// Lowercase ingredient names, move parenthetical amount details into
/// `notes`, drop entries without an amount, and renumber steps from 1.
pub fn normalize_recipe(recipe: RecipeDocument) -> RecipeDocument {
    let ingredients = recipe
        .ingredients
        .into_iter()
        .map(|ingredient| {
            let (amount, parenthetical) = match ingredient.amount.split_once('(') {
                Some((head, tail)) => (
                    head.trim().to_string(),
                    Some(tail.trim_end().trim_end_matches(')').trim().to_string()),
                ),
                None => (ingredient.amount.trim().to_string(), None),
            };
            let notes = match ingredient.notes {
                Some(notes) => Some(notes.trim().to_string()),
                None => parenthetical.filter(|n| !n.is_empty()),
            };
            Ingredient {
                name: ingredient.name.trim().to_lowercase(),
                amount,
                notes,
            }
        })
        .filter(|ingredient| !ingredient.amount.is_empty())
        .collect();

    let instructions = recipe
        .instructions
        .into_iter()
        .enumerate()
        .map(|(index, instruction)| Instruction {
            step: Some(index as u32 + 1),
            action: instruction.action.trim().to_string(),
        })
        .collect();

    RecipeDocument {
        ingredients,
        instructions,
        ..recipe
    }
}

/// Expand a normalized document into the generated-recipe shape, keyed by
/// the slug of its title.
pub fn document_to_generated_recipe(document: &RecipeDocument) -> GeneratedRecipe {
    GeneratedRecipe {
        slug: slugify(&document.title),
        name: document.title.clone(),
        description: document.summary.clone(),
        tags: document.tags.clone(),
        image_url: None,
        prep_time_minutes: document.prep_time_minutes,
        cook_time_minutes: document.cook_time_minutes,
        title: document.title.clone(),
        summary: document.summary.clone(),
        ingredients: document.ingredients.clone(),
        instructions: document.instructions.clone(),
        servings: document.servings,
    }
}

pub fn slugify(value: &str) -> String {
    let lowered = value.to_lowercase();
    let dashed = NON_SLUG_CHARS.replace_all(&lowered, "-");
    dashed.trim_matches('-').chars().take(80).collect()
}

pub fn is_evaluation_passed(evaluation: &str) -> bool {
    let lower = evaluation.to_lowercase();
    lower.contains("all checks passed") || lower.contains("no changes needed")
}

/// Render a recipe as plain text for an LLM prompt.
pub fn format_recipe_for_prompt(recipe: &RecipeFull) -> String {
    let mut parts = vec![format!("Title: {}", recipe.name)];

    if !recipe.description.is_empty() {
        parts.push(format!("Description: {}", recipe.description));
    }

    match parse_ingredients(&recipe.ingredients) {
        Parsed::Structured(ingredients) if !ingredients.is_empty() => {
            parts.push("Ingredients:".to_string());
            for ing in ingredients {
                let line = format!("- {} {}", ing.amount, ing.name);
                match ing.notes {
                    Some(notes) => parts.push(format!("{} ({})", line, notes)),
                    None => parts.push(line),
                }
            }
        }
        Parsed::Structured(_) => {}
        Parsed::Fallback(_) => parts.push(format!("Ingredients: {}", recipe.ingredients)),
    }

    let instructions = parse_instructions(&recipe.instructions).into_inner();
    if !instructions.is_empty() {
        parts.push("Instructions:".to_string());
        parts.push(build_instructions(&instructions));
    }

    if !recipe.tags.is_empty() {
        parts.push(format!("Tags: {}", recipe.tags.join(", ")));
    }
    if let Some(prep) = recipe.prep_time_minutes.filter(|m| *m > 0) {
        parts.push(format!("Prep time: {} minutes", prep));
    }
    if let Some(cook) = recipe.cook_time_minutes.filter(|m| *m > 0) {
        parts.push(format!("Cook time: {} minutes", cook));
    }

    parts.join("\n")
}

pub fn recipe_to_yaml(recipe: &RecipeDocument) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(recipe)
}
