//! Wire representation of recipes and the writes that touch a recipe and its
//! ingredients together.
//!
//! Incoming bodies are validated as raw JSON so every offending field can be
//! reported at once, keyed by field name:
//!
//! ```json
//! {"name": ["This field is required."], "ingredients": [{}, {"name": ["This field may not be blank."]}]}
//! ```

use std::collections::BTreeMap;

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::errors::ApiError;
use crate::models::{Ingredient, Recipe, RecipeChangeset};
use crate::query;

const NAME_MAX_LENGTH: usize = 255;

const REQUIRED: &str = "This field is required.";
const NOT_NULL: &str = "This field may not be null.";
const NOT_BLANK: &str = "This field may not be blank.";
const NOT_A_STRING: &str = "Not a valid string.";
const NON_FIELD_ERRORS: &str = "non_field_errors";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct IngredientRepr {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RecipeRepr {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub ingredients: Vec<IngredientRepr>,
}

impl RecipeRepr {
    fn new(recipe: Recipe, ingredients: Vec<Ingredient>) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name,
            description: recipe.description,
            ingredients: ingredients
                .into_iter()
                .map(|ingredient| IngredientRepr {
                    name: ingredient.name,
                })
                .collect(),
        }
    }
}

/// Validation messages keyed by field name.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub(crate) struct FieldErrors(BTreeMap<String, Value>);

impl FieldErrors {
    fn non_field(message: String) -> Self {
        let mut errors = Self::default();
        errors.insert(NON_FIELD_ERRORS, json!([message]));
        errors
    }

    fn insert(&mut self, field: &str, detail: Value) {
        self.0.insert(field.to_string(), detail);
    }

    #[cfg(test)]
    pub(crate) fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A validated body for creating a recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NewRecipeData {
    pub name: String,
    pub description: String,
    pub ingredients: Vec<String>,
}

/// A validated body for updating a recipe. `ingredients: Some(_)` replaces
/// the whole set, `None` leaves it alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RecipeUpdate {
    pub changeset: RecipeChangeset,
    pub ingredients: Option<Vec<String>>,
}

#[derive(Debug, Default)]
struct RecipeFields {
    name: Option<String>,
    description: Option<String>,
    ingredients: Option<Vec<String>>,
}

pub(crate) fn validate_create(payload: &Value) -> Result<NewRecipeData, FieldErrors> {
    let fields = validate(payload, false)?;
    match fields.name {
        Some(name) => Ok(NewRecipeData {
            name,
            description: fields.description.unwrap_or_default(),
            ingredients: fields.ingredients.unwrap_or_default(),
        }),
        None => {
            let mut errors = FieldErrors::default();
            errors.insert("name", json!([REQUIRED]));
            Err(errors)
        }
    }
}

/// `partial` is PATCH semantics: `name` may be omitted.
pub(crate) fn validate_update(payload: &Value, partial: bool) -> Result<RecipeUpdate, FieldErrors> {
    let fields = validate(payload, partial)?;
    Ok(RecipeUpdate {
        changeset: RecipeChangeset {
            name: fields.name,
            description: fields.description,
        },
        ingredients: fields.ingredients,
    })
}

fn validate(payload: &Value, partial: bool) -> Result<RecipeFields, FieldErrors> {
    let object = match payload {
        Value::Object(object) => object,
        other => return Err(FieldErrors::non_field(not_a_dict(other))),
    };
    let mut errors = FieldErrors::default();

    let name = match object.get("name") {
        Some(value) => keep(
            &mut errors,
            "name",
            char_field(value, false, Some(NAME_MAX_LENGTH)),
        ),
        None if !partial => {
            errors.insert("name", json!([REQUIRED]));
            None
        }
        None => None,
    };
    let description = object
        .get("description")
        .and_then(|value| keep(&mut errors, "description", char_field(value, true, None)));
    let ingredients = object
        .get("ingredients")
        .and_then(|value| keep(&mut errors, "ingredients", ingredient_list(value)));

    if errors.is_empty() {
        Ok(RecipeFields {
            name,
            description,
            ingredients,
        })
    } else {
        Err(errors)
    }
}

fn keep<T>(errors: &mut FieldErrors, field: &str, result: Result<T, Value>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(detail) => {
            errors.insert(field, detail);
            None
        }
    }
}

fn char_field(
    value: &Value,
    allow_blank: bool,
    max_length: Option<usize>,
) -> Result<String, Value> {
    let text = match value {
        Value::Null => return Err(json!([NOT_NULL])),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return Err(json!([NOT_A_STRING])),
    };
    if text.is_empty() && !allow_blank {
        return Err(json!([NOT_BLANK]));
    }
    if let Some(max) = max_length.filter(|max| text.chars().count() > *max) {
        return Err(json!([format!(
            "Ensure this field has no more than {} characters.",
            max
        )]));
    }
    Ok(text)
}

fn ingredient_list(value: &Value) -> Result<Vec<String>, Value> {
    let items = match value {
        Value::Null => return Err(json!([NOT_NULL])),
        Value::Array(items) => items,
        other => {
            return Err(json!([format!(
                "Expected a list of items but got type \"{}\".",
                type_name(other)
            )]))
        }
    };

    let mut names = Vec::with_capacity(items.len());
    let mut item_errors = Vec::with_capacity(items.len());
    let mut failed = false;
    for item in items {
        match ingredient(item) {
            Ok(name) => {
                names.push(name);
                item_errors.push(json!({}));
            }
            Err(detail) => {
                failed = true;
                item_errors.push(detail);
            }
        }
    }

    if failed {
        Err(Value::Array(item_errors))
    } else {
        Ok(names)
    }
}

//only `name` is read from an ingredient, anything else is dropped
fn ingredient(item: &Value) -> Result<String, Value> {
    let object: &Map<String, Value> = match item {
        Value::Object(object) => object,
        other => return Err(json!({ NON_FIELD_ERRORS: [not_a_dict(other)] })),
    };
    match object.get("name") {
        Some(value) => char_field(value, false, Some(NAME_MAX_LENGTH))
            .map_err(|detail| json!({ "name": detail })),
        None => Err(json!({ "name": [REQUIRED] })),
    }
}

fn not_a_dict(value: &Value) -> String {
    format!(
        "Invalid data. Expected a dictionary, but got {}.",
        type_name(value)
    )
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

fn represent(conn: &mut SqliteConnection, recipe: Recipe) -> QueryResult<RecipeRepr> {
    let ingredients = query::ingredients_of(conn, recipe.id)?;
    Ok(RecipeRepr::new(recipe, ingredients))
}

fn represent_all(
    conn: &mut SqliteConnection,
    name_contains: Option<&str>,
) -> QueryResult<Vec<RecipeRepr>> {
    let recipes = query::list_recipes(conn, name_contains)?;
    let grouped = query::list_ingredients(conn, name_contains)?.grouped_by(&recipes);
    Ok(recipes
        .into_iter()
        .zip(grouped)
        .map(|(recipe, ingredients)| RecipeRepr::new(recipe, ingredients))
        .collect())
}

pub(crate) fn list(
    conn: &mut SqliteConnection,
    name_contains: Option<&str>,
) -> Result<Vec<RecipeRepr>, ApiError> {
    conn.transaction::<_, ApiError, _>(|conn| Ok(represent_all(conn, name_contains)?))
}

pub(crate) fn retrieve(conn: &mut SqliteConnection, id: i32) -> Result<RecipeRepr, ApiError> {
    conn.transaction::<_, ApiError, _>(|conn| {
        let recipe = query::find_recipe(conn, id)?.ok_or(ApiError::NotFound)?;
        Ok(represent(conn, recipe)?)
    })
}

/// Inserts the recipe and its ingredients in one transaction.
pub(crate) fn create(
    conn: &mut SqliteConnection,
    data: &NewRecipeData,
) -> Result<RecipeRepr, ApiError> {
    conn.transaction::<_, ApiError, _>(|conn| {
        let recipe = query::create_recipe(conn, &data.name, &data.description)?;
        query::create_ingredients(conn, recipe.id, data.ingredients.as_slice())?;
        Ok(represent(conn, recipe)?)
    })
}

/// Applies `update` to recipe `id` in one transaction, replacing the
/// ingredient set when one is supplied.
pub(crate) fn update(
    conn: &mut SqliteConnection,
    id: i32,
    update: &RecipeUpdate,
) -> Result<RecipeRepr, ApiError> {
    conn.transaction::<_, ApiError, _>(|conn| {
        let mut recipe = query::find_recipe(conn, id)?.ok_or(ApiError::NotFound)?;
        if !update.changeset.is_empty() {
            recipe = query::update_recipe(conn, id, &update.changeset)?;
        }
        if let Some(names) = &update.ingredients {
            query::delete_ingredients_of(conn, id)?;
            query::create_ingredients(conn, id, names.as_slice())?;
        }
        Ok(represent(conn, recipe)?)
    })
}
