use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel::sqlite::SqliteConnection;

use crate::models::{Ingredient, NewIngredient, NewRecipe, Recipe, RecipeChangeset};
use crate::schema::{ingredient, recipe};

diesel::define_sql_function! {
    /// Unicode-aware lowercasing. sqlite's own `lower` only folds ASCII, so
    /// `db` registers this on every connection.
    fn unicode_lower(x: Text) -> Text;
}

pub(crate) fn create_recipe(
    conn: &mut SqliteConnection,
    name: &str,
    description: &str,
) -> QueryResult<Recipe> {
    diesel::insert_into(recipe::table)
        .values(NewRecipe::new(name).with_description(description))
        .returning(Recipe::as_returning())
        .get_result(conn)
}

/// Fails with a foreign key violation when `recipe_id` does not exist.
#[cfg(test)]
pub(crate) fn create_ingredient(
    conn: &mut SqliteConnection,
    recipe_id: i32,
    name: &str,
) -> QueryResult<Ingredient> {
    diesel::insert_into(ingredient::table)
        .values(NewIngredient { name, recipe_id })
        .returning(Ingredient::as_returning())
        .get_result(conn)
}

/// Bulk insert, rows get ascending ids in the order given.
pub(crate) fn create_ingredients<S: AsRef<str>>(
    conn: &mut SqliteConnection,
    recipe_id: i32,
    names: &[S],
) -> QueryResult<usize> {
    if names.is_empty() {
        return Ok(0);
    }
    let rows: Vec<NewIngredient<'_>> = names
        .iter()
        .map(|name| NewIngredient {
            name: name.as_ref(),
            recipe_id,
        })
        .collect();
    diesel::insert_into(ingredient::table)
        .values(&rows)
        .execute(conn)
}

pub(crate) fn find_recipe(conn: &mut SqliteConnection, id: i32) -> QueryResult<Option<Recipe>> {
    recipe::table
        .find(id)
        .select(Recipe::as_select())
        .first(conn)
        .optional()
}

/// All recipes in creation order, optionally restricted to names containing
/// `name_contains` (case-insensitive).
pub(crate) fn list_recipes(
    conn: &mut SqliteConnection,
    name_contains: Option<&str>,
) -> QueryResult<Vec<Recipe>> {
    let mut query = recipe::table
        .select(Recipe::as_select())
        .order(recipe::id.asc())
        .into_boxed();

    if let Some(pattern) = name_pattern(name_contains) {
        query = query.filter(unicode_lower(recipe::name).like(pattern).escape('\\'));
    }

    query.load(conn)
}

/// Ingredients of every recipe `list_recipes` returns for the same filter,
/// in insertion order. The recipe filter is joined rather than bound id by id,
/// so the list has no size limit.
pub(crate) fn list_ingredients(
    conn: &mut SqliteConnection,
    name_contains: Option<&str>,
) -> QueryResult<Vec<Ingredient>> {
    let mut query = ingredient::table
        .inner_join(recipe::table)
        .select(Ingredient::as_select())
        .order(ingredient::id.asc())
        .into_boxed();

    if let Some(pattern) = name_pattern(name_contains) {
        query = query.filter(unicode_lower(recipe::name).like(pattern).escape('\\'));
    }

    query.load(conn)
}

pub(crate) fn ingredients_of(
    conn: &mut SqliteConnection,
    recipe_id: i32,
) -> QueryResult<Vec<Ingredient>> {
    ingredient::table
        .filter(ingredient::recipe_id.eq(recipe_id))
        .select(Ingredient::as_select())
        .order(ingredient::id.asc())
        .load(conn)
}

pub(crate) fn update_recipe(
    conn: &mut SqliteConnection,
    id: i32,
    changeset: &RecipeChangeset,
) -> QueryResult<Recipe> {
    diesel::update(recipe::table.find(id))
        .set(changeset)
        .returning(Recipe::as_returning())
        .get_result(conn)
}

pub(crate) fn delete_ingredients_of(
    conn: &mut SqliteConnection,
    recipe_id: i32,
) -> QueryResult<usize> {
    diesel::delete(ingredient::table.filter(ingredient::recipe_id.eq(recipe_id))).execute(conn)
}

/// Removes the recipe and every ingredient it owns. Returns the number of
/// recipe rows removed, 0 when `id` is unknown.
pub(crate) fn delete_recipe(conn: &mut SqliteConnection, id: i32) -> QueryResult<usize> {
    conn.transaction(|conn| {
        delete_ingredients_of(conn, id)?;
        diesel::delete(recipe::table.find(id)).execute(conn)
    })
}

//empty filters match everything
fn name_pattern(name_contains: Option<&str>) -> Option<String> {
    name_contains
        .filter(|fragment| !fragment.is_empty())
        .map(|fragment| format!("%{}%", escape_like(&fragment.to_lowercase())))
}

fn escape_like(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
