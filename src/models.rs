use std::fmt;

use diesel::prelude::*;

use crate::schema::{ingredient, recipe};

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = recipe)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct Recipe {
    pub id: i32,
    pub name: String,
    pub description: String,
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = recipe)]
pub(crate) struct NewRecipe<'a> {
    pub name: &'a str,
    pub description: &'a str,
}

impl<'a> NewRecipe<'a> {
    /// A recipe with an empty description.
    pub(crate) fn new(name: &'a str) -> Self {
        Self {
            name,
            description: "",
        }
    }

    pub(crate) fn with_description(mut self, description: &'a str) -> Self {
        self.description = description;
        self
    }
}

/// Fields left as `None` are not touched by the update.
#[derive(Debug, Default, Clone, PartialEq, Eq, AsChangeset)]
#[diesel(table_name = recipe)]
pub(crate) struct RecipeChangeset {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl RecipeChangeset {
    pub(crate) fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable, Associations)]
#[diesel(belongs_to(Recipe))]
#[diesel(table_name = ingredient)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct Ingredient {
    pub id: i32,
    pub name: String,
    pub recipe_id: i32,
}

impl fmt::Display for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = ingredient)]
pub(crate) struct NewIngredient<'a> {
    pub name: &'a str,
    pub recipe_id: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipe_displays_as_its_name() {
        let pizza = Recipe {
            id: 1,
            name: "Pizza".to_string(),
            description: "Some description about Pizza.".to_string(),
        };
        assert_eq!(pizza.to_string(), "Pizza");
    }

    #[test]
    fn ingredient_displays_as_its_name() {
        let cheese = Ingredient {
            id: 7,
            name: "Cheese".to_string(),
            recipe_id: 1,
        };
        assert_eq!(cheese.to_string(), "Cheese");
    }

    #[test]
    fn new_recipe_defaults_to_empty_description() {
        let recipe = NewRecipe::new("Soup");
        assert_eq!(recipe.description, "");
        let recipe = recipe.with_description("Hot.");
        assert_eq!(recipe.description, "Hot.");
    }

    #[test]
    fn changeset_emptiness() {
        assert!(RecipeChangeset::default().is_empty());
        let changeset = RecipeChangeset {
            description: Some(String::new()),
            ..Default::default()
        };
        assert!(!changeset.is_empty());
    }
}
