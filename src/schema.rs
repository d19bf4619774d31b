diesel::table! {
    recipe (id) {
        id -> Integer,
        name -> Text,
        description -> Text,
    }
}

diesel::table! {
    ingredient (id) {
        id -> Integer,
        name -> Text,
        recipe_id -> Integer,
    }
}

diesel::joinable!(ingredient -> recipe (recipe_id));

diesel::allow_tables_to_appear_in_same_query!(recipe, ingredient);
