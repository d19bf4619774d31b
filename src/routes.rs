use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::Value;

use crate::db::DbPool;
use crate::errors::ApiError;
use crate::query;
use crate::serializers;

#[derive(Debug, Deserialize)]
pub(crate) struct RecipeFilter {
    name: Option<String>,
}

pub(crate) fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(path_config())
        .app_data(query_config())
        .service(
        web::resource("/recipes")
            .route(web::get().to(list_recipes))
            .route(web::post().to(create_recipe)),
    )
    .service(
        web::resource("/recipes/{id}")
            .route(web::get().to(retrieve_recipe))
            .route(web::put().to(update_recipe))
            .route(web::patch().to(partial_update_recipe))
            .route(web::delete().to(delete_recipe)),
    );
}

// extractor failures answer with the same JSON error shape as everything else
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| ApiError::from(err).into())
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| ApiError::from(err).into())
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| ApiError::from(err).into())
}

async fn list_recipes(
    pool: web::Data<DbPool>,
    filter: web::Query<RecipeFilter>,
) -> Result<HttpResponse, ApiError> {
    let recipes = web::block(move || {
        let mut conn = pool.get()?;
        serializers::list(&mut conn, filter.name.as_deref())
    })
    .await??;
    Ok(HttpResponse::Ok().json(recipes))
}

async fn retrieve_recipe(
    pool: web::Data<DbPool>,
    id: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let recipe = web::block(move || {
        let mut conn = pool.get()?;
        serializers::retrieve(&mut conn, id)
    })
    .await??;
    Ok(HttpResponse::Ok().json(recipe))
}

async fn create_recipe(
    pool: web::Data<DbPool>,
    payload: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let data = serializers::validate_create(&payload)?;
    let recipe = web::block(move || {
        let mut conn = pool.get()?;
        serializers::create(&mut conn, &data)
    })
    .await??;
    log::debug!("created recipe {}", recipe.id);
    Ok(HttpResponse::Created().json(recipe))
}

async fn update_recipe(
    pool: web::Data<DbPool>,
    id: web::Path<i32>,
    payload: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    apply_update(pool, id.into_inner(), &payload, false).await
}

async fn partial_update_recipe(
    pool: web::Data<DbPool>,
    id: web::Path<i32>,
    payload: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    apply_update(pool, id.into_inner(), &payload, true).await
}

async fn apply_update(
    pool: web::Data<DbPool>,
    id: i32,
    payload: &Value,
    partial: bool,
) -> Result<HttpResponse, ApiError> {
    let update = serializers::validate_update(payload, partial)?;
    let recipe = web::block(move || {
        let mut conn = pool.get()?;
        serializers::update(&mut conn, id, &update)
    })
    .await??;
    Ok(HttpResponse::Ok().json(recipe))
}

async fn delete_recipe(
    pool: web::Data<DbPool>,
    id: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let deleted = web::block(move || {
        let mut conn = pool.get()?;
        query::delete_recipe(&mut conn, id).map_err(ApiError::from)
    })
    .await??;
    if deleted == 0 {
        return Err(ApiError::NotFound);
    }
    log::debug!("deleted recipe {}", id);
    Ok(HttpResponse::NoContent().finish())
}
