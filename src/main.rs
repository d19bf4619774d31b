use actix_web::{middleware, web, App, HttpServer};

mod config;
mod db;
mod errors;
mod models;
mod query;
mod routes;
mod schema;
mod serializers;

use crate::config::Config;

#[actix_web::main]
async fn main() -> Result<(), db::BoxError> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env()?;

    // set up database connection pool and bring the schema up to date
    let pool = db::build_pool(&config)?;
    {
        let mut conn = pool.get()?;
        db::run_migrations(&mut conn)?;
    }

    log::info!(
        "starting HTTP server at http://{}:{}",
        config.host,
        config.port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .wrap(middleware::NormalizePath::trim())
            .wrap(middleware::Logger::default())
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
