use {
    super::{context::Context, error::Error, routes},
    crate::config::ServerConfig,
    actix_cors::Cors,
    actix_web::{App, HttpServer, http, web},
    tracing_actix_web::TracingLogger,
};

/// Run the decoder HTTP server until it is shut down.
pub async fn run_server(config: &ServerConfig, context: Context) -> Result<(), Error> {
    tracing::info!(ip = %config.ip, port = config.port, "Starting decoder httpd server");

    let cors_allowed_origin = config.cors_allowed_origin.clone();

    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "OPTIONS"])
            .allowed_headers(vec![http::header::ACCEPT, http::header::CONTENT_TYPE])
            .max_age(3600);

        if let Some(origin) = cors_allowed_origin.as_deref() {
            for origin in origin.split(',') {
                cors = cors.allowed_origin(origin.trim());
            }
        } else {
            cors = cors.allow_any_origin();
        }

        App::new()
            .wrap(TracingLogger::default())
            .wrap(cors)
            .app_data(web::Data::new(context.clone()))
            .service(routes::index)
            .service(routes::decode_loan)
    })
    .workers(config.workers)
    .bind((config.ip.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
