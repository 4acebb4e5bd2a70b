// File: services/slotwise_backend/src/main.rs
mod service_factory;

use axum::Router;
use slotwise_assistant::{AssistantSettings, SchedulingAssistant};
use slotwise_config::load_config;
use std::error::Error;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = load_config()?;
    slotwise_common::logging::init();

    let settings = AssistantSettings::from_config(&config)?;
    info!(
        "Assistant settings: zone {}, working hours {}-{}, {} turns max",
        settings.time_zone, settings.work_start, settings.work_end, settings.max_turns
    );
    let calendar = service_factory::calendar_service(&config).await;
    let assistant = Arc::new(SchedulingAssistant::new(calendar, settings));

    let api_router = slotwise_common::routes().merge(slotwise_assistant::routes(assistant));

    #[allow(unused_mut)] // only the openapi feature adds to it
    let mut app = Router::new().nest("/api", api_router);

    #[cfg(feature = "openapi")]
    {
        use slotwise_assistant::doc::AssistantApiDoc;
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        #[derive(OpenApi)]
        #[openapi(
            info(
                title = "Slotwise API",
                version = "0.1.0",
                description = "Conversational scheduling assistant",
                license(name = "MIT", url = "https://opensource.org/licenses/MIT")
            ),
            components(),
            tags( (name = "Slotwise", description = "Core service endpoints")),
            servers( (url = "/api", description = "Main API Prefix")),
        )]
        struct ApiDoc;

        let mut openapi_doc = ApiDoc::openapi();
        openapi_doc.merge(AssistantApiDoc::openapi());
        info!("Adding Swagger UI at /api/docs");

        let swagger_ui = SwaggerUi::new("/api/docs").url("/api/docs/openapi.json", openapi_doc);
        app = app.merge(swagger_ui);
    }

    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Starting server at http://{}", addr);
    info!("API endpoints available at http://{}/api", addr);

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
