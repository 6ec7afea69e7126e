use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpRequest, HttpResponse, HttpServer};
use async_graphql::http::GraphiQLSource;
use async_graphql_actix_web::{GraphQLRequest, GraphQLResponse, GraphQLSubscription};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use graphql_api::bus::NotificationBus;
use graphql_api::config::Config;
use graphql_api::db::{memory::MemoryDirectory, postgres::PgDirectory, UserDirectory};
use graphql_api::schema::{auth::SessionCookie, auth::SESSION_COOKIE, build_schema, AppSchema};
use graphql_api::security::TokenService;

async fn graphql_handler(
    schema: web::Data<AppSchema>,
    http_req: HttpRequest,
    req: GraphQLRequest,
) -> GraphQLResponse {
    // Lift the session cookie off the transport so the auth resolvers can
    // see it as plain context data.
    let token = http_req
        .cookie(SESSION_COOKIE)
        .map(|c| c.value().to_string());

    let request = req.into_inner().data(SessionCookie(token));
    schema.execute(request).await.into()
}

async fn graphql_subscription_handler(
    schema: web::Data<AppSchema>,
    req: HttpRequest,
    payload: web::Payload,
) -> actix_web::Result<HttpResponse> {
    GraphQLSubscription::new(schema.as_ref().clone()).start(&req, payload)
}

async fn health_handler() -> &'static str {
    "ok"
}

/// SDL endpoint for schema introspection and client code generation
async fn schema_handler(schema: web::Data<AppSchema>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain")
        .body(schema.sdl())
}

async fn playground_handler() -> HttpResponse {
    HttpResponse::Ok().content_type("text/html").body(
        GraphiQLSource::build()
            .endpoint("/graphql")
            .subscription_endpoint("/graphql")
            .finish(),
    )
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,graphql_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting GraphQL API...");

    let config = Config::from_env()?;

    let directory: Arc<dyn UserDirectory> = match &config.database_url {
        Some(url) => {
            let directory = PgDirectory::connect(url).await?;
            info!("User directory backed by Postgres");
            Arc::new(directory)
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory user directory");
            Arc::new(MemoryDirectory::new())
        }
    };

    let bus = Arc::new(NotificationBus::new(256));
    let tokens = TokenService::new(&config.jwt.secret, config.jwt.ttl_seconds);
    let schema = build_schema(directory, bus, tokens);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    info!("GraphQL API listening on http://{}", bind_addr);

    let playground = config.graphql.playground;
    HttpServer::new(move || {
        let mut app = App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(schema.clone()))
            .route("/graphql", web::post().to(graphql_handler))
            // WebSocket subscriptions share the endpoint
            .route("/graphql", web::get().to(graphql_subscription_handler))
            .route("/graphql/schema", web::get().to(schema_handler))
            .route("/health", web::get().to(health_handler));

        if playground {
            app = app.route("/playground", web::get().to(playground_handler));
        }

        app
    })
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}
