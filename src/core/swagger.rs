use anyhow::Result;
use utoipa::openapi::{
    ComponentsBuilder, OpenApi,
    security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

/// Registers the `bearerAuth` scheme referenced by protected routes and mounts Swagger UI.
pub fn create_swagger_ui(mut openapi: OpenApi) -> Result<SwaggerUi> {
    let bearer = HttpBuilder::new()
        .scheme(HttpAuthScheme::Bearer)
        .bearer_format("JWT")
        .build();

    let components = openapi
        .components
        .get_or_insert_with(|| ComponentsBuilder::new().build());
    components.add_security_scheme("bearerAuth", SecurityScheme::Http(bearer));

    Ok(SwaggerUi::new("/swagger-ui").url(OPENAPI_JSON_PATH, openapi))
}
