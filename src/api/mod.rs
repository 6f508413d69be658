pub mod error;
pub mod responses;
pub mod routes;

pub use error::ApiError;

pub const ENDPOINTS: &[&str] = &[
    "GET / - Image proxy interface",
    "GET /?url=IMAGE_URL - Proxy an image",
    "GET /view?url=IMAGE_URL - Proxy an image",
    "GET /cache?url=IMAGE_URL[&width=W&height=H&quality=Q&format=F&fit=M] - Cached proxy with optional transform",
    "GET /resize?url=IMAGE_URL&width=W[&height=H&quality=Q&format=F&fit=M] - Resize an image",
    "GET /{source}/{width}/{height} - Placeholder image (see /sources)",
    "GET /sources - Available placeholder sources",
    "GET /health - Health check",
    "GET /stats - Cache statistics",
    "POST /clear-cache - Drop every cached image",
];

pub fn routes() -> Vec<rocket::Route> {
    routes![
        routes::index,
        routes::view,
        routes::cached_image,
        routes::resize_image,
        routes::placeholder,
        routes::health,
        routes::stats,
        routes::clear_get,
        routes::clear_post,
        routes::clear_cache_get,
        routes::clear_cache_post,
        routes::list_sources,
        routes::preflight,
    ]
}

pub fn catchers() -> Vec<rocket::Catcher> {
    catchers![routes::not_found, routes::default_catcher]
}
