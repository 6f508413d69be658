use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{Request, Response};

/// Permissive CORS headers on every response, errors included.
pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "CORS headers",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _req: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, OPTIONS, HEAD",
        ));
        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Accept, Origin, Referer, User-Agent",
        ));
        response.set_header(Header::new(
            "Access-Control-Expose-Headers",
            "X-Cache, X-Image-Width, X-Image-Height, ETag",
        ));
        response.set_header(Header::new("Access-Control-Max-Age", "86400"));
    }
}
