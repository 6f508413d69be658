#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbImage};
use imgcache::cache::ManualClock;
use imgcache::config::AppConfig;
use imgcache::images::{FetchedImage, Fetcher, ImageProxyError};
use parking_lot::Mutex;
use reqwest::Url;
use rocket::config::LogLevel;
use rocket::figment::Figment;
use rocket::local::asynchronous::Client;

#[derive(Clone)]
enum Stub {
    Body(Vec<u8>, Option<String>),
    Status(u16, &'static str),
}

/// In-memory origin. Unknown URLs answer 404.
#[derive(Default)]
pub struct StubFetcher {
    responses: Mutex<HashMap<String, Stub>>,
    calls: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, url: &str, data: Vec<u8>, content_type: &str) {
        self.responses
            .lock()
            .insert(url.to_string(), Stub::Body(data, Some(content_type.to_string())));
    }

    pub fn serve_untyped(&self, url: &str, data: Vec<u8>) {
        self.responses.lock().insert(url.to_string(), Stub::Body(data, None));
    }

    pub fn fail(&self, url: &str, status: u16, reason: &'static str) {
        self.responses
            .lock()
            .insert(url.to_string(), Stub::Status(status, reason));
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|u| u.as_str() == url).count()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedImage, ImageProxyError> {
        self.calls.lock().push(url.to_string());
        let stub = self.responses.lock().get(url.as_str()).cloned();

        match stub {
            Some(Stub::Body(data, content_type)) => Ok(FetchedImage { data, content_type }),
            Some(Stub::Status(status, reason)) => {
                Err(ImageProxyError::UpstreamStatus(status, reason.to_string()))
            }
            None => Err(ImageProxyError::UpstreamStatus(404, "Not Found".to_string())),
        }
    }
}

pub struct TestApp {
    pub client: Client,
    pub fetcher: Arc<StubFetcher>,
    pub clock: Arc<ManualClock>,
}

pub async fn app() -> TestApp {
    app_with(AppConfig::default()).await
}

pub async fn app_with(config: AppConfig) -> TestApp {
    let fetcher = StubFetcher::new();
    let clock = Arc::new(ManualClock::default());
    let figment = Figment::from(rocket::Config {
        log_level: LogLevel::Off,
        ..rocket::Config::debug_default()
    });

    let rocket = imgcache::assemble(figment, config, fetcher.clone(), clock.clone());
    let client = Client::tracked(rocket).await.expect("valid rocket instance");

    TestApp {
        client,
        fetcher,
        clock,
    }
}

pub fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30])));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), format)
        .expect("encode fixture");
    out
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}
