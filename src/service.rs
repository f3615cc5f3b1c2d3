use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::atomic::AtomicUsize;

use bytes::BytesMut;
use bytes::BufMut;
use actix_rt::System;
use actix_web::middleware;
use actix_web::web;
use actix_web::HttpServer;
use actix_web::App;
use actix_web::HttpResponse;
use actix_web::Error as ActixError;
use actix_web::http::header;
use actix_web::http::StatusCode;
use actix_multipart::Field;
use actix_multipart::Multipart;
use futures::TryStreamExt;

use super::application::Application;
use super::application::FrameOptions;
use super::compose::anchor::EyeAnchor;
use super::compose::anchor::Point;
use super::error::FrameError;


const MAX_UPLOAD_SIZE: usize = 16 * 1024 * 1024;
const MAX_TEXT_FIELD_SIZE: usize = 4 * 1024;

#[derive(Clone)]
pub struct FrameServerOptions {
    host: String,
    workers: usize,
    max_tasks: usize,
    max_upload: usize,
}

impl Default for FrameServerOptions {

    fn default() -> Self {
        FrameServerOptions {
            host: String::from("0.0.0.0:8080"),
            workers: num_cpus::get(),
            max_tasks: 128,
            max_upload: MAX_UPLOAD_SIZE,
        }
    }
}

impl FrameServerOptions {

    pub fn set_host(&mut self, host: &str) {
        self.host = String::from(host);
    }

    pub fn set_workers(&mut self, num: usize) {
        if num > 0 {
            self.workers = num;
        }
    }

    pub fn set_max_tasks(&mut self, num: usize) {
        self.max_tasks = num;
    }

    pub fn set_max_upload(&mut self, bytes: usize) {
        self.max_upload = bytes;
    }
}


pub struct FrameService {
    options: FrameServerOptions,
    app: Arc<Application>,
    working: AtomicUsize,
}

impl FrameService {

    pub fn new(options: FrameServerOptions, frame_options: FrameOptions) -> Self {
        FrameService {
            app: Arc::new(Application::new(frame_options)),
            working: AtomicUsize::new(0),
            options
        }
    }

    pub fn start(self) -> std::io::Result<()> {
        System::new().block_on(run_service(self))
    }

}


/// Holds one slot of the in-flight counter until dropped.
struct Working<'a>(&'a AtomicUsize);

impl<'a> Working<'a> {

    fn enter(counter: &'a AtomicUsize, max: usize) -> Option<Self> {
        let slot = Working(counter);
        if counter.fetch_add(1, Ordering::SeqCst) >= max {
            None
        } else {
            Some(slot)
        }
    }
}

impl<'a> Drop for Working<'a> {

    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}


pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/apply_frame")
            .route(web::post().to(apply_frame))
    );
}

async fn run_service(service: FrameService) -> std::io::Result<()> {

    const ACTIX_LOG_FORMAT: &'static str = "%a \"%r\" %s \"%{User-Agent}i\" %D";

    let options = service.options.clone();
    let service = web::Data::new(service);
    log::info!("listening on {} with {} workers", options.host, options.workers);
    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::new(ACTIX_LOG_FORMAT))
            .app_data(service.clone())
            .configure(configure)
    })
    .bind(options.host.as_str())?
    .workers(options.workers)
    .run()
    .await
}


fn error_status(e: &FrameError) -> StatusCode {
    match e {
        FrameError::Decode(_) => StatusCode::BAD_REQUEST,
        FrameError::FrameLoad { .. } => StatusCode::NOT_FOUND,
        FrameError::FrameOutsideRoot { .. } => StatusCode::FORBIDDEN,
        FrameError::MissingAlpha { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        FrameError::OutOfBounds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        FrameError::Argument(_) => StatusCode::BAD_REQUEST,
        FrameError::Encode(_) | FrameError::Io(_) | FrameError::Config(_) | FrameError::MissingFeature(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `None` once the field grows past `limit`.
async fn read_field(field: &mut Field, limit: usize) -> Result<Option<BytesMut>, ActixError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.try_next().await? {
        if chunk.len() + buf.len() > limit {
            return Ok(None);
        }
        buf.put(chunk);
    }
    Ok(Some(buf))
}

fn parse_point(data: &[u8]) -> Result<Point, String> {
    std::str::from_utf8(data)
        .map_err(|_| String::from("eye point is not utf-8"))?
        .parse()
}

async fn apply_frame(s: web::Data<FrameService>, mut payload: Multipart) -> Result<HttpResponse, ActixError> {

    let _slot = match Working::enter(&s.working, s.options.max_tasks) {
        Some(slot) => slot,
        None => return Ok(HttpResponse::TooManyRequests().finish()),
    };

    let mut upload = None;
    let mut frame = None;
    let mut left_eye = None;
    let mut right_eye = None;
    while let Some(mut field) = payload.try_next().await? {
        let name = field.content_disposition().get_name().unwrap_or_default().to_owned();
        let limit = match name.as_str() {
            "image" => s.options.max_upload,
            "frame" | "left_eye" | "right_eye" => MAX_TEXT_FIELD_SIZE,
            _ => {
                while let Some(_) = field.try_next().await? { }
                continue;
            }
        };
        let data = match read_field(&mut field, limit).await? {
            Some(data) => data,
            None => return Ok(HttpResponse::PayloadTooLarge().body(format!("field `{}` exceeds {} bytes", name, limit))),
        };
        match name.as_str() {
            "image" => upload = Some(data),
            "frame" => frame = Some(data),
            "left_eye" => left_eye = Some(data),
            _ => right_eye = Some(data),
        }
    }

    let upload = match upload {
        Some(v) => v,
        None => return Ok(HttpResponse::BadRequest().body("missing field `image`")),
    };
    let frame = match frame.map(|v| String::from_utf8(v.to_vec())) {
        Some(Ok(v)) => v,
        Some(Err(_)) => return Ok(HttpResponse::BadRequest().body("field `frame` is not utf-8")),
        None => return Ok(HttpResponse::BadRequest().body("missing field `frame`")),
    };
    let anchor = match (left_eye, right_eye) {
        (None, None) => None,
        (Some(left), Some(right)) => match (parse_point(&left), parse_point(&right)) {
            (Ok(left), Ok(right)) => Some(EyeAnchor::new(left, right)),
            (Err(e), _) | (_, Err(e)) => return Ok(HttpResponse::BadRequest().body(e)),
        },
        _ => return Ok(HttpResponse::BadRequest().body("`left_eye` and `right_eye` must be sent together")),
    };

    let app = s.app.clone();
    let r = web::block(move || app.apply_frame_at(&upload, frame.as_str(), anchor.as_ref())).await?;

    match r {
        Ok(buf) => {
            Ok(
                HttpResponse::Ok()
                    .insert_header(header::ContentType::jpeg())
                    .body(buf)
            )
        }
        Err(e) => {
            log::warn!("apply_frame failed: {}", e);
            Ok(
                HttpResponse::build(error_status(&e))
                    .body(e.to_string())
            )
        }
    }
}
