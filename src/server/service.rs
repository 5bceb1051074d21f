use super::request::ParsedRequest;
use super::response::{write_api_response, Response};
use crate::dispatcher::{ApiRequest, ApiResponse, Dispatcher, API_PREFIX};
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::static_files::StaticFiles;
use http::Method;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Anything that can answer one parsed request on a connection.
pub trait HttpService: Send + Sync + 'static {
    fn call(&self, req: ParsedRequest, res: Response<'_>) -> io::Result<()>;
}

/// Route table of the forum server.
///
/// | path | target |
/// |------|--------|
/// | `/api/<name>` | dispatcher (GET, POST) |
/// | `/data/...` | data files, gzip |
/// | `/uploadavatar`, `/captcha/...` | not mounted, 404 |
/// | anything else | frontend bundle, `index.html` fallback |
#[derive(Clone)]
pub struct AppService {
    pub dispatcher: Arc<Dispatcher>,
    pub data_files: Arc<StaticFiles>,
    pub web_files: Option<Arc<StaticFiles>>,
}

impl AppService {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        data_files: StaticFiles,
        web_files: Option<StaticFiles>,
    ) -> Self {
        Self {
            dispatcher,
            data_files: Arc::new(data_files),
            web_files: web_files.map(Arc::new),
        }
    }

    fn call_api(&self, req: ParsedRequest, res: Response<'_>) -> io::Result<()> {
        let request_id = RequestId::from_header_or_new(req.get_header(REQUEST_ID_HEADER));

        if !self.dispatcher.handles(&req.path) {
            debug!(request_id = %request_id, path = %req.path, "Unknown API path");
            let mut resp = ApiResponse::error(404);
            resp.set_header(REQUEST_ID_HEADER, request_id.to_string());
            return write_api_response(res, resp);
        }
        if req.method != Method::GET && req.method != Method::POST {
            let mut resp = ApiResponse::error(405);
            resp.set_header("allow", "GET, POST");
            resp.set_header(REQUEST_ID_HEADER, request_id.to_string());
            return write_api_response(res, resp);
        }

        let api_req = ApiRequest {
            request_id,
            method: req.method,
            path: req.path,
            headers: req.headers,
            cookies: req.cookies,
            body: req.body,
        };
        // handles() was checked above; the registry is immutable while serving
        let resp = self
            .dispatcher
            .dispatch(&api_req)
            .unwrap_or_else(|| ApiResponse::error(404));
        write_api_response(res, resp)
    }

    fn call_files(
        &self,
        files: &StaticFiles,
        req: &ParsedRequest,
        mut res: Response<'_>,
    ) -> io::Result<()> {
        if req.method != Method::GET {
            res.status_code(405).header("allow", "GET");
            return res.send(b"");
        }
        let start = Instant::now();
        let status = files.serve(&req.path, res)?;
        info!(
            path = %req.path,
            status = status,
            latency_ms = crate::dispatcher::latency_ms(start.elapsed()),
            "File request completed"
        );
        Ok(())
    }
}

fn is_unmounted(path: &str) -> bool {
    path == "/uploadavatar" || path == "/captcha" || path.starts_with("/captcha/")
}

impl HttpService for AppService {
    fn call(&self, req: ParsedRequest, res: Response<'_>) -> io::Result<()> {
        if req.path.starts_with(API_PREFIX) {
            return self.call_api(req, res);
        }
        if is_unmounted(&req.path) {
            debug!(path = %req.path, "Collaborator route not mounted");
            return write_api_response(res, ApiResponse::error(404));
        }
        if req.path.starts_with("/data/") {
            return self.call_files(&self.data_files, &req, res);
        }
        match &self.web_files {
            Some(web) => self.call_files(web, &req, res),
            None => write_api_response(res, ApiResponse::error(404)),
        }
    }
}
