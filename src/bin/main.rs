#[cfg(not(target_arch = "wasm32"))]
mod native {
    extern crate pedal;

    use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
    use pedal::core::db::{reset_graph_data, seed_demo_data};
    use pedal::{config, FileStore, GraphEvent, GraphPolicy, SocialGraph};
    use tracing::{error, info};
    use tracing_subscriber::EnvFilter;

    type Graph = SocialGraph<FileStore>;

    mod adapter {
        use actix_web::HttpRequest;
        use spin_sdk::http::{Method, Request, Response};

        pub fn actix_to_spin_request(
            req: &HttpRequest,
            body: actix_web::web::Bytes,
        ) -> anyhow::Result<Request> {
            let method = match req.method().as_str() {
                "GET" => Method::Get,
                "POST" => Method::Post,
                "PUT" => Method::Put,
                "DELETE" => Method::Delete,
                "HEAD" => Method::Head,
                "OPTIONS" => Method::Options,
                "PATCH" => Method::Patch,
                other => anyhow::bail!("Unsupported method {}", other),
            };

            let uri = req.uri().to_string();

            let mut req_builder = Request::builder();
            let mut with_headers = req_builder.method(method).uri(&uri);
            for (name, value) in req.headers() {
                if let Ok(val_str) = value.to_str() {
                    with_headers = with_headers.header(name.as_str(), val_str);
                }
            }

            Ok(with_headers.body(body.to_vec()).build())
        }

        pub fn spin_to_actix_response(spin_resp: Response) -> actix_web::HttpResponse {
            let status = *spin_resp.status();
            let body = spin_resp.body().to_vec();

            actix_web::HttpResponse::build(
                actix_web::http::StatusCode::from_u16(status)
                    .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR),
            )
            .content_type("application/json")
            .body(body)
        }
    }

    fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    fn build_graph() -> anyhow::Result<Graph> {
        let store = FileStore::open(config::data_dir())?;
        if config::reset_on_start() {
            reset_graph_data(&store)?;
        }

        let graph = SocialGraph::new(store, GraphPolicy::from_env());
        if config::seed_demo() {
            seed_demo_data(&graph)?;
        }

        graph.events().subscribe(|event| match event {
            GraphEvent::Pair { kind, from, to, .. } => info!(%kind, %from, %to, "graph event"),
            GraphEvent::VisibilityChanged { user, is_private, .. } => {
                info!(%user, is_private, "visibility changed")
            }
        });
        Ok(graph)
    }

    pub async fn run() -> std::io::Result<()> {
        init_tracing();

        let graph = build_graph().map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        info!(data_dir = %graph.store().dir().display(), policy = ?graph.policy(), "Graph ready");
        let graph = web::Data::new(graph);

        let addr = config::bind_addr();
        info!("Server listening on http://{}", addr);

        HttpServer::new(move || {
            App::new()
                .app_data(graph.clone())
                .default_service(web::route().to(handle_all))
        })
        .bind(addr)?
        .run()
        .await
    }

    async fn handle_all(graph: web::Data<Graph>, req: HttpRequest, body: web::Bytes) -> HttpResponse {
        let spin_req = match adapter::actix_to_spin_request(&req, body) {
            Ok(r) => r,
            Err(_) => {
                return HttpResponse::BadRequest()
                    .json(serde_json::json!({"error": "Invalid request"}))
            }
        };

        match pedal::handlers::route(graph.get_ref(), spin_req) {
            Ok(spin_resp) => adapter::spin_to_actix_response(spin_resp),
            Err(e) => {
                error!(error = %e, path = req.path(), "Request failed");
                HttpResponse::InternalServerError()
                    .json(serde_json::json!({"error": "Internal server error"}))
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    native::run().await
}

#[cfg(target_arch = "wasm32")]
fn main() {}
