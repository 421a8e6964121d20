//! 模拟文件服务，演示媒体访问审计中间件

use clap::Parser;
use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use media_audit_filter::*;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "媒体访问审计演示服务")]
struct Args {
    /// 输出请求体和响应体摘要
    #[arg(long)]
    debug: bool,

    /// JSON 配置文件
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: SocketAddr,
}

/// 业务 Handler
async fn handle_request(req: Request<Body>) -> Result<Response<Body>, BoxError> {
    match req.uri().path() {
        "/api/fs/list" => {
            let _query = hyper::body::to_bytes(req.into_body()).await?;
            Ok(json(
                r#"{"code":200,"message":"success","content":[
                    {"name":"Trip.MP4","path":"/movies","is_dir":false},
                    {"name":"poster.jpg","path":"/movies","is_dir":false},
                    {"name":"subs.srt","path":"/movies","is_dir":false},
                    {"name":"extras.mkv","path":"/movies","is_dir":true}
                ]}"#,
            ))
        }
        "/api/fs/get" => {
            let _query = hyper::body::to_bytes(req.into_body()).await?;
            Ok(json(
                r#"{"code":200,"message":"success","data":{"name":"Trip.MP4","path":"/movies/Trip.MP4","is_dir":false}}"#,
            ))
        }
        "/api/me" => Ok(json(r#"{"code":200,"data":{"username":"guest"}}"#)),
        "/error" => Err("Intentional error".into()),
        path if path.starts_with("/d/") => Ok(Response::new(Body::from(vec![0u8; 256 * 1024]))),
        _ => {
            let mut response = Response::new(Body::from("Not Found"));
            *response.status_mut() = StatusCode::NOT_FOUND;
            Ok(response)
        }
    }
}

fn json(body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    response
}

fn load_config(args: &Args) -> Result<MediaAuditConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => MediaAuditConfig::load_from_file(path)?,
        None => MediaAuditConfig::default(),
    };
    if args.debug {
        config.mode = LogMode::Debug;
    }
    Ok(config)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let audit = match load_config(&args).and_then(|config| MediaAudit::new(&config)) {
        Ok(audit) => audit,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let make_svc = make_service_fn(move |conn: &AddrStream| {
        let audit = audit.clone();
        let remote = conn.remote_addr();

        async move {
            Ok::<_, Infallible>(service_fn(move |mut req: Request<Body>| {
                let audit = audit.clone();
                req.extensions_mut().insert(RemoteAddr(remote));

                async move {
                    match with_media_audit(req, handle_request, &audit).await {
                        Ok(response) => Ok::<_, Infallible>(response.map(to_hyper_body)),
                        Err(e) => {
                            eprintln!("Handler error: {}", e);
                            let mut response = Response::new(Body::from(format!("Error: {}", e)));
                            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                            Ok(response)
                        }
                    }
                }
            }))
        }
    });

    let server = Server::bind(&args.addr).serve(make_svc);

    println!("Listening on http://{}", args.addr);
    println!("\nTry these endpoints:");
    println!("  curl -X POST -d '{{\"path\":\"/movies\"}}' http://{}/api/fs/list", args.addr);
    println!("  curl -X POST -d '{{\"path\":\"/movies/Trip.MP4\"}}' http://{}/api/fs/get", args.addr);
    println!("  curl -o /dev/null http://{}/d/movies/Trip.MP4", args.addr);
    println!("  curl http://{}/api/me", args.addr);

    if let Err(e) = server.await {
        eprintln!("Server error: {}", e);
    }
}
