use actix_web::{middleware, web, App, HttpServer};
use hatchly::pipeline::Predictor;
use hatchly::server::{self, routes};
use hatchly::settings::{self, Settings};
use hatchly::store::Store;
use hatchly::torch::{load_classifier_model, load_regression_model};
use std::str::FromStr;
use std::{env, io};
use tracing::{info, warn, Level};

const USAGE: &str = "usage: ./hatchly [settings file]";

fn get_args() -> String {
    let args: Vec<String> = env::args().collect();
    match args.len() {
        1 => settings::DEFAULT_FILE.to_string(),
        2 => args[1].clone(),
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }
}

fn to_io(err: anyhow::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("{err:#}"))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let settings = Settings::load(&get_args()).map_err(to_io)?;

    let level = Level::from_str(&settings.log_level).unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    info!("hatchly - prawn egg hatch prediction");

    // Models load once, before any traffic. A missing model degrades the
    // service instead of stopping it.
    let predictor = Predictor::new(
        load_regression_model(&settings.regression_model),
        load_classifier_model(&settings.classifier_model),
    );
    if !predictor.regressor_available() {
        warn!("model will use dummy predictions");
    }
    if !predictor.classifier_available() {
        warn!("egg classifier unavailable, subject check disabled");
    }
    let predictor = web::Data::new(predictor);

    let store = Store::connect(&settings.database_url, &settings.upload_dir)
        .await
        .map_err(to_io)?;
    let store = web::Data::new(store);

    let json_limit = settings.max_payload_bytes;
    let bind_addr = settings.bind_addr();
    info!("listening on {bind_addr}");

    HttpServer::new(move || {
        App::new()
            .app_data(predictor.clone())
            .app_data(store.clone())
            .app_data(server::json_config(json_limit))
            .app_data(server::query_config())
            .wrap(middleware::Logger::default())
            .configure(routes::configure)
            .default_service(web::to(server::not_found))
    })
    .bind(bind_addr)?
    .run()
    .await
}
