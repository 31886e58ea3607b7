//! HTTP handlers. Predictions run on the blocking pool; everything else is
//! thin glue over the store.

use super::protocol::*;
use super::{UserId, WebError};
use crate::pipeline::Predictor;
use crate::store::Store;
use actix_web::{get, post, web, HttpResponse, Responder};
use tracing::{info, warn};

type Result<T> = std::result::Result<T, WebError>;

/// Register every route on an app
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(predict)
        .service(save_prediction)
        .service(get_predictions)
        .service(save_prawn)
        .service(get_prawns)
        .service(delete_prawn);
}

/// Estimate days until hatch from a photo of an egg cluster
#[post("/api/predict")]
pub async fn predict(
    _user: UserId,
    req: web::Json<PredictRequest>,
    predictor: web::Data<Predictor>,
) -> Result<impl Responder> {
    let image = req.into_inner().image.unwrap_or_default();

    // inference is CPU bound; keep it off the reactor
    let outcome = web::block(move || predictor.predict(&image)).await?;
    let (status, body) = PredictResponse::from_outcome(outcome);

    Ok(HttpResponse::build(status).json(body))
}

/// Keep a prediction the user accepted
#[post("/api/save_prediction")]
pub async fn save_prediction(
    user: UserId,
    req: web::Json<SavePredictionRequest>,
    store: web::Data<Store>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    let saved = store
        .save_prediction(user.0, &req.prediction, req.image_path.as_deref())
        .await?;

    let Some(id) = saved else {
        warn!(
            "user {} tried to save a prediction on unknown prawn {}",
            user.0, req.prediction.prawn_id
        );
        return Ok(HttpResponse::NotFound().json(Ack {
            success: false,
            message: "Prawn not found".into(),
            id: None,
        }));
    };

    info!("user {} saved prediction {id}", user.0);
    Ok(HttpResponse::Ok().json(Ack {
        success: true,
        message: "Prediction saved".into(),
        id: Some(id),
    }))
}

#[get("/api/get_predictions")]
pub async fn get_predictions(
    user: UserId,
    query: web::Query<PredictionsQuery>,
    store: web::Data<Store>,
) -> Result<impl Responder> {
    let predictions = store.list_predictions(user.0, query.prawn_id).await?;
    Ok(web::Json(PredictionsResponse {
        success: true,
        predictions,
    }))
}

#[post("/api/save_prawn")]
pub async fn save_prawn(
    user: UserId,
    req: web::Json<SavePrawnRequest>,
    store: web::Data<Store>,
) -> Result<HttpResponse> {
    if req.name.trim().is_empty() || req.date_of_birth.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(Ack {
            success: false,
            message: "All fields required".into(),
            id: None,
        }));
    }

    let prawn = store
        .create_prawn(user.0, req.name.trim(), req.date_of_birth.trim())
        .await?;
    Ok(HttpResponse::Ok().json(PrawnResponse {
        success: true,
        prawn,
    }))
}

#[get("/api/get_prawns")]
pub async fn get_prawns(user: UserId, store: web::Data<Store>) -> Result<impl Responder> {
    let prawns = store.list_prawns(user.0).await?;
    Ok(web::Json(PrawnsResponse {
        success: true,
        prawns,
    }))
}

/// Delete a prawn along with all of its saved predictions
#[post("/api/delete_prawn")]
pub async fn delete_prawn(
    user: UserId,
    req: web::Json<DeletePrawnRequest>,
    store: web::Data<Store>,
) -> Result<HttpResponse> {
    if !store.delete_prawn(user.0, req.prawn_id).await? {
        warn!("user {} tried to delete unknown prawn {}", user.0, req.prawn_id);
        return Ok(HttpResponse::NotFound().json(Ack {
            success: false,
            message: "Prawn not found".into(),
            id: None,
        }));
    }

    Ok(HttpResponse::Ok().json(Ack {
        success: true,
        message: "Prawn deleted successfully".into(),
        id: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RejectReason;
    use crate::preprocess::InputTensor;
    use crate::server::USER_HEADER;
    use crate::torch::{ModelSlot, ScalarModel};
    use crate::util::test::{self, memory_store};
    use actix_web::http::StatusCode;
    use actix_web::{test as atest, App};
    use serde_json::{json, Value};

    struct Fixed(f32);

    impl ScalarModel for Fixed {
        fn predict(&self, _input: &InputTensor) -> anyhow::Result<f32> {
            Ok(self.0)
        }
    }

    fn predictor(days: Option<f32>) -> web::Data<Predictor> {
        let regressor = match days {
            Some(days) => ModelSlot::Available(Box::new(Fixed(days)) as Box<dyn ScalarModel>),
            None => ModelSlot::Unavailable,
        };
        web::Data::new(Predictor::new(regressor, ModelSlot::Unavailable))
    }

    macro_rules! app {
        ($predictor:expr, $store:expr) => {
            atest::init_service(
                App::new()
                    .app_data($predictor)
                    .app_data(web::Data::new($store))
                    .app_data(crate::server::json_config(1024 * 1024))
                    .app_data(crate::server::query_config())
                    .configure(configure)
                    .default_service(web::to(crate::server::not_found)),
            )
            .await
        };
    }

    fn post(uri: &str, body: Value) -> atest::TestRequest {
        atest::TestRequest::post()
            .uri(uri)
            .insert_header((USER_HEADER, "1"))
            .set_json(body)
    }

    #[actix_web::test]
    async fn test_predict_success() {
        let app = app!(predictor(Some(14.0)), memory_store("r-success").await);
        let image = test::to_data_uri(&test::gradient_image());

        let resp = atest::call_service(&app, post("/api/predict", json!({ "image": image })).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: PredictResponse = atest::read_body_json(resp).await;
        assert!(body.success);
        assert_eq!(body.days_until_hatch, Some(14));
        assert_eq!(body.confidence, Some(99.));
        assert_eq!(body.current_day, Some(7));
        assert_eq!(body.raw_prediction, Some(14.));
        assert_eq!(body.error, None);
    }

    #[actix_web::test]
    async fn test_predict_rejection() {
        let app = app!(predictor(Some(30.0)), memory_store("r-reject").await);
        let image = test::to_data_uri(&test::gradient_image());

        let resp = atest::call_service(&app, post("/api/predict", json!({ "image": image })).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: PredictResponse = atest::read_body_json(resp).await;
        assert!(!body.success);
        assert_eq!(body.reason, Some(RejectReason::UnrealisticPrediction));
        assert_eq!(body.no_prawn_detected, Some(true));
        assert_eq!(body.debug_info.as_deref(), Some("Predicted: 30.00 days"));
        assert_eq!(
            body.error.as_deref(),
            Some(RejectReason::UnrealisticPrediction.message())
        );
    }

    #[actix_web::test]
    async fn test_predict_blank_image() {
        let app = app!(predictor(Some(10.0)), memory_store("r-blank").await);
        let image = test::to_b64(&test::solid_image(128));

        let resp = atest::call_service(&app, post("/api/predict", json!({ "image": image })).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: PredictResponse = atest::read_body_json(resp).await;
        assert_eq!(body.reason, Some(RejectReason::Uniform));
    }

    #[actix_web::test]
    async fn test_predict_missing_image() {
        let app = app!(predictor(Some(10.0)), memory_store("r-missing").await);

        let resp = atest::call_service(&app, post("/api/predict", json!({})).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: PredictResponse = atest::read_body_json(resp).await;
        assert_eq!(body.error.as_deref(), Some("No image data provided"));
        assert_eq!(body.no_prawn_detected, None);
    }

    #[actix_web::test]
    async fn test_predict_garbage_is_server_error() {
        let app = app!(predictor(Some(10.0)), memory_store("r-garbage").await);

        let resp = atest::call_service(&app, post("/api/predict", json!({ "image": "%%%" })).to_request()).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: PredictResponse = atest::read_body_json(resp).await;
        assert!(body.error.unwrap().starts_with("Prediction failed: "));
    }

    #[actix_web::test]
    async fn test_predict_placeholder_without_model() {
        let app = app!(predictor(None), memory_store("r-dummy").await);

        let resp = atest::call_service(&app, post("/api/predict", json!({ "image": "%%%" })).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: PredictResponse = atest::read_body_json(resp).await;
        assert!(body.success);
        assert_eq!(body.days_until_hatch, Some(7));
        assert_eq!(body.confidence, Some(85.5));
        assert_eq!(body.current_day, Some(14));
        assert!(body.note.is_some());
        assert_eq!(body.raw_prediction, None);
    }

    #[actix_web::test]
    async fn test_login_required() {
        let app = app!(predictor(Some(10.0)), memory_store("r-login").await);

        let req = atest::TestRequest::get().uri("/api/get_prawns").to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = atest::read_body_json(resp).await;
        assert_eq!(body, json!({ "success": false, "message": "Login required" }));
    }

    #[actix_web::test]
    async fn test_prawn_and_prediction_flow() {
        let app = app!(predictor(Some(10.0)), memory_store("r-flow").await);

        let resp = atest::call_service(
            &app,
            post("/api/save_prawn", json!({ "name": "Bubba", "date_of_birth": "2026-01-02" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = atest::read_body_json(resp).await;
        let prawn_id = body["prawn"]["id"].as_i64().unwrap();
        assert_eq!(body["prawn"]["name"], "Bubba");

        let image = test::to_data_uri(&test::gradient_image());
        let resp = atest::call_service(
            &app,
            post(
                "/api/save_prediction",
                json!({
                    "prawn_id": prawn_id,
                    "predicted_days": 10,
                    "current_day": 11,
                    "confidence": 99.0,
                    "image_path": image,
                }),
            )
            .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = atest::TestRequest::get()
            .uri(&format!("/api/get_predictions?prawn_id={prawn_id}"))
            .insert_header((USER_HEADER, "1"))
            .to_request();
        let body: Value = atest::call_and_read_body_json(&app, req).await;
        let predictions = body["predictions"].as_array().unwrap();
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0]["predicted_days"], 10);
        assert!(predictions[0]["image_path"]
            .as_str()
            .unwrap()
            .starts_with("uploads/"));

        let req = atest::TestRequest::get()
            .uri("/api/get_prawns")
            .insert_header((USER_HEADER, "1"))
            .to_request();
        let body: Value = atest::call_and_read_body_json(&app, req).await;
        assert_eq!(body["prawns"].as_array().unwrap().len(), 1);

        let resp = atest::call_service(
            &app,
            post("/api/delete_prawn", json!({ "prawn_id": prawn_id })).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = atest::call_service(
            &app,
            post("/api/delete_prawn", json!({ "prawn_id": prawn_id })).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_save_prawn_requires_fields() {
        let app = app!(predictor(Some(10.0)), memory_store("r-fields").await);

        let resp = atest::call_service(
            &app,
            post("/api/save_prawn", json!({ "name": " ", "date_of_birth": "2026-01-02" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_save_prediction_on_foreign_prawn() {
        let store = memory_store("r-foreign").await;
        let theirs = store.create_prawn(2, "Dan", "2026-03-04").await.unwrap();
        let app = app!(predictor(Some(10.0)), store);

        let resp = atest::call_service(
            &app,
            post(
                "/api/save_prediction",
                json!({
                    "prawn_id": theirs.id,
                    "predicted_days": 10,
                    "current_day": 11,
                    "confidence": 99.0,
                }),
            )
            .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = atest::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Prawn not found");
    }

    #[actix_web::test]
    async fn test_malformed_body_is_json() {
        let app = app!(predictor(Some(10.0)), memory_store("r-malformed").await);

        let req = atest::TestRequest::post()
            .uri("/api/predict")
            .insert_header((USER_HEADER, "1"))
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = atest::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));

        // image must be a string
        let resp = atest::call_service(&app, post("/api/predict", json!({ "image": 42 })).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = atest::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn test_oversized_body_is_json() {
        let app = app!(predictor(Some(10.0)), memory_store("r-oversized").await);

        let image = "A".repeat(2 * 1024 * 1024);
        let resp = atest::call_service(&app, post("/api/predict", json!({ "image": image })).to_request()).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body: Value = atest::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn test_unknown_route_is_json_404() {
        let app = app!(predictor(Some(10.0)), memory_store("r-404").await);

        let req = atest::TestRequest::get().uri("/api/nope").to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = atest::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "Not found" }));
    }
}
