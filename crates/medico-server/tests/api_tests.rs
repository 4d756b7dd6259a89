//! End-to-end tests driving the router in-process.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use medico_core::{Database, NewUser};
use medico_server::{app, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

fn setup(require_auth: bool) -> (Router, AppState) {
    let state = AppState::new(Database::open_in_memory().unwrap(), require_auth);
    {
        let db = state.db().unwrap();
        let mut admin = NewUser::new("admin", "s3cret");
        admin.first_name = "Lab".into();
        admin.last_name = "Admin".into();
        db.create_user(&admin).unwrap();
    }
    (app(state.clone()), state)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Token {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn login(app: &Router) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/login",
        Some(json!({"username": "admin", "password": "s3cret"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

async fn create(app: &Router, uri: &str, body: Value) -> Value {
    let (status, created) = send(app, Method::POST, uri, Some(body), None).await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    created
}

fn patient_body(name: &str) -> Value {
    json!({
        "full_name": name,
        "age": 42,
        "gender": "Female",
        "mobile_number": "9876543210",
        "email": "anita@example.com"
    })
}

#[tokio::test]
async fn test_health_is_open() {
    let (app, _) = setup(true);
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_login_returns_stable_token() {
    let (app, _) = setup(true);
    let first = login(&app).await;
    let second = login(&app).await;
    assert_eq!(first.len(), 40);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_login_failures_are_generic() {
    let (app, _) = setup(true);
    for body in [
        json!({"username": "admin", "password": "wrong"}),
        json!({"username": "ghost", "password": "s3cret"}),
        json!({"username": "admin"}),
        json!({"username": 5, "password": "s3cret"}),
        json!(["admin", "s3cret"]),
    ] {
        let (status, response) = send(&app, Method::POST, "/login", Some(body), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response, json!({"error": "Invalid Credentials"}));
    }
}

#[tokio::test]
async fn test_resources_require_token() {
    let (app, _) = setup(true);

    let (status, body) = send(&app, Method::GET, "/patients", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["detail"].is_string());

    let (status, _) = send(&app, Method::GET, "/patients", None, Some("bogus")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = login(&app).await;
    let (status, body) = send(&app, Method::GET, "/patients", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_patient_identifiers() {
    let (app, _) = setup(false);

    let first = create(&app, "/patients", patient_body("Anita Rao")).await;
    let second = create(&app, "/patients", patient_body("Vikram Rao")).await;
    assert_eq!(first["patient_id"], "PAT001");
    assert_eq!(second["patient_id"], "PAT002");

    // Identifiers are read-only
    let (status, updated) = send(
        &app,
        Method::PATCH,
        &format!("/patients/{}", first["id"]),
        Some(json!({"patient_id": "PAT999", "age": 43})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["patient_id"], "PAT001");
    assert_eq!(updated["age"], 43);
    assert_eq!(updated["full_name"], "Anita Rao");
}

#[tokio::test]
async fn test_validation_errors_are_field_keyed() {
    let (app, _) = setup(false);

    let (status, body) = send(
        &app,
        Method::POST,
        "/patients",
        Some(json!({"full_name": "No Age", "gender": "Robot", "mobile_number": "1"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["age"], json!(["This field is required."]));
    assert_eq!(body["gender"], json!(["\"Robot\" is not a valid choice."]));

    create(&app, "/test-categories", json!({"name": "Biochemistry"})).await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/test-categories",
        Some(json!({"name": "Biochemistry"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"name": ["test category with this name already exists."]})
    );
}

#[tokio::test]
async fn test_malformed_json() {
    let (app, _) = setup(false);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/patients")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_unknown_ids_are_404() {
    let (app, _) = setup(false);
    for (method, body) in [
        (Method::GET, None),
        (Method::PUT, Some(patient_body("Nobody"))),
        (Method::PATCH, Some(json!({"age": 1}))),
        (Method::DELETE, None),
    ] {
        let (status, response) = send(&app, method, "/patients/999", body, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(response, json!({"detail": "Not found."}));
    }
}

#[tokio::test]
async fn test_report_composite_shape() {
    let (app, _) = setup(false);

    let patient = create(&app, "/patients", patient_body("Anita Rao")).await;
    let category = create(&app, "/test-categories", json!({"name": "Biochemistry"})).await;
    let lab_test = create(
        &app,
        "/lab-tests",
        json!({"name": "Lipid Profile", "category": category["id"], "price": "450"}),
    )
    .await;
    assert_eq!(lab_test["category_name"], "Biochemistry");
    assert_eq!(lab_test["price"], "450.00");

    let report = create(
        &app,
        "/reports",
        json!({"patient": patient["id"], "lab_test": lab_test["id"]}),
    )
    .await;
    assert_eq!(report["patient_name"], "Anita Rao");
    assert_eq!(report["patient_id"], "PAT001");
    assert_eq!(report["test_name"], "Lipid Profile");
    assert_eq!(report["status"], "Pending");
    assert_eq!(report["doctor_remarks"], "");

    let results = report["test_results"].as_array().unwrap();
    assert_eq!(results.len(), 6);
    assert_eq!(
        results[0],
        json!({
            "id": results[0]["id"],
            "parameter_name": "Total Cholesterol",
            "unit": "mg/dL",
            "normal_range": "< 200",
            "value": ""
        })
    );

    // Fill in a value, then complete the report
    let (status, result) = send(
        &app,
        Method::PATCH,
        &format!("/test-results/{}", results[0]["id"]),
        Some(json!({"value": "185"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["value"], "185");
    assert_eq!(result["parameter_name"], "Total Cholesterol");

    let (status, completed) = send(
        &app,
        Method::PATCH,
        &format!("/reports/{}", report["id"]),
        Some(json!({"status": "Completed", "doctor_remarks": "Borderline LDL"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "Completed");
    assert_eq!(completed["test_results"].as_array().unwrap().len(), 6);
    assert_eq!(completed["test_results"][0]["value"], "185");
}

#[tokio::test]
async fn test_put_keeps_omitted_optional_fields() {
    let (app, _) = setup(false);

    let patient = create(&app, "/patients", patient_body("Anita Rao")).await;
    let category = create(&app, "/test-categories", json!({"name": "Biochemistry"})).await;
    let lab_test = create(
        &app,
        "/lab-tests",
        json!({"name": "Lipid Profile", "category": category["id"], "price": "450"}),
    )
    .await;
    let report = create(
        &app,
        "/reports",
        json!({
            "patient": patient["id"],
            "lab_test": lab_test["id"],
            "status": "Completed"
        }),
    )
    .await;
    assert_eq!(report["status"], "Completed");

    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/reports/{}", report["id"]),
        Some(json!({
            "patient": patient["id"],
            "lab_test": lab_test["id"],
            "doctor_remarks": "ok"
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "Completed");
    assert_eq!(updated["doctor_remarks"], "ok");

    // A recorded value survives a PUT that leaves it out
    let result_id = report["test_results"][0]["id"].clone();
    let (_, parameters) = send(&app, Method::GET, "/test-parameters", None, None).await;
    let parameter = parameters[0]["id"].clone();
    send(
        &app,
        Method::PATCH,
        &format!("/test-results/{}", result_id),
        Some(json!({"value": "185"})),
        None,
    )
    .await;
    let (status, result) = send(
        &app,
        Method::PUT,
        &format!("/test-results/{}", result_id),
        Some(json!({"report": report["id"], "parameter": parameter})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["value"], "185");

    // Omitted email is kept; an explicit null clears it
    let uri = format!("/patients/{}", patient["id"]);
    let mut body = patient_body("Anita R.");
    body.as_object_mut().unwrap().remove("email");
    let (_, kept) = send(&app, Method::PUT, &uri, Some(body.clone()), None).await;
    assert_eq!(kept["email"], "anita@example.com");
    assert_eq!(kept["full_name"], "Anita R.");

    body["email"] = Value::Null;
    let (_, cleared) = send(&app, Method::PUT, &uri, Some(body), None).await;
    assert_eq!(cleared["email"], Value::Null);

    // Required fields are still required
    let (status, errors) = send(
        &app,
        Method::PUT,
        &format!("/reports/{}", report["id"]),
        Some(json!({"doctor_remarks": "ok"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(errors["patient"].is_array());
}

#[tokio::test]
async fn test_lab_test_delete_cascades() {
    let (app, _) = setup(false);
    let category = create(&app, "/test-categories", json!({"name": "Biochemistry"})).await;
    let lab_test = create(
        &app,
        "/lab-tests",
        json!({"name": "Lipid Profile", "category": category["id"], "price": 450}),
    )
    .await;

    let (_, params) = send(&app, Method::GET, "/test-parameters", None, None).await;
    assert_eq!(params.as_array().unwrap().len(), 6);

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/lab-tests/{}", lab_test["id"]),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (_, params) = send(&app, Method::GET, "/test-parameters", None, None).await;
    assert_eq!(params, json!([]));
}

#[tokio::test]
async fn test_staff_records() {
    let (app, state) = setup(false);
    let user_id = state
        .db()
        .unwrap()
        .get_user_by_username("admin")
        .unwrap()
        .unwrap()
        .id;

    let employee = create(
        &app,
        "/employees",
        json!({
            "user_id": user_id,
            "employee_id": "EMP001",
            "department": "Pathology",
            "role": "Technician",
            "mobile_number": "9123456780"
        }),
    )
    .await;
    assert_eq!(employee["user"]["username"], "admin");
    assert_eq!(employee["is_active"], true);

    let attendance = create(
        &app,
        "/attendance",
        json!({
            "employee": employee["id"],
            "date": "2024-05-06",
            "check_in": "09:00:00",
            "status": "On Leave"
        }),
    )
    .await;
    assert_eq!(attendance["employee_name"], "Lab Admin");
    assert_eq!(attendance["status"], "On Leave");
    assert_eq!(attendance["check_out"], Value::Null);

    let log = create(
        &app,
        "/activity-logs",
        json!({"employee": employee["id"], "message": "Calibrated analyzer"}),
    )
    .await;
    assert_eq!(log["employee_name"], "Lab Admin");

    let prefs = create(
        &app,
        "/notification-preferences",
        json!({"user_id": user_id, "sms_alerts": true}),
    )
    .await;
    assert_eq!(prefs["user"]["id"], user_id);
    assert_eq!(prefs["email_notifications"], true);
    assert_eq!(prefs["sms_alerts"], true);
}
