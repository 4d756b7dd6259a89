//! CRUD collections.
//!
//! Every collection exposes the same six operations; a [`Resource`] impl
//! binds them to the matching `Database` methods and the generic handlers
//! below do the HTTP part.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use medico_core::models::*;
use medico_core::{Database, DbResult};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::extract::JsonBody;
use crate::AppState;

pub trait Resource: 'static {
    /// Collection path, e.g. `/patients`
    const PATH: &'static str;
    /// Optional fields a PUT leaves untouched when it omits them.
    const RETAINED: &'static [&'static str];

    /// Read shape
    type Output: Serialize + Send;
    /// Write shape, all fields optional
    type Input: Serialize + DeserializeOwned + Send + 'static;

    fn list(db: &Database) -> DbResult<Vec<Self::Output>>;
    fn get(db: &Database, id: i64) -> DbResult<Option<Self::Output>>;
    /// Current values in write shape, used as the base of a partial update.
    fn current_input(db: &Database, id: i64) -> DbResult<Option<Self::Input>>;
    fn create(db: &Database, input: &Self::Input) -> DbResult<Self::Output>;
    fn update(db: &Database, id: i64, input: &Self::Input) -> DbResult<Option<Self::Output>>;
    fn delete(db: &Database, id: i64) -> DbResult<bool>;
}

macro_rules! resource {
    (
        $name:ident at $path:literal {
            retained: [$($retained:literal),* $(,)?],
            output: $output:ty,
            input: $input:ty,
            list: $list:ident,
            get: $get:ident,
            current: $current:ident,
            create: $create:ident,
            update: $update:ident,
            delete: $delete:ident $(,)?
        }
    ) => {
        pub struct $name;

        impl Resource for $name {
            const PATH: &'static str = $path;
            const RETAINED: &'static [&'static str] = &[$($retained),*];
            type Output = $output;
            type Input = $input;

            fn list(db: &Database) -> DbResult<Vec<Self::Output>> {
                db.$list()
            }

            fn get(db: &Database, id: i64) -> DbResult<Option<Self::Output>> {
                db.$get(id)
            }

            fn current_input(db: &Database, id: i64) -> DbResult<Option<Self::Input>> {
                Ok(db.$current(id)?.map(|row| <$input>::from(&row)))
            }

            fn create(db: &Database, input: &Self::Input) -> DbResult<Self::Output> {
                db.$create(input)
            }

            fn update(
                db: &Database,
                id: i64,
                input: &Self::Input,
            ) -> DbResult<Option<Self::Output>> {
                db.$update(id, input)
            }

            fn delete(db: &Database, id: i64) -> DbResult<bool> {
                db.$delete(id)
            }
        }
    };
}

resource!(Patients at "/patients" {
    retained: ["email"],
    output: Patient,
    input: PatientInput,
    list: list_patients,
    get: get_patient,
    current: get_patient,
    create: create_patient,
    update: update_patient,
    delete: delete_patient,
});

resource!(TestCategories at "/test-categories" {
    retained: [],
    output: TestCategory,
    input: TestCategoryInput,
    list: list_test_categories,
    get: get_test_category,
    current: get_test_category,
    create: create_test_category,
    update: update_test_category,
    delete: delete_test_category,
});

resource!(LabTests at "/lab-tests" {
    retained: [],
    output: LabTest,
    input: LabTestInput,
    list: list_lab_tests,
    get: get_lab_test,
    current: get_lab_test,
    create: create_lab_test,
    update: update_lab_test,
    delete: delete_lab_test,
});

resource!(TestParameters at "/test-parameters" {
    retained: [],
    output: TestParameter,
    input: TestParameterInput,
    list: list_test_parameters,
    get: get_test_parameter,
    current: get_test_parameter,
    create: create_test_parameter,
    update: update_test_parameter,
    delete: delete_test_parameter,
});

resource!(Reports at "/reports" {
    retained: ["status", "doctor_remarks"],
    output: ReportDetail,
    input: ReportInput,
    list: list_report_details,
    get: get_report_detail,
    current: get_report,
    create: create_report,
    update: update_report,
    delete: delete_report,
});

resource!(TestResults at "/test-results" {
    retained: ["value"],
    output: TestResultView,
    input: TestResultInput,
    list: list_test_result_views,
    get: get_test_result_view,
    current: get_test_result,
    create: create_test_result,
    update: update_test_result,
    delete: delete_test_result,
});

resource!(Employees at "/employees" {
    retained: ["is_active"],
    output: Employee,
    input: EmployeeInput,
    list: list_employees,
    get: get_employee,
    current: get_employee,
    create: create_employee,
    update: update_employee,
    delete: delete_employee,
});

resource!(Attendance at "/attendance" {
    retained: ["check_in", "check_out"],
    output: EmployeeAttendance,
    input: EmployeeAttendanceInput,
    list: list_attendance,
    get: get_attendance,
    current: get_attendance,
    create: create_attendance,
    update: update_attendance,
    delete: delete_attendance,
});

resource!(ActivityLogs at "/activity-logs" {
    retained: [],
    output: ActivityLog,
    input: ActivityLogInput,
    list: list_activity_logs,
    get: get_activity_log,
    current: get_activity_log,
    create: create_activity_log,
    update: update_activity_log,
    delete: delete_activity_log,
});

resource!(NotificationPreferences at "/notification-preferences" {
    retained: [
        "email_notifications",
        "sms_alerts",
        "test_results_ready",
        "system_updates",
    ],
    output: NotificationPreference,
    input: NotificationPreferenceInput,
    list: list_notification_preferences,
    get: get_notification_preference,
    current: get_notification_preference,
    create: create_notification_preference,
    update: update_notification_preference,
    delete: delete_notification_preference,
});

/// Routes for every collection.
pub fn routes() -> Router<AppState> {
    let router = Router::new();
    let router = mount::<Patients>(router);
    let router = mount::<TestCategories>(router);
    let router = mount::<LabTests>(router);
    let router = mount::<TestParameters>(router);
    let router = mount::<Reports>(router);
    let router = mount::<TestResults>(router);
    let router = mount::<Employees>(router);
    let router = mount::<Attendance>(router);
    let router = mount::<ActivityLogs>(router);
    mount::<NotificationPreferences>(router)
}

fn mount<R: Resource>(router: Router<AppState>) -> Router<AppState> {
    router
        .route(R::PATH, get(list::<R>).post(create::<R>))
        .route(
            &format!("{}/:id", R::PATH),
            get(retrieve::<R>)
                .put(update::<R>)
                .patch(partial_update::<R>)
                .delete(destroy::<R>),
        )
}

async fn list<R: Resource>(State(state): State<AppState>) -> ApiResult<Json<Vec<R::Output>>> {
    let db = state.db()?;
    Ok(Json(R::list(&db)?))
}

async fn retrieve<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<R::Output>> {
    let db = state.db()?;
    R::get(&db, id)?.map(Json).ok_or(ApiError::NotFound)
}

async fn create<R: Resource>(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<R::Input>,
) -> ApiResult<(StatusCode, Json<R::Output>)> {
    let db = state.db()?;
    let created = R::create(&db, &input)?;
    debug!(collection = R::PATH, "created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Full update. Retained fields the body omits keep their stored values;
/// every other omitted field is validated as missing.
async fn update<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<Json<R::Output>> {
    let db = state.db()?;
    let current = R::current_input(&db, id)?.ok_or(ApiError::NotFound)?;

    let body = match body {
        Value::Object(mut fields) => {
            if let Value::Object(stored) = to_value(current)? {
                for &name in R::RETAINED {
                    if fields.contains_key(name) {
                        continue;
                    }
                    if let Some(value) = stored.get(name) {
                        fields.insert(name.to_string(), value.clone());
                    }
                }
            }
            Value::Object(fields)
        }
        other => other,
    };
    let input: R::Input = serde_json::from_value(body)?;

    R::update(&db, id, &input)?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// Merge the supplied fields over the current values, then update as PUT would.
async fn partial_update<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonBody(patch): JsonBody<Value>,
) -> ApiResult<Json<R::Output>> {
    let Value::Object(patch) = patch else {
        return Err(ApiError::BadRequest(
            "Invalid data. Expected a dictionary.".to_string(),
        ));
    };

    let db = state.db()?;
    let current = R::current_input(&db, id)?.ok_or(ApiError::NotFound)?;
    let mut merged = to_value(current)?;
    if let Value::Object(fields) = &mut merged {
        fields.extend(patch);
    }
    let input: R::Input = serde_json::from_value(merged)?;

    R::update(&db, id, &input)?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn destroy<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let db = state.db()?;
    if !R::delete(&db, id)? {
        return Err(ApiError::NotFound);
    }
    info!(collection = R::PATH, id, "deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Stored values in write shape as a JSON object.
fn to_value<T: Serialize>(current: T) -> ApiResult<Value> {
    serde_json::to_value(current).map_err(|e| ApiError::Internal(e.to_string()))
}
