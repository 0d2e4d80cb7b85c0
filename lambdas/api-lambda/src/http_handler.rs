use lambda_http::{http::Method, Body, Error, Request, RequestExt, Response};
use qpaper_shared::types::PaperQuery;
use qpaper_shared::{papers, responses, users, AppState};
use std::sync::Arc;

/// Main Lambda handler - routes requests to user or paper endpoints.
/// Role checks happen upstream in the API Gateway authorizer.
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method();
    let path = event.uri().path();
    let body = event.body();
    tracing::info!("Paper API invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if *method == Method::OPTIONS {
        return responses::preflight();
    }

    let store = state.store.as_ref();
    let objects = state.objects.as_ref();
    let config = &state.config;
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let query_param = |name: &str| {
        event
            .query_string_parameters_ref()
            .and_then(|params| params.first(name))
            .map(|s| s.to_string())
    };

    match parts.as_slice() {
        ["users"] => match *method {
            // POST /users - create (or overwrite) a user
            Method::POST => users::create_user(store, &config.users_table, body).await,
            // GET /users?role= - list users
            Method::GET => {
                let role = query_param("role");
                users::list_users(store, &config.users_table, role.as_deref()).await
            }
            _ => responses::method_not_allowed(),
        },
        ["users", user_id] => match *method {
            // GET /users/{id} - get user
            Method::GET => users::get_user(store, &config.users_table, user_id).await,
            // PATCH /users/{id} - verify / change role
            Method::PATCH => users::update_user(store, &config.users_table, user_id, body).await,
            _ => responses::method_not_allowed(),
        },
        ["papers"] => match *method {
            // POST /papers - submit a paper, returns an upload URL
            Method::POST => papers::submit_paper(store, objects, &config.papers_table, body).await,
            // GET /papers?status=&submittedBy=&requestedBy= - list papers
            Method::GET => {
                let query = PaperQuery {
                    status: query_param("status"),
                    submitted_by: query_param("submittedBy"),
                    requested_by: query_param("requestedBy"),
                };
                papers::list_papers(store, &config.papers_table, &query).await
            }
            _ => responses::method_not_allowed(),
        },
        ["papers", paper_id] => match *method {
            // GET /papers/{id} - presigned download URL
            Method::GET => {
                papers::download_paper(store, objects, &config.papers_table, paper_id).await
            }
            // PUT /papers/{id} - evaluate
            Method::PUT => {
                papers::evaluate_paper(store, &config.papers_table, paper_id, body).await
            }
            _ => responses::method_not_allowed(),
        },
        _ => {
            tracing::warn!("No route matched - Method: {} Path: {}", method, path);
            responses::not_found()
        }
    }
}
