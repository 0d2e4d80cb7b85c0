use lambda_http::{http::StatusCode, Body, Error, Response};
use serde_json::Value;

use crate::errors::{missing_as, parse_body, taken_as, ApiError};
use crate::objects::{ObjectStore, Operation, PRESIGN_TTL};
use crate::persistence::{from_item, to_item, Filter, Item, ItemStore, ReturnMode};
use crate::responses;
use crate::types::{
    DownloadPaperResponse, EvaluatePaperRequest, Paper, PaperQuery, PaperStatus,
    SubmitPaperRequest, SubmitPaperResponse,
};

/// Fields only the evaluation step may write.
const EVALUATION_FIELDS: [&str; 3] = ["rating", "feedback", "evaluatedAt"];

/// Submit a paper and hand back a presigned upload URL for its file.
///
/// The record is written before the URL is signed. If signing fails the
/// record stays, and the caller gets a 500 without an upload URL. An id that
/// is already taken is a 409; the stored paper and its file key are kept.
pub async fn submit_paper(
    store: &dyn ItemStore,
    objects: &dyn ObjectStore,
    table_name: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    match store_submission(store, objects, table_name, body).await {
        Ok(submitted) => responses::json(StatusCode::OK, &submitted),
        Err(e) => e.into_response("submit_paper"),
    }
}

async fn store_submission(
    store: &dyn ItemStore,
    objects: &dyn ObjectStore,
    table_name: &str,
    body: &[u8],
) -> Result<SubmitPaperResponse, ApiError> {
    let req: SubmitPaperRequest = parse_body(body)?;
    if req.file_key.trim().is_empty() {
        return Err(ApiError::Validation("fileKey must not be empty".into()));
    }

    let mut record = req.paper_data;
    for field in EVALUATION_FIELDS {
        record.remove(field);
    }
    record
        .entry("id")
        .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
    record.insert("fileKey".into(), Value::String(req.file_key));
    record.insert("status".into(), Value::String(PaperStatus::Pending.as_str().into()));
    record.insert("submittedDate".into(), serde_json::to_value(chrono::Utc::now())?);

    let paper: Paper = serde_json::from_value(Value::Object(record))
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    store
        .insert(table_name, to_item(&paper)?)
        .await
        .map_err(taken_as("Paper"))?;
    tracing::info!("Paper {} submitted for {}", paper.id, paper.subject);

    let upload = objects
        .presign(Operation::Upload, &paper.file_key, PRESIGN_TTL)
        .await?;

    Ok(SubmitPaperResponse {
        paper,
        upload_url: upload.url,
    })
}

/// Record an evaluation. Only rating, feedback, status and evaluatedAt change;
/// the file key stays as submitted.
pub async fn evaluate_paper(
    store: &dyn ItemStore,
    table_name: &str,
    paper_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    match store_evaluation(store, table_name, paper_id, body).await {
        Ok(paper) => responses::json(StatusCode::OK, &paper),
        Err(e) => e.into_response("evaluate_paper"),
    }
}

async fn store_evaluation(
    store: &dyn ItemStore,
    table_name: &str,
    paper_id: &str,
    body: &[u8],
) -> Result<Paper, ApiError> {
    let req: EvaluatePaperRequest = parse_body(body)?;

    let mut fields = Item::new();
    fields.insert("rating".into(), Value::from(req.rating));
    fields.insert("feedback".into(), Value::String(req.feedback));
    fields.insert("status".into(), Value::String(req.status.as_str().into()));
    fields.insert("evaluatedAt".into(), serde_json::to_value(chrono::Utc::now())?);

    let updated = store
        .update(table_name, paper_id, fields, ReturnMode::AllNew)
        .await
        .map_err(missing_as("Paper"))?
        .ok_or(ApiError::NotFound("Paper"))?;

    let paper: Paper = from_item(updated)?;
    tracing::info!("Paper {} marked {}", paper.id, paper.status.as_str());
    Ok(paper)
}

/// Presign a download of the paper's stored file.
pub async fn download_paper(
    store: &dyn ItemStore,
    objects: &dyn ObjectStore,
    table_name: &str,
    paper_id: &str,
) -> Result<Response<Body>, Error> {
    match presign_download(store, objects, table_name, paper_id).await {
        Ok(download) => responses::json(StatusCode::OK, &download),
        Err(e) => e.into_response("download_paper"),
    }
}

async fn presign_download(
    store: &dyn ItemStore,
    objects: &dyn ObjectStore,
    table_name: &str,
    paper_id: &str,
) -> Result<DownloadPaperResponse, ApiError> {
    let item = store
        .get(table_name, paper_id)
        .await?
        .ok_or(ApiError::NotFound("Paper"))?;
    let paper: Paper = from_item(item)?;

    let download = objects
        .presign(Operation::Download, &paper.file_key, PRESIGN_TTL)
        .await?;

    Ok(DownloadPaperResponse {
        download_url: download.url,
    })
}

/// List papers matching every filter that was supplied
pub async fn list_papers(
    store: &dyn ItemStore,
    table_name: &str,
    query: &PaperQuery,
) -> Result<Response<Body>, Error> {
    let mut filter = Filter::new();
    if let Some(status) = &query.status {
        filter = filter.eq("status", status.as_str());
    }
    if let Some(submitted_by) = &query.submitted_by {
        filter = filter.eq("submittedBy", submitted_by.as_str());
    }
    if let Some(requested_by) = &query.requested_by {
        filter = filter.eq("requestedBy", requested_by.as_str());
    }

    match query_papers(store, table_name, &filter).await {
        Ok(papers) => responses::json(StatusCode::OK, &papers),
        Err(e) => e.into_response("list_papers"),
    }
}

async fn query_papers(
    store: &dyn ItemStore,
    table_name: &str,
    filter: &Filter,
) -> Result<Vec<Paper>, ApiError> {
    let items = store.query(table_name, filter).await?;
    let papers = items
        .into_iter()
        .map(from_item)
        .collect::<Result<Vec<Paper>, _>>()?;
    Ok(papers)
}
