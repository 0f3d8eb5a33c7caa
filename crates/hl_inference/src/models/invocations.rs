use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use hl_core::{Error, Result, SentimentModel};
use std::fmt;
use url::Url;
use crate::{Config, DEFAULT_MODEL_URL};

#[derive(Serialize)]
struct InvocationRequest<'a> {
    instances: Vec<Instance<'a>>,
}

#[derive(Serialize)]
struct Instance<'a> {
    text: &'a [String],
}

#[derive(Deserialize)]
struct InvocationResponse {
    predictions: Vec<i64>,
}

/// Client for a model server exposing `POST /invocations`.
pub struct InvocationsModel {
    client: Client,
    endpoint: Url,
}

impl InvocationsModel {
    pub fn new(config: &Config) -> Result<Self> {
        let raw = config.model_url.as_deref().unwrap_or(DEFAULT_MODEL_URL);
        let endpoint = Url::parse(raw)
            .map_err(|e| Error::Config(format!("Invalid model URL {}: {}", raw, e)))?;
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl fmt::Debug for InvocationsModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationsModel")
            .field("client", &"<reqwest::Client>")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

#[async_trait]
impl SentimentModel for InvocationsModel {
    fn name(&self) -> &str {
        "invocations"
    }

    async fn predict(&self, texts: &[String]) -> Result<Vec<i64>> {
        let request = InvocationRequest {
            instances: vec![Instance { text: texts }],
        };

        let response = self.client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::BatchInference(format!("request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| Error::BatchInference(format!("model server rejected batch: {}", e)))?
            .json::<InvocationResponse>()
            .await
            .map_err(|e| Error::BatchInference(format!("malformed response: {}", e)))?;

        Ok(response.predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::time::Duration;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/invocations", addr)
    }

    fn model_for(url: String) -> InvocationsModel {
        InvocationsModel::new(&Config {
            model_name: None,
            model_url: Some(url),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_predict_sends_instances_payload() {
        // Echo back the length of each text as the label so the payload shape is checked.
        let app = Router::new().route(
            "/invocations",
            post(|Json(body): Json<Value>| async move {
                let texts = body["instances"][0]["text"].as_array().cloned().unwrap_or_default();
                let predictions: Vec<i64> = texts
                    .iter()
                    .map(|t| t.as_str().map(|s| s.len() as i64 % 3).unwrap_or(-1))
                    .collect();
                Json(json!({ "predictions": predictions }))
            }),
        );
        let model = model_for(serve(app).await);

        let texts = vec!["a".to_string(), "bb".to_string(), "ccc".to_string()];
        let predictions = model.predict(&texts).await.unwrap();
        assert_eq!(predictions, vec![1, 2, 0]);
    }

    #[tokio::test]
    async fn test_server_error_is_batch_error() {
        let app = Router::new().route(
            "/invocations",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model crashed") }),
        );
        let model = model_for(serve(app).await);

        let result = model.predict(&["headline".to_string()]).await;
        assert!(matches!(result, Err(Error::BatchInference(_))));
    }

    #[tokio::test]
    async fn test_malformed_response_is_batch_error() {
        let app = Router::new().route(
            "/invocations",
            post(|| async { Json(json!({ "outputs": [1] })) }),
        );
        let model = model_for(serve(app).await);

        let result = model.predict(&["headline".to_string()]).await;
        assert!(matches!(result, Err(Error::BatchInference(_))));
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        let result = InvocationsModel::new(&Config {
            model_name: None,
            model_url: Some("not a url".to_string()),
            timeout: Duration::from_secs(1),
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
