use std::sync::Arc;
use hl_core::{Error, Result, SentimentModel};
use crate::Config;

pub mod dummy;
pub mod invocations;

pub use dummy::DummyModel;
pub use invocations::InvocationsModel;

pub async fn create_model(config: Option<Config>) -> Result<Arc<dyn SentimentModel>> {
    let config = config.unwrap_or_default();
    match config.model_name.as_deref().unwrap_or("invocations") {
        "invocations" | "mlflow" => {
            let model = InvocationsModel::new(&config)?;
            tracing::info!("🧠 Using inference endpoint at {}", model.endpoint());
            Ok(Arc::new(model))
        }
        "dummy" => {
            tracing::info!("🧠 Using dummy model, every headline is labelled neutral");
            Ok(Arc::new(DummyModel::new()))
        }
        other => Err(Error::Config(format!(
            "Unknown model: {}. Available models: invocations (default), dummy",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_model_defaults_to_invocations() {
        let model = create_model(None).await.unwrap();
        assert_eq!(model.name(), "invocations");
    }

    #[tokio::test]
    async fn test_create_dummy_model() {
        let config = Config {
            model_name: Some("dummy".to_string()),
            ..Config::default()
        };
        let model = create_model(Some(config)).await.unwrap();
        assert_eq!(model.name(), "dummy");
    }

    #[tokio::test]
    async fn test_unknown_model_is_config_error() {
        let config = Config {
            model_name: Some("ollama".to_string()),
            ..Config::default()
        };
        let result = create_model(Some(config)).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
