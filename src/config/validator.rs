use crate::config::{Config, VectorBackend, SCHEMA_VERSION};
use crate::error::{Result, RerankError, ValidationError};
use std::net::SocketAddr;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every violation
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_ingestion(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_vector(config, &mut errors);
        Self::validate_lexical(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_server(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RerankError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_ingestion(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.ingestion.max_words == 0 {
            errors.push(ValidationError::new(
                "ingestion.max_words",
                "Max words per chunk must be greater than 0",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }
    }

    fn validate_vector(config: &Config, errors: &mut Vec<ValidationError>) {
        // Graph parameters are irrelevant to the exact backend
        if config.vector.backend != VectorBackend::Hnsw {
            return;
        }

        if config.vector.hnsw_m == 0 {
            errors.push(ValidationError::new(
                "vector.hnsw_m",
                "HNSW M must be greater than 0",
            ));
        }

        if config.vector.hnsw_ef_construction == 0 {
            errors.push(ValidationError::new(
                "vector.hnsw_ef_construction",
                "HNSW ef_construction must be greater than 0",
            ));
        }

        if config.vector.hnsw_ef_search == 0 {
            errors.push(ValidationError::new(
                "vector.hnsw_ef_search",
                "HNSW ef_search must be greater than 0",
            ));
        }
    }

    fn validate_lexical(config: &Config, errors: &mut Vec<ValidationError>) {
        let lexical = &config.lexical;
        if !(lexical.k1 > 0.0) {
            errors.push(ValidationError::new(
                "lexical.k1",
                format!("k1 must be positive, got {}", lexical.k1),
            ));
        }

        if !(0.0..=1.0).contains(&lexical.b) {
            errors.push(ValidationError::new(
                "lexical.b",
                format!("b must be between 0.0 and 1.0, got {}", lexical.b),
            ));
        }

        if !(lexical.epsilon >= 0.0) {
            errors.push(ValidationError::new(
                "lexical.epsilon",
                format!("epsilon must be non-negative, got {}", lexical.epsilon),
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;
        if !(0.0..=1.0).contains(&retrieval.alpha) {
            errors.push(ValidationError::new(
                "retrieval.alpha",
                format!("Alpha must be between 0.0 and 1.0, got {}", retrieval.alpha),
            ));
        }

        if retrieval.default_top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.default_top_k",
                "Default top_k must be greater than 0",
            ));
        }

        if retrieval.candidate_pool < retrieval.default_top_k {
            errors.push(ValidationError::new(
                "retrieval.candidate_pool",
                format!(
                    "Candidate pool ({}) must be at least default_top_k ({})",
                    retrieval.candidate_pool, retrieval.default_top_k
                ),
            ));
        }
    }

    fn validate_server(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.server.bind.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "server.bind",
                format!("Invalid socket address: {}", config.server.bind),
            ));
        }

        if config.server.max_connections == 0 {
            errors.push(ValidationError::new(
                "server.max_connections",
                "Max connections must be greater than 0",
            ));
        }
    }
}
