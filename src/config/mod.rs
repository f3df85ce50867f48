use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Database configuration
    pub database_url: String,
    pub db_max_connections: u32,

    // External classifier
    pub classifier_url: String,
    pub classifier_api_key: Option<String>,
    pub classifier_timeout_secs: u64,

    // Classification cache
    pub moderation_cache_ttl_secs: u64,

    // Rule engine
    pub rule_snapshot_ttl_secs: u64,

    // Moderation queue
    pub escalation_cap: u32,
    pub dispatch_retry_attempts: u32,

    // Trust ledger
    pub trust_write_retry_attempts: u32,

    // Word lists
    pub profanity_words_path: String,

    // Service configuration
    pub service_name: String,
    pub environment: String,
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .unwrap_or(20),
            classifier_url: env::var("CLASSIFIER_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/moderations".to_string()),
            classifier_api_key: env::var("CLASSIFIER_API_KEY").ok(),
            classifier_timeout_secs: env::var("CLASSIFIER_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            moderation_cache_ttl_secs: env::var("MODERATION_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .unwrap_or(3600),
            rule_snapshot_ttl_secs: env::var("RULE_SNAPSHOT_TTL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            escalation_cap: env::var("ESCALATION_CAP")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            dispatch_retry_attempts: env::var("DISPATCH_RETRY_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            trust_write_retry_attempts: env::var("TRUST_WRITE_RETRY_ATTEMPTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            profanity_words_path: env::var("PROFANITY_WORDS_PATH")
                .unwrap_or_else(|_| "data/profanity_words.txt".to_string()),
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "safety-engine".to_string()),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            db_max_connections: 20,
            classifier_url: "https://api.openai.com/v1/moderations".to_string(),
            classifier_api_key: None,
            classifier_timeout_secs: 5,
            moderation_cache_ttl_secs: 3600,
            rule_snapshot_ttl_secs: 30,
            escalation_cap: 3,
            dispatch_retry_attempts: 3,
            trust_write_retry_attempts: 5,
            profanity_words_path: "data/profanity_words.txt".to_string(),
            service_name: "safety-engine".to_string(),
            environment: "development".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        env::set_var("DATABASE_URL", "postgres://test");
        let config = Config::from_env().unwrap();
        assert_eq!(config.classifier_timeout_secs, 5);
        assert_eq!(config.escalation_cap, 3);
        assert_eq!(config.moderation_cache_ttl_secs, 3600);
    }
}
