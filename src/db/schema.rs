//! DDL for the dashboard's own tables on a user-supplied database.
//! Runs as one simple-protocol batch; every statement is idempotent.

/// - `saved_prompts`, `api_credentials`, `ai_personas`, `ai_settings`
/// - `user_id` is a plain string tag, no foreign keys
/// - `ai_settings.user_id` is unique so settings can be upserted per user
pub const APP_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS saved_prompts (
    id VARCHAR(255) PRIMARY KEY,
    user_id VARCHAR(255) NOT NULL,
    name VARCHAR(255) NOT NULL,
    prompt TEXT NOT NULL,
    category VARCHAR(100) NOT NULL,
    tags TEXT[],
    auto_execute BOOLEAN DEFAULT FALSE,
    is_starred BOOLEAN DEFAULT FALSE,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    last_used TIMESTAMP,
    usage_count INTEGER DEFAULT 0,
    variables JSONB,
    description TEXT
);

CREATE TABLE IF NOT EXISTS api_credentials (
    id VARCHAR(255) PRIMARY KEY,
    user_id VARCHAR(255) NOT NULL,
    provider_id VARCHAR(100) NOT NULL,
    name VARCHAR(255) NOT NULL,
    api_key TEXT NOT NULL,
    model VARCHAR(255) NOT NULL,
    is_default BOOLEAN DEFAULT FALSE,
    is_active BOOLEAN DEFAULT TRUE,
    last_tested TIMESTAMP,
    status VARCHAR(50) DEFAULT 'untested',
    usage_data JSONB,
    settings JSONB,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS ai_personas (
    id VARCHAR(255) PRIMARY KEY,
    user_id VARCHAR(255) NOT NULL,
    name VARCHAR(255) NOT NULL,
    description TEXT,
    instructions TEXT NOT NULL,
    tone VARCHAR(100) NOT NULL,
    expertise TEXT[],
    is_default BOOLEAN DEFAULT FALSE,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS ai_settings (
    id VARCHAR(255) PRIMARY KEY,
    user_id VARCHAR(255) NOT NULL,
    default_persona VARCHAR(255),
    temperature DECIMAL(3,2) DEFAULT 0.7,
    max_tokens INTEGER DEFAULT 2048,
    top_p DECIMAL(3,2) DEFAULT 0.9,
    frequency_penalty DECIMAL(3,2) DEFAULT 0,
    presence_penalty DECIMAL(3,2) DEFAULT 0,
    response_format VARCHAR(50) DEFAULT 'detailed',
    include_explanations BOOLEAN DEFAULT TRUE,
    show_confidence BOOLEAN DEFAULT FALSE,
    enable_context_memory BOOLEAN DEFAULT TRUE,
    max_context_length INTEGER DEFAULT 4000,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_saved_prompts_user_id ON saved_prompts(user_id);
CREATE INDEX IF NOT EXISTS idx_api_credentials_user_id ON api_credentials(user_id);
CREATE INDEX IF NOT EXISTS idx_ai_personas_user_id ON ai_personas(user_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_ai_settings_user_id ON ai_settings(user_id);
"#;

/// Tables created by [`APP_SCHEMA`].
pub const APP_TABLES: [&str; 4] = ["saved_prompts", "api_credentials", "ai_personas", "ai_settings"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_app_table_is_created_idempotently() {
        for table in APP_TABLES {
            assert!(
                APP_SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {table} (")),
                "missing DDL for {table}"
            );
        }
        assert_eq!(
            APP_SCHEMA.matches("CREATE TABLE").count(),
            APP_SCHEMA.matches("CREATE TABLE IF NOT EXISTS").count()
        );
    }

    #[test]
    fn settings_upsert_target_is_unique() {
        assert!(APP_SCHEMA.contains("CREATE UNIQUE INDEX IF NOT EXISTS idx_ai_settings_user_id"));
    }
}
